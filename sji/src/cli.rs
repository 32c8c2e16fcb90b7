//! Command-line flags

use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

use crate::config::Config;

/// securityimport - bulk import of groups, users and permission targets
#[derive(Debug, Parser)]
#[command(
    name = "sji",
    about = "Bulk import of an exported security configuration through the admin REST API",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)")]
    pub log_level: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Base URL of the target, including any context path
    #[arg(long)]
    pub url: Option<String>,

    #[arg(short, long)]
    pub username: Option<String>,

    /// API key or password
    #[arg(long)]
    pub apikey: Option<String>,

    /// File with one `username password` pair per line
    #[arg(long, value_name = "PATH")]
    pub creds_file: Option<PathBuf>,

    /// Exported security configuration (groups and ACLs)
    #[arg(long, value_name = "PATH")]
    pub security_json: Option<PathBuf>,

    /// Users-with-groups or groups-with-users file
    #[arg(long, value_name = "PATH")]
    pub user_group_file: Option<PathBuf>,

    /// The user group file lists users, each with its groups
    #[arg(long, conflicts_with = "users_from_groups")]
    pub users_with_groups: bool,

    /// The user group file lists groups, each with its members
    #[arg(long)]
    pub users_from_groups: bool,

    /// Domain appended to member names that are not email addresses
    #[arg(long, value_name = "DOMAIN")]
    pub user_email_domain: Option<String>,

    #[arg(long)]
    pub skip_group_import: bool,

    #[arg(long)]
    pub skip_user_import: bool,

    #[arg(long)]
    pub skip_permission_import: bool,

    /// Skip groups with an ordinal below this index
    #[arg(long, value_name = "N")]
    pub group_skip_index: Option<usize>,

    /// Skip users with an ordinal below this index
    #[arg(long, value_name = "N")]
    pub user_skip_index: Option<usize>,

    /// Skip permission targets with an ordinal below this index
    #[arg(long, value_name = "N")]
    pub permission_skip_index: Option<usize>,

    /// Number of concurrent workers
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Seconds the dispatcher sleeps when the work queue is empty
    #[arg(long, value_name = "SECS")]
    pub worker_sleep: Option<u64>,

    /// Retries per request before giving up
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Seconds between retries
    #[arg(long, value_name = "SECS")]
    pub backoff_secs: Option<u64>,

    /// Per-request timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Offer a manual break after draining this long
    #[arg(long, value_name = "SECS")]
    pub drain_prompt_after_secs: Option<u64>,

    /// Maximum failure replay rounds
    #[arg(long, value_name = "N")]
    pub max_replay_rounds: Option<u32>,

    /// Answer yes to every retry prompt; the manual break is never offered
    #[arg(short = 'y', long, conflicts_with = "assume_no")]
    pub assume_yes: bool,

    /// Answer no to every retry prompt; the manual break is never offered
    #[arg(long)]
    pub assume_no: bool,
}

impl Cli {
    /// Layer flags over file configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        debug!("Cli::apply_overrides: called");
        if let Some(v) = &self.url {
            config.remote.url = v.clone();
        }
        if let Some(v) = &self.username {
            config.remote.username = v.clone();
        }
        if let Some(v) = &self.apikey {
            config.remote.apikey = v.clone();
        }
        if let Some(v) = &self.creds_file {
            config.remote.creds_file = Some(v.clone());
        }
        if let Some(v) = self.timeout_ms {
            config.remote.timeout_ms = v;
        }

        if let Some(v) = self.max_retries {
            config.http.max_retries = v;
        }
        if let Some(v) = self.backoff_secs {
            config.http.backoff_secs = v;
        }

        if let Some(v) = self.workers {
            config.workers.count = v;
        }
        if let Some(v) = self.worker_sleep {
            config.workers.poll_interval_secs = v;
        }

        let import = &mut config.import;
        if let Some(v) = &self.security_json {
            import.security_json = Some(v.clone());
        }
        if let Some(v) = &self.user_group_file {
            import.user_group_file = Some(v.clone());
        }
        if self.users_with_groups {
            import.users_with_groups = true;
            import.users_from_groups = false;
        }
        if self.users_from_groups {
            import.users_from_groups = true;
            import.users_with_groups = false;
        }
        if let Some(v) = &self.user_email_domain {
            import.user_email_domain = v.clone();
        }
        import.skip_group_import |= self.skip_group_import;
        import.skip_user_import |= self.skip_user_import;
        import.skip_permission_import |= self.skip_permission_import;
        if let Some(v) = self.group_skip_index {
            import.group_skip_index = v;
        }
        if let Some(v) = self.user_skip_index {
            import.user_skip_index = v;
        }
        if let Some(v) = self.permission_skip_index {
            import.permission_skip_index = v;
        }
        if let Some(v) = self.drain_prompt_after_secs {
            import.drain_prompt_after_secs = v;
        }
        if let Some(v) = self.max_replay_rounds {
            import.max_replay_rounds = v;
        }

        if let Some(v) = &self.log_level {
            config.log_level = Some(v.clone());
        }
    }

    /// Fixed answer for every prompt, if one was requested
    pub fn assumed_answer(&self) -> Option<bool> {
        match (self.assume_yes, self.assume_no) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_overrides_win_over_file() {
        let mut config: Config = serde_yaml::from_str(
            "remote:\n  url: http://file\n  username: fromfile\nworkers:\n  count: 10\nimport:\n  users-with-groups: true\n",
        )
        .unwrap();
        let cli = Cli::parse_from([
            "sji",
            "--url",
            "http://flag",
            "--workers",
            "4",
            "--users-from-groups",
            "--permission-skip-index",
            "12",
            "--skip-group-import",
        ]);
        cli.apply_overrides(&mut config);

        assert_eq!(config.remote.url, "http://flag");
        assert_eq!(config.remote.username, "fromfile");
        assert_eq!(config.workers.count, 4);
        assert!(config.import.users_from_groups);
        assert!(!config.import.users_with_groups);
        assert_eq!(config.import.permission_skip_index, 12);
        assert!(config.import.skip_group_import);
    }

    #[test]
    fn test_assumed_answer() {
        assert_eq!(Cli::parse_from(["sji"]).assumed_answer(), None);
        assert_eq!(Cli::parse_from(["sji", "-y"]).assumed_answer(), Some(true));
        assert_eq!(Cli::parse_from(["sji", "--assume-no"]).assumed_answer(), Some(false));
        assert!(Cli::try_parse_from(["sji", "--assume-yes", "--assume-no"]).is_err());
    }

    #[test]
    fn test_user_sources_conflict() {
        assert!(Cli::try_parse_from(["sji", "--users-with-groups", "--users-from-groups"]).is_err());
    }
}
