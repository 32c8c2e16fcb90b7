//! securityimport configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};

use crate::pipeline::{PipelineConfig, SkipIndex};
use crate::remote::{CredentialPool, Credentials, RetryPolicy};
use crate::source::{SourceOptions, UserImport, UserSource, normalize_email_domain};

/// Usernames that imports commonly carry and would overwrite mid-run
pub const FORBIDDEN_USERNAMES: [&str; 3] = ["admin", "access-admin", "system"];

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Target system
    pub remote: RemoteConfig,

    /// Retry policy
    pub http: HttpConfig,

    /// Worker pool
    pub workers: WorkersConfig,

    /// What to import and how
    pub import: ImportConfig,

    /// TRACE, DEBUG, INFO, WARN or ERROR
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RemoteConfig {
    /// Base URL including any context path
    pub url: String,
    pub username: String,
    pub apikey: String,

    /// One `username password` pair per line; replaces username/apikey
    pub creds_file: Option<PathBuf>,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            apikey: String::new(),
            creds_file: None,
            timeout_ms: 120_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpConfig {
    pub max_retries: u32,
    pub backoff_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct WorkersConfig {
    pub count: usize,
    pub poll_interval_secs: u64,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            count: 50,
            poll_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ImportConfig {
    /// Exported security configuration
    pub security_json: Option<PathBuf>,

    /// Users-with-groups or groups-with-users file
    pub user_group_file: Option<PathBuf>,
    pub users_with_groups: bool,
    pub users_from_groups: bool,
    pub user_email_domain: String,

    pub skip_group_import: bool,
    pub skip_user_import: bool,
    pub skip_permission_import: bool,

    pub group_skip_index: usize,
    pub user_skip_index: usize,
    pub permission_skip_index: usize,

    pub drain_prompt_after_secs: u64,
    pub max_replay_rounds: u32,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            security_json: None,
            user_group_file: None,
            users_with_groups: false,
            users_from_groups: false,
            user_email_domain: "@example.com".to_string(),
            skip_group_import: false,
            skip_user_import: false,
            skip_permission_import: false,
            group_skip_index: 0,
            user_skip_index: 0,
            permission_skip_index: 0,
            drain_prompt_after_secs: 60,
            max_replay_rounds: 5,
        }
    }
}

/// Reject usernames the import itself would overwrite
pub fn check_username(username: &str) -> Result<()> {
    if FORBIDDEN_USERNAMES.contains(&username) {
        return Err(eyre!(
            "Username '{}' is commonly part of an import and would be overwritten mid-run; use a dedicated account",
            username
        ));
    }
    Ok(())
}

impl Config {
    /// Fail fast on settings that would break the run
    pub fn validate(&self) -> Result<()> {
        if self.remote.url.trim().is_empty() {
            return Err(eyre!("Remote URL is required (--url or remote.url)"));
        }
        if self.remote.creds_file.is_none() {
            if self.remote.username.is_empty() || self.remote.apikey.is_empty() {
                return Err(eyre!(
                    "Username and API key are required unless a credentials file is given"
                ));
            }
            check_username(&self.remote.username)?;
        }
        if self.import.security_json.is_none() {
            return Err(eyre!("Security JSON path is required (--security-json or import.security-json)"));
        }
        if self.workers.count == 0 {
            return Err(eyre!("Worker count must be at least 1"));
        }
        if !self.import.skip_user_import {
            match (self.import.users_with_groups, self.import.users_from_groups) {
                (true, true) => {
                    return Err(eyre!("Choose only one of users-with-groups and users-from-groups"));
                }
                (false, false) => {
                    return Err(eyre!(
                        "Choose one of users-with-groups and users-from-groups, or skip user import"
                    ));
                }
                _ => {}
            }
            if self.import.user_group_file.is_none() {
                return Err(eyre!("User import needs a user group file (--user-group-file)"));
            }
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local: .securityimport.yml
        let local_config = PathBuf::from(".securityimport.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User: ~/.config/securityimport/securityimport.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("securityimport").join("securityimport.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::debug!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Credentials file if configured, otherwise the single username/apikey pair
    pub fn credential_pool(&self) -> Result<CredentialPool> {
        let pool = match &self.remote.creds_file {
            Some(path) => CredentialPool::from_file(path)
                .context(format!("Failed to load credentials from {}", path.display()))?,
            None => CredentialPool::single(Credentials::new(&self.remote.username, &self.remote.apikey)),
        };
        for credentials in pool.iter() {
            check_username(&credentials.username)?;
        }
        Ok(pool)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.remote.timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.http.max_retries,
            backoff: Duration::from_secs(self.http.backoff_secs),
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            workers: self.workers.count,
            poll_interval: Duration::from_secs(self.workers.poll_interval_secs),
            skip: SkipIndex {
                group: self.import.group_skip_index,
                user: self.import.user_skip_index,
                permission: self.import.permission_skip_index,
            },
            drain_prompt_after: Duration::from_secs(self.import.drain_prompt_after_secs),
            max_replay_rounds: self.import.max_replay_rounds,
        }
    }

    /// Input selection; call after `validate`
    pub fn source_options(&self) -> Result<SourceOptions> {
        let security_json = self
            .import
            .security_json
            .clone()
            .ok_or_else(|| eyre!("Security JSON path is required"))?;

        let users = if self.import.skip_user_import {
            None
        } else {
            let path = self
                .import
                .user_group_file
                .clone()
                .ok_or_else(|| eyre!("User import needs a user group file"))?;
            let source = if self.import.users_with_groups {
                UserSource::UsersWithGroups
            } else {
                UserSource::GroupsWithUsers
            };
            Some(UserImport {
                source,
                path,
                email_domain: normalize_email_domain(&self.import.user_email_domain),
            })
        };

        Ok(SourceOptions {
            security_json,
            import_groups: !self.import.skip_group_import,
            users,
            import_permissions: !self.import.skip_permission_import,
        })
    }
}
