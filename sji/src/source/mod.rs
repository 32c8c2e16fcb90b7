//! Input sources
//!
//! Reads the exported security configuration and the user/group association
//! file, and turns them into an [`ImportPlan`] before the pipeline starts.
//! Any read or parse error here is an input error and stops the run.

mod security;
mod users;

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{GROUP_MEMBERS_SINCE, GroupRecord, PermissionRecord, PermissionV2Record, UserRecord, Version};

pub use security::{ExportedAce, ExportedAcl, ExportedGroup, ExportedTarget, SecurityExport};
pub use users::{
    ExportedUser, GroupMembers, GroupsWithUsers, PLACEHOLDER_PASSWORD, UsersWithGroups, normalize_email_domain,
};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Which association file format supplies users
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSource {
    /// `users[]`, each with its `groups`
    UsersWithGroups,
    /// `groups[]`, each with its `userNames`
    GroupsWithUsers,
}

/// User import settings
#[derive(Debug, Clone)]
pub struct UserImport {
    pub source: UserSource,
    pub path: PathBuf,
    pub email_domain: String,
}

/// What to read and which kinds to include
#[derive(Debug, Clone)]
pub struct SourceOptions {
    pub security_json: PathBuf,
    pub import_groups: bool,
    /// `None` skips user import
    pub users: Option<UserImport>,
    pub import_permissions: bool,
}

/// Permission targets in the shape the remote version accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionPlan {
    Legacy(Vec<PermissionRecord>),
    V2(Vec<PermissionV2Record>),
}

impl PermissionPlan {
    pub fn len(&self) -> usize {
        match self {
            PermissionPlan::Legacy(p) => p.len(),
            PermissionPlan::V2(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PermissionPlan {
    fn default() -> Self {
        PermissionPlan::V2(Vec::new())
    }
}

/// Parsed records, ready for the producer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportPlan {
    pub groups: Vec<GroupRecord>,
    pub users: Vec<UserRecord>,
    pub permissions: PermissionPlan,
}

impl ImportPlan {
    /// Read every enabled input and shape permissions for `remote_version`
    pub fn load(options: &SourceOptions, remote_version: Version) -> Result<Self, SourceError> {
        debug!(?options, %remote_version, "ImportPlan::load: called");
        info!("Reading security export {}", options.security_json.display());
        let export: SecurityExport = read_json(&options.security_json)?;

        let groups = if options.import_groups {
            let groups = export.group_records();
            info!("Number of groups: {}", groups.len());
            groups
        } else {
            info!("Skipping group import");
            Vec::new()
        };

        let users = match &options.users {
            Some(user_import) => load_users(user_import, remote_version)?,
            None => {
                info!("Skipping user import");
                Vec::new()
            }
        };

        let permissions = if !options.import_permissions {
            info!("Skipping permission import");
            PermissionPlan::default()
        } else if remote_version.supports_permission_v2() {
            let perms = export.v2_permissions();
            info!(
                "{} detected, using v2 permissions: {} targets ({} repo, {} build ACLs)",
                remote_version,
                perms.len(),
                export.repo_acls.len(),
                export.build_acls.len()
            );
            PermissionPlan::V2(perms)
        } else {
            let perms = export.legacy_permissions();
            info!("{} detected, using v1 permissions: {} targets", remote_version, perms.len());
            PermissionPlan::Legacy(perms)
        };

        Ok(Self {
            groups,
            users,
            permissions,
        })
    }

    pub fn task_count(&self) -> usize {
        self.groups.len() + self.users.len() + self.permissions.len()
    }
}

fn load_users(user_import: &UserImport, remote_version: Version) -> Result<Vec<UserRecord>, SourceError> {
    debug!(source = ?user_import.source, path = %user_import.path.display(), "load_users: called");
    let users = match user_import.source {
        UserSource::UsersWithGroups => {
            let input: UsersWithGroups = read_json(&user_import.path)?;
            input.user_records()
        }
        UserSource::GroupsWithUsers => {
            if remote_version < GROUP_MEMBERS_SINCE {
                warn!(
                    "Group member lists need a source of at least {}; importing into {}, proceed with caution",
                    GROUP_MEMBERS_SINCE, remote_version
                );
            }
            let input: GroupsWithUsers = read_json(&user_import.path)?;
            input.user_records(&user_import.email_domain)
        }
    };
    info!("Number of users: {}", users.len());
    Ok(users)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, SourceError> {
    let content = fs::read(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&content).map_err(|source| SourceError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
