//! Domain types for the import pipeline
//!
//! - [`Task`] - sum type over importable record kinds plus the End sentinel
//! - Payload records serialized exactly as the remote admin API expects
//! - [`Version`] - remote server version used to pick the permission shape

mod payload;
mod task;
mod version;

pub use payload::{
    ExistingUser, GroupRecord, PermissionRecord, PermissionScope, PermissionV2Record, PrincipalMap, Principals,
    UserRecord,
};
pub use task::{Entry, Task, TaskKind};
pub use version::{GROUP_MEMBERS_SINCE, PERMISSION_V2_SINCE, ParseVersionError, Version, VersionInfo};
