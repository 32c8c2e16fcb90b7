//! Task sum type flowing through the import pipeline

use std::fmt;

use serde::Serialize;

use super::payload::{GroupRecord, PermissionRecord, PermissionV2Record, UserRecord};

/// Discriminant of a [`Task`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Group,
    Permission,
    PermissionV2,
    User,
    End,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskKind::Group => "group",
            TaskKind::Permission => "permission",
            TaskKind::PermissionV2 => "permissionV2",
            TaskKind::User => "user",
            TaskKind::End => "end",
        };
        write!(f, "{}", s)
    }
}

/// An importable record with its per-kind ordinal and remote key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<T> {
    /// Zero-based position within the kind's emission sequence
    pub ordinal: usize,

    /// Identifying key at the remote system
    pub name: String,

    pub payload: T,
}

impl<T> Entry<T> {
    pub fn new(ordinal: usize, name: impl Into<String>, payload: T) -> Self {
        Self {
            ordinal,
            name: name.into(),
            payload,
        }
    }
}

/// One unit of work for the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Group(Entry<GroupRecord>),
    Permission(Entry<PermissionRecord>),
    PermissionV2(Entry<PermissionV2Record>),
    User(Entry<UserRecord>),
    /// Sentinel closing a run or a replay round
    End,
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::Group(_) => TaskKind::Group,
            Task::Permission(_) => TaskKind::Permission,
            Task::PermissionV2(_) => TaskKind::PermissionV2,
            Task::User(_) => TaskKind::User,
            Task::End => TaskKind::End,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Task::End)
    }

    /// Remote key, `None` for End
    pub fn name(&self) -> Option<&str> {
        match self {
            Task::Group(e) => Some(&e.name),
            Task::Permission(e) => Some(&e.name),
            Task::PermissionV2(e) => Some(&e.name),
            Task::User(e) => Some(&e.name),
            Task::End => None,
        }
    }

    /// Per-kind ordinal, `None` for End
    pub fn ordinal(&self) -> Option<usize> {
        match self {
            Task::Group(e) => Some(e.ordinal),
            Task::Permission(e) => Some(e.ordinal),
            Task::PermissionV2(e) => Some(e.ordinal),
            Task::User(e) => Some(e.ordinal),
            Task::End => None,
        }
    }

    /// Serialized payload as sent to the remote system
    pub fn payload_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Task::Group(e) => to_json(&e.payload),
            Task::Permission(e) => to_json(&e.payload),
            Task::PermissionV2(e) => to_json(&e.payload),
            Task::User(e) => to_json(&e.payload),
            Task::End => Ok(Vec::new()),
        }
    }
}

fn to_json<T: Serialize>(payload: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(payload)
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name(), self.ordinal()) {
            (Some(name), Some(ordinal)) => write!(f, "{} #{} '{}'", self.kind(), ordinal, name),
            _ => write!(f, "{}", self.kind()),
        }
    }
}
