//! Payload records as the remote admin API expects them on the wire

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Principal name to list of granted permissions/actions
pub type PrincipalMap = BTreeMap<String, Vec<String>>;

/// Group record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRecord {
    pub name: String,
    pub description: String,
    pub auto_join: bool,
    pub realm: String,
    pub admin_privileges: bool,
}

/// User record
///
/// `groups` is a set: merging with an existing user never duplicates entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub name: String,
    pub email: String,
    pub password: String,
    pub admin: bool,
    pub profile_updatable: bool,
    #[serde(rename = "disableUIAccess")]
    pub disable_ui_access: bool,
    pub internal_password_disabled: bool,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub groups: BTreeSet<String>,
}

impl UserRecord {
    /// Union `other` into this user's group set
    pub fn merge_groups<I, S>(&mut self, other: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(other.into_iter().map(Into::into));
    }
}

/// The subset of an existing remote user that the merge needs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExistingUser {
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

/// Legacy permission target principals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principals {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub users: PrincipalMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: PrincipalMap,
}

/// Legacy (pre-v2) permission target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub name: String,
    #[serde(rename = "include-patterns", default, skip_serializing_if = "Vec::is_empty")]
    pub include_patterns: Vec<String>,
    #[serde(rename = "exclude-patterns", default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default)]
    pub principals: Principals,
}

/// One scoped block (repository or build) of a v2 permission target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionScope {
    #[serde(rename = "include-patterns", default, skip_serializing_if = "Vec::is_empty")]
    pub include_patterns: Vec<String>,
    #[serde(rename = "exclude-patterns", default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default)]
    pub actions: Principals,
}

/// v2 permission target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionV2Record {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<PermissionScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<PermissionScope>,
}

impl PermissionV2Record {
    /// Repository keys referenced by the repository scope
    pub fn repositories(&self) -> &[String] {
        self.repo.as_ref().map(|r| r.repositories.as_slice()).unwrap_or(&[])
    }

    /// Copy of this record with the repository scope's keys replaced
    pub fn with_repositories(&self, repositories: Vec<String>) -> Self {
        let mut record = self.clone();
        if let Some(repo) = record.repo.as_mut() {
            repo.repositories = repositories;
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_wire_names() {
        let group = GroupRecord {
            name: "devs".to_string(),
            description: "developers".to_string(),
            auto_join: true,
            realm: "internal".to_string(),
            admin_privileges: false,
        };
        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json["autoJoin"], true);
        assert_eq!(json["adminPrivileges"], false);
        assert_eq!(json["name"], "devs");
    }

    #[test]
    fn test_user_wire_names_and_empty_groups_omitted() {
        let user = UserRecord {
            name: "alice".to_string(),
            disable_ui_access: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["disableUIAccess"], true);
        assert_eq!(json["internalPasswordDisabled"], false);
        assert!(json.get("groups").is_none());
    }

    #[test]
    fn test_merge_groups_is_set_union() {
        let mut user = UserRecord {
            groups: ["g1".to_string()].into_iter().collect(),
            ..Default::default()
        };
        user.merge_groups(["g1", "g2"]);
        user.merge_groups(["g1", "g2"]);
        assert_eq!(user.groups.iter().collect::<Vec<_>>(), vec!["g1", "g2"]);
    }

    #[test]
    fn test_existing_user_tolerates_missing_groups() {
        let existing: ExistingUser = serde_json::from_str(r#"{"name":"bob","email":"b@x"}"#).unwrap();
        assert!(existing.groups.is_empty());
    }

    #[test]
    fn test_v2_with_repositories_only_touches_repo_scope() {
        let record = PermissionV2Record {
            name: "p".to_string(),
            repo: Some(PermissionScope {
                repositories: vec!["a".to_string(), "b-cache".to_string()],
                ..Default::default()
            }),
            build: Some(PermissionScope {
                repositories: vec!["artifactory-build-info".to_string()],
                ..Default::default()
            }),
        };
        let repaired = record.with_repositories(vec!["a".to_string()]);
        assert_eq!(repaired.repositories().to_vec(), vec!["a".to_string()]);
        assert_eq!(repaired.build, record.build);
    }

    #[test]
    fn test_v2_wire_shape() {
        let mut actions = Principals::default();
        actions.groups.insert("readers".to_string(), vec!["read".to_string()]);
        let record = PermissionV2Record {
            name: "p".to_string(),
            repo: Some(PermissionScope {
                include_patterns: vec!["**".to_string()],
                repositories: vec!["libs".to_string()],
                actions,
                ..Default::default()
            }),
            build: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["repo"]["include-patterns"][0], "**");
        assert_eq!(json["repo"]["actions"]["groups"]["readers"][0], "read");
        assert!(json["repo"].get("exclude-patterns").is_none());
        assert!(json.get("build").is_none());
    }
}
