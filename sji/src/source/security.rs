//! Exported security configuration (groups and ACLs)

use serde::Deserialize;

use crate::domain::{GroupRecord, PermissionRecord, PermissionScope, PermissionV2Record, Principals};

/// Top-level export document; unknown sections are ignored
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityExport {
    pub groups: Vec<ExportedGroup>,
    pub repo_acls: Vec<ExportedAcl>,
    pub build_acls: Vec<ExportedAcl>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportedGroup {
    pub group_name: String,
    pub description: String,
    pub new_user_default: bool,
    pub realm: String,
    pub admin_privileges: bool,
}

impl ExportedGroup {
    pub fn to_record(&self) -> GroupRecord {
        GroupRecord {
            name: self.group_name.clone(),
            description: self.description.clone(),
            auto_join: self.new_user_default,
            realm: self.realm.clone(),
            admin_privileges: self.admin_privileges,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportedAce {
    pub principal: String,
    pub group: bool,
    pub permissions_as_string: Vec<String>,
    pub permissions_display_names: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportedTarget {
    pub name: String,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub repo_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportedAcl {
    pub aces: Vec<ExportedAce>,
    pub permission_target: ExportedTarget,
}

impl ExportedAcl {
    pub fn name(&self) -> &str {
        &self.permission_target.name
    }

    /// Split aces into user and group principals using `pick` for the permission list
    fn principals(&self, pick: impl Fn(&ExportedAce) -> &Vec<String>) -> Principals {
        let mut principals = Principals::default();
        for ace in &self.aces {
            let target = if ace.group {
                &mut principals.groups
            } else {
                &mut principals.users
            };
            target.insert(ace.principal.clone(), pick(ace).clone());
        }
        principals
    }

    /// Legacy shape, permissions as internal strings
    pub fn to_permission(&self) -> PermissionRecord {
        PermissionRecord {
            name: self.permission_target.name.clone(),
            include_patterns: self.permission_target.includes.clone(),
            exclude_patterns: self.permission_target.excludes.clone(),
            repositories: self.permission_target.repo_keys.clone(),
            principals: self.principals(|ace| &ace.permissions_as_string),
        }
    }

    /// v2 scope block, permissions as display names
    pub fn to_scope(&self) -> PermissionScope {
        PermissionScope {
            include_patterns: self.permission_target.includes.clone(),
            exclude_patterns: self.permission_target.excludes.clone(),
            repositories: self.permission_target.repo_keys.clone(),
            actions: self.principals(|ace| &ace.permissions_display_names),
        }
    }
}

impl SecurityExport {
    pub fn group_records(&self) -> Vec<GroupRecord> {
        self.groups.iter().map(ExportedGroup::to_record).collect()
    }

    pub fn legacy_permissions(&self) -> Vec<PermissionRecord> {
        self.repo_acls.iter().map(ExportedAcl::to_permission).collect()
    }

    /// v2 targets: repository ACLs first, then build ACLs
    ///
    /// A build ACL sharing a name with a repository ACL becomes that target's
    /// `build` block, so each name appears once.
    pub fn v2_permissions(&self) -> Vec<PermissionV2Record> {
        let mut records: Vec<PermissionV2Record> = self
            .repo_acls
            .iter()
            .map(|acl| PermissionV2Record {
                name: acl.name().to_string(),
                repo: Some(acl.to_scope()),
                build: None,
            })
            .collect();

        for acl in &self.build_acls {
            match records.iter_mut().find(|r| r.name == acl.name()) {
                Some(existing) => existing.build = Some(acl.to_scope()),
                None => records.push(PermissionV2Record {
                    name: acl.name().to_string(),
                    repo: None,
                    build: Some(acl.to_scope()),
                }),
            }
        }
        records
    }
}
