//! User/group association inputs

use std::collections::{BTreeSet, HashMap};

use serde::Deserialize;

use crate::domain::UserRecord;

/// Password assigned to every imported user; real credentials come from the realm
pub const PLACEHOLDER_PASSWORD: &str = "password";

/// `users[]` list where each user names its groups
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UsersWithGroups {
    pub users: Vec<ExportedUser>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportedUser {
    pub name: String,
    pub email: String,
    pub admin: bool,
    pub profile_updatable: bool,
    #[serde(rename = "disableUIAccess")]
    pub disable_ui_access: bool,
    pub internal_password_disabled: bool,
    pub groups: Vec<String>,
}

impl UsersWithGroups {
    pub fn user_records(&self) -> Vec<UserRecord> {
        self.users
            .iter()
            .map(|u| UserRecord {
                name: u.name.clone(),
                email: u.email.clone(),
                password: PLACEHOLDER_PASSWORD.to_string(),
                admin: u.admin,
                profile_updatable: u.profile_updatable,
                disable_ui_access: u.disable_ui_access,
                internal_password_disabled: u.internal_password_disabled,
                groups: u.groups.iter().cloned().collect(),
            })
            .collect()
    }
}

/// `groups[]` list where each group names its members
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GroupsWithUsers {
    pub groups: Vec<GroupMembers>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupMembers {
    pub name: String,
    pub user_names: Vec<String>,
}

/// `@domain` form, prepending the `@` when missing
pub fn normalize_email_domain(domain: &str) -> String {
    let domain = domain.trim();
    if domain.starts_with('@') {
        domain.to_string()
    } else {
        format!("@{}", domain)
    }
}

impl GroupsWithUsers {
    /// One record per distinct member, carrying every group that lists it
    ///
    /// Members keep the order in which they first appear.
    pub fn user_records(&self, email_domain: &str) -> Vec<UserRecord> {
        let domain = normalize_email_domain(email_domain);
        let mut records: Vec<UserRecord> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for group in &self.groups {
            for member in &group.user_names {
                if let Some(&idx) = index.get(member) {
                    records[idx].groups.insert(group.name.clone());
                    continue;
                }
                let email = if member.contains('@') {
                    member.clone()
                } else {
                    format!("{}{}", member, domain)
                };
                index.insert(member.clone(), records.len());
                records.push(UserRecord {
                    name: member.clone(),
                    email,
                    password: PLACEHOLDER_PASSWORD.to_string(),
                    profile_updatable: true,
                    groups: BTreeSet::from([group.name.clone()]),
                    ..Default::default()
                });
            }
        }
        records
    }
}
