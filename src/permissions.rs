use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::Capability;

/// Users holding this role pass every admin-panel check.
pub const ADMIN_ROLE_ID: i64 = 1;

/// Capability names as stored in the `capabilities` table.
pub mod caps {
    pub const ADMIN: &str = "admin";
    pub const ADMIN_READ_USERS: &str = "admin_read_users";
    pub const ADMIN_UPDATE_USERS: &str = "admin_update_users";
    pub const READ_ROLE: &str = "read_role";
    pub const CREATE_ROLE: &str = "create_role";
    pub const UPDATE_ROLE: &str = "update_role";
    pub const DELETE_ROLE: &str = "delete_role";
    pub const UPDATE_PERMISSIONS: &str = "update_permissions";

    pub const READ_USERS: &str = "read_users";
    pub const CREATE_USERS: &str = "create_users";
    pub const DELETE_USERS: &str = "delete_users";

    pub const READ_PROJECTS_MINE: &str = "read_projects_mine";
    pub const READ_PROJECTS_OTHERS: &str = "read_projects_others";
    pub const CREATE_PROJECTS: &str = "create_projects";
    pub const UPDATE_PROJECTS_MINE: &str = "update_projects_mine";
    pub const UPDATE_PROJECTS_OTHERS: &str = "update_projects_others";
    pub const DELETE_PROJECTS_MINE: &str = "delete_projects_mine";
    pub const DELETE_PROJECTS_OTHERS: &str = "delete_projects_others";

    pub const READ_FEATURES: &str = "read_features";
    pub const CREATE_FEATURES: &str = "create_features";
    pub const UPDATE_FEATURES: &str = "update_features";
    pub const DELETE_FEATURES: &str = "delete_features";
}

/// Permissions
///
/// The capability set granted to a user through their role, keyed by
/// capability name. Serializes as a map so templates can test
/// `auth_user.permissions.create_projects`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Permissions(BTreeMap<String, Capability>);

impl Permissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0.insert(capability.name.clone(), capability);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// True iff every named capability is held. An empty list is always
    /// satisfied; the no-role rule lives on `AuthUser`.
    pub fn can(&self, capabilities: &[&str]) -> bool {
        capabilities.iter().all(|c| self.contains(c))
    }

    /// Ownership-scoped check: `mine` is required when any owner column holds
    /// `me`, `others` otherwise.
    pub fn can_on(&self, owners: &[Option<i64>], me: i64, mine: &str, others: &str) -> bool {
        self.can(&[Scope::of(owners, me).pick(mine, others)])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl FromIterator<Capability> for Permissions {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut permissions = Permissions::new();
        for capability in iter {
            permissions.insert(capability);
        }
        permissions
    }
}

/// Whether a record belongs to the acting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Mine,
    Others,
}

impl Scope {
    /// A record is mine when any of its owner columns (creator, assignee)
    /// holds my id.
    pub fn of(owners: &[Option<i64>], me: i64) -> Self {
        if owners.iter().any(|owner| *owner == Some(me)) {
            Scope::Mine
        } else {
            Scope::Others
        }
    }

    /// Picks the capability guarding this scope.
    pub fn pick<'a>(self, mine: &'a str, others: &'a str) -> &'a str {
        match self {
            Scope::Mine => mine,
            Scope::Others => others,
        }
    }
}
