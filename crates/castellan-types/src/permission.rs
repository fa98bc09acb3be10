//! Permission value type.

use crate::PermissionId;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// A named right.
///
/// Permissions are registered once at startup and only read afterwards.
/// The [`id`](Self::id) is the identity: equality and hashing ignore the
/// title and description.
///
/// # Example
///
/// ```
/// use castellan_types::Permission;
///
/// let view = Permission::new("acme.View", "View", "Read published content");
/// let renamed = Permission::new("acme.View", "See", "");
/// assert_eq!(view, renamed);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    /// Id under which the permission is known and used.
    pub id: PermissionId,
    /// Short human-readable title.
    pub title: String,
    /// Longer description.
    #[serde(default)]
    pub description: String,
}

impl Permission {
    /// Creates a permission.
    #[must_use]
    pub fn new(
        id: impl Into<PermissionId>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
        }
    }
}

impl PartialEq for Permission {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Permission {}

impl Hash for Permission {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}
