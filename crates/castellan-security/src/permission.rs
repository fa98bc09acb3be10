//! Required permissions and the permission table.

use crate::error::PermissionError;
use castellan_types::{Permission, PermissionId};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Id that stands for "no permission needed".
pub const PUBLIC_PERMISSION_ID: &str = "castellan.Public";

/// What a checker requires before granting a name.
///
/// # Example
///
/// ```
/// use castellan_security::RequiredPermission;
///
/// assert_eq!(RequiredPermission::from("castellan.Public"), RequiredPermission::Public);
/// assert!(!RequiredPermission::from("acme.View").is_public());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequiredPermission {
    /// Granted without consulting the interaction.
    Public,
    /// Granted when the interaction holds the permission.
    Permission(PermissionId),
}

impl RequiredPermission {
    /// Returns `true` for [`RequiredPermission::Public`].
    #[must_use]
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Public)
    }

    /// Returns the permission id, with `Public` mapped to [`PUBLIC_PERMISSION_ID`].
    #[must_use]
    pub fn id(&self) -> PermissionId {
        match self {
            Self::Public => PermissionId::new(PUBLIC_PERMISSION_ID),
            Self::Permission(id) => id.clone(),
        }
    }
}

impl From<PermissionId> for RequiredPermission {
    fn from(id: PermissionId) -> Self {
        if id.as_str() == PUBLIC_PERMISSION_ID {
            Self::Public
        } else {
            Self::Permission(id)
        }
    }
}

impl From<&str> for RequiredPermission {
    fn from(id: &str) -> Self {
        Self::from(PermissionId::new(id))
    }
}

impl From<&Permission> for RequiredPermission {
    fn from(permission: &Permission) -> Self {
        Self::from(permission.id.clone())
    }
}

impl fmt::Display for RequiredPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str(PUBLIC_PERMISSION_ID),
            Self::Permission(id) => write!(f, "{id}"),
        }
    }
}

/// Table of defined permissions.
///
/// Written at startup, read afterwards.
#[derive(Debug, Default)]
pub struct PermissionRegistry {
    permissions: RwLock<BTreeMap<PermissionId, Permission>>,
}

impl PermissionRegistry {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a permission.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError::Duplicate`] if the id is already defined.
    pub fn define(&self, permission: Permission) -> Result<(), PermissionError> {
        let mut permissions = self.permissions.write();
        if permissions.contains_key(&permission.id) {
            return Err(PermissionError::Duplicate(permission.id));
        }
        tracing::debug!(permission = %permission.id, "permission defined");
        permissions.insert(permission.id.clone(), permission);
        Ok(())
    }

    /// Returns a permission by id.
    #[must_use]
    pub fn get(&self, id: &PermissionId) -> Option<Permission> {
        self.permissions.read().get(id).cloned()
    }

    /// Returns `true` if `id` is defined.
    #[must_use]
    pub fn contains(&self, id: &PermissionId) -> bool {
        self.permissions.read().contains_key(id)
    }

    /// Returns every defined id, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<PermissionId> {
        self.permissions.read().keys().cloned().collect()
    }

    /// Removes every permission.
    pub fn clear(&self) {
        self.permissions.write().clear();
    }
}

static PERMISSIONS: LazyLock<Arc<PermissionRegistry>> =
    LazyLock::new(|| Arc::new(PermissionRegistry::new()));

/// Returns the process-wide permission table.
#[must_use]
pub fn permission_registry() -> Arc<PermissionRegistry> {
    Arc::clone(&PERMISSIONS)
}
