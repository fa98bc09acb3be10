//! Name-based checkers.

use super::{authorize, Checker, NameBased};
use crate::context::SecurityContext;
use crate::error::{CheckerError, SecurityError};
use crate::operation::{is_always_available, Operation};
use crate::permission::RequiredPermission;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Checker backed by two maps: names readable under a permission, and
/// names writable under a permission.
///
/// - A read of a mapped name needs its permission.
/// - A read of an unmapped name is granted only if it is always available.
/// - A write needs an entry in the write map; there are no always-available
///   writes.
///
/// # Example
///
/// ```
/// use castellan_security::{NameChecker, NameBased, RequiredPermission};
///
/// let checker = NameChecker::names(["title", "body"], "acme.View")
///     .with_setattr("title", "acme.Edit");
///
/// assert_eq!(checker.permission_id("body"), Some(RequiredPermission::from("acme.View")));
/// assert_eq!(checker.setattr_permission_id("body"), None);
/// assert_eq!(checker.setattr_permission_id("title"), Some(RequiredPermission::from("acme.Edit")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct NameChecker {
    get: HashMap<String, RequiredPermission>,
    set: HashMap<String, RequiredPermission>,
}

impl NameChecker {
    /// Creates a checker from explicit read and write maps.
    #[must_use]
    pub fn new(
        get: impl IntoIterator<Item = (String, RequiredPermission)>,
        set: impl IntoIterator<Item = (String, RequiredPermission)>,
    ) -> Self {
        Self {
            get: get.into_iter().collect(),
            set: set.into_iter().collect(),
        }
    }

    /// Grants reading `names` under one permission and nothing else.
    #[must_use]
    pub fn names<I, S>(names: I, permission: impl Into<RequiredPermission>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let permission = permission.into();
        Self {
            get: names
                .into_iter()
                .map(|name| (name.into(), permission.clone()))
                .collect(),
            set: HashMap::new(),
        }
    }

    /// Grants reading `names` to everyone.
    #[must_use]
    pub fn public<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::names(names, RequiredPermission::Public)
    }

    /// Grants nothing beyond the always-available operations.
    #[must_use]
    pub fn deny_all() -> Self {
        Self::default()
    }

    /// Allows reading `name` under `permission`.
    #[must_use]
    pub fn with_getattr(
        mut self,
        name: impl Into<String>,
        permission: impl Into<RequiredPermission>,
    ) -> Self {
        self.get.insert(name.into(), permission.into());
        self
    }

    /// Allows writing `name` under `permission`.
    #[must_use]
    pub fn with_setattr(
        mut self,
        name: impl Into<String>,
        permission: impl Into<RequiredPermission>,
    ) -> Self {
        self.set.insert(name.into(), permission.into());
        self
    }

    /// Shares the checker.
    #[must_use]
    pub fn into_ref(self) -> super::CheckerRef {
        Arc::new(self)
    }

    fn check_name(
        &self,
        ctx: &SecurityContext,
        object: &Value,
        name: &str,
    ) -> Result<Option<()>, SecurityError> {
        match self.get.get(name) {
            Some(required) => authorize(ctx, object, name, required).map(Some),
            None if is_always_available(name) => Ok(Some(())),
            None => Ok(None),
        }
    }
}

impl Checker for NameChecker {
    fn check_getattr(
        &self,
        ctx: &SecurityContext,
        object: &Value,
        name: &str,
    ) -> Result<(), SecurityError> {
        self.check_name(ctx, object, name)?
            .ok_or_else(|| SecurityError::forbidden_attribute(name, object.type_key()))
    }

    fn check_setattr(
        &self,
        ctx: &SecurityContext,
        object: &Value,
        name: &str,
    ) -> Result<(), SecurityError> {
        match self.set.get(name) {
            Some(required) => authorize(ctx, object, name, required),
            None => Err(SecurityError::forbidden_attribute(name, object.type_key())),
        }
    }

    fn check(
        &self,
        ctx: &SecurityContext,
        object: &Value,
        operation: Operation,
    ) -> Result<(), SecurityError> {
        let name = operation.name();
        match self.check_name(ctx, object, name)? {
            Some(()) => Ok(()),
            // Not iterable: let the iteration itself report it.
            None if operation == Operation::Iter && !object.is_iterable() => Ok(()),
            None => Err(SecurityError::forbidden_attribute(name, object.type_key())),
        }
    }

    fn as_name_based(&self) -> Option<&dyn NameBased> {
        Some(self)
    }
}

impl NameBased for NameChecker {
    fn permission_id(&self, name: &str) -> Option<RequiredPermission> {
        self.get.get(name).cloned()
    }

    fn setattr_permission_id(&self, name: &str) -> Option<RequiredPermission> {
        self.set.get(name).cloned()
    }
}

/// Builds a read-only [`NameChecker`] from several name sets.
///
/// Mapping the same name to two different permissions is an error;
/// repeating a name with the same permission is not.
///
/// # Example
///
/// ```
/// use castellan_security::{CheckerError, MultiChecker};
///
/// let checker = MultiChecker::new()
///     .names(["title", "body"], "acme.View")?
///     .map([("delete", "acme.Manage")])?
///     .build();
///
/// let clash = MultiChecker::new()
///     .names(["title"], "acme.View")?
///     .names(["title"], "acme.Edit");
/// assert_eq!(clash.err(), Some(CheckerError::DuplicateName("title".into())));
/// # Ok::<(), CheckerError>(())
/// ```
#[derive(Debug, Default)]
pub struct MultiChecker {
    get: HashMap<String, RequiredPermission>,
}

impl MultiChecker {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Protects every name in `names` with `permission`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckerError::DuplicateName`] on a conflicting name.
    pub fn names<I, S>(
        mut self,
        names: I,
        permission: impl Into<RequiredPermission>,
    ) -> Result<Self, CheckerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let permission = permission.into();
        for name in names {
            self.insert(name.into(), permission.clone())?;
        }
        Ok(self)
    }

    /// Adds explicit name/permission pairs.
    ///
    /// # Errors
    ///
    /// Returns [`CheckerError::DuplicateName`] on a conflicting name.
    pub fn map<I, S, P>(mut self, entries: I) -> Result<Self, CheckerError>
    where
        I: IntoIterator<Item = (S, P)>,
        S: Into<String>,
        P: Into<RequiredPermission>,
    {
        for (name, permission) in entries {
            self.insert(name.into(), permission.into())?;
        }
        Ok(self)
    }

    /// Finishes the checker.
    #[must_use]
    pub fn build(self) -> NameChecker {
        NameChecker {
            get: self.get,
            set: HashMap::new(),
        }
    }

    fn insert(&mut self, name: String, permission: RequiredPermission) -> Result<(), CheckerError> {
        match self.get.get(&name) {
            Some(existing) if *existing != permission => Err(CheckerError::DuplicateName(name)),
            _ => {
                self.get.insert(name, permission);
                Ok(())
            }
        }
    }
}
