//! Checkers decide whether a name or operation on an object is allowed.
//!
//! # Architecture
//!
//! ```text
//! Checker (trait)
//!    ├── NameChecker       ← name → RequiredPermission maps (read and write)
//!    │      └── built by NameChecker::names, MultiChecker, container_checker
//!    ├── CombinedChecker   ← union of two checkers (decorators)
//!    └── WatchingChecker   ← logs every outcome of another checker
//! ```
//!
//! # Outcomes
//!
//! | Result | Meaning |
//! |--------|---------|
//! | `Ok(())` | Granted |
//! | [`SecurityError::Unauthorized`] | The current principals lack the permission |
//! | [`SecurityError::ForbiddenAttribute`] | No one may access the name |
//! | [`SecurityError::NoInteraction`] | A permission was needed but no interaction is active |
//!
//! Anything a checker does not know about is denied. The names in
//! [`ALWAYS_AVAILABLE`](crate::ALWAYS_AVAILABLE) are granted by every
//! name-based checker, even one that maps no names at all.

mod combined;
mod container;
mod name;
mod watching;

pub use combined::CombinedChecker;
pub use container::{container_checker, ContainerAccess, ContainerKind};
pub use name::{MultiChecker, NameChecker};
pub use watching::{WatchLevel, WatchingChecker};

use crate::context::SecurityContext;
use crate::error::SecurityError;
use crate::operation::Operation;
use crate::permission::RequiredPermission;
use crate::proxy::proxy_value;
use crate::registry::CheckerRegistry;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a checker.
///
/// Checkers are compared by identity ([`Arc::ptr_eq`]).
pub type CheckerRef = Arc<dyn Checker>;

/// Policy object deciding access to one object's names and operations.
///
/// Checkers must be pure given the name and the active interaction: the
/// same question asked twice under the same interaction gets the same
/// answer.
///
/// # Example Implementation
///
/// ```
/// use castellan_security::{Checker, Operation, SecurityContext, SecurityError, Value};
///
/// /// Grants every read, refuses every write.
/// #[derive(Debug)]
/// struct ReadOnly;
///
/// impl Checker for ReadOnly {
///     fn check_getattr(&self, _: &SecurityContext, _: &Value, _: &str) -> Result<(), SecurityError> {
///         Ok(())
///     }
///
///     fn check_setattr(&self, _: &SecurityContext, object: &Value, name: &str) -> Result<(), SecurityError> {
///         Err(SecurityError::forbidden_attribute(name, object.type_key()))
///     }
///
///     fn check(&self, _: &SecurityContext, object: &Value, operation: Operation) -> Result<(), SecurityError> {
///         match operation {
///             Operation::SetItem | Operation::DelItem => {
///                 Err(SecurityError::forbidden_attribute(operation.name(), object.type_key()))
///             }
///             _ => Ok(()),
///         }
///     }
/// }
/// ```
pub trait Checker: Send + Sync + fmt::Debug {
    /// Checks reading the attribute `name`.
    ///
    /// # Errors
    ///
    /// Returns the denial, or [`SecurityError::NoInteraction`].
    fn check_getattr(
        &self,
        ctx: &SecurityContext,
        object: &Value,
        name: &str,
    ) -> Result<(), SecurityError>;

    /// Checks writing the attribute `name`.
    ///
    /// # Errors
    ///
    /// Returns the denial, or [`SecurityError::NoInteraction`].
    fn check_setattr(
        &self,
        ctx: &SecurityContext,
        object: &Value,
        name: &str,
    ) -> Result<(), SecurityError>;

    /// Checks a non-attribute operation.
    ///
    /// # Errors
    ///
    /// Returns the denial, or [`SecurityError::NoInteraction`].
    fn check(
        &self,
        ctx: &SecurityContext,
        object: &Value,
        operation: Operation,
    ) -> Result<(), SecurityError>;

    /// Wraps a value returned by a granted operation.
    ///
    /// Proxies are returned unchanged; everything else gets the checker
    /// `registry` selects for it, or stays bare if it selects none.
    fn proxy(&self, registry: &CheckerRegistry, value: Value) -> Value {
        proxy_value(registry, value)
    }

    /// Returns the name-based view of this checker, if it has one.
    fn as_name_based(&self) -> Option<&dyn NameBased> {
        None
    }
}

/// Checkers that can report the permission guarding each name.
///
/// This enables asymmetric policies: a name may be readable but not
/// writable, or the other way round.
pub trait NameBased {
    /// Permission needed to read `name`, or `None` if reading is forbidden.
    fn permission_id(&self, name: &str) -> Option<RequiredPermission>;

    /// Permission needed to write `name`, or `None` if writing is forbidden.
    fn setattr_permission_id(&self, name: &str) -> Option<RequiredPermission>;
}

/// Grants `name` when the interaction holds `required`.
pub(crate) fn authorize(
    ctx: &SecurityContext,
    object: &Value,
    name: &str,
    required: &RequiredPermission,
) -> Result<(), SecurityError> {
    match required {
        RequiredPermission::Public => Ok(()),
        RequiredPermission::Permission(id) => {
            if ctx.get_interaction()?.check_permission(id, object) {
                Ok(())
            } else {
                tracing::trace!(
                    object = object.type_key(),
                    attribute = name,
                    permission = %id,
                    "unauthorized"
                );
                Err(SecurityError::unauthorized(object.type_key(), name, id.clone()))
            }
        }
    }
}

/// Returns the checker guarding `value` and the object it is applied to.
///
/// A proxy yields its own checker and target; anything else is resolved
/// through the registry.
pub(crate) fn checker_for(ctx: &SecurityContext, value: &Value) -> Option<(CheckerRef, Value)> {
    match value {
        Value::Proxy(p) => Some((Arc::clone(p.checker()), p.target().clone())),
        other => ctx
            .registry()
            .select_checker(other)
            .map(|checker| (checker, other.clone())),
    }
}

/// Returns whether the current interaction may read `name` on `value`.
///
/// `Unauthorized` becomes `false`. A forbidden name is a configuration
/// error and is returned as such.
///
/// # Errors
///
/// Returns `Forbidden`/`ForbiddenAttribute` denials and
/// [`SecurityError::NoInteraction`].
pub fn can_access(ctx: &SecurityContext, value: &Value, name: &str) -> Result<bool, SecurityError> {
    let Some((checker, object)) = checker_for(ctx, value) else {
        return Ok(true);
    };
    match checker.check_getattr(ctx, &object, name) {
        Ok(()) => Ok(true),
        Err(e) if e.is_unauthorized() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Returns whether the current interaction may write `name` on `value`.
///
/// A write that is forbidden on a name that can at least be read (granted
/// or merely unauthorized) is a read-only attribute and yields `false`.
/// A name that is forbidden both ways is reported as an error.
///
/// # Errors
///
/// Returns the read-side `ForbiddenAttribute` for names forbidden both ways,
/// and [`SecurityError::NoInteraction`].
pub fn can_write(ctx: &SecurityContext, value: &Value, name: &str) -> Result<bool, SecurityError> {
    let Some((checker, object)) = checker_for(ctx, value) else {
        return Ok(true);
    };
    match checker.check_setattr(ctx, &object, name) {
        Ok(()) => Ok(true),
        Err(e) if e.is_unauthorized() => Ok(false),
        Err(SecurityError::ForbiddenAttribute { .. }) => {
            match checker.check_getattr(ctx, &object, name) {
                Ok(()) => Ok(false),
                Err(e) if e.is_unauthorized() => Ok(false),
                Err(e) => Err(e),
            }
        }
        Err(e) => Err(e),
    }
}
