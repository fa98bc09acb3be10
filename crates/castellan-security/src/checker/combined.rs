//! Union of two checkers.

use super::{Checker, CheckerRef};
use crate::context::SecurityContext;
use crate::error::SecurityError;
use crate::operation::Operation;
use crate::registry::CheckerRegistry;
use crate::value::Value;

/// Grants whatever either of two checkers grants.
///
/// The primary checker is asked first. The secondary is only consulted
/// when the primary denies:
///
/// | Primary | Secondary | Result |
/// |---------|-----------|--------|
/// | granted | (not asked) | granted |
/// | forbidden | any | secondary's result |
/// | unauthorized | granted | granted |
/// | unauthorized | forbidden | primary's `Unauthorized` |
/// | unauthorized | unauthorized | secondary's `Unauthorized` |
///
/// A missing interaction ([`SecurityError::NoInteraction`]) is never
/// absorbed. Values returned through a combined checker are proxied the
/// way the primary proxies them.
///
/// # Example
///
/// ```
/// use castellan_security::{Checker, CombinedChecker, NameChecker, SecurityContext, Value};
///
/// let combined = CombinedChecker::new(
///     NameChecker::public(["a"]).into_ref(),
///     NameChecker::public(["b"]).into_ref(),
/// );
/// let ctx = SecurityContext::new();
/// let object = Value::None;
/// assert!(combined.check_getattr(&ctx, &object, "a").is_ok());
/// assert!(combined.check_getattr(&ctx, &object, "b").is_ok());
/// assert!(combined.check_getattr(&ctx, &object, "c").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct CombinedChecker {
    primary: CheckerRef,
    secondary: CheckerRef,
}

impl CombinedChecker {
    /// Combines two checkers, `primary` taking precedence.
    #[must_use]
    pub fn new(primary: CheckerRef, secondary: CheckerRef) -> Self {
        Self { primary, secondary }
    }

    /// Returns the checker asked first.
    #[must_use]
    pub fn primary(&self) -> &CheckerRef {
        &self.primary
    }

    /// Returns the checker asked when the primary denies.
    #[must_use]
    pub fn secondary(&self) -> &CheckerRef {
        &self.secondary
    }
}

fn combine(
    primary: Result<(), SecurityError>,
    secondary: impl FnOnce() -> Result<(), SecurityError>,
) -> Result<(), SecurityError> {
    match primary {
        Ok(()) => Ok(()),
        Err(e) if e.is_forbidden() => secondary(),
        Err(unauthorized) if unauthorized.is_unauthorized() => match secondary() {
            Ok(()) => Ok(()),
            Err(e) if e.is_forbidden() => Err(unauthorized),
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    }
}

impl Checker for CombinedChecker {
    fn check_getattr(
        &self,
        ctx: &SecurityContext,
        object: &Value,
        name: &str,
    ) -> Result<(), SecurityError> {
        combine(self.primary.check_getattr(ctx, object, name), || {
            self.secondary.check_getattr(ctx, object, name)
        })
    }

    fn check_setattr(
        &self,
        ctx: &SecurityContext,
        object: &Value,
        name: &str,
    ) -> Result<(), SecurityError> {
        combine(self.primary.check_setattr(ctx, object, name), || {
            self.secondary.check_setattr(ctx, object, name)
        })
    }

    fn check(
        &self,
        ctx: &SecurityContext,
        object: &Value,
        operation: Operation,
    ) -> Result<(), SecurityError> {
        combine(self.primary.check(ctx, object, operation), || {
            self.secondary.check(ctx, object, operation)
        })
    }

    fn proxy(&self, registry: &CheckerRegistry, value: Value) -> Value {
        self.primary.proxy(registry, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::NameChecker;
    use crate::interaction::Participation;
    use crate::policy::ParanoidPolicy;
    use castellan_types::Principal;
    use std::sync::Arc;

    fn user_ctx() -> SecurityContext {
        let ctx = SecurityContext::new().with_policy(Arc::new(ParanoidPolicy));
        ctx.new_interaction([Participation::new(Principal::user("acme.alice", "Alice"))])
            .expect("no interaction active");
        ctx
    }

    fn combined(primary: NameChecker, secondary: NameChecker) -> CombinedChecker {
        CombinedChecker::new(primary.into_ref(), secondary.into_ref())
    }

    #[test]
    fn granted_by_primary() {
        let c = combined(NameChecker::public(["a"]), NameChecker::deny_all());
        assert_eq!(c.check_getattr(&user_ctx(), &Value::None, "a"), Ok(()));
    }

    #[test]
    fn forbidden_then_secondary_decides() {
        let ctx = user_ctx();
        let c = combined(NameChecker::deny_all(), NameChecker::public(["b"]));
        assert_eq!(c.check_getattr(&ctx, &Value::None, "b"), Ok(()));

        let c = combined(NameChecker::deny_all(), NameChecker::names(["b"], "acme.B"));
        let err = c.check_getattr(&ctx, &Value::None, "b").expect_err("denied");
        assert_eq!(err, SecurityError::unauthorized("none", "b", "acme.B".into()));

        let c = combined(NameChecker::deny_all(), NameChecker::deny_all());
        assert!(c
            .check_getattr(&ctx, &Value::None, "b")
            .expect_err("denied")
            .is_forbidden());
    }

    #[test]
    fn unauthorized_then_secondary_grants() {
        let c = combined(NameChecker::names(["a"], "acme.A"), NameChecker::public(["a"]));
        assert_eq!(c.check_getattr(&user_ctx(), &Value::None, "a"), Ok(()));
    }

    #[test]
    fn unauthorized_then_forbidden_keeps_primary_error() {
        let c = combined(NameChecker::names(["a"], "acme.A"), NameChecker::deny_all());
        let err = c
            .check_getattr(&user_ctx(), &Value::None, "a")
            .expect_err("denied");
        assert_eq!(err, SecurityError::unauthorized("none", "a", "acme.A".into()));
    }

    #[test]
    fn unauthorized_twice_reports_secondary() {
        let c = combined(
            NameChecker::names(["a"], "acme.A"),
            NameChecker::names(["a"], "acme.Other"),
        );
        let err = c
            .check_getattr(&user_ctx(), &Value::None, "a")
            .expect_err("denied");
        assert_eq!(err, SecurityError::unauthorized("none", "a", "acme.Other".into()));
    }

    #[test]
    fn missing_interaction_propagates() {
        let c = combined(NameChecker::names(["a"], "acme.A"), NameChecker::public(["a"]));
        assert_eq!(
            c.check_getattr(&SecurityContext::new(), &Value::None, "a"),
            Err(SecurityError::NoInteraction)
        );
    }

    #[test]
    fn writes_and_operations_combine_too() {
        let ctx = user_ctx();
        let c = combined(
            NameChecker::deny_all().with_setattr("x", "acme.X"),
            NameChecker::public(["__len__"]).with_setattr("x", crate::RequiredPermission::Public),
        );
        assert_eq!(c.check_setattr(&ctx, &Value::None, "x"), Ok(()));
        assert_eq!(c.check(&ctx, &Value::None, Operation::Len), Ok(()));
        assert!(c.check(&ctx, &Value::None, Operation::GetItem).is_err());
    }
}
