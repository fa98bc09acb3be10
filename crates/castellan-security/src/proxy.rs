//! Security proxies.
//!
//! A [`Proxy`] pairs a target value with the checker guarding it. Every
//! operation on the proxy is checked first and forwarded second, and
//! whatever comes back is proxied again before the caller sees it:
//!
//! ```text
//! caller ──► Proxy ──check──► Checker
//!              │  granted
//!              ▼
//!           target ──result──► checker.proxy(result) ──► caller
//! ```
//!
//! There is no way to reach the target through the proxy's public API.
//! Trusted code strips proxies with [`remove_security_proxy`].
//!
//! # Identity
//!
//! Proxies are shared handles: cloning a proxy yields the same proxy, and
//! [`Value::is_same`] compares proxies by identity. Two proxies made for
//! the same target are equal (`==` looks through proxies) but not the same.

use crate::checker::CheckerRef;
use crate::context::SecurityContext;
use crate::error::{AccessError, SecurityError, ValueError};
use crate::operation::Operation;
use crate::registry::CheckerRegistry;
use crate::value::{ReprPath, Value};
use std::fmt;
use std::sync::Arc;

struct ProxyInner {
    target: Value,
    checker: CheckerRef,
}

/// A value guarded by a checker.
///
/// Created by [`proxy_factory`] or [`SecurityContext::proxy`]; never by
/// hand.
#[derive(Clone)]
pub struct Proxy(Arc<ProxyInner>);

impl Proxy {
    pub(crate) fn new(target: Value, checker: CheckerRef) -> Self {
        Self(Arc::new(ProxyInner { target, checker }))
    }

    pub(crate) fn target(&self) -> &Value {
        &self.0.target
    }

    /// Returns the checker guarding the target.
    #[must_use]
    pub fn checker(&self) -> &CheckerRef {
        &self.0.checker
    }

    /// Returns `true` if both handles refer to the same proxy.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn rewrap(&self, ctx: &SecurityContext, value: Value) -> Value {
        self.checker().proxy(ctx.registry(), value)
    }

    fn check(&self, ctx: &SecurityContext, operation: Operation) -> Result<(), SecurityError> {
        self.checker().check(ctx, self.target(), operation)
    }

    fn description(&self) -> String {
        format!("<security proxied {} instance>", self.target().type_key())
    }

    pub(crate) fn getattr(&self, ctx: &SecurityContext, name: &str) -> Result<Value, AccessError> {
        self.checker().check_getattr(ctx, self.target(), name)?;
        let value = self.target().getattr(ctx, name)?;
        Ok(self.rewrap(ctx, value))
    }

    pub(crate) fn setattr(
        &self,
        ctx: &SecurityContext,
        name: &str,
        value: Value,
    ) -> Result<(), AccessError> {
        self.checker().check_setattr(ctx, self.target(), name)?;
        self.target().setattr(ctx, name, value)
    }

    pub(crate) fn getitem(&self, ctx: &SecurityContext, key: &Value) -> Result<Value, AccessError> {
        self.check(ctx, Operation::GetItem)?;
        let value = self.target().getitem(ctx, key)?;
        Ok(self.rewrap(ctx, value))
    }

    pub(crate) fn setitem(
        &self,
        ctx: &SecurityContext,
        key: &Value,
        item: Value,
    ) -> Result<(), AccessError> {
        self.check(ctx, Operation::SetItem)?;
        self.target().setitem(ctx, key, item)
    }

    pub(crate) fn delitem(&self, ctx: &SecurityContext, key: &Value) -> Result<(), AccessError> {
        self.check(ctx, Operation::DelItem)?;
        self.target().delitem(ctx, key)
    }

    pub(crate) fn len(&self, ctx: &SecurityContext) -> Result<usize, AccessError> {
        self.check(ctx, Operation::Len)?;
        self.target().len(ctx)
    }

    pub(crate) fn contains(&self, ctx: &SecurityContext, item: &Value) -> Result<bool, AccessError> {
        self.check(ctx, Operation::Contains)?;
        self.target().contains(ctx, item)
    }

    pub(crate) fn iter(&self, ctx: &SecurityContext) -> Result<Vec<Value>, AccessError> {
        self.check(ctx, Operation::Iter)?;
        let items = self.target().iter(ctx)?;
        Ok(items
            .into_iter()
            .map(|item| self.rewrap(ctx, item))
            .collect())
    }

    pub(crate) fn call(&self, ctx: &SecurityContext, args: &[Value]) -> Result<Value, AccessError> {
        self.check(ctx, Operation::Call)?;
        let value = self.target().call(ctx, args)?;
        Ok(self.rewrap(ctx, value))
    }

    pub(crate) fn call_method(
        &self,
        ctx: &SecurityContext,
        name: &str,
        args: &[Value],
    ) -> Result<Value, AccessError> {
        self.checker().check_getattr(ctx, self.target(), name)?;
        let value = self.target().call_method(ctx, name, args)?;
        Ok(self.rewrap(ctx, value))
    }

    pub(crate) fn add(&self, ctx: &SecurityContext, other: &Value) -> Result<Value, AccessError> {
        self.check(ctx, Operation::Add)?;
        let value = self.target().add(ctx, other)?;
        Ok(self.rewrap(ctx, value))
    }

    pub(crate) fn str(&self, ctx: &SecurityContext) -> Result<String, AccessError> {
        match self.check(ctx, Operation::Str) {
            Ok(()) => self.target().str(ctx),
            Err(e) if e.is_denial() => Ok(self.description()),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn repr(
        &self,
        ctx: &SecurityContext,
        path: &mut ReprPath,
    ) -> Result<String, AccessError> {
        match self.check(ctx, Operation::Repr) {
            Ok(()) => self.target().repr_in(ctx, path),
            Err(e) if e.is_denial() => Ok(self.description()),
            Err(e) => Err(e.into()),
        }
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// Wraps `value` in a proxy.
///
/// | `value` | `checker` | Result |
/// |---------|-----------|--------|
/// | proxy | `None` or its own checker | `value` unchanged |
/// | proxy | another checker | [`ValueError::CheckerChange`] |
/// | other | `Some(c)` | proxy guarded by `c` |
/// | other | `None` | proxy guarded by the selected checker, or `value` bare if none is selected |
///
/// # Errors
///
/// Returns [`ValueError::CheckerChange`] when asked to re-guard a proxy.
///
/// # Example
///
/// ```
/// use castellan_security::{proxy_factory, CheckerRegistry, NameChecker, Value};
///
/// let registry = CheckerRegistry::with_defaults();
/// let list = Value::list([Value::Int(1)]);
///
/// let proxied = proxy_factory(&registry, list, None)?;
/// assert!(proxied.is_proxy());
///
/// let again = proxy_factory(&registry, proxied.clone(), None)?;
/// assert!(again.is_same(&proxied));
///
/// let other = NameChecker::deny_all().into_ref();
/// assert!(proxy_factory(&registry, proxied, Some(other)).is_err());
/// # Ok::<(), castellan_security::ValueError>(())
/// ```
pub fn proxy_factory(
    registry: &CheckerRegistry,
    value: Value,
    checker: Option<CheckerRef>,
) -> Result<Value, ValueError> {
    if let Value::Proxy(existing) = &value {
        let same = checker
            .as_ref()
            .map_or(true, |c| Arc::ptr_eq(c, existing.checker()));
        return if same {
            Ok(value)
        } else {
            Err(ValueError::CheckerChange)
        };
    }
    let checker = match checker {
        Some(c) => c,
        None => match registry.select_checker(&value) {
            Some(c) => c,
            None => return Ok(value),
        },
    };
    Ok(Value::Proxy(Proxy::new(value, checker)))
}

/// Proxies `value` with its selected checker, if any. Proxies pass
/// through unchanged.
#[must_use]
pub fn proxy_value(registry: &CheckerRegistry, value: Value) -> Value {
    match registry.select_checker(&value) {
        Some(checker) => Value::Proxy(Proxy::new(value, checker)),
        None => value,
    }
}

/// Strips every proxy layer from `value`.
///
/// For trusted code only: the result is unchecked.
#[must_use]
pub fn remove_security_proxy(value: &Value) -> Value {
    let mut current = value;
    while let Value::Proxy(p) = current {
        current = p.target();
    }
    current.clone()
}

/// Returns the checker of a proxy, or `None` for anything else.
#[must_use]
pub fn get_checker(value: &Value) -> Option<CheckerRef> {
    value.as_proxy().map(|p| Arc::clone(p.checker()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::NameChecker;
    use crate::policy::PermissivePolicy;
    use crate::value::Instance;

    fn ctx() -> SecurityContext {
        SecurityContext::new()
            .with_policy(Arc::new(PermissivePolicy))
            .with_registry(Arc::new(CheckerRegistry::with_defaults()))
    }

    fn doc() -> Value {
        Instance::new("acme.Document")
            .with_attr("title", Value::from("Minutes"))
            .with_attr("secret", Value::from("s3cr3t"))
            .with_attr("tags", Value::list([Value::from("a")]))
            .into_value()
    }

    fn guarded(ctx: &SecurityContext, names: &[&str]) -> Value {
        let checker = NameChecker::public(names.iter().copied()).into_ref();
        proxy_factory(ctx.registry(), doc(), Some(checker)).expect("bare value")
    }

    #[test]
    fn granted_reads_pass_through() {
        let ctx = ctx();
        let proxy = guarded(&ctx, &["title"]);
        assert_eq!(proxy.getattr(&ctx, "title").expect("public"), Value::from("Minutes"));
    }

    #[test]
    fn denied_reads_fail() {
        let ctx = ctx();
        let proxy = guarded(&ctx, &["title"]);
        let err = proxy.getattr(&ctx, "secret").expect_err("not mapped");
        assert!(err.is_forbidden());
    }

    #[test]
    fn results_are_proxied() {
        let ctx = ctx();
        let proxy = guarded(&ctx, &["tags"]);
        let tags = proxy.getattr(&ctx, "tags").expect("public");
        assert!(tags.is_proxy());
        assert_eq!(tags.len(&ctx).expect("lists are readable"), 1);
        let err = tags
            .call_method(&ctx, "append", &[Value::from("b")])
            .expect_err("append is not granted");
        assert!(err.is_forbidden());
    }

    #[test]
    fn iteration_proxies_items() {
        let ctx = ctx();
        let nested = Value::list([Value::list([Value::Int(1)]), Value::Int(2)]);
        let proxy = proxy_value(ctx.registry(), nested);
        let items = proxy.iter(&ctx).expect("lists are iterable");
        assert!(items[0].is_proxy());
        assert!(!items[1].is_proxy());
    }

    #[test]
    fn writes_need_a_write_grant() {
        let ctx = ctx();
        let proxy = guarded(&ctx, &["title"]);
        let err = proxy
            .setattr(&ctx, "title", Value::from("x"))
            .expect_err("no write map");
        assert!(err.is_forbidden());

        let checker = NameChecker::public(["title"])
            .with_setattr("title", crate::RequiredPermission::Public)
            .into_ref();
        let writable = proxy_factory(ctx.registry(), doc(), Some(checker)).expect("bare value");
        writable
            .setattr(&ctx, "title", Value::from("Agenda"))
            .expect("granted");
        assert_eq!(writable.getattr(&ctx, "title").expect("public"), Value::from("Agenda"));
    }

    #[test]
    fn denied_str_falls_back_to_description() {
        let ctx = ctx();
        let proxy = guarded(&ctx, &[]);
        assert_eq!(
            proxy.str(&ctx).expect("never fails on denial"),
            "<security proxied acme.Document instance>"
        );
        assert_eq!(format!("{:?}", proxy.as_proxy().expect("proxy")), "<security proxied acme.Document instance>");
    }

    #[test]
    fn factory_is_idempotent() {
        let ctx = ctx();
        let proxy = guarded(&ctx, &["title"]);
        let checker = get_checker(&proxy).expect("proxied");
        let same = proxy_factory(ctx.registry(), proxy.clone(), Some(checker)).expect("same checker");
        assert!(same.is_same(&proxy));
        let same = proxy_factory(ctx.registry(), proxy.clone(), None).expect("no checker");
        assert!(same.is_same(&proxy));
    }

    #[test]
    fn factory_refuses_checker_change() {
        let ctx = ctx();
        let proxy = guarded(&ctx, &["title"]);
        let err = proxy_factory(ctx.registry(), proxy, Some(NameChecker::deny_all().into_ref()))
            .expect_err("different checker");
        assert_eq!(err, ValueError::CheckerChange);
    }

    #[test]
    fn factory_leaves_unguarded_types_bare() {
        let ctx = ctx();
        let value = proxy_factory(ctx.registry(), Value::Int(5), None).expect("bare value");
        assert!(!value.is_proxy());
        assert_eq!(value, Value::Int(5));
    }

    #[test]
    fn remove_and_get_checker() {
        let ctx = ctx();
        let target = doc();
        let proxy = proxy_value(ctx.registry(), target.clone());
        assert!(remove_security_proxy(&proxy).is_same(&target));
        assert!(remove_security_proxy(&target).is_same(&target));
        assert!(get_checker(&proxy).is_some());
        assert!(get_checker(&target).is_none());
    }

    #[test]
    fn equality_looks_through_proxies() {
        let ctx = ctx();
        let target = doc();
        let a = proxy_value(ctx.registry(), target.clone());
        let b = proxy_value(ctx.registry(), target.clone());
        assert_eq!(a, target);
        assert_eq!(a, b);
        assert!(!a.is_same(&b));
    }
}
