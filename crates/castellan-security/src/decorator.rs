//! Decorators: transparent wrappers that add attributes to a value.
//!
//! A decorated value behaves like the value it wraps, plus whatever the
//! decorator adds. Its checker and capability markers are both derived
//! from the two layers and recomputed on every access, so a change to
//! either layer shows up immediately:
//!
//! ```text
//! Decorated(d)
//!   ├── provided_by     = inner markers, then the decorator's own
//!   └── checker         = CombinedChecker(decorator type's checker,
//!                                         inner value's checker)
//! ```
//!
//! When only one layer has a checker, that checker is used alone. When
//! neither has one, the decorated value is not proxied at all.

use crate::checker::{CheckerRef, CombinedChecker};
use crate::context::SecurityContext;
use crate::error::AccessError;
use crate::registry::CheckerRegistry;
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A non-security wrapper adding attributes to a value.
///
/// The decorator registers its own checker under its own
/// [`type_key`](Self::type_key); the wrapped value keeps its checker.
///
/// # Example
///
/// ```
/// use castellan_security::{CheckerRegistry, Decorator, Instance, NameChecker, SecurityContext, Value};
/// use std::sync::Arc;
///
/// let registry = Arc::new(CheckerRegistry::with_defaults());
/// registry.define_checker("acme.Foo", NameChecker::public(["a"]).into_ref())?;
/// registry.define_checker("acme.Wrapper", NameChecker::public(["b"]).into_ref())?;
///
/// let foo = Instance::new("acme.Foo").with_attr("a", Value::Int(1)).into_value();
/// let wrapped = Decorator::new("acme.Wrapper", foo)
///     .with_attr("b", Value::Int(2))
///     .into_value();
///
/// let ctx = SecurityContext::new().with_registry(Arc::clone(&registry));
/// let proxied = ctx.proxy(wrapped);
/// assert_eq!(proxied.getattr(&ctx, "a")?, Value::Int(1));
/// assert_eq!(proxied.getattr(&ctx, "b")?, Value::Int(2));
/// assert!(proxied.getattr(&ctx, "c").is_err());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Decorator {
    type_key: String,
    inner: Value,
    attrs: RwLock<BTreeMap<String, Value>>,
    provides: Vec<String>,
}

impl Decorator {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(type_key: impl Into<String>, inner: Value) -> Self {
        Self {
            type_key: type_key.into(),
            inner,
            attrs: RwLock::new(BTreeMap::new()),
            provides: Vec::new(),
        }
    }

    /// Adds an attribute of the decorator's own.
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attrs.get_mut().insert(name.into(), value);
        self
    }

    /// Declares capability markers of the decorator's own.
    #[must_use]
    pub fn with_provides<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provides = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Wraps the decorator in a [`Value`].
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Decorated(Arc::new(self))
    }

    /// Type under which the decorator's own checker is registered.
    #[must_use]
    pub fn type_key(&self) -> &str {
        &self.type_key
    }

    /// The wrapped value.
    #[must_use]
    pub fn inner(&self) -> &Value {
        &self.inner
    }

    /// Capability markers of the decorated value.
    #[must_use]
    pub fn provided_by(&self) -> Vec<String> {
        merge_capabilities(&self.inner.provided_by(), &self.provides)
    }

    /// Checker of the decorated value, combined from both layers.
    ///
    /// `this` is the decorated value itself, handed to checker factories.
    pub(crate) fn effective_checker(
        &self,
        registry: &CheckerRegistry,
        this: &Value,
    ) -> Option<CheckerRef> {
        let inner = match &self.inner {
            Value::Proxy(p) => Some(Arc::clone(p.checker())),
            other => registry.select_unwatched(other),
        };
        let outer = registry.lookup_key(&self.type_key, this);
        merge_checkers(outer, inner)
    }

    pub(crate) fn getattr(&self, ctx: &SecurityContext, name: &str) -> Result<Value, AccessError> {
        if let Some(value) = self.attrs.read().get(name) {
            return Ok(value.clone());
        }
        self.inner.getattr(ctx, name)
    }

    pub(crate) fn setattr(
        &self,
        ctx: &SecurityContext,
        name: &str,
        value: Value,
    ) -> Result<(), AccessError> {
        {
            let mut attrs = self.attrs.write();
            if let Some(slot) = attrs.get_mut(name) {
                *slot = value;
                return Ok(());
            }
        }
        self.inner.setattr(ctx, name, value)
    }

    pub(crate) fn call_method(
        &self,
        ctx: &SecurityContext,
        name: &str,
        args: &[Value],
    ) -> Result<Value, AccessError> {
        let own = self.attrs.read().get(name).cloned();
        match own {
            Some(method) => method.call(ctx, args),
            None => self.inner.call_method(ctx, name, args),
        }
    }
}

/// Merges capability markers: `inner` first, then the `outer` markers it
/// does not already have.
///
/// ```
/// use castellan_security::merge_capabilities;
///
/// let merged = merge_capabilities(
///     &["acme.IDocument".to_string()],
///     &["acme.IAnnotated".to_string(), "acme.IDocument".to_string()],
/// );
/// assert_eq!(merged, ["acme.IDocument", "acme.IAnnotated"]);
/// ```
#[must_use]
pub fn merge_capabilities(inner: &[String], outer: &[String]) -> Vec<String> {
    let mut merged = inner.to_vec();
    for marker in outer {
        if !merged.contains(marker) {
            merged.push(marker.clone());
        }
    }
    merged
}

/// Combines the checkers of two layers.
///
/// | outer | inner | Result |
/// |-------|-------|--------|
/// | `Some(o)` | `Some(i)` | `CombinedChecker(o, i)` |
/// | `Some(o)` | `None` | `o` |
/// | `None` | `Some(i)` | `i` |
/// | `None` | `None` | `None` |
#[must_use]
pub fn merge_checkers(outer: Option<CheckerRef>, inner: Option<CheckerRef>) -> Option<CheckerRef> {
    match (outer, inner) {
        (Some(outer), Some(inner)) => Some(Arc::new(CombinedChecker::new(outer, inner))),
        (Some(only), None) | (None, Some(only)) => Some(only),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::NameChecker;
    use crate::registry::CheckerEntry;
    use crate::value::Instance;

    fn registry() -> Arc<CheckerRegistry> {
        let registry = Arc::new(CheckerRegistry::with_defaults());
        registry
            .define_checker("acme.Foo", NameChecker::public(["a"]).into_ref())
            .expect("first definition");
        registry
            .define_checker("acme.Wrapper", NameChecker::public(["b"]).into_ref())
            .expect("first definition");
        registry
    }

    fn foo() -> Value {
        Instance::new("acme.Foo")
            .with_attr("a", Value::Int(1))
            .with_attr("c", Value::Int(3))
            .with_provides(["acme.IFoo"])
            .into_value()
    }

    #[test]
    fn capabilities_put_inner_first() {
        let wrapped = Decorator::new("acme.Wrapper", foo())
            .with_provides(["acme.IWrapper", "acme.IFoo"])
            .into_value();
        assert_eq!(wrapped.provided_by(), ["acme.IFoo", "acme.IWrapper"]);
    }

    #[test]
    fn capabilities_follow_the_inner_value() {
        let inner = Instance::new("acme.Foo").into_value();
        let wrapped = Decorator::new("acme.Wrapper", inner).with_provides(["acme.IWrapper"]);
        assert_eq!(wrapped.provided_by(), ["acme.IWrapper"]);
    }

    #[test]
    fn both_layers_combine() {
        let registry = registry();
        let ctx = SecurityContext::new().with_registry(Arc::clone(&registry));
        let wrapped = Decorator::new("acme.Wrapper", foo())
            .with_attr("b", Value::Int(2))
            .into_value();
        let proxied = ctx.proxy(wrapped);

        assert_eq!(proxied.getattr(&ctx, "a").expect("inner grants"), Value::Int(1));
        assert_eq!(proxied.getattr(&ctx, "b").expect("outer grants"), Value::Int(2));
        assert!(proxied
            .getattr(&ctx, "c")
            .expect_err("neither grants")
            .is_forbidden());
    }

    #[test]
    fn combination_is_recomputed_per_access() {
        let registry = registry();
        let wrapped = Decorator::new("acme.Wrapper", foo()).into_value();
        let before = registry.select_checker(&wrapped).expect("combined");
        assert!(format!("{before:?}").contains("CombinedChecker"));

        registry.redefine("acme.Wrapper", CheckerEntry::NoProxy);
        let after = registry.select_checker(&wrapped).expect("inner only");
        assert!(!format!("{after:?}").contains("CombinedChecker"));
    }

    #[test]
    fn no_checker_on_either_layer() {
        let registry = CheckerRegistry::with_defaults();
        registry
            .define("acme.Wrapper", CheckerEntry::NoProxy)
            .expect("first definition");
        let wrapped = Decorator::new("acme.Wrapper", Value::Int(4)).into_value();
        assert!(registry.select_checker(&wrapped).is_none());
    }

    #[test]
    fn undefined_decorator_type_gets_the_default() {
        let registry = CheckerRegistry::with_defaults();
        let wrapped = Decorator::new("acme.Unknown", Value::Int(4)).into_value();
        let checker = registry.select_checker(&wrapped).expect("default checker");
        assert!(Arc::ptr_eq(&checker, registry.default_checker()));
    }

    #[test]
    fn own_attributes_shadow_and_forward() {
        let ctx = SecurityContext::new();
        let decorator = Decorator::new("acme.Wrapper", foo()).with_attr("a", Value::Int(10));
        assert_eq!(decorator.getattr(&ctx, "a").expect("own"), Value::Int(10));
        assert_eq!(decorator.getattr(&ctx, "c").expect("inner"), Value::Int(3));

        decorator.setattr(&ctx, "a", Value::Int(11)).expect("own attribute");
        decorator.setattr(&ctx, "c", Value::Int(30)).expect("inner attribute");
        assert_eq!(decorator.getattr(&ctx, "a").expect("own"), Value::Int(11));
        assert_eq!(decorator.inner().getattr(&ctx, "c").expect("inner"), Value::Int(30));
    }

    #[test]
    fn own_methods_are_called() {
        let ctx = SecurityContext::new();
        let decorator = Decorator::new("acme.Wrapper", foo())
            .with_attr("answer", Value::function("answer", |_, _| Ok(Value::Int(42))));
        assert_eq!(
            decorator.call_method(&ctx, "answer", &[]).expect("own method"),
            Value::Int(42)
        );
    }

    #[test]
    fn merge_checkers_table() {
        let a = NameChecker::deny_all().into_ref();
        let b = NameChecker::deny_all().into_ref();
        assert!(merge_checkers(None, None).is_none());
        let only = merge_checkers(Some(Arc::clone(&a)), None).expect("outer");
        assert!(Arc::ptr_eq(&only, &a));
        let only = merge_checkers(None, Some(Arc::clone(&b))).expect("inner");
        assert!(Arc::ptr_eq(&only, &b));
        assert!(merge_checkers(Some(a), Some(b)).is_some());
    }
}
