//! User-defined objects.

use super::Value;
use crate::checker::CheckerRef;
use crate::context::SecurityContext;
use crate::error::{AccessError, ValueError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An application object that can sit behind a proxy.
///
/// Only [`type_key`](Self::type_key) and [`get_attr`](Self::get_attr) are
/// required. Container-like objects answer `__getitem__`, `__setitem__`,
/// `__delitem__`, `__len__`, `__contains__` and `__iter__` through
/// [`call_method`](Self::call_method).
///
/// Implementations never see security checks: a proxy decides first and
/// only then forwards to the object.
pub trait Object: Send + Sync + fmt::Debug {
    /// Type under which checkers are registered for this object.
    fn type_key(&self) -> &str;

    /// Reads an attribute.
    fn get_attr(&self, name: &str) -> Result<Value, ValueError>;

    /// Writes an attribute.
    fn set_attr(&self, name: &str, _value: Value) -> Result<(), ValueError> {
        Err(ValueError::ReadOnly {
            type_key: self.type_key().to_string(),
            name: name.to_string(),
        })
    }

    /// Calls a method. Defaults to calling the attribute `name`.
    fn call_method(
        &self,
        ctx: &SecurityContext,
        name: &str,
        args: &[Value],
    ) -> Result<Value, AccessError> {
        let method = self.get_attr(name)?;
        method.call(ctx, args)
    }

    /// Calls the object itself.
    fn call(&self, _ctx: &SecurityContext, _args: &[Value]) -> Result<Value, AccessError> {
        Err(ValueError::NotCallable(self.type_key().to_string()).into())
    }

    /// Instance-level checker, preferred over the one registered for the type.
    fn security_checker(&self) -> Option<CheckerRef> {
        None
    }

    /// Capability markers the object provides, most specific first.
    fn provides(&self) -> Vec<String> {
        Vec::new()
    }

    /// Truth value.
    fn truthy(&self) -> bool {
        true
    }

    /// Text for `str` and `repr`.
    fn describe(&self) -> String {
        format!("<{} object>", self.type_key())
    }
}

/// A ready-made attribute bag.
///
/// # Example
///
/// ```
/// use castellan_security::{Instance, Value};
///
/// let doc = Instance::new("acme.Document")
///     .with_attr("title", Value::from("Minutes"))
///     .with_provides(["acme.IDocument"])
///     .into_value();
///
/// assert_eq!(doc.type_key(), "acme.Document");
/// assert_eq!(doc.provided_by(), vec!["acme.IDocument".to_string()]);
/// ```
#[derive(Debug)]
pub struct Instance {
    type_key: String,
    attrs: RwLock<BTreeMap<String, Value>>,
    checker: Option<CheckerRef>,
    provides: Vec<String>,
}

impl Instance {
    /// Creates an instance with no attributes.
    #[must_use]
    pub fn new(type_key: impl Into<String>) -> Self {
        Self {
            type_key: type_key.into(),
            attrs: RwLock::new(BTreeMap::new()),
            checker: None,
            provides: Vec::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attrs.get_mut().insert(name.into(), value);
        self
    }

    /// Sets an instance-level checker.
    #[must_use]
    pub fn with_checker(mut self, checker: CheckerRef) -> Self {
        self.checker = Some(checker);
        self
    }

    /// Sets the capability markers.
    #[must_use]
    pub fn with_provides<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provides = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Wraps the instance in a [`Value`].
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(Arc::new(self))
    }
}

impl Object for Instance {
    fn type_key(&self) -> &str {
        &self.type_key
    }

    fn get_attr(&self, name: &str) -> Result<Value, ValueError> {
        self.attrs
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ValueError::no_attribute(&self.type_key, name))
    }

    fn set_attr(&self, name: &str, value: Value) -> Result<(), ValueError> {
        self.attrs.write().insert(name.to_string(), value);
        Ok(())
    }

    fn security_checker(&self) -> Option<CheckerRef> {
        self.checker.clone()
    }

    fn provides(&self) -> Vec<String> {
        self.provides.clone()
    }
}
