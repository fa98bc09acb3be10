//! Native callables.

use super::Value;
use crate::context::SecurityContext;
use crate::error::AccessError;
use std::fmt;
use std::sync::Arc;

/// Signature of a native callable.
///
/// Functions run with the caller's [`SecurityContext`], so anything they
/// touch through proxies is checked against the caller's interaction.
pub type NativeFn =
    dyn Fn(&SecurityContext, &[Value]) -> Result<Value, AccessError> + Send + Sync;

/// A named native function, shared by reference.
///
/// # Example
///
/// ```
/// use castellan_security::{NativeFunction, SecurityContext, Value};
///
/// let double = NativeFunction::new("double", |_ctx, args| match args {
///     [Value::Int(n)] => Ok(Value::Int(n * 2)),
///     _ => Ok(Value::None),
/// });
///
/// let ctx = SecurityContext::new();
/// assert_eq!(double.call(&ctx, &[Value::Int(21)]).ok(), Some(Value::Int(42)));
/// assert_eq!(double.name(), "double");
/// ```
#[derive(Clone)]
pub struct NativeFunction {
    name: Arc<str>,
    func: Arc<NativeFn>,
}

impl NativeFunction {
    /// Creates a function.
    pub fn new<F>(name: impl AsRef<str>, func: F) -> Self
    where
        F: Fn(&SecurityContext, &[Value]) -> Result<Value, AccessError> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.as_ref()),
            func: Arc::new(func),
        }
    }

    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Calls the function.
    ///
    /// # Errors
    ///
    /// Returns whatever the function returns.
    pub fn call(&self, ctx: &SecurityContext, args: &[Value]) -> Result<Value, AccessError> {
        (self.func)(ctx, args)
    }

    /// Returns `true` if both handles share the same function.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.func).cast::<()>() as usize
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name)
    }
}
