//! The value model proxies operate on.
//!
//! A [`Value`] is a cheaply clonable tagged union of everything that can
//! cross a trust boundary: scalars, containers, functions, application
//! objects, decorated objects and security proxies.
//!
//! # Dispatch
//!
//! ```text
//! value.getattr(ctx, "title")
//!        │
//!        ├── Value::Proxy      → checker.check_getattr → target → checker.proxy(result)
//!        ├── Value::Decorated  → decorator attributes, else the wrapped value
//!        └── anything else     → executed directly (see raw.rs)
//! ```
//!
//! Checked operations take the caller's [`SecurityContext`]. Operations
//! that are always available ([`PartialEq`], [`Value::compare`],
//! [`Value::hash_code`], [`Value::truthy`], [`Value::type_key`],
//! [`Value::provided_by`]) take no context and look straight through
//! proxies and decorators.

mod function;
mod object;
mod raw;

pub use function::{NativeFn, NativeFunction};
pub use object::{Instance, Object};
pub(crate) use raw::ReprPath;

use crate::context::SecurityContext;
use crate::decorator::Decorator;
use crate::error::{AccessError, ValueError};
use crate::proxy::Proxy;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Nesting depth at which container equality and ordering give up.
///
/// A list may contain itself, directly or through other containers.
const MAX_COMPARE_DEPTH: usize = 100;

/// 2^63, the first float above every `i64`.
const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

/// Shared, mutable list storage.
pub type ListRef = Arc<RwLock<Vec<Value>>>;

/// Shared, mutable mapping storage.
pub type MapRef = Arc<RwLock<BTreeMap<String, Value>>>;

/// A value that may cross a trust boundary.
///
/// Scalars and tuples are immutable. Lists and maps are shared by
/// reference: clones of a `List` value see each other's mutations.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absence of a value.
    None,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Immutable text.
    Str(Arc<str>),
    /// Immutable sequence.
    Tuple(Arc<[Value]>),
    /// Mutable sequence.
    List(ListRef),
    /// Mutable mapping with text keys.
    Map(MapRef),
    /// Native callable.
    Function(NativeFunction),
    /// Application object.
    Object(Arc<dyn Object>),
    /// Object wrapped by a [`Decorator`].
    Decorated(Arc<Decorator>),
    /// Security proxy.
    Proxy(Proxy),
}

impl Value {
    /// Creates a text value.
    #[must_use]
    pub fn string(text: impl AsRef<str>) -> Self {
        Self::Str(Arc::from(text.as_ref()))
    }

    /// Creates a tuple.
    #[must_use]
    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Tuple(items.into_iter().collect())
    }

    /// Creates a list.
    #[must_use]
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(Arc::new(RwLock::new(items.into_iter().collect())))
    }

    /// Creates a mapping.
    #[must_use]
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Map(Arc::new(RwLock::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )))
    }

    /// Wraps an application object.
    #[must_use]
    pub fn object(object: impl Object + 'static) -> Self {
        Self::Object(Arc::new(object))
    }

    /// Creates a function value.
    pub fn function<F>(name: impl AsRef<str>, func: F) -> Self
    where
        F: Fn(&SecurityContext, &[Value]) -> Result<Value, AccessError> + Send + Sync + 'static,
    {
        Self::Function(NativeFunction::new(name, func))
    }

    /// Returns `true` for a security proxy.
    #[must_use]
    pub fn is_proxy(&self) -> bool {
        matches!(self, Self::Proxy(_))
    }

    /// Returns the proxy, if this is one.
    #[must_use]
    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            Self::Proxy(p) => Some(p),
            _ => None,
        }
    }

    /// Identity comparison.
    ///
    /// Shared variants compare by pointer, scalars and text by value.
    ///
    /// # Example
    ///
    /// ```
    /// use castellan_security::Value;
    ///
    /// let a = Value::list([Value::Int(1)]);
    /// let b = Value::list([Value::Int(1)]);
    /// assert_eq!(a, b);
    /// assert!(!a.is_same(&b));
    /// assert!(a.is_same(&a.clone()));
    /// ```
    #[must_use]
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Proxy(a), Self::Proxy(b)) => a.ptr_eq(b),
            (Self::Tuple(a), Self::Tuple(b)) => Arc::ptr_eq(a, b),
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b),
            (Self::Map(a), Self::Map(b)) => Arc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Decorated(a), Self::Decorated(b)) => Arc::ptr_eq(a, b),
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            _ => false,
        }
    }

    /// Looks through proxies and decorators to the innermost value.
    pub(crate) fn bare(&self) -> &Value {
        match self {
            Self::Proxy(p) => p.target().bare(),
            Self::Decorated(d) => d.inner().bare(),
            other => other,
        }
    }

    // ---------------------------------------------------------------------
    // Always available
    // ---------------------------------------------------------------------

    /// Type of the value, as the wrapped object reports it.
    ///
    /// Proxies and decorators are transparent here.
    #[must_use]
    pub fn type_key(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Tuple(_) => "tuple",
            Self::List(_) => "list",
            Self::Map(_) => "dict",
            Self::Function(_) => "function",
            Self::Object(o) => o.type_key(),
            Self::Decorated(d) => d.inner().type_key(),
            Self::Proxy(p) => p.target().type_key(),
        }
    }

    /// Truth value.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self.bare() {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Tuple(items) => !items.is_empty(),
            Self::List(items) => !items.read().is_empty(),
            Self::Map(entries) => !entries.read().is_empty(),
            Self::Object(o) => o.truthy(),
            Self::Function(_) | Self::Decorated(_) | Self::Proxy(_) => true,
        }
    }

    /// Ordering between values of the same kind.
    ///
    /// Integers and floats compare with each other. Returns `None` for
    /// values that have no order.
    ///
    /// Containers nested more than a hundred levels deep, such as two
    /// distinct lists that each contain themselves, have no order either.
    #[must_use]
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        self.compare_at(other, 0)
    }

    fn compare_at(&self, other: &Value, depth: usize) -> Option<Ordering> {
        match (self.bare(), other.bare()) {
            (Self::None, Self::None) => Some(Ordering::Equal),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Int(a), Self::Float(b)) => cmp_int_float(*a, *b),
            (Self::Float(a), Self::Int(b)) => cmp_int_float(*b, *a).map(Ordering::reverse),
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::Tuple(a), Self::Tuple(b)) => compare_sequences(a, b, depth),
            (Self::List(a), Self::List(b)) => {
                if Arc::ptr_eq(a, b) {
                    return Some(Ordering::Equal);
                }
                let (a, b) = (a.read().clone(), b.read().clone());
                compare_sequences(&a, &b, depth)
            }
            _ => None,
        }
    }

    /// Hash consistent with equality.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Unhashable`] for lists and maps, or tuples
    /// containing them.
    pub fn hash_code(&self) -> Result<u64, ValueError> {
        let mut hasher = DefaultHasher::new();
        self.hash_into(&mut hasher)?;
        Ok(hasher.finish())
    }

    fn hash_into(&self, state: &mut DefaultHasher) -> Result<(), ValueError> {
        match self.bare() {
            Self::None => 0u8.hash(state),
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Float(f) => match integral_float(*f) {
                Some(i) => i.hash(state),
                None => f.to_bits().hash(state),
            },
            Self::Str(s) => s.hash(state),
            Self::Tuple(items) => {
                for item in items.iter() {
                    item.hash_into(state)?;
                }
            }
            Self::Function(f) => f.addr().hash(state),
            Self::Object(o) => (Arc::as_ptr(o).cast::<()>() as usize).hash(state),
            other => return Err(ValueError::Unhashable(other.type_key().to_string())),
        }
        Ok(())
    }

    /// Capability markers, most specific first.
    #[must_use]
    pub fn provided_by(&self) -> Vec<String> {
        match self {
            Self::Object(o) => o.provides(),
            Self::Decorated(d) => d.provided_by(),
            Self::Proxy(p) => p.target().provided_by(),
            _ => Vec::new(),
        }
    }

    /// Returns `true` if the value can be iterated.
    #[must_use]
    pub fn is_iterable(&self) -> bool {
        match self {
            Self::Str(_) | Self::Tuple(_) | Self::List(_) | Self::Map(_) => true,
            Self::Decorated(d) => d.inner().is_iterable(),
            Self::Proxy(p) => p.target().is_iterable(),
            _ => false,
        }
    }

    // ---------------------------------------------------------------------
    // Checked operations
    // ---------------------------------------------------------------------

    /// Reads an attribute.
    ///
    /// # Errors
    ///
    /// Returns a denial from the proxy's checker, or a [`ValueError`] if
    /// the attribute does not exist.
    pub fn getattr(&self, ctx: &SecurityContext, name: &str) -> Result<Value, AccessError> {
        match self {
            Self::Proxy(p) => p.getattr(ctx, name),
            Self::Decorated(d) => d.getattr(ctx, name),
            _ => self.raw_getattr(name),
        }
    }

    /// Writes an attribute.
    ///
    /// # Errors
    ///
    /// Returns a denial, or a [`ValueError`] if the attribute is read-only.
    pub fn setattr(
        &self,
        ctx: &SecurityContext,
        name: &str,
        value: Value,
    ) -> Result<(), AccessError> {
        match self {
            Self::Proxy(p) => p.setattr(ctx, name, value),
            Self::Decorated(d) => d.setattr(ctx, name, value),
            _ => self.raw_setattr(name, value),
        }
    }

    /// Reads `self[key]`.
    ///
    /// # Errors
    ///
    /// Returns a denial, or a missing key or index error.
    pub fn getitem(&self, ctx: &SecurityContext, key: &Value) -> Result<Value, AccessError> {
        match self {
            Self::Proxy(p) => p.getitem(ctx, key),
            Self::Decorated(d) => d.inner().getitem(ctx, key),
            _ => self.raw_getitem(ctx, key),
        }
    }

    /// Writes `self[key] = item`.
    ///
    /// # Errors
    ///
    /// Returns a denial, or a [`ValueError`] for immutable values.
    pub fn setitem(
        &self,
        ctx: &SecurityContext,
        key: &Value,
        item: Value,
    ) -> Result<(), AccessError> {
        match self {
            Self::Proxy(p) => p.setitem(ctx, key, item),
            Self::Decorated(d) => d.inner().setitem(ctx, key, item),
            _ => self.raw_setitem(ctx, key, item),
        }
    }

    /// Deletes `self[key]`.
    ///
    /// # Errors
    ///
    /// Returns a denial, or a missing key or index error.
    pub fn delitem(&self, ctx: &SecurityContext, key: &Value) -> Result<(), AccessError> {
        match self {
            Self::Proxy(p) => p.delitem(ctx, key),
            Self::Decorated(d) => d.inner().delitem(ctx, key),
            _ => self.raw_delitem(ctx, key),
        }
    }

    /// Number of items.
    ///
    /// # Errors
    ///
    /// Returns a denial, or [`ValueError::Unsupported`] for unsized values.
    pub fn len(&self, ctx: &SecurityContext) -> Result<usize, AccessError> {
        match self {
            Self::Proxy(p) => p.len(ctx),
            Self::Decorated(d) => d.inner().len(ctx),
            _ => self.raw_len(ctx),
        }
    }

    /// Membership test.
    ///
    /// # Errors
    ///
    /// Returns a denial, or [`ValueError::Unsupported`].
    pub fn contains(&self, ctx: &SecurityContext, item: &Value) -> Result<bool, AccessError> {
        match self {
            Self::Proxy(p) => p.contains(ctx, item),
            Self::Decorated(d) => d.inner().contains(ctx, item),
            _ => self.raw_contains(ctx, item),
        }
    }

    /// Items of the value, in iteration order.
    ///
    /// Iterating a proxy yields proxied items.
    ///
    /// # Errors
    ///
    /// Returns a denial, or [`ValueError::Unsupported`].
    pub fn iter(&self, ctx: &SecurityContext) -> Result<Vec<Value>, AccessError> {
        match self {
            Self::Proxy(p) => p.iter(ctx),
            Self::Decorated(d) => d.inner().iter(ctx),
            _ => self.raw_iter(ctx),
        }
    }

    /// Calls the value.
    ///
    /// # Errors
    ///
    /// Returns a denial, [`ValueError::NotCallable`], or the callee's error.
    pub fn call(&self, ctx: &SecurityContext, args: &[Value]) -> Result<Value, AccessError> {
        match self {
            Self::Proxy(p) => p.call(ctx, args),
            Self::Decorated(d) => d.inner().call(ctx, args),
            _ => self.raw_call(ctx, args),
        }
    }

    /// Calls the method `name`.
    ///
    /// Through a proxy the method name is checked like an attribute read.
    ///
    /// # Errors
    ///
    /// Returns a denial, or the method's error.
    pub fn call_method(
        &self,
        ctx: &SecurityContext,
        name: &str,
        args: &[Value],
    ) -> Result<Value, AccessError> {
        match self {
            Self::Proxy(p) => p.call_method(ctx, name, args),
            Self::Decorated(d) => d.call_method(ctx, name, args),
            _ => self.raw_call_method(ctx, name, args),
        }
    }

    /// Concatenation or addition.
    ///
    /// # Errors
    ///
    /// Returns a denial, or [`ValueError::Unsupported`] for mismatched kinds.
    pub fn add(&self, ctx: &SecurityContext, other: &Value) -> Result<Value, AccessError> {
        match self {
            Self::Proxy(p) => p.add(ctx, other),
            Self::Decorated(d) => d.inner().add(ctx, other),
            _ => self.raw_add(other),
        }
    }

    /// Human-readable text.
    ///
    /// A proxy that denies `__str__` returns a generic description instead
    /// of failing.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::NoInteraction`](crate::SecurityError::NoInteraction)
    /// when a check needs an interaction and none is active.
    pub fn str(&self, ctx: &SecurityContext) -> Result<String, AccessError> {
        match self {
            Self::Proxy(p) => p.str(ctx),
            Self::Decorated(d) => d.inner().str(ctx),
            Self::Str(s) => Ok(s.to_string()),
            _ => self.raw_repr(ctx, &mut ReprPath::default()),
        }
    }

    /// Debug text.
    ///
    /// # Errors
    ///
    /// As for [`Value::str`].
    ///
    /// A list or map that contains itself shows the inner occurrence as
    /// `[...]` or `{...}`.
    pub fn repr(&self, ctx: &SecurityContext) -> Result<String, AccessError> {
        self.repr_in(ctx, &mut ReprPath::default())
    }

    pub(crate) fn repr_in(
        &self,
        ctx: &SecurityContext,
        path: &mut ReprPath,
    ) -> Result<String, AccessError> {
        match self {
            Self::Proxy(p) => p.repr(ctx, path),
            Self::Decorated(d) => d.inner().repr_in(ctx, path),
            _ => self.raw_repr(ctx, path),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.eq_at(other, 0)
    }
}

impl Value {
    fn eq_at(&self, other: &Value, depth: usize) -> bool {
        match (self.bare(), other.bare()) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => {
                integral_float(*b) == Some(*a)
            }
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => Arc::ptr_eq(a, b) || sequences_eq(a, b, depth),
            (Self::List(a), Self::List(b)) => {
                Arc::ptr_eq(a, b) || {
                    let (a, b) = (a.read().clone(), b.read().clone());
                    sequences_eq(&a, &b, depth)
                }
            }
            (Self::Map(a), Self::Map(b)) => {
                Arc::ptr_eq(a, b) || {
                    let (a, b) = (a.read().clone(), b.read().clone());
                    depth < MAX_COMPARE_DEPTH
                        && a.len() == b.len()
                        && a.iter().zip(&b).all(|((ka, va), (kb, vb))| {
                            ka == kb && va.eq_at(vb, depth + 1)
                        })
                }
            }
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn sequences_eq(a: &[Value], b: &[Value], depth: usize) -> bool {
    depth < MAX_COMPARE_DEPTH
        && a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| x.eq_at(y, depth + 1))
}

fn compare_sequences(a: &[Value], b: &[Value], depth: usize) -> Option<Ordering> {
    if depth >= MAX_COMPARE_DEPTH {
        return None;
    }
    for (x, y) in a.iter().zip(b) {
        match x.compare_at(y, depth + 1)? {
            Ordering::Equal => continue,
            unequal => return Some(unequal),
        }
    }
    Some(a.len().cmp(&b.len()))
}

/// The integer equal to `f`, if there is one.
fn integral_float(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && (-TWO_POW_63..TWO_POW_63).contains(&f)).then(|| f as i64)
}

/// Exact ordering of an integer against a float.
fn cmp_int_float(i: i64, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f >= TWO_POW_63 {
        return Some(Ordering::Less);
    }
    if f < -TWO_POW_63 {
        return Some(Ordering::Greater);
    }
    match i.cmp(&(f.trunc() as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&f.fract()),
        unequal => Some(unequal),
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Arc::from(s))
    }
}

impl From<NativeFunction> for Value {
    fn from(f: NativeFunction) -> Self {
        Self::Function(f)
    }
}

impl From<Proxy> for Value {
    fn from(p: Proxy) -> Self {
        Self::Proxy(p)
    }
}
