//! Direct execution of operations on unproxied values.
//!
//! Nothing here checks permissions. These run after a proxy has already
//! granted the operation, or when no proxy is involved.
//!
//! Objects receive container operations through
//! [`Object::call_method`](super::Object::call_method) under the
//! operation's name (`__getitem__`, `__len__`, ...).

use super::{NativeFunction, Value};
use crate::context::SecurityContext;
use crate::error::{AccessError, ValueError};
use crate::operation::Operation;
use std::collections::BTreeMap;
use std::sync::Arc;

const MAP_METHODS: &[&str] = &[
    "keys", "values", "items", "get", "copy", "clear", "pop", "update",
];
const LIST_METHODS: &[&str] = &[
    "index", "count", "copy", "append", "pop", "insert", "clear",
];
const TUPLE_METHODS: &[&str] = &["index", "count"];

impl Value {
    fn methods(&self) -> &'static [&'static str] {
        match self {
            Self::Map(_) => MAP_METHODS,
            Self::List(_) => LIST_METHODS,
            Self::Tuple(_) => TUPLE_METHODS,
            _ => &[],
        }
    }

    fn unsupported(&self, operation: Operation) -> AccessError {
        ValueError::unsupported(self.type_key(), operation.name()).into()
    }

    pub(super) fn raw_getattr(&self, name: &str) -> Result<Value, AccessError> {
        match self {
            Self::Object(o) => Ok(o.get_attr(name)?),
            Self::Function(f) if name == "__name__" => Ok(Value::string(f.name())),
            _ if self.methods().contains(&name) => {
                let receiver = self.clone();
                let method = name.to_string();
                Ok(Value::Function(NativeFunction::new(name, move |ctx, args| {
                    receiver.raw_call_method(ctx, &method, args)
                })))
            }
            _ => Err(ValueError::no_attribute(self.type_key(), name).into()),
        }
    }

    pub(super) fn raw_setattr(&self, name: &str, value: Value) -> Result<(), AccessError> {
        match self {
            Self::Object(o) => Ok(o.set_attr(name, value)?),
            _ => Err(ValueError::ReadOnly {
                type_key: self.type_key().to_string(),
                name: name.to_string(),
            }
            .into()),
        }
    }

    pub(super) fn raw_getitem(
        &self,
        ctx: &SecurityContext,
        key: &Value,
    ) -> Result<Value, AccessError> {
        match self {
            Self::Tuple(items) => {
                let index = sequence_index(key, items.len(), "__getitem__")?;
                Ok(items[index].clone())
            }
            Self::List(items) => {
                let items = items.read();
                let index = sequence_index(key, items.len(), "__getitem__")?;
                Ok(items[index].clone())
            }
            Self::Map(entries) => {
                let key = map_key(key, "__getitem__")?;
                entries
                    .read()
                    .get(key)
                    .cloned()
                    .ok_or_else(|| ValueError::NoKey(key.to_string()).into())
            }
            Self::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let index = sequence_index(key, chars.len(), "__getitem__")?;
                Ok(Value::string(chars[index].to_string()))
            }
            Self::Object(o) => o.call_method(ctx, Operation::GetItem.name(), &[key.clone()]),
            _ => Err(self.unsupported(Operation::GetItem)),
        }
    }

    pub(super) fn raw_setitem(
        &self,
        ctx: &SecurityContext,
        key: &Value,
        item: Value,
    ) -> Result<(), AccessError> {
        match self {
            Self::List(items) => {
                let mut items = items.write();
                let index = sequence_index(key, items.len(), "__setitem__")?;
                items[index] = item;
                Ok(())
            }
            Self::Map(entries) => {
                let key = map_key(key, "__setitem__")?;
                entries.write().insert(key.to_string(), item);
                Ok(())
            }
            Self::Object(o) => o
                .call_method(ctx, Operation::SetItem.name(), &[key.clone(), item])
                .map(drop),
            _ => Err(self.unsupported(Operation::SetItem)),
        }
    }

    pub(super) fn raw_delitem(&self, ctx: &SecurityContext, key: &Value) -> Result<(), AccessError> {
        match self {
            Self::List(items) => {
                let mut items = items.write();
                let index = sequence_index(key, items.len(), "__delitem__")?;
                items.remove(index);
                Ok(())
            }
            Self::Map(entries) => {
                let key = map_key(key, "__delitem__")?;
                entries
                    .write()
                    .remove(key)
                    .map(drop)
                    .ok_or_else(|| ValueError::NoKey(key.to_string()).into())
            }
            Self::Object(o) => o
                .call_method(ctx, Operation::DelItem.name(), &[key.clone()])
                .map(drop),
            _ => Err(self.unsupported(Operation::DelItem)),
        }
    }

    pub(super) fn raw_len(&self, ctx: &SecurityContext) -> Result<usize, AccessError> {
        match self {
            Self::Str(s) => Ok(s.chars().count()),
            Self::Tuple(items) => Ok(items.len()),
            Self::List(items) => Ok(items.read().len()),
            Self::Map(entries) => Ok(entries.read().len()),
            Self::Object(o) => match o.call_method(ctx, Operation::Len.name(), &[])?.bare() {
                Self::Int(n) => usize::try_from(*n).map_err(|_| {
                    ValueError::bad_arguments("__len__", "length must not be negative").into()
                }),
                _ => Err(ValueError::bad_arguments("__len__", "length must be an integer").into()),
            },
            _ => Err(self.unsupported(Operation::Len)),
        }
    }

    pub(super) fn raw_contains(
        &self,
        ctx: &SecurityContext,
        item: &Value,
    ) -> Result<bool, AccessError> {
        match self {
            Self::Str(s) => match item.bare() {
                Self::Str(needle) => Ok(s.contains(&**needle)),
                _ => Err(ValueError::bad_arguments("__contains__", "expected text").into()),
            },
            Self::Tuple(items) => Ok(items.iter().any(|x| x == item)),
            Self::List(items) => {
                let items = items.read().clone();
                Ok(items.iter().any(|x| x == item))
            }
            Self::Map(entries) => Ok(match item.bare() {
                Self::Str(key) => entries.read().contains_key(&**key),
                _ => false,
            }),
            Self::Object(o) => Ok(o
                .call_method(ctx, Operation::Contains.name(), &[item.clone()])?
                .truthy()),
            _ => Err(self.unsupported(Operation::Contains)),
        }
    }

    pub(super) fn raw_iter(&self, ctx: &SecurityContext) -> Result<Vec<Value>, AccessError> {
        match self {
            Self::Str(s) => Ok(s.chars().map(|c| Value::string(c.to_string())).collect()),
            Self::Tuple(items) => Ok(items.to_vec()),
            Self::List(items) => Ok(items.read().clone()),
            Self::Map(entries) => Ok(entries.read().keys().map(Value::string).collect()),
            Self::Object(o) => o.call_method(ctx, Operation::Iter.name(), &[])?.iter(ctx),
            _ => Err(self.unsupported(Operation::Iter)),
        }
    }

    pub(super) fn raw_call(
        &self,
        ctx: &SecurityContext,
        args: &[Value],
    ) -> Result<Value, AccessError> {
        match self {
            Self::Function(f) => f.call(ctx, args),
            Self::Object(o) => o.call(ctx, args),
            _ => Err(ValueError::NotCallable(self.type_key().to_string()).into()),
        }
    }

    pub(super) fn raw_call_method(
        &self,
        ctx: &SecurityContext,
        name: &str,
        args: &[Value],
    ) -> Result<Value, AccessError> {
        match self {
            Self::Object(o) => o.call_method(ctx, name, args),
            Self::Map(entries) => map_method(entries, name, args),
            Self::List(items) => list_method(items, name, args),
            Self::Tuple(items) => sequence_method(items, name, args),
            _ => Err(ValueError::no_attribute(self.type_key(), name).into()),
        }
    }

    pub(super) fn raw_add(&self, other: &Value) -> Result<Value, AccessError> {
        let sum = match (self, other.bare()) {
            (Self::Int(a), Self::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or_else(|| ValueError::bad_arguments("__add__", "integer overflow"))?,
            (Self::Int(a), Self::Float(b)) => Value::Float(*a as f64 + b),
            (Self::Float(a), Self::Int(b)) => Value::Float(a + *b as f64),
            (Self::Float(a), Self::Float(b)) => Value::Float(a + b),
            (Self::Str(a), Self::Str(b)) => Value::string(format!("{a}{b}")),
            (Self::Tuple(a), Self::Tuple(b)) => Value::tuple(a.iter().chain(b.iter()).cloned()),
            (Self::List(a), Self::List(b)) => {
                let mut joined = a.read().clone();
                joined.extend(b.read().iter().cloned());
                Value::list(joined)
            }
            _ => return Err(self.unsupported(Operation::Add)),
        };
        Ok(sum)
    }

    pub(super) fn raw_repr(
        &self,
        ctx: &SecurityContext,
        path: &mut ReprPath,
    ) -> Result<String, AccessError> {
        Ok(match self {
            Self::None => "None".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => format!("{f:?}"),
            Self::Str(s) => format!("{:?}", &**s),
            Self::Tuple(items) => format!("({})", join_reprs(ctx, items, path)?),
            Self::List(items) => {
                if !path.enter(Arc::as_ptr(items).cast()) {
                    return Ok("[...]".to_string());
                }
                let snapshot = items.read().clone();
                let inner = join_reprs(ctx, &snapshot, path);
                path.leave();
                format!("[{}]", inner?)
            }
            Self::Map(entries) => {
                if !path.enter(Arc::as_ptr(entries).cast()) {
                    return Ok("{...}".to_string());
                }
                let snapshot = entries.read().clone();
                let inner = join_entry_reprs(ctx, &snapshot, path);
                path.leave();
                format!("{{{}}}", inner?)
            }
            Self::Function(f) => format!("<function {}>", f.name()),
            Self::Object(o) => o.describe(),
            Self::Decorated(_) | Self::Proxy(_) => return self.repr_in(ctx, path),
        })
    }
}

/// Lists and maps whose repr is being built, outermost first.
///
/// A container met again on the same path renders as `[...]` or `{...}`.
#[derive(Debug, Default)]
pub(crate) struct ReprPath(Vec<*const ()>);

impl ReprPath {
    /// Records `container`. Returns `false` if it is already on the path.
    fn enter(&mut self, container: *const ()) -> bool {
        if self.0.contains(&container) {
            return false;
        }
        self.0.push(container);
        true
    }

    fn leave(&mut self) {
        self.0.pop();
    }
}

fn join_reprs(
    ctx: &SecurityContext,
    items: &[Value],
    path: &mut ReprPath,
) -> Result<String, AccessError> {
    let parts = items
        .iter()
        .map(|item| item.repr_in(ctx, path))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join(", "))
}

fn join_entry_reprs(
    ctx: &SecurityContext,
    entries: &BTreeMap<String, Value>,
    path: &mut ReprPath,
) -> Result<String, AccessError> {
    let mut parts = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        parts.push(format!("{key:?}: {}", value.repr_in(ctx, path)?));
    }
    Ok(parts.join(", "))
}

/// Resolves a possibly negative index against `len`.
fn sequence_index(key: &Value, len: usize, method: &str) -> Result<usize, ValueError> {
    let Value::Int(index) = key.bare() else {
        return Err(ValueError::bad_arguments(method, "indices must be integers"));
    };
    let index = *index;
    let signed_len = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = if index < 0 { index + signed_len } else { index };
    if resolved < 0 || resolved >= signed_len {
        return Err(ValueError::IndexOutOfRange { index, len });
    }
    usize::try_from(resolved).map_err(|_| ValueError::IndexOutOfRange { index, len })
}

fn map_key<'a>(key: &'a Value, method: &str) -> Result<&'a str, ValueError> {
    match key.bare() {
        Value::Str(s) => Ok(&**s),
        _ => Err(ValueError::bad_arguments(method, "keys must be text")),
    }
}

fn arity(method: &str, args: &[Value], min: usize, max: usize) -> Result<(), ValueError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("expected {min} argument(s), got {}", args.len())
        } else {
            format!("expected {min} to {max} arguments, got {}", args.len())
        };
        return Err(ValueError::bad_arguments(method, expected));
    }
    Ok(())
}

fn map_method(
    entries: &super::MapRef,
    name: &str,
    args: &[Value],
) -> Result<Value, AccessError> {
    match name {
        "keys" => {
            arity(name, args, 0, 0)?;
            Ok(Value::list(entries.read().keys().map(Value::string)))
        }
        "values" => {
            arity(name, args, 0, 0)?;
            Ok(Value::list(entries.read().values().cloned()))
        }
        "items" => {
            arity(name, args, 0, 0)?;
            Ok(Value::list(entries.read().iter().map(|(k, v)| {
                Value::tuple([Value::string(k), v.clone()])
            })))
        }
        "get" => {
            arity(name, args, 1, 2)?;
            let key = map_key(&args[0], name)?;
            let found = entries.read().get(key).cloned();
            Ok(found.unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::None)))
        }
        "copy" => {
            arity(name, args, 0, 0)?;
            let copy: BTreeMap<String, Value> = entries.read().clone();
            Ok(Value::map(copy))
        }
        "clear" => {
            arity(name, args, 0, 0)?;
            entries.write().clear();
            Ok(Value::None)
        }
        "pop" => {
            arity(name, args, 1, 2)?;
            let key = map_key(&args[0], name)?;
            let removed = entries.write().remove(key);
            match (removed, args.get(1)) {
                (Some(value), _) => Ok(value),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(ValueError::NoKey(key.to_string()).into()),
            }
        }
        "update" => {
            arity(name, args, 1, 1)?;
            let Value::Map(other) = args[0].bare() else {
                return Err(ValueError::bad_arguments(name, "expected a mapping").into());
            };
            let incoming = other.read().clone();
            entries.write().extend(incoming);
            Ok(Value::None)
        }
        _ => Err(ValueError::no_attribute("dict", name).into()),
    }
}

fn list_method(items: &super::ListRef, name: &str, args: &[Value]) -> Result<Value, AccessError> {
    match name {
        "index" | "count" => {
            let snapshot = items.read().clone();
            sequence_method(&snapshot, name, args)
        }
        "copy" => {
            arity(name, args, 0, 0)?;
            Ok(Value::list(items.read().iter().cloned()))
        }
        "append" => {
            arity(name, args, 1, 1)?;
            items.write().push(args[0].clone());
            Ok(Value::None)
        }
        "pop" => {
            arity(name, args, 0, 1)?;
            let mut items = items.write();
            let key = args.first().cloned().unwrap_or(Value::Int(-1));
            let index = sequence_index(&key, items.len(), name)?;
            Ok(items.remove(index))
        }
        "insert" => {
            arity(name, args, 2, 2)?;
            let Value::Int(index) = args[0].bare() else {
                return Err(ValueError::bad_arguments(name, "indices must be integers").into());
            };
            let mut items = items.write();
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let clamped = if *index < 0 { (index + len).max(0) } else { (*index).min(len) };
            let position = usize::try_from(clamped).unwrap_or(items.len());
            items.insert(position, args[1].clone());
            Ok(Value::None)
        }
        "clear" => {
            arity(name, args, 0, 0)?;
            items.write().clear();
            Ok(Value::None)
        }
        _ => Err(ValueError::no_attribute("list", name).into()),
    }
}

fn sequence_method(items: &[Value], name: &str, args: &[Value]) -> Result<Value, AccessError> {
    match name {
        "index" => {
            arity(name, args, 1, 1)?;
            let position = items
                .iter()
                .position(|x| *x == args[0])
                .ok_or(ValueError::NotInSequence)?;
            Ok(Value::Int(i64::try_from(position).unwrap_or(i64::MAX)))
        }
        "count" => {
            arity(name, args, 1, 1)?;
            let count = items.iter().filter(|x| **x == args[0]).count();
            Ok(Value::Int(i64::try_from(count).unwrap_or(i64::MAX)))
        }
        _ => Err(ValueError::no_attribute("tuple", name).into()),
    }
}
