//! Special operations a proxy mediates besides attribute access.
//!
//! Checkers key their maps by name. Attribute names are used as they are;
//! every other operation is resolved once to an [`Operation`] and looked
//! up under its canonical name ([`Operation::name`]).
//!
//! # Always Available
//!
//! Some operations must keep working on any proxy so generic code can
//! compare, hash and test values without knowing their permissions.
//! They are listed in [`ALWAYS_AVAILABLE`], shared by every checker,
//! and the proxy dispatches them without consulting its checker at all.
//!
//! | Name | Rust surface |
//! |------|--------------|
//! | `__eq__`, `__ne__` | `PartialEq for Value` |
//! | `__lt__`, `__le__`, `__gt__`, `__ge__` | [`Value::compare`](crate::Value::compare) |
//! | `__hash__` | [`Value::hash_code`](crate::Value::hash_code) |
//! | `__bool__` | [`Value::truthy`](crate::Value::truthy) |
//! | `__class__` | [`Value::type_key`](crate::Value::type_key) |
//! | `__provided_by__` | [`Value::provided_by`](crate::Value::provided_by) |
//! | `__repr__` | [`Value::repr`](crate::Value::repr) (checked, but granted by every name checker) |

use std::fmt;

/// Names that every checker grants without a permission.
pub const ALWAYS_AVAILABLE: &[&str] = &[
    "__eq__",
    "__ne__",
    "__lt__",
    "__le__",
    "__gt__",
    "__ge__",
    "__hash__",
    "__bool__",
    "__class__",
    "__provided_by__",
    "__repr__",
];

/// Returns `true` if `name` is in [`ALWAYS_AVAILABLE`].
#[must_use]
pub fn is_always_available(name: &str) -> bool {
    ALWAYS_AVAILABLE.contains(&name)
}

/// A non-attribute operation on a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `value[key]`
    GetItem,
    /// `value[key] = item`
    SetItem,
    /// `del value[key]`
    DelItem,
    /// Number of items.
    Len,
    /// Membership test.
    Contains,
    /// Iteration.
    Iter,
    /// Calling the value.
    Call,
    /// Concatenation or addition.
    Add,
    /// Human-readable text.
    Str,
    /// Debug text.
    Repr,
    /// Equality.
    Eq,
    /// Inequality.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// Hashing.
    Hash,
    /// Truth value.
    Bool,
    /// Type identity.
    Class,
    /// Capability markers.
    ProvidedBy,
}

impl Operation {
    /// Returns the canonical name used in checker maps.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::GetItem => "__getitem__",
            Self::SetItem => "__setitem__",
            Self::DelItem => "__delitem__",
            Self::Len => "__len__",
            Self::Contains => "__contains__",
            Self::Iter => "__iter__",
            Self::Call => "__call__",
            Self::Add => "__add__",
            Self::Str => "__str__",
            Self::Repr => "__repr__",
            Self::Eq => "__eq__",
            Self::Ne => "__ne__",
            Self::Lt => "__lt__",
            Self::Le => "__le__",
            Self::Gt => "__gt__",
            Self::Ge => "__ge__",
            Self::Hash => "__hash__",
            Self::Bool => "__bool__",
            Self::Class => "__class__",
            Self::ProvidedBy => "__provided_by__",
        }
    }

    /// Returns `true` if the operation is never denied.
    #[must_use]
    pub fn is_always_available(self) -> bool {
        is_always_available(self.name())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_and_identity_are_always_available() {
        for op in [
            Operation::Eq,
            Operation::Ne,
            Operation::Lt,
            Operation::Le,
            Operation::Gt,
            Operation::Ge,
            Operation::Hash,
            Operation::Bool,
            Operation::Class,
            Operation::ProvidedBy,
            Operation::Repr,
        ] {
            assert!(op.is_always_available(), "{op} should be available");
        }
    }

    #[test]
    fn access_operations_are_checked() {
        for op in [
            Operation::GetItem,
            Operation::SetItem,
            Operation::DelItem,
            Operation::Len,
            Operation::Contains,
            Operation::Iter,
            Operation::Call,
            Operation::Add,
            Operation::Str,
        ] {
            assert!(!op.is_always_available(), "{op} should be checked");
        }
    }

    #[test]
    fn attribute_names_are_not_always_available() {
        assert!(!is_always_available("title"));
        assert!(!is_always_available("__str__"));
    }
}
