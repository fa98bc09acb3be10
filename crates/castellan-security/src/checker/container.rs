//! Stock checkers for the built-in container values.

use super::NameChecker;
use crate::permission::RequiredPermission;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Which side of a container a checker opens up.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ContainerAccess: u8 {
        /// Lookups, length, iteration, membership and read-only methods.
        const READ = 1;
        /// Item assignment, deletion and mutating methods.
        const WRITE = 2;
    }
}

/// Built-in container kinds with a stock checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// `dict` values.
    Dict,
    /// `list` values.
    List,
    /// `tuple` values.
    Tuple,
    /// `function` values.
    Function,
}

const SEQUENCE_READ: &[&str] = &[
    "__getitem__",
    "__len__",
    "__iter__",
    "__contains__",
    "__str__",
];

impl ContainerKind {
    /// Every kind.
    pub const ALL: [ContainerKind; 4] = [Self::Dict, Self::List, Self::Tuple, Self::Function];

    /// Type key the checker is registered under.
    #[must_use]
    pub fn type_key(self) -> &'static str {
        match self {
            Self::Dict => "dict",
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Function => "function",
        }
    }

    /// Names that only read the container.
    #[must_use]
    pub fn read_names(self) -> Vec<&'static str> {
        let extra: &[&str] = match self {
            Self::Dict => &["get", "keys", "values", "items", "copy"],
            Self::List => &["__add__", "index", "count", "copy"],
            Self::Tuple => &["__add__", "index", "count"],
            Self::Function => return vec!["__str__", "__name__", "__call__"],
        };
        SEQUENCE_READ.iter().chain(extra).copied().collect()
    }

    /// Names that change the container. Empty for immutable kinds.
    #[must_use]
    pub fn write_names(self) -> Vec<&'static str> {
        match self {
            Self::Dict => vec!["__setitem__", "__delitem__", "clear", "pop", "update"],
            Self::List => vec![
                "__setitem__",
                "__delitem__",
                "clear",
                "append",
                "pop",
                "insert",
            ],
            Self::Tuple | Self::Function => Vec::new(),
        }
    }
}

/// Builds the checker for a container kind.
///
/// Every name on the selected sides is guarded by `permission`. Write
/// access to the mutating methods is granted through the read map because
/// they are reached by calling a method, not by assigning an attribute.
///
/// ```
/// use castellan_security::{container_checker, ContainerAccess, ContainerKind, NameBased};
///
/// let checker = container_checker(ContainerKind::List, ContainerAccess::READ, "acme.View");
/// assert!(checker.permission_id("__len__").is_some());
/// assert!(checker.permission_id("append").is_none());
/// ```
#[must_use]
pub fn container_checker(
    kind: ContainerKind,
    access: ContainerAccess,
    permission: impl Into<RequiredPermission>,
) -> NameChecker {
    let mut names = Vec::new();
    if access.contains(ContainerAccess::READ) {
        names.extend(kind.read_names());
    }
    if access.contains(ContainerAccess::WRITE) {
        names.extend(kind.write_names());
    }
    NameChecker::names(names, permission)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::NameBased;

    #[test]
    fn read_side_only() {
        let checker = container_checker(
            ContainerKind::Dict,
            ContainerAccess::READ,
            RequiredPermission::Public,
        );
        for name in ["__getitem__", "keys", "items", "get"] {
            assert_eq!(checker.permission_id(name), Some(RequiredPermission::Public), "{name}");
        }
        assert_eq!(checker.permission_id("__setitem__"), None);
        assert_eq!(checker.permission_id("update"), None);
    }

    #[test]
    fn both_sides() {
        let checker = container_checker(
            ContainerKind::List,
            ContainerAccess::READ | ContainerAccess::WRITE,
            "acme.Edit",
        );
        assert!(checker.permission_id("append").is_some());
        assert!(checker.permission_id("__add__").is_some());
        assert_eq!(checker.setattr_permission_id("append"), None);
    }

    #[test]
    fn immutable_kinds_have_no_write_side() {
        assert!(ContainerKind::Tuple.write_names().is_empty());
        assert!(ContainerKind::Function.write_names().is_empty());
        assert!(ContainerKind::Function.read_names().contains(&"__call__"));
    }

    #[test]
    fn type_keys() {
        let keys: Vec<_> = ContainerKind::ALL.iter().map(|k| k.type_key()).collect();
        assert_eq!(keys, ["dict", "list", "tuple", "function"]);
    }
}
