//! Checker registry: which checker guards which type.
//!
//! Checkers are registered against a type key ([`Value::type_key`]).
//! Selection for a value follows a fixed order:
//!
//! ```text
//! select_checker(value)
//!   ├── already a proxy          → None (never wrapped twice)
//!   ├── decorated value          → decorator checker ∪ inner checker
//!   ├── object with own checker  → that checker
//!   └── registry[type_key]
//!         ├── Checker(c)         → c
//!         ├── Factory(f)         → f(value)
//!         ├── NoProxy            → None (value passes through bare)
//!         └── (missing)          → default checker (denies all)
//! ```
//!
//! A type nobody registered is therefore guarded by a checker that grants
//! nothing but the always-available operations.
//!
//! # Concurrency
//!
//! Definitions take a write lock. Selection clones the entry under a read
//! lock and runs factories after releasing it.

use crate::checker::{
    container_checker, CheckerRef, ContainerAccess, ContainerKind, NameChecker, WatchLevel,
    WatchingChecker,
};
use crate::error::CheckerError;
use crate::permission::RequiredPermission;
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Computes a checker from the value being guarded.
pub type CheckerFactory = Arc<dyn Fn(&Value) -> Option<CheckerRef> + Send + Sync>;

/// What the registry holds for one type.
#[derive(Clone)]
pub enum CheckerEntry {
    /// Guard values of the type with this checker.
    Checker(CheckerRef),
    /// Values of the type are safe to hand out unproxied.
    NoProxy,
    /// Ask the factory for each value.
    Factory(CheckerFactory),
}

impl CheckerEntry {
    /// Wraps a factory closure.
    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Option<CheckerRef> + Send + Sync + 'static,
    {
        Self::Factory(Arc::new(f))
    }
}

impl fmt::Debug for CheckerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checker(c) => f.debug_tuple("Checker").field(c).finish(),
            Self::NoProxy => f.write_str("NoProxy"),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

impl From<CheckerRef> for CheckerEntry {
    fn from(checker: CheckerRef) -> Self {
        Self::Checker(checker)
    }
}

/// Map from type key to [`CheckerEntry`].
///
/// # Example
///
/// ```
/// use castellan_security::{CheckerRegistry, Instance, NameChecker, Value};
///
/// let registry = CheckerRegistry::with_defaults();
/// registry
///     .define_checker("acme.Document", NameChecker::public(["title"]).into_ref())
///     .expect("first definition");
///
/// let doc = Instance::new("acme.Document").into_value();
/// assert!(registry.select_checker(&doc).is_some());
/// assert!(registry.select_checker(&Value::Int(1)).is_none());
/// ```
#[derive(Debug)]
pub struct CheckerRegistry {
    entries: RwLock<HashMap<String, CheckerEntry>>,
    default_checker: CheckerRef,
    watch: RwLock<WatchLevel>,
}

/// Built-in entries installed by [`CheckerRegistry::with_defaults`].
fn default_entries() -> HashMap<String, CheckerEntry> {
    let mut entries: HashMap<String, CheckerEntry> = ["none", "bool", "int", "float", "str"]
        .into_iter()
        .map(|key| (key.to_string(), CheckerEntry::NoProxy))
        .collect();
    for kind in ContainerKind::ALL {
        let checker = container_checker(kind, ContainerAccess::READ, RequiredPermission::Public);
        entries.insert(
            kind.type_key().to_string(),
            CheckerEntry::Checker(checker.into_ref()),
        );
    }
    entries
}

impl Default for CheckerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckerRegistry {
    /// Creates a registry with no definitions.
    ///
    /// Every value, numbers included, then gets the deny-all default.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_checker: NameChecker::deny_all().into_ref(),
            watch: RwLock::new(WatchLevel::Off),
        }
    }

    /// Creates a registry with the built-in definitions.
    ///
    /// - `none`, `bool`, `int`, `float` and `str` pass through unproxied.
    /// - `tuple`, `list`, `dict` and `function` get public read-only
    ///   container checkers.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.install_defaults();
        registry
    }

    fn install_defaults(&self) {
        *self.entries.write() = default_entries();
    }

    /// Defines the entry for a type.
    ///
    /// # Errors
    ///
    /// Returns [`CheckerError::DuplicateType`] if the type already has one.
    pub fn define(
        &self,
        type_key: impl Into<String>,
        entry: CheckerEntry,
    ) -> Result<(), CheckerError> {
        let type_key = type_key.into();
        let mut entries = self.entries.write();
        if entries.contains_key(&type_key) {
            return Err(CheckerError::DuplicateType(type_key));
        }
        tracing::debug!(type_key = %type_key, entry = ?entry, "checker defined");
        entries.insert(type_key, entry);
        Ok(())
    }

    /// Defines a checker for a type.
    ///
    /// # Errors
    ///
    /// Returns [`CheckerError::DuplicateType`] if the type already has one.
    pub fn define_checker(
        &self,
        type_key: impl Into<String>,
        checker: CheckerRef,
    ) -> Result<(), CheckerError> {
        self.define(type_key, CheckerEntry::Checker(checker))
    }

    /// Replaces the entry for a type, defined or not. Returns the old one.
    pub fn redefine(&self, type_key: impl Into<String>, entry: CheckerEntry) -> Option<CheckerEntry> {
        let type_key = type_key.into();
        tracing::debug!(type_key = %type_key, entry = ?entry, "checker redefined");
        self.entries.write().insert(type_key, entry)
    }

    /// Removes the entry for a type.
    ///
    /// # Errors
    ///
    /// Returns [`CheckerError::UndefinedType`] if there is none.
    pub fn undefine(&self, type_key: &str) -> Result<CheckerEntry, CheckerError> {
        let entry = self
            .entries
            .write()
            .remove(type_key)
            .ok_or_else(|| CheckerError::UndefinedType(type_key.to_string()))?;
        tracing::debug!(type_key = %type_key, entry = ?entry, "checker undefined");
        Ok(entry)
    }

    /// Returns the entry for a type.
    #[must_use]
    pub fn get(&self, type_key: &str) -> Option<CheckerEntry> {
        self.entries.read().get(type_key).cloned()
    }

    /// Returns `true` if the type has an entry.
    #[must_use]
    pub fn contains(&self, type_key: &str) -> bool {
        self.entries.read().contains_key(type_key)
    }

    /// Checker used for types without an entry.
    #[must_use]
    pub fn default_checker(&self) -> &CheckerRef {
        &self.default_checker
    }

    /// Drops every definition and reinstalls the built-in ones.
    ///
    /// The table is swapped in one step, so readers see either the old
    /// definitions or the built-in ones.
    pub fn reset(&self) {
        self.install_defaults();
        tracing::debug!("checker registry reset");
    }

    /// Sets how selected checkers are watched.
    ///
    /// Takes effect for checkers selected from now on; proxies created
    /// earlier keep the checker they were given.
    pub fn set_watch_level(&self, level: WatchLevel) {
        *self.watch.write() = level;
        tracing::debug!(level = ?level, "checker watch level set");
    }

    /// Returns the watch level.
    #[must_use]
    pub fn watch_level(&self) -> WatchLevel {
        *self.watch.read()
    }

    /// Picks the checker guarding `value`, or `None` if it needs no proxy.
    #[must_use]
    pub fn select_checker(&self, value: &Value) -> Option<CheckerRef> {
        let checker = self.select_unwatched(value)?;
        Some(self.watched(checker))
    }

    pub(crate) fn select_unwatched(&self, value: &Value) -> Option<CheckerRef> {
        match value {
            Value::Proxy(_) => None,
            Value::Decorated(d) => d.effective_checker(self, value),
            Value::Object(o) => o.security_checker().or_else(|| self.lookup(value)),
            _ => self.lookup(value),
        }
    }

    /// Registry-only selection: the entry for the value's type, or the
    /// default checker if there is none.
    pub(crate) fn lookup(&self, value: &Value) -> Option<CheckerRef> {
        self.lookup_key(value.type_key(), value)
    }

    /// Like [`lookup`](Self::lookup) with an explicit type key. Decorators
    /// use it to find the checker of their own type.
    pub(crate) fn lookup_key(&self, type_key: &str, value: &Value) -> Option<CheckerRef> {
        let entry = self.get(type_key);
        match entry {
            Some(CheckerEntry::Checker(c)) => Some(c),
            Some(CheckerEntry::NoProxy) => None,
            Some(CheckerEntry::Factory(f)) => f(value),
            None => Some(Arc::clone(&self.default_checker)),
        }
    }

    fn watched(&self, checker: CheckerRef) -> CheckerRef {
        let level = self.watch_level();
        if level.is_enabled() {
            Arc::new(WatchingChecker::new(checker, level))
        } else {
            checker
        }
    }
}

static CHECKERS: LazyLock<Arc<CheckerRegistry>> =
    LazyLock::new(|| Arc::new(CheckerRegistry::with_defaults()));

/// Returns the process-wide checker registry.
///
/// Contexts built with [`SecurityContext::new`](crate::SecurityContext::new)
/// use it.
#[must_use]
pub fn checker_registry() -> Arc<CheckerRegistry> {
    Arc::clone(&CHECKERS)
}
