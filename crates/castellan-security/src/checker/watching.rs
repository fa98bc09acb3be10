//! Checker that logs its decisions.
//!
//! Wrapping the checkers of a registry in a [`WatchingChecker`] traces why
//! an access was refused, without touching application code. Output goes
//! to `tracing` under the target `castellan::watch`:
//!
//! | Level | Logged |
//! |-------|--------|
//! | [`WatchLevel::Off`] | nothing (the registry does not wrap) |
//! | [`WatchLevel::Denials`] | unauthorized and forbidden accesses, at `INFO` |
//! | [`WatchLevel::All`] | denials, plus every grant at `DEBUG` |

use super::{Checker, CheckerRef, NameBased};
use crate::context::SecurityContext;
use crate::error::SecurityError;
use crate::operation::{is_always_available, Operation};
use crate::registry::CheckerRegistry;
use crate::value::Value;
use serde::{Deserialize, Serialize};

const WATCH_TARGET: &str = "castellan::watch";

/// How much a [`WatchingChecker`] reports.
///
/// Serialized as an integer: `0` is off, `1` denials, `2` or more all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum WatchLevel {
    /// No watching.
    #[default]
    Off,
    /// Denials only.
    Denials,
    /// Every check.
    All,
}

impl WatchLevel {
    /// Parses the value of a watch environment variable.
    ///
    /// An empty value means "not set". A value that is not an integer
    /// enables denial logging, as does a negative one.
    ///
    /// ```
    /// use castellan_security::WatchLevel;
    ///
    /// assert_eq!(WatchLevel::from_env_value(""), None);
    /// assert_eq!(WatchLevel::from_env_value("0"), Some(WatchLevel::Off));
    /// assert_eq!(WatchLevel::from_env_value("yes"), Some(WatchLevel::Denials));
    /// assert_eq!(WatchLevel::from_env_value("2"), Some(WatchLevel::All));
    /// ```
    #[must_use]
    pub fn from_env_value(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        let level = match value.parse::<i64>() {
            Ok(0) => Self::Off,
            Ok(n) if n >= 2 => Self::All,
            _ => Self::Denials,
        };
        Some(level)
    }

    /// Returns `true` unless the level is [`WatchLevel::Off`].
    #[must_use]
    pub fn is_enabled(self) -> bool {
        self != Self::Off
    }
}

impl From<u8> for WatchLevel {
    fn from(n: u8) -> Self {
        match n {
            0 => Self::Off,
            1 => Self::Denials,
            _ => Self::All,
        }
    }
}

impl From<WatchLevel> for u8 {
    fn from(level: WatchLevel) -> Self {
        match level {
            WatchLevel::Off => 0,
            WatchLevel::Denials => 1,
            WatchLevel::All => 2,
        }
    }
}

/// Wraps a checker and logs each decision it makes.
///
/// Decisions are never changed, only reported.
#[derive(Debug, Clone)]
pub struct WatchingChecker {
    inner: CheckerRef,
    level: WatchLevel,
}

impl WatchingChecker {
    /// Watches `inner` at `level`.
    #[must_use]
    pub fn new(inner: CheckerRef, level: WatchLevel) -> Self {
        Self { inner, level }
    }

    /// Returns the watched checker.
    #[must_use]
    pub fn inner(&self) -> &CheckerRef {
        &self.inner
    }

    /// Returns the watch level.
    #[must_use]
    pub fn level(&self) -> WatchLevel {
        self.level
    }

    fn report(
        &self,
        kind: &str,
        object: &Value,
        name: &str,
        outcome: Result<(), SecurityError>,
    ) -> Result<(), SecurityError> {
        match &outcome {
            Ok(()) if self.level == WatchLevel::All => {
                let how = if is_always_available(name) {
                    "always available"
                } else {
                    "granted"
                };
                tracing::debug!(
                    target: WATCH_TARGET,
                    check = kind,
                    object = object.type_key(),
                    attribute = name,
                    "{how}"
                );
            }
            Ok(()) => {}
            Err(SecurityError::Unauthorized { permission, .. }) => {
                tracing::info!(
                    target: WATCH_TARGET,
                    check = kind,
                    object = object.type_key(),
                    attribute = name,
                    permission = %permission,
                    "unauthorized"
                );
            }
            Err(e) if e.is_forbidden() => {
                tracing::info!(
                    target: WATCH_TARGET,
                    check = kind,
                    object = object.type_key(),
                    attribute = name,
                    "forbidden"
                );
            }
            Err(_) => {}
        }
        outcome
    }
}

impl Checker for WatchingChecker {
    fn check_getattr(
        &self,
        ctx: &SecurityContext,
        object: &Value,
        name: &str,
    ) -> Result<(), SecurityError> {
        let outcome = self.inner.check_getattr(ctx, object, name);
        self.report("getattr", object, name, outcome)
    }

    fn check_setattr(
        &self,
        ctx: &SecurityContext,
        object: &Value,
        name: &str,
    ) -> Result<(), SecurityError> {
        let outcome = self.inner.check_setattr(ctx, object, name);
        self.report("setattr", object, name, outcome)
    }

    fn check(
        &self,
        ctx: &SecurityContext,
        object: &Value,
        operation: Operation,
    ) -> Result<(), SecurityError> {
        let outcome = self.inner.check(ctx, object, operation);
        self.report("operation", object, operation.name(), outcome)
    }

    fn proxy(&self, registry: &CheckerRegistry, value: Value) -> Value {
        self.inner.proxy(registry, value)
    }

    fn as_name_based(&self) -> Option<&dyn NameBased> {
        self.inner.as_name_based()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::NameChecker;

    #[test]
    fn env_values() {
        assert_eq!(WatchLevel::from_env_value("  "), None);
        assert_eq!(WatchLevel::from_env_value("1"), Some(WatchLevel::Denials));
        assert_eq!(WatchLevel::from_env_value("-3"), Some(WatchLevel::Denials));
        assert_eq!(WatchLevel::from_env_value("7"), Some(WatchLevel::All));
        assert_eq!(WatchLevel::from_env_value("0"), Some(WatchLevel::Off));
    }

    #[test]
    fn integer_serde() {
        #[derive(Debug, Deserialize)]
        struct Wrapper {
            level: WatchLevel,
        }
        let parsed: Wrapper = toml::from_str("level = 5").expect("valid toml");
        assert_eq!(parsed.level, WatchLevel::All);
        assert_eq!(u8::from(WatchLevel::Denials), 1);
        assert!(!WatchLevel::Off.is_enabled());
    }

    #[test]
    fn decisions_are_unchanged() {
        let ctx = SecurityContext::new();
        let watched = WatchingChecker::new(NameChecker::public(["a"]).into_ref(), WatchLevel::All);
        assert_eq!(watched.check_getattr(&ctx, &Value::None, "a"), Ok(()));
        assert!(watched.check_getattr(&ctx, &Value::None, "b").is_err());
        assert!(watched.check_setattr(&ctx, &Value::None, "a").is_err());
        assert_eq!(watched.check(&ctx, &Value::None, Operation::Eq), Ok(()));
    }

    #[test]
    fn name_based_view_passes_through() {
        let watched = WatchingChecker::new(NameChecker::public(["a"]).into_ref(), WatchLevel::Denials);
        let names = watched.as_name_based().expect("wraps a name checker");
        assert!(names.permission_id("a").is_some());
        assert!(names.permission_id("b").is_none());
    }
}
