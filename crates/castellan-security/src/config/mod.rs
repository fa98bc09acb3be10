//! Security configuration.
//!
//! # Load Order
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌──────────────────────────────────────────┐
//! │  1. Environment Variables (CASTELLAN_*)  │  Runtime override
//! ├──────────────────────────────────────────┤
//! │  2. Config file (TOML, optional)         │  Deployment settings
//! ├──────────────────────────────────────────┤
//! │  3. Default Values (compile-time)        │  Fallback
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Values |
//! |----------|--------------|--------|
//! | `CASTELLAN_WATCH_CHECKERS` | `watch_checkers` | `0`, `1`, `2`; other non-empty text means `1` |
//! | `CASTELLAN_SECURITY_POLICY` | `policy` | `paranoid`, `permissive` |
//!
//! # Example Configuration
//!
//! ```toml
//! watch_checkers = 1
//! policy = "paranoid"
//!
//! [[permissions]]
//! id = "acme.View"
//! title = "View"
//! description = "Read published content"
//!
//! [[permissions]]
//! id = "acme.Edit"
//! title = "Edit"
//! ```

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::{ConfigLoader, ENV_SECURITY_POLICY, ENV_WATCH_CHECKERS};

use crate::checker::WatchLevel;
use crate::error::PermissionError;
use crate::permission::{permission_registry, PermissionRegistry};
use crate::policy::{set_security_policy, ParanoidPolicy, PermissivePolicy, SecurityPolicy};
use crate::registry::{checker_registry, CheckerRegistry};
use castellan_types::Permission;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Which built-in policy to install.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// [`ParanoidPolicy`].
    #[default]
    Paranoid,
    /// [`PermissivePolicy`].
    Permissive,
}

impl PolicyKind {
    /// Creates the policy.
    #[must_use]
    pub fn build(self) -> Arc<dyn SecurityPolicy> {
        match self {
            Self::Paranoid => Arc::new(ParanoidPolicy),
            Self::Permissive => Arc::new(PermissivePolicy),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "paranoid" => Ok(Self::Paranoid),
            "permissive" => Ok(Self::Permissive),
            other => Err(format!("unknown policy '{other}', expected paranoid or permissive")),
        }
    }
}

/// Process-wide security settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// How selected checkers are watched.
    pub watch_checkers: WatchLevel,
    /// Policy answering permission questions.
    pub policy: PolicyKind,
    /// Permissions to define.
    pub permissions: Vec<Permission>,
}

impl SecurityConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns the TOML error for malformed input.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Applies the settings to the process-wide policy, checker registry
    /// and permission table.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Permission`] if a permission is already
    /// defined. The policy and watch level are applied regardless.
    pub fn install(&self) -> Result<(), ConfigError> {
        set_security_policy(self.policy.build());
        self.install_into(&checker_registry(), &permission_registry())?;
        Ok(())
    }

    /// Applies the watch level and permissions to the given registries.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError::Duplicate`] for an already defined
    /// permission. Permissions before it stay defined.
    pub fn install_into(
        &self,
        registry: &CheckerRegistry,
        permissions: &PermissionRegistry,
    ) -> Result<(), PermissionError> {
        registry.set_watch_level(self.watch_checkers);
        for permission in &self.permissions {
            permissions.define(permission.clone())?;
        }
        tracing::debug!(
            policy = ?self.policy,
            watch = ?self.watch_checkers,
            permissions = self.permissions.len(),
            "security config installed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castellan_types::PermissionId;

    #[test]
    fn defaults() {
        let config = SecurityConfig::default();
        assert_eq!(config.watch_checkers, WatchLevel::Off);
        assert_eq!(config.policy, PolicyKind::Paranoid);
        assert!(config.permissions.is_empty());
        assert_eq!(SecurityConfig::from_toml("").expect("empty is valid"), config);
    }

    #[test]
    fn parse_full_document() {
        let config = SecurityConfig::from_toml(
            r#"
watch_checkers = 2
policy = "permissive"

[[permissions]]
id = "acme.View"
title = "View"
"#,
        )
        .expect("valid toml");
        assert_eq!(config.watch_checkers, WatchLevel::All);
        assert_eq!(config.policy, PolicyKind::Permissive);
        assert_eq!(config.permissions[0].id, PermissionId::new("acme.View"));
        assert_eq!(config.permissions[0].description, "");
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(SecurityConfig::from_toml(r#"policy = "lax""#).is_err());
        assert!("lax".parse::<PolicyKind>().is_err());
        assert_eq!(" Permissive ".parse::<PolicyKind>(), Ok(PolicyKind::Permissive));
    }

    #[test]
    fn policy_kinds_build() {
        assert_eq!(PolicyKind::Paranoid.build().name(), "paranoid");
        assert_eq!(PolicyKind::Permissive.build().name(), "permissive");
    }

    #[test]
    fn install_into_local_registries() {
        let registry = CheckerRegistry::new();
        let permissions = PermissionRegistry::new();
        let config = SecurityConfig {
            watch_checkers: WatchLevel::Denials,
            policy: PolicyKind::Paranoid,
            permissions: vec![
                Permission::new("acme.View", "View", ""),
                Permission::new("acme.Edit", "Edit", ""),
            ],
        };

        config
            .install_into(&registry, &permissions)
            .expect("fresh registries");
        assert_eq!(registry.watch_level(), WatchLevel::Denials);
        assert!(permissions.contains(&PermissionId::new("acme.Edit")));

        let err = config
            .install_into(&registry, &permissions)
            .expect_err("already defined");
        assert_eq!(err, PermissionError::Duplicate(PermissionId::new("acme.View")));
    }
}
