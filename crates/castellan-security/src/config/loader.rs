//! Configuration loader.
//!
//! # Load Order
//!
//! 1. Default values (compile-time)
//! 2. Config file, if one is set and exists
//! 3. Environment variables (`CASTELLAN_*`)
//!
//! Each layer overrides the previous.

use super::{ConfigError, PolicyKind, SecurityConfig};
use crate::checker::WatchLevel;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding [`SecurityConfig::watch_checkers`].
pub const ENV_WATCH_CHECKERS: &str = "CASTELLAN_WATCH_CHECKERS";

/// Environment variable overriding [`SecurityConfig::policy`].
pub const ENV_SECURITY_POLICY: &str = "CASTELLAN_SECURITY_POLICY";

/// Configuration loader with builder pattern.
///
/// # Example
///
/// ```
/// use castellan_security::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .skip_env_vars() // For testing
///     .load()?;
/// assert!(config.permissions.is_empty());
/// # Ok::<(), castellan_security::ConfigError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Config file path.
    config_path: Option<PathBuf>,

    /// Skip environment variable loading.
    skip_env: bool,
}

impl ConfigLoader {
    /// Creates a new loader with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the config file. A missing file is ignored.
    #[must_use]
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Skips environment variable loading.
    ///
    /// Useful for testing with deterministic config.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Loads and merges configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file exists but cannot be read
    /// or parsed, or an environment variable holds an invalid value.
    pub fn load(&self) -> Result<SecurityConfig, ConfigError> {
        let mut config = SecurityConfig::default();

        if let Some(path) = &self.config_path {
            if let Some(file_config) = self.load_file(path)? {
                debug!(path = %path.display(), "Loaded security config");
                config = file_config;
            }
        }

        if !self.skip_env {
            apply_env(&mut config, |name| std::env::var(name).ok())?;
        }

        Ok(config)
    }

    /// Loads a config file, returning None if it doesn't exist.
    fn load_file(&self, path: &Path) -> Result<Option<SecurityConfig>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

        let config =
            SecurityConfig::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;

        Ok(Some(config))
    }
}

/// Applies environment overrides read through `lookup`.
fn apply_env(
    config: &mut SecurityConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(val) = lookup(ENV_WATCH_CHECKERS) {
        if let Some(level) = WatchLevel::from_env_value(&val) {
            config.watch_checkers = level;
        }
    }

    if let Some(val) = lookup(ENV_SECURITY_POLICY) {
        config.policy = val
            .parse::<PolicyKind>()
            .map_err(|message| ConfigError::invalid_env_var(ENV_SECURITY_POLICY, message))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("security.toml");
        std::fs::write(&path, content).expect("temp dir is writable");
        path
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn load_defaults_only() {
        let config = ConfigLoader::new().skip_env_vars().load().expect("defaults");
        assert_eq!(config, SecurityConfig::default());
    }

    #[test]
    fn missing_file_is_ignored() {
        let temp = TempDir::new().expect("temp dir");
        let config = ConfigLoader::new()
            .with_config_file(temp.path().join("absent.toml"))
            .skip_env_vars()
            .load()
            .expect("missing file is fine");
        assert_eq!(config, SecurityConfig::default());
    }

    #[test]
    fn load_config_file() {
        let temp = TempDir::new().expect("temp dir");
        let path = create_config_file(
            temp.path(),
            r#"
watch_checkers = 1
policy = "permissive"
"#,
        );

        let config = ConfigLoader::new()
            .with_config_file(&path)
            .skip_env_vars()
            .load()
            .expect("valid file");
        assert_eq!(config.watch_checkers, WatchLevel::Denials);
        assert_eq!(config.policy, PolicyKind::Permissive);
    }

    #[test]
    fn invalid_file_is_an_error() {
        let temp = TempDir::new().expect("temp dir");
        let path = create_config_file(temp.path(), "watch_checkers = [");
        let err = ConfigLoader::new()
            .with_config_file(&path)
            .skip_env_vars()
            .load()
            .expect_err("invalid toml");
        assert!(matches!(err, ConfigError::ParseToml { .. }));
        assert!(err.to_string().contains("security.toml"));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = SecurityConfig {
            watch_checkers: WatchLevel::All,
            ..SecurityConfig::default()
        };
        apply_env(
            &mut config,
            env(&[(ENV_WATCH_CHECKERS, "0"), (ENV_SECURITY_POLICY, "permissive")]),
        )
        .expect("valid values");
        assert_eq!(config.watch_checkers, WatchLevel::Off);
        assert_eq!(config.policy, PolicyKind::Permissive);
    }

    #[test]
    fn non_integer_watch_value_means_denials() {
        let mut config = SecurityConfig::default();
        apply_env(&mut config, env(&[(ENV_WATCH_CHECKERS, "on")])).expect("lenient");
        assert_eq!(config.watch_checkers, WatchLevel::Denials);
    }

    #[test]
    fn empty_watch_value_is_ignored() {
        let mut config = SecurityConfig {
            watch_checkers: WatchLevel::All,
            ..SecurityConfig::default()
        };
        apply_env(&mut config, env(&[(ENV_WATCH_CHECKERS, "")])).expect("lenient");
        assert_eq!(config.watch_checkers, WatchLevel::All);
    }

    #[test]
    fn invalid_policy_env_var() {
        let mut config = SecurityConfig::default();
        let err = apply_env(&mut config, env(&[(ENV_SECURITY_POLICY, "lax")]))
            .expect_err("unknown policy");
        match err {
            ConfigError::InvalidEnvVar { name, message } => {
                assert_eq!(name, ENV_SECURITY_POLICY);
                assert!(message.contains("lax"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
