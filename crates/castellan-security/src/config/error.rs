//! Configuration errors.

use crate::error::PermissionError;
use castellan_types::ErrorCode;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config file '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Invalid environment variable value.
    #[error("invalid value for environment variable '{name}': {message}")]
    InvalidEnvVar { name: String, message: String },

    /// The permission table could not be installed.
    #[error("failed to install permissions: {0}")]
    Permission(#[from] PermissionError),
}

impl ConfigError {
    /// Creates a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse TOML error.
    pub fn parse_toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ParseToml {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid env var error.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::ReadFile { .. } => "CONFIG_READ_FILE",
            Self::ParseToml { .. } => "CONFIG_PARSE_TOML",
            Self::InvalidEnvVar { .. } => "CONFIG_INVALID_ENV_VAR",
            Self::Permission(_) => "CONFIG_PERMISSION",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castellan_types::{assert_error_codes, PermissionId};

    #[test]
    fn error_display() {
        let err = ConfigError::invalid_env_var("CASTELLAN_SECURITY_POLICY", "unknown policy");
        assert!(err.to_string().contains("CASTELLAN_SECURITY_POLICY"));
        assert!(err.to_string().contains("unknown policy"));
    }

    #[test]
    fn all_variants_have_codes() {
        let io = || std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let toml_err = toml::from_str::<toml::Value>("= nope").expect_err("invalid toml");
        let variants = [
            ConfigError::read_file("/tmp/x.toml", io()),
            ConfigError::parse_toml("/tmp/x.toml", toml_err),
            ConfigError::invalid_env_var("X", "bad"),
            ConfigError::from(PermissionError::Duplicate(PermissionId::new("acme.View"))),
        ];
        assert_error_codes(&variants, "CONFIG_");
    }
}
