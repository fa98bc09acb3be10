//! Error types of the mediation layer.
//!
//! Security denials and ordinary value failures are kept apart so callers
//! can tell "you may not" from "this does not exist". Every mediated
//! operation returns [`AccessError`], which wraps either kind.
//!
//! # Error Codes
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`SecurityError::Unauthorized`] | `SECURITY_UNAUTHORIZED` | Yes |
//! | [`SecurityError::Forbidden`] | `SECURITY_FORBIDDEN` | No |
//! | [`SecurityError::ForbiddenAttribute`] | `SECURITY_FORBIDDEN_ATTRIBUTE` | No |
//! | [`SecurityError::NoInteraction`] | `SECURITY_NO_INTERACTION` | No |
//!
//! `Unauthorized` is the only recoverable denial: a different principal
//! might succeed, so the layer above may re-authenticate and retry the
//! whole operation.
//!
//! # Example
//!
//! ```
//! use castellan_security::SecurityError;
//! use castellan_types::ErrorCode;
//!
//! let err = SecurityError::forbidden_attribute("secret", "acme.Document");
//! assert_eq!(err.code(), "SECURITY_FORBIDDEN_ATTRIBUTE");
//! assert!(err.is_forbidden());
//! assert!(!err.is_recoverable());
//! ```

use castellan_types::{ErrorCode, InteractionId, PermissionId, PrincipalId};
use thiserror::Error;

/// A security denial, or a missing security context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    /// The current principals lack the permission guarding `name`.
    #[error("unauthorized: '{name}' on {object} requires {permission}")]
    Unauthorized {
        /// Type of the object that was accessed.
        object: String,
        /// Attribute or operation name.
        name: String,
        /// Permission that was not granted.
        permission: PermissionId,
    },

    /// Disallowed unconditionally, whoever is asking.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Access to `name` is not allowed for anyone.
    ///
    /// Generic code may treat this like a missing attribute.
    #[error("forbidden attribute: '{name}' on {object}")]
    ForbiddenAttribute {
        /// Attribute or operation name.
        name: String,
        /// Type of the object that was accessed.
        object: String,
    },

    /// A permission check ran without an active interaction.
    ///
    /// This is a programming error and is never caught and continued.
    #[error("no interaction is active")]
    NoInteraction,
}

impl SecurityError {
    /// Creates an unauthorized error.
    pub fn unauthorized(
        object: impl Into<String>,
        name: impl Into<String>,
        permission: PermissionId,
    ) -> Self {
        Self::Unauthorized {
            object: object.into(),
            name: name.into(),
            permission,
        }
    }

    /// Creates a forbidden error.
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    /// Creates a forbidden attribute error.
    pub fn forbidden_attribute(name: impl Into<String>, object: impl Into<String>) -> Self {
        Self::ForbiddenAttribute {
            name: name.into(),
            object: object.into(),
        }
    }

    /// Returns `true` for both `Forbidden` and `ForbiddenAttribute`.
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_) | Self::ForbiddenAttribute { .. })
    }

    /// Returns `true` for `Unauthorized`.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Returns `true` for every variant except `NoInteraction`.
    #[must_use]
    pub fn is_denial(&self) -> bool {
        !matches!(self, Self::NoInteraction)
    }
}

impl ErrorCode for SecurityError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "SECURITY_UNAUTHORIZED",
            Self::Forbidden(_) => "SECURITY_FORBIDDEN",
            Self::ForbiddenAttribute { .. } => "SECURITY_FORBIDDEN_ATTRIBUTE",
            Self::NoInteraction => "SECURITY_NO_INTERACTION",
        }
    }

    fn is_recoverable(&self) -> bool {
        self.is_unauthorized()
    }
}

/// An ordinary failure of an operation on a value.
///
/// These are raised by the value itself after access was granted, or
/// when the caller asked for something the value cannot do.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The value has no attribute `name`.
    #[error("'{type_key}' object has no attribute '{name}'")]
    NoAttribute {
        /// Type of the value.
        type_key: String,
        /// Requested attribute.
        name: String,
    },

    /// The mapping has no such key.
    #[error("key not found: '{0}'")]
    NoKey(String),

    /// Sequence index outside the sequence.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// Requested index (negative counts from the end).
        index: i64,
        /// Length of the sequence.
        len: usize,
    },

    /// The item is not in the sequence.
    #[error("item not in sequence")]
    NotInSequence,

    /// The value does not support the operation.
    #[error("'{type_key}' does not support {operation}")]
    Unsupported {
        /// Type of the value.
        type_key: String,
        /// Name of the operation.
        operation: String,
    },

    /// The value cannot be called.
    #[error("'{0}' object is not callable")]
    NotCallable(String),

    /// The value cannot be hashed.
    #[error("unhashable type: '{0}'")]
    Unhashable(String),

    /// The attribute cannot be assigned.
    #[error("attribute '{name}' of '{type_key}' is read-only")]
    ReadOnly {
        /// Type of the value.
        type_key: String,
        /// Attribute that was assigned.
        name: String,
    },

    /// A method or function got arguments it cannot use.
    #[error("{method}: {message}")]
    BadArguments {
        /// Method or function name.
        method: String,
        /// What was wrong.
        message: String,
    },

    /// Tried to give an existing proxy a different checker.
    #[error("tried to change the checker of a security proxy")]
    CheckerChange,
}

impl ValueError {
    /// Creates a no-attribute error.
    pub fn no_attribute(type_key: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NoAttribute {
            type_key: type_key.into(),
            name: name.into(),
        }
    }

    /// Creates an unsupported-operation error.
    pub fn unsupported(type_key: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Unsupported {
            type_key: type_key.into(),
            operation: operation.into(),
        }
    }

    /// Creates a bad-arguments error.
    pub fn bad_arguments(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadArguments {
            method: method.into(),
            message: message.into(),
        }
    }
}

impl ErrorCode for ValueError {
    fn code(&self) -> &'static str {
        match self {
            Self::NoAttribute { .. } => "VALUE_NO_ATTRIBUTE",
            Self::NoKey(_) => "VALUE_NO_KEY",
            Self::IndexOutOfRange { .. } => "VALUE_INDEX_OUT_OF_RANGE",
            Self::NotInSequence => "VALUE_NOT_IN_SEQUENCE",
            Self::Unsupported { .. } => "VALUE_UNSUPPORTED",
            Self::NotCallable(_) => "VALUE_NOT_CALLABLE",
            Self::Unhashable(_) => "VALUE_UNHASHABLE",
            Self::ReadOnly { .. } => "VALUE_READ_ONLY",
            Self::BadArguments { .. } => "VALUE_BAD_ARGUMENTS",
            Self::CheckerChange => "VALUE_CHECKER_CHANGE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Error of a mediated operation: either a denial or a value failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The checker denied the operation.
    #[error(transparent)]
    Security(#[from] SecurityError),

    /// The operation itself failed.
    #[error(transparent)]
    Value(#[from] ValueError),
}

impl AccessError {
    /// Returns the security error, if this is one.
    #[must_use]
    pub fn as_security(&self) -> Option<&SecurityError> {
        match self {
            Self::Security(e) => Some(e),
            Self::Value(_) => None,
        }
    }

    /// Returns `true` if this is a `Forbidden` or `ForbiddenAttribute` denial.
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        self.as_security().is_some_and(SecurityError::is_forbidden)
    }

    /// Returns `true` if this is an `Unauthorized` denial.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.as_security()
            .is_some_and(SecurityError::is_unauthorized)
    }
}

impl ErrorCode for AccessError {
    fn code(&self) -> &'static str {
        match self {
            Self::Security(e) => e.code(),
            Self::Value(e) => e.code(),
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Security(e) => e.is_recoverable(),
            Self::Value(e) => e.is_recoverable(),
        }
    }
}

/// Interaction lifecycle and participation bookkeeping errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InteractionError {
    /// An interaction is already active in this context.
    #[error("an interaction is already active: {0}")]
    AlreadyActive(InteractionId),

    /// The participation already belongs to an interaction.
    #[error("participation of '{principal}' already belongs to {interaction}")]
    AlreadyParticipating {
        /// Principal of the participation.
        principal: PrincipalId,
        /// Interaction it belongs to.
        interaction: InteractionId,
    },

    /// The participation does not belong to this interaction.
    #[error("participation of '{0}' does not belong to this interaction")]
    NotParticipating(PrincipalId),
}

impl ErrorCode for InteractionError {
    fn code(&self) -> &'static str {
        match self {
            Self::AlreadyActive(_) => "INTERACTION_ALREADY_ACTIVE",
            Self::AlreadyParticipating { .. } => "INTERACTION_ALREADY_PARTICIPATING",
            Self::NotParticipating(_) => "INTERACTION_NOT_PARTICIPATING",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Checker construction and registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckerError {
    /// A name was mapped to two different permissions.
    #[error("name '{0}' is mapped to more than one permission")]
    DuplicateName(String),

    /// A checker is already defined for the type.
    #[error("a checker is already defined for type '{0}'")]
    DuplicateType(String),

    /// No checker is defined for the type.
    #[error("no checker is defined for type '{0}'")]
    UndefinedType(String),
}

impl ErrorCode for CheckerError {
    fn code(&self) -> &'static str {
        match self {
            Self::DuplicateName(_) => "CHECKER_DUPLICATE_NAME",
            Self::DuplicateType(_) => "CHECKER_DUPLICATE_TYPE",
            Self::UndefinedType(_) => "CHECKER_UNDEFINED_TYPE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Permission table errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    /// A permission with this id is already defined.
    #[error("permission '{0}' is already defined")]
    Duplicate(PermissionId),
}

impl ErrorCode for PermissionError {
    fn code(&self) -> &'static str {
        match self {
            Self::Duplicate(_) => "PERMISSION_DUPLICATE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
