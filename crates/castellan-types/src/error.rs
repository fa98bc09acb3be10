//! Unified error interface for castellan.
//!
//! Every castellan error type implements [`ErrorCode`] so callers can
//! branch on a stable machine-readable code and know whether retrying
//! with a different principal could help.
//!
//! # Example
//!
//! ```
//! use castellan_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum LookupError {
//!     Missing,
//!     Busy,
//! }
//!
//! impl ErrorCode for LookupError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::Missing => "LOOKUP_MISSING",
//!             Self::Busy => "LOOKUP_BUSY",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Busy)
//!     }
//! }
//!
//! assert_eq!(LookupError::Busy.code(), "LOOKUP_BUSY");
//! assert!(!LookupError::Missing.is_recoverable());
//! ```

/// Unified error code interface.
///
/// # Code Format
///
/// - **UPPER_SNAKE_CASE**: e.g. `"SECURITY_UNAUTHORIZED"`
/// - **Prefixed by domain**: `SECURITY_`, `VALUE_`, `INTERACTION_`, `CHECKER_`, ...
/// - **Stable**: codes are an API contract and do not change once defined
///
/// # Recoverability
///
/// An error is recoverable when the same operation could succeed later
/// without a code or configuration change, typically after the caller
/// re-authenticates as a different principal. A hard denial, a
/// programming error or a malformed registry is not recoverable.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;

    /// Returns whether the error is recoverable.
    fn is_recoverable(&self) -> bool;
}

/// Validates that an error code follows castellan conventions.
///
/// # Panics
///
/// Panics if the code is empty, lacks `expected_prefix`, or is not
/// UPPER_SNAKE_CASE.
///
/// # Example
///
/// ```
/// use castellan_types::{assert_error_code, ErrorCode};
///
/// struct Stale;
///
/// impl ErrorCode for Stale {
///     fn code(&self) -> &'static str { "CACHE_STALE" }
///     fn is_recoverable(&self) -> bool { true }
/// }
///
/// assert_error_code(&Stale, "CACHE_");
/// ```
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "Error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "Error code '{}' must start with prefix '{}'",
        code,
        expected_prefix
    );
    assert!(
        is_upper_snake_case(code),
        "Error code '{}' must be UPPER_SNAKE_CASE",
        code
    );
}

/// Validates the codes of several errors, typically every variant of an enum.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    if s.is_empty() || s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
