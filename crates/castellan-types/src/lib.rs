//! Core data types for castellan.
//!
//! This crate holds the facts the security layer reasons about, and no
//! security logic of its own.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  castellan-types    : ids, Permission, Principal  ◄── HERE   │
//! │                       Group, ErrorCode                       │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │  castellan-security : Checker, Proxy, Interaction,           │
//! │                       SecurityPolicy, CheckerRegistry        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Identity
//!
//! Permissions and principals are compared by id only. Titles and
//! descriptions are for humans.
//!
//! # Example
//!
//! ```
//! use castellan_types::{Permission, Principal, PrincipalId};
//!
//! let edit = Permission::new("acme.Edit", "Edit", "Change content");
//! let alice = Principal::user("acme.alice", "Alice");
//!
//! assert_eq!(edit.id.as_str(), "acme.Edit");
//! assert_eq!(alice.id(), &PrincipalId::new("acme.alice"));
//! ```

mod error;
mod id;
mod permission;
mod principal;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::{InteractionId, PermissionId, PrincipalId};
pub use permission::Permission;
pub use principal::{
    all_groups, Group, GroupSource, Principal, PrincipalKind, PrincipalRegistry,
    SYSTEM_PRINCIPAL_ID,
};
