//! Capability security proxies for castellan.
//!
//! Objects that cross a trust boundary are wrapped in a [`Proxy`]. Every
//! attribute read, attribute write and special operation on the proxy is
//! first put to a [`Checker`], which asks the active [`Interaction`]
//! whether its principals hold the required permission. Only then is the
//! operation forwarded, and its result is proxied in turn.
//!
//! # Crate Architecture
//!
//! ```text
//! castellan-types  (ids, Permission, Principal, Group, ErrorCode)
//!        ↑
//! castellan-security  ◄── THIS CRATE
//!
//!   caller ──► Proxy ──► Checker ──► SecurityContext ──► Interaction
//!                │           │                               │
//!                │           ├── NameChecker                 └── SecurityPolicy
//!                │           ├── CombinedChecker                 (Paranoid, Permissive,
//!                │           └── WatchingChecker                  Grant)
//!                ▼
//!             target ──► result ──► Checker::proxy ──► caller
//! ```
//!
//! # Design Principles
//!
//! - **Deny by default**: a type without a registered checker gets one
//!   that grants only the always-available operations.
//! - **Reads and writes are separate**: a readable name is not writable
//!   unless a write permission is declared for it, and the other way round.
//! - **One interaction per task**: the interaction lives in an explicit
//!   [`SecurityContext`], never in a global.
//! - **Idempotent wrapping**: proxying a proxy returns it unchanged.
//!
//! # Always Available
//!
//! Equality, ordering, hashing, truth value, type and capability markers
//! never consult a checker (see [`ALWAYS_AVAILABLE`]). Generic code can
//! compare and hash proxies without holding any permission.
//!
//! # Example
//!
//! ```
//! use castellan_security::{
//!     CheckerRegistry, Instance, NameChecker, Participation, ParanoidPolicy, SecurityContext,
//!     Value,
//! };
//! use castellan_types::Principal;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(CheckerRegistry::with_defaults());
//! registry.define_checker(
//!     "acme.Document",
//!     NameChecker::public(["title"]).with_getattr("body", "acme.View").into_ref(),
//! )?;
//!
//! let ctx = SecurityContext::new()
//!     .with_registry(registry)
//!     .with_policy(Arc::new(ParanoidPolicy));
//! ctx.new_interaction([Participation::new(Principal::user("acme.alice", "Alice"))])?;
//!
//! let doc = Instance::new("acme.Document")
//!     .with_attr("title", Value::from("Minutes"))
//!     .with_attr("body", Value::from("..."))
//!     .into_value();
//! let doc = ctx.proxy(doc);
//!
//! assert_eq!(doc.getattr(&ctx, "title")?, Value::from("Minutes"));
//! assert!(doc.getattr(&ctx, "body").unwrap_err().is_unauthorized());
//! assert!(doc.getattr(&ctx, "author").unwrap_err().is_forbidden());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod checker;
pub mod config;
pub mod context;
pub mod decorator;
pub mod error;
pub mod interaction;
pub mod operation;
pub mod permission;
pub mod policy;
pub mod proxy;
pub mod registry;
pub mod value;

pub use checker::{
    can_access, can_write, container_checker, Checker, CheckerRef, CombinedChecker,
    ContainerAccess, ContainerKind, MultiChecker, NameBased, NameChecker, WatchLevel,
    WatchingChecker,
};
pub use config::{ConfigError, ConfigLoader, PolicyKind, SecurityConfig};
pub use context::{check_permission, SecurityContext};
pub use decorator::{merge_capabilities, merge_checkers, Decorator};
pub use error::{
    AccessError, CheckerError, InteractionError, PermissionError, SecurityError, ValueError,
};
pub use interaction::{Interaction, Participation, ParticipationSet};
pub use operation::{is_always_available, Operation, ALWAYS_AVAILABLE};
pub use permission::{
    permission_registry, PermissionRegistry, RequiredPermission, PUBLIC_PERMISSION_ID,
};
pub use policy::{
    security_policy, set_security_policy, Decider, GrantPolicy, ParanoidPolicy,
    PermissionSetting, PermissivePolicy, PolicyInteraction, PrincipalPermissionMap,
    SecurityPolicy,
};
pub use proxy::{get_checker, proxy_factory, proxy_value, remove_security_proxy, Proxy};
pub use registry::{checker_registry, CheckerEntry, CheckerFactory, CheckerRegistry};
pub use value::{Instance, NativeFn, NativeFunction, Object, Value};
