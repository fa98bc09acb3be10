//! The per-task security context.
//!
//! A [`SecurityContext`] owns the one interaction slot of a unit of work,
//! plus the policy and checker registry used inside it. It is passed by
//! reference to every checked operation instead of living in a global or
//! thread-local, so a task can only act under the identity it was given.
//!
//! # Lifecycle
//!
//! ```text
//! new_interaction(participations) ──► [active] ──► end_interaction()
//!        │ (already active)             │
//!        ▼                              ├── get_interaction()   → Ok
//!   AlreadyActive                       └── query_interaction() → Some
//! ```
//!
//! At most one interaction is active per context. Ending is idempotent.

use crate::error::{InteractionError, SecurityError};
use crate::interaction::{Interaction, Participation};
use crate::permission::RequiredPermission;
use crate::policy::{security_policy, SecurityPolicy};
use crate::proxy::proxy_value;
use crate::registry::{checker_registry, CheckerRegistry};
use crate::value::Value;
use parking_lot::Mutex;
use std::sync::Arc;

/// Security state of one task.
///
/// Not `Clone`: a context is owned by exactly one task.
///
/// # Example
///
/// ```
/// use castellan_security::{Participation, PermissivePolicy, SecurityContext};
/// use castellan_types::Principal;
/// use std::sync::Arc;
///
/// let ctx = SecurityContext::new().with_policy(Arc::new(PermissivePolicy));
/// assert!(ctx.query_interaction().is_none());
///
/// ctx.new_interaction([Participation::new(Principal::user("acme.alice", "Alice"))])?;
/// assert!(ctx.query_interaction().is_some());
/// assert!(ctx.new_interaction([]).is_err());
///
/// ctx.end_interaction();
/// ctx.end_interaction();
/// assert!(ctx.get_interaction().is_err());
/// # Ok::<(), castellan_security::InteractionError>(())
/// ```
#[derive(Debug)]
pub struct SecurityContext {
    slot: Mutex<Option<Arc<dyn Interaction>>>,
    policy: Option<Arc<dyn SecurityPolicy>>,
    registry: Arc<CheckerRegistry>,
}

impl Default for SecurityContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityContext {
    /// Creates a context using the process-wide registry and policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            policy: None,
            registry: checker_registry(),
        }
    }

    /// Uses `policy` instead of the process-wide one.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn SecurityPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Uses `registry` instead of the process-wide one.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<CheckerRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// The checker registry of this context.
    #[must_use]
    pub fn registry(&self) -> &CheckerRegistry {
        &self.registry
    }

    /// The policy new interactions are created with.
    ///
    /// Without an explicit policy, this is the process-wide one at the
    /// time of the call.
    #[must_use]
    pub fn policy(&self) -> Arc<dyn SecurityPolicy> {
        self.policy.clone().unwrap_or_else(security_policy)
    }

    /// Starts an interaction for `participations`.
    ///
    /// # Errors
    ///
    /// - [`InteractionError::AlreadyActive`] if an interaction is active.
    /// - [`InteractionError::AlreadyParticipating`] if a participation is
    ///   attached elsewhere.
    pub fn new_interaction(
        &self,
        participations: impl IntoIterator<Item = Arc<Participation>>,
    ) -> Result<Arc<dyn Interaction>, InteractionError> {
        let mut slot = self.slot.lock();
        if let Some(active) = slot.as_ref() {
            return Err(InteractionError::AlreadyActive(active.id()));
        }
        let policy = self.policy();
        let interaction = policy.new_interaction(participations.into_iter().collect())?;
        tracing::debug!(
            interaction = %interaction.id(),
            policy = policy.name(),
            participants = interaction.participations().len(),
            "interaction started"
        );
        *slot = Some(Arc::clone(&interaction));
        Ok(interaction)
    }

    /// The active interaction, if any.
    #[must_use]
    pub fn query_interaction(&self) -> Option<Arc<dyn Interaction>> {
        self.slot.lock().clone()
    }

    /// The active interaction.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::NoInteraction`] if none is active.
    pub fn get_interaction(&self) -> Result<Arc<dyn Interaction>, SecurityError> {
        self.query_interaction().ok_or(SecurityError::NoInteraction)
    }

    /// Ends the active interaction and detaches its participations.
    /// Does nothing if none is active.
    pub fn end_interaction(&self) {
        let ended = self.slot.lock().take();
        if let Some(interaction) = ended {
            interaction.clear();
            tracing::debug!(interaction = %interaction.id(), "interaction ended");
        }
    }

    /// Asks whether the active interaction holds `required` on `object`.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::NoInteraction`] for a non-public permission
    /// when no interaction is active.
    pub fn check_permission(
        &self,
        required: &RequiredPermission,
        object: &Value,
    ) -> Result<bool, SecurityError> {
        check_permission(self, required, object)
    }

    /// Proxies `value` with the checker this context's registry selects.
    #[must_use]
    pub fn proxy(&self, value: Value) -> Value {
        proxy_value(&self.registry, value)
    }
}

/// `Public` is always held. Anything else is asked of the active
/// interaction.
///
/// # Errors
///
/// Returns [`SecurityError::NoInteraction`] for a non-public permission
/// when no interaction is active.
pub fn check_permission(
    ctx: &SecurityContext,
    required: &RequiredPermission,
    object: &Value,
) -> Result<bool, SecurityError> {
    match required {
        RequiredPermission::Public => Ok(true),
        RequiredPermission::Permission(id) => {
            Ok(ctx.get_interaction()?.check_permission(id, object))
        }
    }
}
