//! Participations and interactions.
//!
//! An interaction is the security context of one unit of work (one
//! request, one task). It holds the participations of the principals
//! acting in it and answers permission questions for them.
//!
//! ```text
//! SecurityContext ──slot──► Interaction ──► [Participation { principal }, ...]
//!                               │
//!                               └── check_permission(permission, object) → bool
//! ```
//!
//! A participation belongs to at most one interaction at a time and
//! remembers which one.

use crate::error::InteractionError;
use crate::value::Value;
use castellan_types::{InteractionId, PermissionId, Principal};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// One principal taking part in an interaction.
///
/// # Example
///
/// ```
/// use castellan_security::Participation;
/// use castellan_types::Principal;
///
/// let participation = Participation::new(Principal::user("acme.alice", "Alice"));
/// assert_eq!(participation.principal().id().as_str(), "acme.alice");
/// assert!(participation.interaction().is_none());
/// ```
#[derive(Debug)]
pub struct Participation {
    principal: Principal,
    interaction: Mutex<Option<InteractionId>>,
}

impl Participation {
    /// Creates a participation not yet attached to any interaction.
    #[must_use]
    pub fn new(principal: Principal) -> Arc<Self> {
        Arc::new(Self {
            principal,
            interaction: Mutex::new(None),
        })
    }

    /// The acting principal.
    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// The interaction this participation belongs to, if any.
    #[must_use]
    pub fn interaction(&self) -> Option<InteractionId> {
        *self.interaction.lock()
    }
}

/// Security context of one unit of work.
///
/// Created by a [`SecurityPolicy`](crate::SecurityPolicy), which decides
/// how [`check_permission`](Self::check_permission) answers.
pub trait Interaction: Send + Sync + fmt::Debug {
    /// Unique id of this interaction.
    fn id(&self) -> InteractionId;

    /// Current participations, in the order they were added.
    fn participations(&self) -> Vec<Arc<Participation>>;

    /// Attaches a participation.
    ///
    /// # Errors
    ///
    /// Returns [`InteractionError::AlreadyParticipating`] if it already
    /// belongs to an interaction (this one included).
    fn add(&self, participation: Arc<Participation>) -> Result<(), InteractionError>;

    /// Detaches a participation.
    ///
    /// # Errors
    ///
    /// Returns [`InteractionError::NotParticipating`] if it does not
    /// belong to this interaction.
    fn remove(&self, participation: &Arc<Participation>) -> Result<(), InteractionError>;

    /// Detaches every participation, leaving them free to join another
    /// interaction.
    fn clear(&self);

    /// Returns `true` if the participants hold `permission` on `object`.
    fn check_permission(&self, permission: &PermissionId, object: &Value) -> bool;
}

/// Participation bookkeeping shared by interaction implementations.
#[derive(Debug)]
pub struct ParticipationSet {
    id: InteractionId,
    members: Mutex<Vec<Arc<Participation>>>,
}

impl ParticipationSet {
    /// Creates an empty set with a fresh interaction id.
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            id: InteractionId::new(),
            members: Mutex::new(Vec::new()),
        }
    }

    /// Id of the owning interaction.
    #[must_use]
    pub fn id(&self) -> InteractionId {
        self.id
    }

    /// Copy of the current members.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Participation>> {
        self.members.lock().clone()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    /// Returns `true` if there are no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }

    /// Attaches `participation` to this interaction.
    ///
    /// # Errors
    ///
    /// Returns [`InteractionError::AlreadyParticipating`] if it is attached
    /// anywhere already.
    pub fn add(&self, participation: Arc<Participation>) -> Result<(), InteractionError> {
        {
            let mut slot = participation.interaction.lock();
            if let Some(interaction) = *slot {
                return Err(InteractionError::AlreadyParticipating {
                    principal: participation.principal.id().clone(),
                    interaction,
                });
            }
            *slot = Some(self.id);
        }
        self.members.lock().push(participation);
        Ok(())
    }

    /// Detaches `participation` from this interaction.
    ///
    /// # Errors
    ///
    /// Returns [`InteractionError::NotParticipating`] if it is not attached
    /// here.
    pub fn remove(&self, participation: &Arc<Participation>) -> Result<(), InteractionError> {
        {
            let mut slot = participation.interaction.lock();
            if *slot != Some(self.id) {
                return Err(InteractionError::NotParticipating(
                    participation.principal.id().clone(),
                ));
            }
            *slot = None;
        }
        self.members
            .lock()
            .retain(|member| !Arc::ptr_eq(member, participation));
        Ok(())
    }

    /// Detaches every member.
    pub fn clear(&self) {
        let members = std::mem::take(&mut *self.members.lock());
        for member in members {
            *member.interaction.lock() = None;
        }
    }
}
