//! Security policies.
//!
//! A [`SecurityPolicy`] is the interaction factory: the interaction it
//! creates decides every permission question asked during one unit of
//! work. Swapping the process-wide policy changes both.
//!
//! # Built-in Policies
//!
//! | Policy | Grants |
//! |--------|--------|
//! | [`ParanoidPolicy`] | `Public`, or anything when every participant is the system principal |
//! | [`PermissivePolicy`] | Everything |
//! | [`GrantPolicy`] | Per-principal Allow/Deny settings, falling back to groups |
//!
//! The public permission is granted by every policy.

use crate::error::InteractionError;
use crate::interaction::{Interaction, Participation, ParticipationSet};
use crate::permission::PUBLIC_PERMISSION_ID;
use crate::value::Value;
use castellan_types::{GroupSource, InteractionId, PermissionId, Principal, PrincipalId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Pluggable strategy answering permission questions.
///
/// # Example Implementation
///
/// ```
/// use castellan_security::{Decider, Interaction, InteractionError, Participation, PolicyInteraction, SecurityPolicy, Value};
/// use castellan_types::PermissionId;
/// use std::sync::Arc;
///
/// /// Grants only to interactions with exactly one participant.
/// #[derive(Debug, Clone)]
/// struct SoloPolicy;
///
/// impl Decider for SoloPolicy {
///     fn decide(&self, participations: &[Arc<Participation>], _: &PermissionId, _: &Value) -> bool {
///         participations.len() == 1
///     }
/// }
///
/// impl SecurityPolicy for SoloPolicy {
///     fn name(&self) -> &'static str {
///         "solo"
///     }
///
///     fn new_interaction(
///         &self,
///         participations: Vec<Arc<Participation>>,
///     ) -> Result<Arc<dyn Interaction>, InteractionError> {
///         Ok(PolicyInteraction::start(self.clone(), participations)?)
///     }
/// }
/// ```
pub trait SecurityPolicy: Send + Sync + fmt::Debug {
    /// Short name used in logs and configuration.
    fn name(&self) -> &'static str;

    /// Creates an interaction holding `participations`.
    ///
    /// # Errors
    ///
    /// Returns [`InteractionError::AlreadyParticipating`] if a
    /// participation is attached elsewhere.
    fn new_interaction(
        &self,
        participations: Vec<Arc<Participation>>,
    ) -> Result<Arc<dyn Interaction>, InteractionError>;
}

/// The decision half of a policy.
pub trait Decider: Send + Sync + fmt::Debug {
    /// Returns `true` if `participations` hold `permission` on `object`.
    ///
    /// Never called for the public permission.
    fn decide(
        &self,
        participations: &[Arc<Participation>],
        permission: &PermissionId,
        object: &Value,
    ) -> bool;
}

/// Interaction answering through a [`Decider`].
#[derive(Debug)]
pub struct PolicyInteraction<D> {
    participations: ParticipationSet,
    decider: D,
}

impl<D: Decider + 'static> PolicyInteraction<D> {
    /// Creates the interaction and attaches `participations`.
    ///
    /// Nothing stays attached if one of them fails.
    ///
    /// # Errors
    ///
    /// Returns [`InteractionError::AlreadyParticipating`].
    pub fn start(
        decider: D,
        participations: Vec<Arc<Participation>>,
    ) -> Result<Arc<Self>, InteractionError> {
        let interaction = Self {
            participations: ParticipationSet::new(),
            decider,
        };
        for participation in participations {
            if let Err(e) = interaction.participations.add(participation) {
                interaction.participations.clear();
                return Err(e);
            }
        }
        Ok(Arc::new(interaction))
    }

    /// Returns the decider.
    #[must_use]
    pub fn decider(&self) -> &D {
        &self.decider
    }
}

impl<D: Decider> Interaction for PolicyInteraction<D> {
    fn id(&self) -> InteractionId {
        self.participations.id()
    }

    fn participations(&self) -> Vec<Arc<Participation>> {
        self.participations.snapshot()
    }

    fn add(&self, participation: Arc<Participation>) -> Result<(), InteractionError> {
        self.participations.add(participation)
    }

    fn remove(&self, participation: &Arc<Participation>) -> Result<(), InteractionError> {
        self.participations.remove(participation)
    }

    fn clear(&self) {
        self.participations.clear();
    }

    fn check_permission(&self, permission: &PermissionId, object: &Value) -> bool {
        if permission.as_str() == PUBLIC_PERMISSION_ID {
            return true;
        }
        self.decider
            .decide(&self.participations.snapshot(), permission, object)
    }
}

/// Grants only to the system principal.
///
/// An interaction without participants counts as system work.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParanoidPolicy;

impl Decider for ParanoidPolicy {
    fn decide(&self, participations: &[Arc<Participation>], _: &PermissionId, _: &Value) -> bool {
        participations.iter().all(|p| p.principal().is_system())
    }
}

impl SecurityPolicy for ParanoidPolicy {
    fn name(&self) -> &'static str {
        "paranoid"
    }

    fn new_interaction(
        &self,
        participations: Vec<Arc<Participation>>,
    ) -> Result<Arc<dyn Interaction>, InteractionError> {
        Ok(PolicyInteraction::start(*self, participations)?)
    }
}

/// Grants everything. For tests and trusted tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissivePolicy;

impl Decider for PermissivePolicy {
    fn decide(&self, _: &[Arc<Participation>], _: &PermissionId, _: &Value) -> bool {
        true
    }
}

impl SecurityPolicy for PermissivePolicy {
    fn name(&self) -> &'static str {
        "permissive"
    }

    fn new_interaction(
        &self,
        participations: Vec<Arc<Participation>>,
    ) -> Result<Arc<dyn Interaction>, InteractionError> {
        Ok(PolicyInteraction::start(*self, participations)?)
    }
}

/// A principal's setting for one permission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionSetting {
    /// Explicitly granted.
    Allow,
    /// Explicitly refused.
    Deny,
    /// No setting; groups decide.
    #[default]
    Unset,
}

impl PermissionSetting {
    /// `Some(true)` for Allow, `Some(false)` for Deny, `None` for Unset.
    #[must_use]
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Allow => Some(true),
            Self::Deny => Some(false),
            Self::Unset => None,
        }
    }
}

/// Allow/Deny settings per permission and principal.
#[derive(Debug, Default)]
pub struct PrincipalPermissionMap {
    settings: RwLock<HashMap<(PermissionId, PrincipalId), PermissionSetting>>,
}

impl PrincipalPermissionMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows `permission` to `principal`.
    pub fn grant(&self, permission: impl Into<PermissionId>, principal: impl Into<PrincipalId>) {
        self.set(permission.into(), principal.into(), PermissionSetting::Allow);
    }

    /// Denies `permission` to `principal`.
    pub fn deny(&self, permission: impl Into<PermissionId>, principal: impl Into<PrincipalId>) {
        self.set(permission.into(), principal.into(), PermissionSetting::Deny);
    }

    /// Removes any setting of `permission` for `principal`.
    pub fn unset(&self, permission: impl Into<PermissionId>, principal: impl Into<PrincipalId>) {
        self.settings
            .write()
            .remove(&(permission.into(), principal.into()));
    }

    /// Returns the setting of `permission` for `principal`.
    #[must_use]
    pub fn setting(&self, permission: &PermissionId, principal: &PrincipalId) -> PermissionSetting {
        self.settings
            .read()
            .get(&(permission.clone(), principal.clone()))
            .copied()
            .unwrap_or_default()
    }

    fn set(&self, permission: PermissionId, principal: PrincipalId, setting: PermissionSetting) {
        self.settings.write().insert((permission, principal), setting);
    }
}

/// Grants from a [`PrincipalPermissionMap`], consulting groups when a
/// principal has no setting of its own.
///
/// For each participant other than the system principal:
///
/// 1. The principal's own setting decides if there is one.
/// 2. Otherwise its groups are asked, recursively: any group allowing
///    grants, otherwise any group denying refuses.
/// 3. Otherwise the permission is refused.
///
/// Every such participant must be granted.
///
/// # Example
///
/// ```
/// use castellan_security::{GrantPolicy, PrincipalPermissionMap};
/// use castellan_types::{Group, Principal, PrincipalId, PrincipalRegistry};
/// use std::sync::Arc;
///
/// let directory = Arc::new(PrincipalRegistry::new());
/// let editors = directory.add_group(Group::new("acme.editors", "Editors"));
/// editors.set_members([PrincipalId::new("acme.alice")]);
///
/// let grants = Arc::new(PrincipalPermissionMap::new());
/// grants.grant("acme.Edit", "acme.editors");
///
/// let policy = GrantPolicy::new(grants).with_groups(directory);
/// let alice = Principal::user("acme.alice", "Alice");
/// assert!(policy.principal_allowed(&alice, &"acme.Edit".into()));
/// assert!(!policy.principal_allowed(&alice, &"acme.Delete".into()));
/// ```
#[derive(Clone)]
pub struct GrantPolicy {
    grants: Arc<PrincipalPermissionMap>,
    groups: Option<Arc<dyn GroupSource>>,
}

impl GrantPolicy {
    /// Creates a policy reading `grants`. Group memberships come only from
    /// the principals' own records until [`with_groups`](Self::with_groups).
    #[must_use]
    pub fn new(grants: Arc<PrincipalPermissionMap>) -> Self {
        Self {
            grants,
            groups: None,
        }
    }

    /// Adds a source of group memberships.
    #[must_use]
    pub fn with_groups(mut self, groups: Arc<dyn GroupSource>) -> Self {
        self.groups = Some(groups);
        self
    }

    /// Returns the settings map.
    #[must_use]
    pub fn grants(&self) -> &Arc<PrincipalPermissionMap> {
        &self.grants
    }

    /// Returns `true` if `principal` is granted `permission`.
    #[must_use]
    pub fn principal_allowed(&self, principal: &Principal, permission: &PermissionId) -> bool {
        let mut direct = principal.groups().to_vec();
        for group in self.direct_groups(principal.id()) {
            if !direct.contains(&group) {
                direct.push(group);
            }
        }
        let mut seen = HashSet::from([principal.id().clone()]);
        self.decision(principal.id(), direct, permission, &mut seen)
            .unwrap_or(false)
    }

    fn direct_groups(&self, id: &PrincipalId) -> Vec<PrincipalId> {
        self.groups
            .as_ref()
            .map(|source| source.direct_groups(id))
            .unwrap_or_default()
    }

    fn decision(
        &self,
        id: &PrincipalId,
        groups: Vec<PrincipalId>,
        permission: &PermissionId,
        seen: &mut HashSet<PrincipalId>,
    ) -> Option<bool> {
        if let Some(own) = self.grants.setting(permission, id).as_bool() {
            return Some(own);
        }
        let mut denied = false;
        for group in groups {
            if !seen.insert(group.clone()) {
                continue;
            }
            let parents = self.direct_groups(&group);
            match self.decision(&group, parents, permission, seen) {
                Some(true) => return Some(true),
                Some(false) => denied = true,
                None => {}
            }
        }
        denied.then_some(false)
    }
}

impl fmt::Debug for GrantPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrantPolicy")
            .field("grants", &self.grants)
            .field("groups", &self.groups.is_some())
            .finish()
    }
}

impl Decider for GrantPolicy {
    fn decide(
        &self,
        participations: &[Arc<Participation>],
        permission: &PermissionId,
        _: &Value,
    ) -> bool {
        let mut seen = HashSet::new();
        participations.iter().all(|p| {
            let principal = p.principal();
            principal.is_system()
                || !seen.insert(principal.id().clone())
                || self.principal_allowed(principal, permission)
        })
    }
}

impl SecurityPolicy for GrantPolicy {
    fn name(&self) -> &'static str {
        "grant"
    }

    fn new_interaction(
        &self,
        participations: Vec<Arc<Participation>>,
    ) -> Result<Arc<dyn Interaction>, InteractionError> {
        Ok(PolicyInteraction::start(self.clone(), participations)?)
    }
}

static POLICY: LazyLock<RwLock<Arc<dyn SecurityPolicy>>> =
    LazyLock::new(|| RwLock::new(Arc::new(ParanoidPolicy)));

/// Returns the process-wide policy. [`ParanoidPolicy`] until replaced.
#[must_use]
pub fn security_policy() -> Arc<dyn SecurityPolicy> {
    Arc::clone(&POLICY.read())
}

/// Replaces the process-wide policy and returns the previous one.
///
/// Interactions already created keep answering with the policy that
/// created them.
pub fn set_security_policy(policy: Arc<dyn SecurityPolicy>) -> Arc<dyn SecurityPolicy> {
    let mut slot = POLICY.write();
    tracing::debug!(previous = slot.name(), next = policy.name(), "security policy set");
    std::mem::replace(&mut *slot, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use castellan_types::{Group, PrincipalRegistry};

    fn user(id: &str) -> Arc<Participation> {
        Participation::new(Principal::user(id, id))
    }

    fn ask(policy: &dyn SecurityPolicy, participations: Vec<Arc<Participation>>, permission: &str) -> bool {
        policy
            .new_interaction(participations)
            .expect("fresh participations")
            .check_permission(&PermissionId::new(permission), &Value::None)
    }

    #[test]
    fn paranoid_grants_system_only() {
        assert!(ask(&ParanoidPolicy, vec![Participation::new(Principal::system())], "acme.View"));
        assert!(!ask(&ParanoidPolicy, vec![user("acme.alice")], "acme.View"));
        assert!(!ask(
            &ParanoidPolicy,
            vec![Participation::new(Principal::system()), user("acme.alice")],
            "acme.View"
        ));
        assert!(ask(&ParanoidPolicy, vec![], "acme.View"));
    }

    #[test]
    fn public_is_always_granted() {
        assert!(ask(&ParanoidPolicy, vec![user("acme.alice")], PUBLIC_PERMISSION_ID));
        let strict = GrantPolicy::new(Arc::new(PrincipalPermissionMap::new()));
        assert!(ask(&strict, vec![user("acme.alice")], PUBLIC_PERMISSION_ID));
    }

    #[test]
    fn permissive_grants_everything() {
        assert!(ask(&PermissivePolicy, vec![user("acme.alice")], "acme.Anything"));
    }

    #[test]
    fn own_setting_wins_over_groups() {
        let directory = Arc::new(PrincipalRegistry::new());
        let staff = directory.add_group(Group::new("acme.staff", "Staff"));
        staff.set_members([PrincipalId::new("acme.alice")]);

        let grants = Arc::new(PrincipalPermissionMap::new());
        grants.grant("acme.View", "acme.staff");
        grants.deny("acme.View", "acme.alice");
        let policy = GrantPolicy::new(Arc::clone(&grants)).with_groups(directory);

        assert!(!ask(&policy, vec![user("acme.alice")], "acme.View"));
        grants.unset("acme.View", "acme.alice");
        assert!(ask(&policy, vec![user("acme.alice")], "acme.View"));
    }

    #[test]
    fn any_group_allow_beats_group_deny() {
        let directory = Arc::new(PrincipalRegistry::new());
        for id in ["acme.a", "acme.b"] {
            directory
                .add_group(Group::new(id, id))
                .set_members([PrincipalId::new("acme.alice")]);
        }
        let grants = Arc::new(PrincipalPermissionMap::new());
        grants.deny("acme.View", "acme.a");
        grants.grant("acme.View", "acme.b");
        let policy = GrantPolicy::new(grants).with_groups(directory);

        assert!(ask(&policy, vec![user("acme.alice")], "acme.View"));
    }

    #[test]
    fn group_deny_without_allow_refuses() {
        let grants = Arc::new(PrincipalPermissionMap::new());
        grants.deny("acme.View", "acme.staff");
        let policy = GrantPolicy::new(grants);
        let alice = Principal::user("acme.alice", "Alice").with_groups([PrincipalId::new("acme.staff")]);
        assert!(!policy.principal_allowed(&alice, &PermissionId::new("acme.View")));
    }

    #[test]
    fn nested_groups_are_followed() {
        let directory = Arc::new(PrincipalRegistry::new());
        directory
            .add_group(Group::new("acme.staff", "Staff"))
            .set_members([PrincipalId::new("acme.editors")]);
        directory
            .add_group(Group::new("acme.editors", "Editors"))
            .set_members([PrincipalId::new("acme.alice")]);
        let grants = Arc::new(PrincipalPermissionMap::new());
        grants.grant("acme.View", "acme.staff");
        let policy = GrantPolicy::new(grants).with_groups(directory);

        let alice = Principal::user("acme.alice", "Alice");
        assert!(policy.principal_allowed(&alice, &PermissionId::new("acme.View")));
    }

    #[test]
    fn cyclic_groups_terminate() {
        let directory = Arc::new(PrincipalRegistry::new());
        directory
            .add_group(Group::new("g.a", "A"))
            .set_members([PrincipalId::new("g.b"), PrincipalId::new("acme.alice")]);
        directory
            .add_group(Group::new("g.b", "B"))
            .set_members([PrincipalId::new("g.a")]);
        let policy = GrantPolicy::new(Arc::new(PrincipalPermissionMap::new())).with_groups(directory);
        let alice = Principal::user("acme.alice", "Alice");
        assert!(!policy.principal_allowed(&alice, &PermissionId::new("acme.View")));
    }

    #[test]
    fn every_non_system_participant_must_pass() {
        let grants = Arc::new(PrincipalPermissionMap::new());
        grants.grant("acme.View", "acme.alice");
        let policy = GrantPolicy::new(grants);

        assert!(ask(
            &policy,
            vec![user("acme.alice"), Participation::new(Principal::system())],
            "acme.View"
        ));
        assert!(!ask(&policy, vec![user("acme.alice"), user("acme.bob")], "acme.View"));
    }

    #[test]
    fn failed_start_detaches_everything() {
        let shared = user("acme.alice");
        let fresh = user("acme.bob");
        let taken = PolicyInteraction::start(PermissivePolicy, vec![Arc::clone(&shared)])
            .expect("fresh participation");

        let err = PermissivePolicy
            .new_interaction(vec![Arc::clone(&fresh), Arc::clone(&shared)])
            .expect_err("alice is taken");
        assert!(matches!(err, InteractionError::AlreadyParticipating { .. }));
        assert!(fresh.interaction().is_none());
        assert_eq!(shared.interaction(), Some(taken.id()));
    }

    #[test]
    fn global_policy_swaps() {
        let previous = set_security_policy(Arc::new(PermissivePolicy));
        assert_eq!(security_policy().name(), "permissive");
        let restored = set_security_policy(previous);
        assert_eq!(restored.name(), "permissive");
    }
}
