//! Principal (actor identity) and group types.
//!
//! A [`Principal`] represents the actor performing an action,
//! separating "who is acting" from "what they are allowed to do".
//!
//! # Design Rationale
//!
//! Principals carry facts only: identity and *direct* group membership.
//! Whether a principal may do something is decided by a security policy
//! together with the checker guarding the object. The transitive group
//! closure is derived on demand with [`all_groups`] and never stored,
//! so a membership change is visible at the next check.
//!
//! # Kinds
//!
//! | Kind | Description | Typical Use |
//! |------|-------------|-------------|
//! | `User` | Authenticated human or service | Requests, API calls |
//! | `Group` | A named set of principals | Bulk grants |
//! | `System` | Internal operations | Startup, housekeeping |

use crate::PrincipalId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Well-known id of the system principal.
pub const SYSTEM_PRINCIPAL_ID: &str = "castellan.system";

/// What sort of actor a [`Principal`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    /// An authenticated user or service account.
    User,
    /// A group of principals.
    Group,
    /// Internal operations not attributable to any user.
    System,
}

/// The actor performing an action.
///
/// The [`id`](Self::id) is the comparison and hash key. `groups` holds the
/// groups the principal *directly* belongs to.
///
/// # Example
///
/// ```
/// use castellan_types::{Principal, PrincipalId};
///
/// let alice = Principal::user("acme.alice", "Alice")
///     .with_groups([PrincipalId::new("acme.editors")]);
///
/// assert!(alice.is_user());
/// assert_eq!(alice.groups().len(), 1);
/// assert!(Principal::system().is_system());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    id: PrincipalId,
    title: String,
    #[serde(default)]
    description: String,
    kind: PrincipalKind,
    #[serde(default)]
    groups: Vec<PrincipalId>,
}

impl Principal {
    /// Creates a principal of the given kind.
    #[must_use]
    pub fn new(id: impl Into<PrincipalId>, title: impl Into<String>, kind: PrincipalKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            kind,
            groups: Vec::new(),
        }
    }

    /// Creates a user principal.
    #[must_use]
    pub fn user(id: impl Into<PrincipalId>, title: impl Into<String>) -> Self {
        Self::new(id, title, PrincipalKind::User)
    }

    /// Creates a group principal.
    #[must_use]
    pub fn group(id: impl Into<PrincipalId>, title: impl Into<String>) -> Self {
        Self::new(id, title, PrincipalKind::Group)
    }

    /// Returns the system principal.
    #[must_use]
    pub fn system() -> Self {
        Self::new(SYSTEM_PRINCIPAL_ID, "System", PrincipalKind::System)
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the direct group memberships.
    #[must_use]
    pub fn with_groups(mut self, groups: impl IntoIterator<Item = PrincipalId>) -> Self {
        self.groups = groups.into_iter().collect();
        self
    }

    /// Returns the principal id.
    #[must_use]
    pub fn id(&self) -> &PrincipalId {
        &self.id
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the kind.
    #[must_use]
    pub fn kind(&self) -> PrincipalKind {
        self.kind
    }

    /// Returns the groups this principal directly belongs to.
    #[must_use]
    pub fn groups(&self) -> &[PrincipalId] {
        &self.groups
    }

    /// Returns `true` for [`PrincipalKind::User`].
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.kind == PrincipalKind::User
    }

    /// Returns `true` for [`PrincipalKind::Group`].
    #[must_use]
    pub fn is_group(&self) -> bool {
        self.kind == PrincipalKind::Group
    }

    /// Returns `true` for [`PrincipalKind::System`].
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.kind == PrincipalKind::System
    }
}

impl PartialEq for Principal {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Principal {}

impl Hash for Principal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            PrincipalKind::User => write!(f, "user:{}", self.id),
            PrincipalKind::Group => write!(f, "group:{}", self.id),
            PrincipalKind::System => write!(f, "system"),
        }
    }
}

/// A group that can enumerate and replace its members.
///
/// Membership is stored as principal ids. Readers take a snapshot.
#[derive(Debug)]
pub struct Group {
    principal: Principal,
    members: RwLock<BTreeSet<PrincipalId>>,
}

impl Group {
    /// Creates an empty group.
    #[must_use]
    pub fn new(id: impl Into<PrincipalId>, title: impl Into<String>) -> Self {
        Self {
            principal: Principal::group(id, title),
            members: RwLock::new(BTreeSet::new()),
        }
    }

    /// Returns the group as a principal.
    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Returns the group id.
    #[must_use]
    pub fn id(&self) -> &PrincipalId {
        self.principal.id()
    }

    /// Returns the member ids in sorted order.
    #[must_use]
    pub fn members(&self) -> Vec<PrincipalId> {
        self.members.read().iter().cloned().collect()
    }

    /// Replaces the member set.
    pub fn set_members(&self, members: impl IntoIterator<Item = PrincipalId>) {
        let members: BTreeSet<_> = members.into_iter().collect();
        *self.members.write() = members;
    }

    /// Returns `true` if `id` is a direct member.
    #[must_use]
    pub fn has_member(&self, id: &PrincipalId) -> bool {
        self.members.read().contains(id)
    }
}

/// Source of direct group-membership facts.
///
/// Implemented by whatever authentication subsystem knows the principals.
pub trait GroupSource: Send + Sync {
    /// Returns the groups `id` directly belongs to.
    fn direct_groups(&self, id: &PrincipalId) -> Vec<PrincipalId>;
}

/// Computes the transitive group closure of `principal`.
///
/// Breadth-first from the principal's direct groups, each group reported
/// once, in discovery order. Cycles are tolerated and the principal itself
/// is never part of its own closure.
///
/// # Example
///
/// ```
/// use castellan_types::{all_groups, Group, Principal, PrincipalId, PrincipalRegistry};
///
/// let registry = PrincipalRegistry::new();
/// let staff = registry.add_group(Group::new("acme.staff", "Staff"));
/// let editors = registry.add_group(Group::new("acme.editors", "Editors"));
/// staff.set_members([PrincipalId::new("acme.editors")]);
/// editors.set_members([PrincipalId::new("acme.alice")]);
///
/// let alice = Principal::user("acme.alice", "Alice");
/// let closure = all_groups(&alice, &registry);
/// assert_eq!(closure, vec![PrincipalId::new("acme.editors"), PrincipalId::new("acme.staff")]);
/// ```
#[must_use]
pub fn all_groups(principal: &Principal, source: &dyn GroupSource) -> Vec<PrincipalId> {
    let mut seen: HashSet<PrincipalId> = HashSet::new();
    seen.insert(principal.id().clone());

    let mut queue: VecDeque<PrincipalId> = principal.groups().iter().cloned().collect();
    queue.extend(source.direct_groups(principal.id()));

    let mut closure = Vec::new();
    while let Some(group) = queue.pop_front() {
        if !seen.insert(group.clone()) {
            continue;
        }
        queue.extend(source.direct_groups(&group));
        closure.push(group);
    }
    closure
}

/// In-memory directory of principals and groups.
///
/// Direct membership of a principal is the union of the groups stored on
/// its [`Principal`] record and the groups listing it as a member.
#[derive(Debug, Default)]
pub struct PrincipalRegistry {
    principals: RwLock<HashMap<PrincipalId, Principal>>,
    groups: RwLock<HashMap<PrincipalId, Arc<Group>>>,
}

impl PrincipalRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a principal record.
    pub fn register(&self, principal: Principal) {
        self.principals
            .write()
            .insert(principal.id().clone(), principal);
    }

    /// Returns a principal by id. Groups are found as well.
    #[must_use]
    pub fn get(&self, id: &PrincipalId) -> Option<Principal> {
        if let Some(p) = self.principals.read().get(id) {
            return Some(p.clone());
        }
        self.groups.read().get(id).map(|g| g.principal().clone())
    }

    /// Adds a group and returns a shared handle for editing its members.
    pub fn add_group(&self, group: Group) -> Arc<Group> {
        let group = Arc::new(group);
        self.groups
            .write()
            .insert(group.id().clone(), Arc::clone(&group));
        group
    }

    /// Returns a group by id.
    #[must_use]
    pub fn group(&self, id: &PrincipalId) -> Option<Arc<Group>> {
        self.groups.read().get(id).cloned()
    }
}

impl GroupSource for PrincipalRegistry {
    fn direct_groups(&self, id: &PrincipalId) -> Vec<PrincipalId> {
        let mut direct: Vec<PrincipalId> = self
            .principals
            .read()
            .get(id)
            .map(|p| p.groups().to_vec())
            .unwrap_or_default();

        let groups = self.groups.read();
        let mut by_membership: Vec<&Arc<Group>> =
            groups.values().filter(|g| g.has_member(id)).collect();
        by_membership.sort_by(|a, b| a.id().cmp(b.id()));
        for group in by_membership {
            if !direct.contains(group.id()) {
                direct.push(group.id().clone());
            }
        }
        direct
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_kinds() {
        let user = Principal::user("acme.alice", "Alice");
        assert!(user.is_user());
        assert!(!user.is_group());
        assert!(!user.is_system());

        let group = Principal::group("acme.staff", "Staff");
        assert!(group.is_group());

        let system = Principal::system();
        assert!(system.is_system());
        assert_eq!(system.id().as_str(), SYSTEM_PRINCIPAL_ID);
    }

    #[test]
    fn principal_equality_ignores_title() {
        let a = Principal::user("acme.alice", "Alice");
        let b = Principal::user("acme.alice", "Alice Liddell").with_description("x");
        assert_eq!(a, b);
        assert_ne!(a, Principal::user("acme.bob", "Alice"));
    }

    #[test]
    fn principal_display() {
        assert_eq!(Principal::user("a", "A").to_string(), "user:a");
        assert_eq!(Principal::group("g", "G").to_string(), "group:g");
        assert_eq!(Principal::system().to_string(), "system");
    }

    #[test]
    fn group_members_replace() {
        let group = Group::new("acme.staff", "Staff");
        group.set_members([PrincipalId::new("b"), PrincipalId::new("a")]);
        assert_eq!(group.members(), vec![PrincipalId::new("a"), PrincipalId::new("b")]);

        group.set_members([PrincipalId::new("c")]);
        assert!(group.has_member(&PrincipalId::new("c")));
        assert!(!group.has_member(&PrincipalId::new("a")));
    }

    #[test]
    fn closure_follows_stored_and_member_groups() {
        let registry = PrincipalRegistry::new();
        registry.register(
            Principal::group("acme.editors", "Editors").with_groups([PrincipalId::new("acme.staff")]),
        );
        let reviewers = registry.add_group(Group::new("acme.reviewers", "Reviewers"));
        reviewers.set_members([PrincipalId::new("acme.alice")]);

        let alice = Principal::user("acme.alice", "Alice").with_groups([PrincipalId::new("acme.editors")]);
        let closure = all_groups(&alice, &registry);

        assert_eq!(
            closure,
            vec![
                PrincipalId::new("acme.editors"),
                PrincipalId::new("acme.reviewers"),
                PrincipalId::new("acme.staff"),
            ]
        );
    }

    #[test]
    fn closure_tolerates_cycles() {
        let registry = PrincipalRegistry::new();
        let a = registry.add_group(Group::new("g.a", "A"));
        let b = registry.add_group(Group::new("g.b", "B"));
        a.set_members([PrincipalId::new("g.b"), PrincipalId::new("u")]);
        b.set_members([PrincipalId::new("g.a")]);

        let user = Principal::user("u", "U");
        let closure = all_groups(&user, &registry);
        assert_eq!(closure, vec![PrincipalId::new("g.a"), PrincipalId::new("g.b")]);
    }

    #[test]
    fn closure_never_contains_self() {
        let registry = PrincipalRegistry::new();
        let g = registry.add_group(Group::new("g", "G"));
        g.set_members([PrincipalId::new("g")]);
        assert!(all_groups(g.principal(), &registry).is_empty());
    }

    #[test]
    fn registry_get_finds_groups() {
        let registry = PrincipalRegistry::new();
        registry.add_group(Group::new("acme.staff", "Staff"));
        let found = registry.get(&PrincipalId::new("acme.staff")).expect("group is registered");
        assert!(found.is_group());
        assert!(registry.get(&PrincipalId::new("missing")).is_none());
    }
}
