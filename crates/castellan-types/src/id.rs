//! Identifier types for castellan.
//!
//! Principals and permissions are identified by dotted strings
//! (`"acme.editor"`, `"acme.ManageContent"`) because they are declared
//! by configuration and compared across process restarts. Interactions
//! are short-lived and get random UUIDs.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Identifier of a [`Principal`](crate::Principal).
///
/// The id is the comparison and hash key of a principal: two principals
/// with the same id are the same actor, whatever their titles say.
///
/// # Example
///
/// ```
/// use castellan_types::PrincipalId;
///
/// let alice = PrincipalId::new("acme.alice");
/// assert_eq!(alice.as_str(), "acme.alice");
/// assert_eq!(alice, PrincipalId::from("acme.alice"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Arc<str>);

impl PrincipalId {
    /// Creates a principal id from its string form.
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PrincipalId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PrincipalId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a [`Permission`](crate::Permission).
///
/// # Example
///
/// ```
/// use castellan_types::PermissionId;
///
/// let view = PermissionId::new("acme.View");
/// assert_eq!(view.to_string(), "acme.View");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(Arc<str>);

impl PermissionId {
    /// Creates a permission id from its string form.
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PermissionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PermissionId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl std::fmt::Display for PermissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one interaction (one unit of work).
///
/// Participations record the id of the interaction they joined, so an
/// interaction can tell its own participations apart from foreign ones.
///
/// # Why No Default?
///
/// An interaction id only means something when an interaction is
/// created. Always construct with [`InteractionId::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteractionId(pub Uuid);

impl InteractionId {
    /// Creates a new [`InteractionId`] with a random UUID v4.
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for InteractionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "interaction:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_id_equality_is_by_string() {
        let a = PrincipalId::new("acme.alice");
        let b = PrincipalId::from(String::from("acme.alice"));
        assert_eq!(a, b);
        assert_ne!(a, PrincipalId::new("acme.bob"));
    }

    #[test]
    fn permission_id_ordering() {
        let mut ids = vec![PermissionId::new("b.Edit"), PermissionId::new("a.View")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "a.View");
    }

    #[test]
    fn interaction_id_uniqueness() {
        let id1 = InteractionId::new();
        let id2 = InteractionId::new();
        assert_ne!(id1, id2);
        assert!(id1.to_string().starts_with("interaction:"));
        assert_eq!(id1.uuid(), id1.0);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Grant {
            permission: PermissionId,
            principal: PrincipalId,
        }

        let grant: Grant = toml::from_str(
            r#"
permission = "acme.View"
principal = "acme.alice"
"#,
        )
        .expect("valid toml");
        assert_eq!(grant.permission, PermissionId::new("acme.View"));
        assert_eq!(grant.principal.as_str(), "acme.alice");

        let text = toml::to_string(&grant).expect("serializable");
        assert!(text.contains(r#"permission = "acme.View""#), "{text}");
    }
}
