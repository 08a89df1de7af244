use serde::{Deserialize, Serialize};

/// Signed-in user as issued by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable identifier; keys the user's remote document.
    pub id: String,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }
}

/// Source of the current signed-in identity. `None` means the remote store
/// cannot be read or written.
pub trait AuthProvider: Send + Sync {
    fn current_identity(&self) -> Option<Identity>;
}

/// An identity that never changes, for tools and tests.
pub struct FixedIdentity {
    identity: Option<Identity>,
}

impl FixedIdentity {
    pub fn signed_in(id: impl Into<String>) -> Self {
        Self {
            identity: Some(Identity::new(id)),
        }
    }

    pub fn anonymous() -> Self {
        Self { identity: None }
    }
}

impl AuthProvider for FixedIdentity {
    fn current_identity(&self) -> Option<Identity> {
        self.identity.clone()
    }
}
