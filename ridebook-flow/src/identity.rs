use ridebook_core::{AuthProvider, Identity};
use tokio::sync::watch;
use tracing::info;

/// Identity of the user behind one booking session, with change notification.
pub struct SessionIdentity {
    current: watch::Sender<Option<Identity>>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self { current }
    }

    pub fn sign_in(&self, identity: Identity) {
        info!("User {} signed in", identity.id);
        self.current.send_replace(Some(identity));
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.current.send_replace(None) {
            info!("User {} signed out", previous.id);
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthProvider for SessionIdentity {
    fn current_identity(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }
}
