use std::sync::Arc;

use ridebook_core::repository::LocalCache;
use ridebook_core::BookingDraft;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::BookingError;
use crate::store::BookingStore;

/// Single authority on what may reach the local cache.
///
/// Steps 1-4 never reach the cache in their real form: writes substitute the
/// default draft and reads discard them. Payment and finalizing pass through
/// unchanged in both directions.
pub struct CacheGate {
    cache: Arc<dyn LocalCache>,
    key: String,
}

impl CacheGate {
    pub fn new(cache: Arc<dyn LocalCache>, key: impl Into<String>) -> Self {
        Self {
            cache,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// What the cache is allowed to hold for `draft`.
    pub fn admit(draft: &BookingDraft) -> BookingDraft {
        if draft.is_durable() {
            draft.clone()
        } else {
            BookingDraft::default()
        }
    }

    pub async fn write(&self, draft: &BookingDraft) -> Result<(), BookingError> {
        let admitted = Self::admit(draft);
        let payload = serde_json::to_string(&admitted).map_err(|e| BookingError::Cache(e.to_string()))?;
        self.cache
            .set(&self.key, &payload)
            .await
            .map_err(BookingError::cache)?;
        debug!("Cached draft under {} (step {})", self.key, admitted.step());
        Ok(())
    }

    /// Cached draft, or the default one when the entry is missing, unreadable,
    /// malformed or ephemeral.
    pub async fn read(&self) -> BookingDraft {
        let payload = match self.cache.get(&self.key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return BookingDraft::default(),
            Err(e) => {
                warn!("Local cache read failed for {}: {}", self.key, e);
                return BookingDraft::default();
            }
        };

        match serde_json::from_str::<BookingDraft>(&payload) {
            Ok(draft) if draft.is_well_formed() && draft.is_durable() => draft,
            Ok(draft) => {
                debug!("Discarding cached draft on step {}", draft.step());
                BookingDraft::default()
            }
            Err(e) => {
                warn!("Discarding malformed cached draft under {}: {}", self.key, e);
                BookingDraft::default()
            }
        }
    }

    /// Session-start restore. Returns whether a durable draft was applied.
    pub async fn restore_into(&self, store: &BookingStore) -> bool {
        let cached = self.read().await;
        if !cached.is_durable() {
            return false;
        }
        store.restore_snapshot(cached)
    }

    /// Mirror every state the store publishes through [`CacheGate::write`].
    /// Intermediate states may be coalesced; the latest one always lands.
    ///
    /// An ephemeral starting state is not written, so a fresh session cannot
    /// overwrite a cached payment session before `restore_into` has read it.
    pub fn spawn_mirror(self: Arc<Self>, store: &BookingStore) -> JoinHandle<()> {
        let mut rx = store.subscribe();
        tokio::spawn(async move {
            let initial = rx.borrow_and_update().clone();
            if initial.is_durable() {
                self.mirror(&initial).await;
            }
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                self.mirror(&snapshot).await;
            }
        })
    }

    async fn mirror(&self, draft: &BookingDraft) {
        if let Err(e) = self.write(draft).await {
            warn!("Failed to mirror draft to local cache: {}", e);
        }
    }
}
