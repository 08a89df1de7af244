use std::sync::Arc;

use ridebook_core::repository::DocumentStore;
use ridebook_core::step::PAYMENT_STEP;
use ridebook_core::{AuthProvider, BookingDraft, Identity, Outcome};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::BookingError;
use crate::snapshot;
use crate::store::BookingStore;

/// Saves and loads the draft against the user's remote document.
///
/// Conflict rule: a local payment session (step 5) always wins over a
/// non-payment remote snapshot; a remote payment session only replaces local
/// state when local is not already paying.
pub struct RemoteReconciler {
    store: Arc<BookingStore>,
    auth: Arc<dyn AuthProvider>,
    documents: Arc<dyn DocumentStore>,
}

impl RemoteReconciler {
    pub fn new(
        store: Arc<BookingStore>,
        auth: Arc<dyn AuthProvider>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            store,
            auth,
            documents,
        }
    }

    pub async fn save(&self) -> Outcome {
        match self.try_save().await {
            Ok(message) => Outcome::ok(message),
            Err(e) => {
                warn!("Saving booking draft failed: {}", e);
                Outcome::failed(e.to_string())
            }
        }
    }

    pub async fn load(&self) -> Outcome {
        match self.try_load().await {
            Ok(message) => Outcome::ok(message),
            Err(e) => {
                warn!("Loading booking draft failed: {}", e);
                Outcome::failed(e.to_string())
            }
        }
    }

    fn identity(&self) -> Result<Identity, BookingError> {
        self.auth.current_identity().ok_or(BookingError::NotSignedIn)
    }

    async fn try_save(&self) -> Result<String, BookingError> {
        let identity = self.identity()?;
        let draft = self.store.state();

        match draft.step() {
            1 => {
                self.clear_remote(&identity.id).await?;
                Ok("Draft reset, remote draft cleared".to_string())
            }
            2..=4 => {
                // A save scheduled on a payment step may run after the user
                // navigated back; drop whatever it left behind.
                self.clear_remote(&identity.id).await?;
                Ok("Ephemeral step, remote draft cleared".to_string())
            }
            5 | 6 => {
                self.write_remote(&identity.id, &draft).await?;
                Ok(format!("Booking draft saved on step {}", draft.step()))
            }
            other => Ok(format!("Nothing to save on step {}", other)),
        }
    }

    async fn try_load(&self) -> Result<String, BookingError> {
        let identity = self.identity()?;
        let document = self
            .documents
            .get(&identity.id)
            .await
            .map_err(BookingError::remote)?;

        let remote = document
            .as_ref()
            .and_then(|doc| doc.get("booking"))
            .filter(|booking| booking.is_object());

        // Local state may have moved while the read was in flight.
        let local_step = self.store.step();

        let Some(remote) = remote else {
            if local_step == PAYMENT_STEP {
                return Ok("No remote draft, local payment session kept".to_string());
            }
            self.store.reset();
            return Ok("No remote draft, draft reset".to_string());
        };

        if snapshot::decode_step(remote) == Some(PAYMENT_STEP) {
            if local_step == PAYMENT_STEP {
                self.resync_remote(&identity.id).await?;
                return Ok("Local payment session kept, remote resynced".to_string());
            }
            return self.rehydrate(remote);
        }

        if local_step == PAYMENT_STEP {
            self.resync_remote(&identity.id).await?;
            return Ok("Local payment session kept, remote overwritten".to_string());
        }

        self.store.reset();
        self.clear_remote(&identity.id).await?;
        Ok("Remote draft discarded, draft reset".to_string())
    }

    fn rehydrate(&self, remote: &Value) -> Result<String, BookingError> {
        let decoded = snapshot::decode(remote);
        let from = self.store.step();
        if !self.store.rehydrate(&decoded.draft) {
            return Err(BookingError::TransitionRejected {
                from,
                to: PAYMENT_STEP,
            });
        }

        if decoded.dropped.is_empty() {
            Ok("Payment session restored".to_string())
        } else {
            Ok(format!(
                "Payment session restored without invalid fields: {}",
                decoded.dropped.join(", ")
            ))
        }
    }

    /// Overwrite the remote snapshot with the current local draft.
    async fn resync_remote(&self, user_id: &str) -> Result<(), BookingError> {
        let draft = self.store.state();
        self.write_remote(user_id, &draft).await
    }

    async fn write_remote(&self, user_id: &str, draft: &BookingDraft) -> Result<(), BookingError> {
        self.documents
            .update(user_id, json!({ "booking": snapshot::to_remote(draft) }))
            .await
            .map_err(BookingError::remote)?;
        info!("Saved booking draft for {} on step {}", user_id, draft.step());
        Ok(())
    }

    async fn clear_remote(&self, user_id: &str) -> Result<(), BookingError> {
        self.documents
            .update(user_id, json!({ "booking": Value::Null }))
            .await
            .map_err(BookingError::remote)?;
        info!("Cleared remote booking draft for {}", user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ridebook_core::identity::FixedIdentity;
    use ridebook_core::memory::InMemoryDocumentStore;
    use ridebook_core::step::TransitionKind;
    use ridebook_core::RouteInfo;

    struct Fixture {
        store: Arc<BookingStore>,
        documents: Arc<InMemoryDocumentStore>,
        reconciler: RemoteReconciler,
    }

    fn fixture(auth: FixedIdentity) -> Fixture {
        let store = Arc::new(BookingStore::default());
        let documents = Arc::new(InMemoryDocumentStore::new());
        let reconciler = RemoteReconciler::new(store.clone(), Arc::new(auth), documents.clone());
        Fixture {
            store,
            documents,
            reconciler,
        }
    }

    fn signed_in() -> Fixture {
        fixture(FixedIdentity::signed_in("user-1"))
    }

    fn walk_to_payment(store: &BookingStore, departure: i64) {
        assert!(store.select_departure(departure));
        assert!(store.advance_step(3, TransitionKind::Navigation));
        assert!(store.select_arrival(20));
        assert!(store.set_route(RouteInfo {
            distance: 4_000.0,
            duration: 480.0,
            polyline: "abc".to_string(),
        }));
        assert!(store.advance_step(5, TransitionKind::Navigation));
    }

    fn remote_booking(f: &Fixture) -> Value {
        f.documents.document("user-1").unwrap()["booking"].clone()
    }

    #[tokio::test]
    async fn test_save_requires_identity() {
        let f = fixture(FixedIdentity::anonymous());
        walk_to_payment(&f.store, 10);

        let outcome = f.reconciler.save().await;
        assert!(!outcome.success);
        assert!(f.documents.document("user-1").is_none());
    }

    #[tokio::test]
    async fn test_save_payment_step_writes_snapshot() {
        let f = signed_in();
        walk_to_payment(&f.store, 10);

        let outcome = f.reconciler.save().await;
        assert!(outcome.success, "{}", outcome.message);
        let booking = remote_booking(&f);
        assert_eq!(booking["step"], 5);
        assert_eq!(booking["departureStationId"], 10);
        assert_eq!(booking["route"]["distance"], 4000.0);
        assert!(booking["updatedAt"].is_string());
    }

    #[tokio::test]
    async fn test_save_on_ephemeral_step_clears_remote() {
        let f = signed_in();
        walk_to_payment(&f.store, 10);
        assert!(f.reconciler.save().await.success);

        f.store.clear_arrival();
        assert!(f.reconciler.save().await.success);
        assert!(remote_booking(&f).is_null());

        f.store.reset();
        assert!(f.reconciler.save().await.success);
        assert!(remote_booking(&f).is_null());
    }

    #[tokio::test]
    async fn test_save_reports_remote_failure() {
        let f = signed_in();
        walk_to_payment(&f.store, 10);
        f.documents.set_unavailable(true);

        let outcome = f.reconciler.save().await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("Remote store error"));
    }

    #[tokio::test]
    async fn test_load_requires_identity() {
        let f = fixture(FixedIdentity::anonymous());
        assert!(!f.reconciler.load().await.success);
    }

    #[tokio::test]
    async fn test_local_payment_session_wins_over_older_remote_step() {
        let f = signed_in();
        walk_to_payment(&f.store, 10);
        f.documents
            .set("user-1", json!({"booking": {"step": 3, "departureStationId": 99}}))
            .await
            .unwrap();

        let outcome = f.reconciler.load().await;
        assert!(outcome.success, "{}", outcome.message);

        let draft = f.store.state();
        assert_eq!(draft.step(), 5);
        assert_eq!(draft.departure_station_id, Some(10));

        let booking = remote_booking(&f);
        assert_eq!(booking["step"], 5);
        assert_eq!(booking["departureStationId"], 10);
    }

    #[tokio::test]
    async fn test_remote_payment_session_rehydrates_fresh_state() {
        let f = signed_in();
        f.documents
            .set(
                "user-1",
                json!({"booking": {
                    "step": 5,
                    "departureStationId": 7,
                    "departureDateString": "2024-01-01T10:00:00Z"
                }}),
            )
            .await
            .unwrap();

        let outcome = f.reconciler.load().await;
        assert!(outcome.success, "{}", outcome.message);

        let draft = f.store.state();
        assert_eq!(draft.step(), 5);
        assert_eq!(draft.departure_station_id, Some(7));
        assert_eq!(
            draft.departure_date,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_invalid_remote_date_is_dropped() {
        let f = signed_in();
        f.documents
            .set("user-1", json!({"booking": {"step": 5, "departureDateString": "not-a-date"}}))
            .await
            .unwrap();

        let outcome = f.reconciler.load().await;
        assert!(outcome.success);
        assert!(outcome.message.contains("departureDateString"));

        let draft = f.store.state();
        assert_eq!(draft.step(), 5);
        assert!(draft.departure_date.is_none());
    }

    #[tokio::test]
    async fn test_remote_payment_session_is_confirmatory_when_local_pays() {
        let f = signed_in();
        walk_to_payment(&f.store, 10);
        f.documents
            .set("user-1", json!({"booking": {"step": 5, "departureStationId": 42}}))
            .await
            .unwrap();

        assert!(f.reconciler.load().await.success);
        assert_eq!(f.store.state().departure_station_id, Some(10));
        assert_eq!(remote_booking(&f)["departureStationId"], 10);
    }

    #[tokio::test]
    async fn test_stale_remote_step_resets_local_and_remote() {
        let f = signed_in();
        assert!(f.store.select_departure(3));
        f.documents
            .set("user-1", json!({"booking": {"step": 4, "departureStationId": 8}}))
            .await
            .unwrap();

        assert!(f.reconciler.load().await.success);
        assert_eq!(f.store.state(), BookingDraft::default());
        assert!(remote_booking(&f).is_null());
    }

    #[tokio::test]
    async fn test_empty_remote_resets_unless_paying() {
        let f = signed_in();
        assert!(f.store.select_departure(3));
        assert!(f.reconciler.load().await.success);
        assert_eq!(f.store.step(), 1);

        walk_to_payment(&f.store, 10);
        f.documents.set("user-1", json!({"name": "Ada"})).await.unwrap();
        assert!(f.reconciler.load().await.success);
        assert_eq!(f.store.step(), 5);
        assert_eq!(f.store.state().departure_station_id, Some(10));
    }

    #[tokio::test]
    async fn test_remote_read_failure_leaves_state_untouched() {
        let f = signed_in();
        assert!(f.store.select_departure(3));
        let before = f.store.state();
        f.documents.set_unavailable(true);

        let outcome = f.reconciler.load().await;
        assert!(!outcome.success);
        assert_eq!(f.store.state(), before);
    }
}
