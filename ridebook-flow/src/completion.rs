use std::sync::Arc;

use chrono::Utc;
use ridebook_core::events::BookingEventSink;
use ridebook_core::repository::{BookingRepository, DocumentStore};
use ridebook_core::{AuthProvider, BookingHistoryRecord, BookingStatus, Outcome};
use ridebook_shared::{BookingCompletedEvent, BookingLifecycleEvent};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::BookingError;
use crate::store::BookingStore;

/// Archives a finished trip and clears the active draft.
pub struct BookingCompletion {
    store: Arc<BookingStore>,
    auth: Arc<dyn AuthProvider>,
    documents: Arc<dyn DocumentStore>,
    bookings: Arc<dyn BookingRepository>,
    events: Arc<dyn BookingEventSink>,
}

impl BookingCompletion {
    pub fn new(
        store: Arc<BookingStore>,
        auth: Arc<dyn AuthProvider>,
        documents: Arc<dyn DocumentStore>,
        bookings: Arc<dyn BookingRepository>,
        events: Arc<dyn BookingEventSink>,
    ) -> Self {
        Self {
            store,
            auth,
            documents,
            bookings,
            events,
        }
    }

    /// Local state is only reset once every remote write has gone through, so
    /// a failed completion leaves the session as it was.
    pub async fn complete(&self) -> Outcome {
        match self.try_complete().await {
            Ok(message) => Outcome::ok(message),
            Err(e) => {
                warn!("Completing booking failed: {}", e);
                Outcome::failed(e.to_string())
            }
        }
    }

    async fn try_complete(&self) -> Result<String, BookingError> {
        let identity = self.auth.current_identity().ok_or(BookingError::NotSignedIn)?;
        let booking_id = self.store.state().booking_id.ok_or(BookingError::NoBooking)?;

        let mut record = self
            .bookings
            .get_booking(&booking_id)
            .await
            .map_err(BookingError::remote)?
            .ok_or_else(|| BookingError::BookingNotFound(booking_id.clone()))?;

        let history_id = if record.status == BookingStatus::Completed {
            info!("Booking {} was already completed, skipping history", booking_id);
            None
        } else {
            record.complete();
            self.bookings
                .save_booking(&record)
                .await
                .map_err(BookingError::remote)?;

            let history = BookingHistoryRecord::from_completed(&record);
            self.bookings
                .append_history(&history)
                .await
                .map_err(BookingError::remote)?;
            Some(history.id)
        };

        self.documents
            .update(&identity.id, json!({ "booking": Value::Null }))
            .await
            .map_err(BookingError::remote)?;

        self.store.reset();
        info!("Booking {} completed for {}", booking_id, identity.id);

        if let Some(history_id) = history_id {
            let event = BookingLifecycleEvent::Completed(BookingCompletedEvent {
                booking_id: booking_id.clone(),
                user_id: identity.id.clone(),
                history_id,
                timestamp: Utc::now().timestamp(),
            });
            if let Err(e) = self.events.publish(&event).await {
                warn!("Failed to publish {} event: {}", event.topic(), e);
            }
        }

        Ok(format!("Booking {} completed", booking_id))
    }
}
