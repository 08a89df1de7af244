use std::sync::Arc;

use chrono::Utc;
use ridebook_core::events::BookingEventSink;
use ridebook_core::payment::BookingApi;
use ridebook_core::repository::BookingRepository;
use ridebook_core::{AuthProvider, BookingRequest, Outcome};
use ridebook_shared::{BookingFinalizedEvent, BookingLifecycleEvent};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::BookingError;
use crate::reconciler::RemoteReconciler;
use crate::store::BookingStore;

/// Turns the current draft into a durable booking record.
pub struct BookingFinalizer {
    store: Arc<BookingStore>,
    auth: Arc<dyn AuthProvider>,
    bookings: Arc<dyn BookingRepository>,
    api: Arc<dyn BookingApi>,
    reconciler: Arc<RemoteReconciler>,
    events: Arc<dyn BookingEventSink>,
    in_flight: Mutex<()>,
}

impl BookingFinalizer {
    pub fn new(
        store: Arc<BookingStore>,
        auth: Arc<dyn AuthProvider>,
        bookings: Arc<dyn BookingRepository>,
        api: Arc<dyn BookingApi>,
        reconciler: Arc<RemoteReconciler>,
        events: Arc<dyn BookingEventSink>,
    ) -> Self {
        Self {
            store,
            auth,
            bookings,
            api,
            reconciler,
            events,
            in_flight: Mutex::new(()),
        }
    }

    /// Idempotent: a draft whose `booking_id` already resolves to a stored
    /// record is reported as finalized without creating another one.
    /// Overlapping calls run one at a time, so a retry issued while the first
    /// call is in flight sees its `booking_id`.
    pub async fn finalize(&self) -> Outcome {
        let _in_flight = self.in_flight.lock().await;
        match self.try_finalize().await {
            Ok(message) => Outcome::ok(message),
            Err(e) => {
                warn!("Finalizing booking failed: {}", e);
                Outcome::failed(e.to_string())
            }
        }
    }

    async fn try_finalize(&self) -> Result<String, BookingError> {
        let draft = self.store.state();
        let missing = draft.missing_for_finalize();
        if !missing.is_empty() {
            return Err(BookingError::MissingFields(missing.join(", ")));
        }

        let identity = self.auth.current_identity().ok_or(BookingError::NotSignedIn)?;

        if let Some(existing) = draft.booking_id.as_deref() {
            let stored = self
                .bookings
                .get_booking(existing)
                .await
                .map_err(BookingError::remote)?;
            if stored.is_some() {
                return Ok(format!("Booking {} already finalized", existing));
            }
            info!("Booking id {} on the draft has no record, creating a new one", existing);
        }

        let request = BookingRequest::from_draft(&identity.id, &draft)
            .ok_or_else(|| BookingError::MissingFields("trip details".to_string()))?;
        let booking_id = self
            .api
            .create_booking(&request)
            .await
            .map_err(BookingError::remote)?;

        self.store.set_booking_id(Some(booking_id.clone()));
        info!("Draft of {} finalized as booking {}", identity.id, booking_id);

        let saved = self.reconciler.save().await;
        if !saved.success {
            warn!("Booking {} created but draft not saved: {}", booking_id, saved.message);
        }

        let event = BookingLifecycleEvent::Finalized(BookingFinalizedEvent {
            booking_id: booking_id.clone(),
            user_id: identity.id.clone(),
            departure_station_id: request.departure_station_id,
            arrival_station_id: request.arrival_station_id,
            selected_car_id: Some(request.selected_car.id.clone()),
            estimated_cost: request.estimated_cost,
            timestamp: Utc::now().timestamp(),
        });
        if let Err(e) = self.events.publish(&event).await {
            warn!("Failed to publish {} event: {}", event.topic(), e);
        }

        Ok(format!("Booking {} created", booking_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ridebook_core::identity::FixedIdentity;
    use ridebook_core::memory::{InMemoryBookingRepository, InMemoryDocumentStore, RecordingEventSink};
    use ridebook_core::payment::DirectBookingApi;
    use ridebook_core::step::TransitionKind;
    use ridebook_core::{BoxError, CarSummary, RouteInfo};
    use std::time::Duration;

    /// Booking API that takes a while to answer.
    struct SlowBookingApi {
        inner: DirectBookingApi,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl BookingApi for SlowBookingApi {
        async fn create_booking(&self, request: &BookingRequest) -> Result<String, BoxError> {
            tokio::time::sleep(self.delay).await;
            self.inner.create_booking(request).await
        }
    }

    struct Fixture {
        store: Arc<BookingStore>,
        bookings: Arc<InMemoryBookingRepository>,
        documents: Arc<InMemoryDocumentStore>,
        events: Arc<RecordingEventSink>,
        finalizer: BookingFinalizer,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(BookingStore::default());
        let auth: Arc<dyn AuthProvider> = Arc::new(FixedIdentity::signed_in("user-1"));
        let bookings = Arc::new(InMemoryBookingRepository::new());
        let documents = Arc::new(InMemoryDocumentStore::new());
        let events = Arc::new(RecordingEventSink::new());
        let reconciler = Arc::new(RemoteReconciler::new(store.clone(), auth.clone(), documents.clone()));
        let finalizer = BookingFinalizer::new(
            store.clone(),
            auth,
            bookings.clone(),
            Arc::new(DirectBookingApi::new(bookings.clone())),
            reconciler,
            events.clone(),
        );
        Fixture {
            store,
            bookings,
            documents,
            events,
            finalizer,
        }
    }

    fn ready_to_pay(store: &BookingStore) {
        assert!(store.select_departure(10));
        store.set_departure_schedule(Some(Utc::now()), Some(Utc::now()));
        store.set_date_time_confirmed(true);
        assert!(store.advance_step(3, TransitionKind::Navigation));
        assert!(store.select_arrival(20));
        assert!(store.set_route(RouteInfo {
            distance: 8_000.0,
            duration: 900.0,
            polyline: "abc".to_string(),
        }));
        store.select_car(CarSummary {
            id: "car-2".to_string(),
            name: "Estate".to_string(),
            price: 1.5,
            seats: None,
            image_url: None,
        });
        assert!(store.advance_step(5, TransitionKind::Navigation));
    }

    #[tokio::test]
    async fn test_finalize_reports_missing_fields() {
        let f = fixture();
        assert!(f.store.select_departure(10));

        let outcome = f.finalizer.finalize().await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("arrival station"));
        assert!(outcome.message.contains("car"));
        assert_eq!(f.bookings.booking_count(), 0);
    }

    #[tokio::test]
    async fn test_finalize_creates_record_and_saves_draft() {
        let f = fixture();
        ready_to_pay(&f.store);

        let outcome = f.finalizer.finalize().await;
        assert!(outcome.success, "{}", outcome.message);

        let booking_id = f.store.state().booking_id.unwrap();
        let record = f.bookings.get_booking(&booking_id).await.unwrap().unwrap();
        assert_eq!(record.user_id, "user-1");
        assert_eq!(record.estimated_cost, Some(12));

        let remote = f.documents.document("user-1").unwrap();
        assert_eq!(remote["booking"]["bookingId"], booking_id.as_str());
        assert_eq!(f.events.events().len(), 1);
    }

    #[tokio::test]
    async fn test_finalize_twice_keeps_one_record() {
        let f = fixture();
        ready_to_pay(&f.store);

        assert!(f.finalizer.finalize().await.success);
        let first = f.store.state().booking_id;
        let again = f.finalizer.finalize().await;
        assert!(again.success);
        assert!(again.message.contains("already finalized"));

        assert_eq!(f.store.state().booking_id, first);
        assert_eq!(f.bookings.booking_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_booking_id_is_replaced() {
        let f = fixture();
        ready_to_pay(&f.store);
        f.store.set_booking_id(Some("ghost".to_string()));

        assert!(f.finalizer.finalize().await.success);
        let booking_id = f.store.state().booking_id.unwrap();
        assert_ne!(booking_id, "ghost");
        assert_eq!(f.bookings.booking_count(), 1);
    }

    #[tokio::test]
    async fn test_repository_outage_is_reported() {
        let f = fixture();
        ready_to_pay(&f.store);
        f.bookings.set_unavailable(true);

        let outcome = f.finalizer.finalize().await;
        assert!(!outcome.success);
        assert!(f.store.state().booking_id.is_none());
    }

    #[tokio::test]
    async fn test_overlapping_finalize_creates_one_record() {
        let store = Arc::new(BookingStore::default());
        let auth: Arc<dyn AuthProvider> = Arc::new(FixedIdentity::signed_in("user-1"));
        let bookings = Arc::new(InMemoryBookingRepository::new());
        let documents = Arc::new(InMemoryDocumentStore::new());
        let reconciler = Arc::new(RemoteReconciler::new(store.clone(), auth.clone(), documents));
        let finalizer = BookingFinalizer::new(
            store.clone(),
            auth,
            bookings.clone(),
            Arc::new(SlowBookingApi {
                inner: DirectBookingApi::new(bookings.clone()),
                delay: Duration::from_millis(50),
            }),
            reconciler,
            Arc::new(RecordingEventSink::new()),
        );
        ready_to_pay(&store);

        let (first, second) = tokio::join!(finalizer.finalize(), finalizer.finalize());
        assert!(first.success, "{}", first.message);
        assert!(second.success, "{}", second.message);
        assert!(second.message.contains("already finalized"));
        assert_eq!(bookings.booking_count(), 1);
    }
}
