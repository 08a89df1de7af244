use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::record::{BookingRecord, BookingRequest};
use crate::repository::BookingRepository;
use crate::BoxError;

/// Payment/finalize API: turns a paid draft into a booking and returns its id.
#[async_trait]
pub trait BookingApi: Send + Sync {
    async fn create_booking(&self, request: &BookingRequest) -> Result<String, BoxError>;
}

/// Creates bookings directly in the booking repository, without a hosted
/// payment backend in front of it.
pub struct DirectBookingApi {
    repository: Arc<dyn BookingRepository>,
}

impl DirectBookingApi {
    pub fn new(repository: Arc<dyn BookingRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl BookingApi for DirectBookingApi {
    async fn create_booking(&self, request: &BookingRequest) -> Result<String, BoxError> {
        let record = BookingRecord::from_request(request);
        self.repository.save_booking(&record).await?;
        info!("Booking {} created for user {}", record.id, record.user_id);
        Ok(record.id)
    }
}
