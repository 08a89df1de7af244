use async_trait::async_trait;
use serde_json::Value;

use crate::record::{BookingHistoryRecord, BookingRecord};
use crate::BoxError;

/// Per-user document store. The booking flow only touches the `booking` field
/// of each document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<Value>, BoxError>;

    /// Replace the whole document.
    async fn set(&self, user_id: &str, document: Value) -> Result<(), BoxError>;

    /// Merge the top-level fields of `partial` into the document, creating it
    /// if it does not exist.
    async fn update(&self, user_id: &str, partial: Value) -> Result<(), BoxError>;
}

/// The `bookings` collection living next to the user documents.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn get_booking(&self, booking_id: &str) -> Result<Option<BookingRecord>, BoxError>;

    /// Insert or replace a booking record.
    async fn save_booking(&self, record: &BookingRecord) -> Result<(), BoxError>;

    async fn append_history(&self, record: &BookingHistoryRecord) -> Result<(), BoxError>;

    async fn list_history(&self, user_id: &str) -> Result<Vec<BookingHistoryRecord>, BoxError>;
}

/// Local key-value cache. Entries may be stale or missing at any time.
#[async_trait]
pub trait LocalCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, BoxError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), BoxError>;
}
