//! In-process collaborators.
//!
//! Used by tests across the workspace and by the API when it runs without
//! Postgres or Redis. Each store can be switched to "unavailable" to simulate
//! a collaborator outage.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use ridebook_shared::BookingLifecycleEvent;

use crate::draft::StationId;
use crate::events::BookingEventSink;
use crate::record::{BookingHistoryRecord, BookingRecord};
use crate::repository::{BookingRepository, DocumentStore, LocalCache};
use crate::routing::{Coordinates, StationCatalog};
use crate::{BoxError, CoreError};

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, CoreError> {
    mutex
        .lock()
        .map_err(|_| CoreError::InternalError(format!("{} lock poisoned", name)))
}

fn check_available(flag: &AtomicBool, name: &str) -> Result<(), CoreError> {
    if flag.load(Ordering::SeqCst) {
        return Err(CoreError::Unavailable(name.to_string()));
    }
    Ok(())
}

#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: Mutex<HashMap<String, Value>>,
    unavailable: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Current document of a user, bypassing the availability switch.
    pub fn document(&self, user_id: &str) -> Option<Value> {
        self.documents.lock().ok()?.get(user_id).cloned()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, user_id: &str) -> Result<Option<Value>, BoxError> {
        check_available(&self.unavailable, "document store")?;
        Ok(lock(&self.documents, "document store")?.get(user_id).cloned())
    }

    async fn set(&self, user_id: &str, document: Value) -> Result<(), BoxError> {
        check_available(&self.unavailable, "document store")?;
        lock(&self.documents, "document store")?.insert(user_id.to_string(), document);
        Ok(())
    }

    async fn update(&self, user_id: &str, partial: Value) -> Result<(), BoxError> {
        check_available(&self.unavailable, "document store")?;
        let Value::Object(fields) = partial else {
            return Err(CoreError::ValidationError("partial update must be an object".into()).into());
        };

        let mut documents = lock(&self.documents, "document store")?;
        let document = documents
            .entry(user_id.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        if !document.is_object() {
            *document = Value::Object(Default::default());
        }
        if let Value::Object(existing) = document {
            existing.extend(fields);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryBookingRepository {
    bookings: Mutex<HashMap<String, BookingRecord>>,
    history: Mutex<Vec<BookingHistoryRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.lock().map(|b| b.len()).unwrap_or(0)
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn get_booking(&self, booking_id: &str) -> Result<Option<BookingRecord>, BoxError> {
        check_available(&self.unavailable, "booking repository")?;
        Ok(lock(&self.bookings, "booking repository")?.get(booking_id).cloned())
    }

    async fn save_booking(&self, record: &BookingRecord) -> Result<(), BoxError> {
        check_available(&self.unavailable, "booking repository")?;
        lock(&self.bookings, "booking repository")?.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn append_history(&self, record: &BookingHistoryRecord) -> Result<(), BoxError> {
        check_available(&self.unavailable, "booking repository")?;
        lock(&self.history, "booking history")?.push(record.clone());
        Ok(())
    }

    async fn list_history(&self, user_id: &str) -> Result<Vec<BookingHistoryRecord>, BoxError> {
        check_available(&self.unavailable, "booking repository")?;
        Ok(lock(&self.history, "booking history")?
            .iter()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryLocalCache {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryLocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }
}

#[async_trait]
impl LocalCache for InMemoryLocalCache {
    async fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
        Ok(lock(&self.entries, "local cache")?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BoxError> {
        lock(&self.entries, "local cache")?.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryStationCatalog {
    stations: HashMap<StationId, Coordinates>,
}

impl InMemoryStationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_station(mut self, station_id: StationId, coordinates: Coordinates) -> Self {
        self.stations.insert(station_id, coordinates);
        self
    }
}

#[async_trait]
impl StationCatalog for InMemoryStationCatalog {
    async fn coordinates(&self, station_id: StationId) -> Result<Option<Coordinates>, BoxError> {
        Ok(self.stations.get(&station_id).copied())
    }
}

/// Keeps every published event for later inspection.
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<BookingLifecycleEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BookingLifecycleEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl BookingEventSink for RecordingEventSink {
    async fn publish(&self, event: &BookingLifecycleEvent) -> Result<(), BoxError> {
        lock(&self.events, "event sink")?.push(event.clone());
        Ok(())
    }
}
