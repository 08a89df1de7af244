use async_trait::async_trait;
use ridebook_shared::BookingLifecycleEvent;

use crate::BoxError;

/// Destination for booking lifecycle notifications.
#[async_trait]
pub trait BookingEventSink: Send + Sync {
    async fn publish(&self, event: &BookingLifecycleEvent) -> Result<(), BoxError>;
}

/// Drops every event. Used when no event bus is configured.
pub struct NoopEventSink;

#[async_trait]
impl BookingEventSink for NoopEventSink {
    async fn publish(&self, event: &BookingLifecycleEvent) -> Result<(), BoxError> {
        tracing::debug!("No event bus configured, dropping {} event", event.topic());
        Ok(())
    }
}
