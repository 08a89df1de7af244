use serde::{Deserialize, Serialize};

/// Published once a draft has been turned into a durable booking record.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BookingFinalizedEvent {
    pub booking_id: String,
    pub user_id: String,
    pub departure_station_id: i64,
    pub arrival_station_id: i64,
    pub selected_car_id: Option<String>,
    pub estimated_cost: Option<i64>,
    pub timestamp: i64,
}

/// Published when a finalized booking has been archived into history.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BookingCompletedEvent {
    pub booking_id: String,
    pub user_id: String,
    pub history_id: String,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingLifecycleEvent {
    Finalized(BookingFinalizedEvent),
    Completed(BookingCompletedEvent),
}

impl BookingLifecycleEvent {
    /// Topic the event is routed to on the event bus.
    pub fn topic(&self) -> &'static str {
        match self {
            BookingLifecycleEvent::Finalized(_) => "booking.finalized",
            BookingLifecycleEvent::Completed(_) => "booking.completed",
        }
    }

    /// Partition key; all events of one booking land on the same partition.
    pub fn key(&self) -> &str {
        match self {
            BookingLifecycleEvent::Finalized(e) => &e.booking_id,
            BookingLifecycleEvent::Completed(e) => &e.booking_id,
        }
    }
}
