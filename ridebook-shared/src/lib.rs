pub mod models;
pub mod pii;

pub use models::events::{BookingCompletedEvent, BookingFinalizedEvent, BookingLifecycleEvent};
pub use pii::Masked;
