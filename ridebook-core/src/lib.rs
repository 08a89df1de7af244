pub mod draft;
pub mod events;
pub mod identity;
pub mod memory;
pub mod payment;
pub mod pricing;
pub mod record;
pub mod repository;
pub mod routing;
pub mod step;

use serde::{Deserialize, Serialize};

pub use draft::{BookingDraft, CarSummary, PaymentStatus, RouteInfo, RouteStatus, StationId, TicketPlan};
pub use identity::{AuthProvider, Identity};
pub use record::{BookingHistoryRecord, BookingRecord, BookingRequest, BookingStatus};
pub use step::{StepDecision, StepName, TransitionKind};

/// Error type every collaborator trait returns.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Structured result of an operation that talks to an external collaborator.
///
/// These operations never return `Err` to the caller: the UI inspects `success`
/// and shows `message` when it is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
