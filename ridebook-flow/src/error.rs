use ridebook_core::BoxError;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("No signed-in user")]
    NotSignedIn,

    #[error("Missing booking details: {0}")]
    MissingFields(String),

    #[error("No finalized booking on the current draft")]
    NoBooking,

    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    #[error("Step transition rejected: {from} -> {to}")]
    TransitionRejected { from: u8, to: u8 },

    #[error("Remote store error: {0}")]
    Remote(String),

    #[error("Local cache error: {0}")]
    Cache(String),

    #[error("Route provider error: {0}")]
    Route(String),
}

impl BookingError {
    pub fn remote(err: BoxError) -> Self {
        BookingError::Remote(err.to_string())
    }

    pub fn cache(err: BoxError) -> Self {
        BookingError::Cache(err.to_string())
    }

    pub fn route(err: BoxError) -> Self {
        BookingError::Route(err.to_string())
    }
}
