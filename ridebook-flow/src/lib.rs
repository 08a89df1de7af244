pub mod cache_gate;
pub mod completion;
pub mod error;
pub mod finalizer;
pub mod identity;
pub mod reconciler;
pub mod route_planner;
pub mod session;
pub mod snapshot;
pub mod store;

pub use cache_gate::CacheGate;
pub use completion::BookingCompletion;
pub use error::BookingError;
pub use finalizer::BookingFinalizer;
pub use identity::SessionIdentity;
pub use reconciler::RemoteReconciler;
pub use route_planner::RoutePlanner;
pub use session::{BookingSession, SessionCollaborators};
pub use store::BookingStore;
