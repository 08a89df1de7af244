use std::sync::Arc;

use ridebook_core::events::BookingEventSink;
use ridebook_core::payment::BookingApi;
use ridebook_core::pricing::FareEstimator;
use ridebook_core::repository::{BookingRepository, DocumentStore, LocalCache};
use ridebook_core::routing::{RouteProvider, StationCatalog};
use ridebook_core::step::{self, TransitionKind, FIRST_STEP};
use ridebook_core::{AuthProvider, Identity, Outcome};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::cache_gate::CacheGate;
use crate::completion::BookingCompletion;
use crate::finalizer::BookingFinalizer;
use crate::identity::SessionIdentity;
use crate::reconciler::RemoteReconciler;
use crate::route_planner::RoutePlanner;
use crate::store::BookingStore;

/// External services a session is wired to.
#[derive(Clone)]
pub struct SessionCollaborators {
    pub documents: Arc<dyn DocumentStore>,
    pub bookings: Arc<dyn BookingRepository>,
    pub cache: Arc<dyn LocalCache>,
    pub booking_api: Arc<dyn BookingApi>,
    pub stations: Arc<dyn StationCatalog>,
    pub routes: Arc<dyn RouteProvider>,
    pub events: Arc<dyn BookingEventSink>,
}

/// Everything one user's booking flow needs, built around a single store.
///
/// Remote operations on one session run one at a time, each starting after
/// the previous one resolved.
pub struct BookingSession {
    store: Arc<BookingStore>,
    identity: Arc<SessionIdentity>,
    gate: Arc<CacheGate>,
    reconciler: Arc<RemoteReconciler>,
    finalizer: BookingFinalizer,
    completion: BookingCompletion,
    planner: RoutePlanner,
    mirror: JoinHandle<()>,
    operations: Mutex<()>,
}

impl BookingSession {
    /// Build the session and start mirroring the store into the local cache.
    /// Must be called from within a Tokio runtime.
    pub fn start(collaborators: &SessionCollaborators, cache_key: impl Into<String>, fares: FareEstimator) -> Self {
        let store = Arc::new(BookingStore::new(fares));
        let identity = Arc::new(SessionIdentity::new());
        let auth: Arc<dyn AuthProvider> = identity.clone();

        let gate = Arc::new(CacheGate::new(collaborators.cache.clone(), cache_key));
        let mirror = gate.clone().spawn_mirror(&store);

        let reconciler = Arc::new(RemoteReconciler::new(
            store.clone(),
            auth.clone(),
            collaborators.documents.clone(),
        ));
        let finalizer = BookingFinalizer::new(
            store.clone(),
            auth.clone(),
            collaborators.bookings.clone(),
            collaborators.booking_api.clone(),
            reconciler.clone(),
            collaborators.events.clone(),
        );
        let completion = BookingCompletion::new(
            store.clone(),
            auth,
            collaborators.documents.clone(),
            collaborators.bookings.clone(),
            collaborators.events.clone(),
        );
        let planner = RoutePlanner::new(
            store.clone(),
            collaborators.stations.clone(),
            collaborators.routes.clone(),
        );

        Self {
            store,
            identity,
            gate,
            reconciler,
            finalizer,
            completion,
            planner,
            mirror,
            operations: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &BookingStore {
        &self.store
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn cache_key(&self) -> &str {
        self.gate.key()
    }

    /// Sign in and pull the user's remote draft.
    pub async fn sign_in(&self, identity: Identity) -> Outcome {
        let _op = self.operations.lock().await;
        self.identity.sign_in(identity);
        self.reconciler.load().await
    }

    pub fn sign_out(&self) {
        self.identity.sign_out();
    }

    /// App resume: restore a cached payment session, then reconcile with the
    /// remote store.
    pub async fn resume(&self) -> Outcome {
        let _op = self.operations.lock().await;
        if self.gate.restore_into(&self.store).await {
            info!("Restored cached payment session from {}", self.gate.key());
        }
        self.reconciler.load().await
    }

    /// Navigate to `target`. Reaching a durable step, or resetting to the
    /// first one, is followed by a remote save.
    pub async fn advance_step(&self, target: u8) -> Outcome {
        let _op = self.operations.lock().await;
        if !self.store.advance_step(target, TransitionKind::Navigation) {
            return Outcome::failed(format!(
                "Cannot move from step {} to step {}",
                self.store.step(),
                target
            ));
        }
        let step = self.store.step();
        if step == FIRST_STEP || step::is_durable(step) {
            return self.reconciler.save().await;
        }
        Outcome::ok(format!("Moved to step {}", step))
    }

    pub async fn save(&self) -> Outcome {
        let _op = self.operations.lock().await;
        self.reconciler.save().await
    }

    pub async fn load(&self) -> Outcome {
        let _op = self.operations.lock().await;
        self.reconciler.load().await
    }

    pub async fn plan_route(&self) -> Outcome {
        let _op = self.operations.lock().await;
        self.planner.plan().await
    }

    pub async fn finalize(&self) -> Outcome {
        let _op = self.operations.lock().await;
        self.finalizer.finalize().await
    }

    pub async fn complete(&self) -> Outcome {
        let _op = self.operations.lock().await;
        self.completion.complete().await
    }
}

impl Drop for BookingSession {
    fn drop(&mut self) {
        self.mirror.abort();
    }
}
