use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ridebook_core::pricing::FareEstimator;
use ridebook_core::Identity;
use ridebook_flow::{BookingSession, SessionCollaborators};
use ridebook_store::{ConfiguredStations, RedisClient};
use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct BookingSettings {
    pub cache_key_prefix: String,
    pub rate_limit_per_minute: i64,
    pub fares: FareEstimator,
    /// Sessions untouched for this long are dropped by the sweeper.
    pub session_idle_timeout: Duration,
}

struct SessionSlot {
    session: Arc<OnceCell<Arc<BookingSession>>>,
    last_seen: Instant,
}

/// One live booking session per signed-in user.
///
/// The map lock only covers slot lookup; opening a session (cache read plus
/// remote load) runs outside it, once per user.
pub struct SessionRegistry {
    collaborators: SessionCollaborators,
    settings: BookingSettings,
    sessions: Mutex<HashMap<String, SessionSlot>>,
}

impl SessionRegistry {
    pub fn new(collaborators: SessionCollaborators, settings: BookingSettings) -> Self {
        Self {
            collaborators,
            settings,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Existing session for the user, or a new one resumed from the local
    /// cache and the remote document.
    pub async fn session_for(&self, identity: Identity) -> Arc<BookingSession> {
        let cell = {
            let mut sessions = self.sessions.lock().await;
            let slot = sessions.entry(identity.id.clone()).or_insert_with(|| SessionSlot {
                session: Arc::new(OnceCell::new()),
                last_seen: Instant::now(),
            });
            slot.last_seen = Instant::now();
            slot.session.clone()
        };

        cell.get_or_init(|| self.open(identity)).await.clone()
    }

    async fn open(&self, identity: Identity) -> Arc<BookingSession> {
        let user_id = identity.id.clone();
        let key = format!("{}:{}", self.settings.cache_key_prefix, user_id);
        let session = Arc::new(BookingSession::start(&self.collaborators, key, self.settings.fares));
        session.identity().sign_in(identity);

        let outcome = session.resume().await;
        if outcome.success {
            info!("Session for {} resumed: {}", user_id, outcome.message);
        } else {
            warn!("Session for {} started without remote state: {}", user_id, outcome.message);
        }
        session
    }

    pub async fn end(&self, user_id: &str) -> bool {
        let Some(slot) = self.sessions.lock().await.remove(user_id) else {
            return false;
        };
        if let Some(session) = slot.session.get() {
            session.sign_out();
        }
        true
    }

    /// Drop every session idle for longer than the configured timeout. The
    /// session stops mirroring once the last in-flight request releases it.
    pub async fn evict_idle(&self) -> usize {
        let timeout = self.settings.session_idle_timeout;
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|user_id, slot| {
            if slot.last_seen.elapsed() < timeout {
                return true;
            }
            if let Some(session) = slot.session.get() {
                session.sign_out();
            }
            info!("Booking session for {} evicted after {:?} idle", user_id, timeout);
            false
        });
        before - sessions.len()
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Periodically evict idle sessions.
    pub fn spawn_sweeper(self: Arc<Self>) -> JoinHandle<()> {
        let period = (self.settings.session_idle_timeout / 2).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let evicted = self.evict_idle().await;
                if evicted > 0 {
                    info!("Evicted {} idle sessions, {} active", evicted, self.active_sessions().await);
                }
            }
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    pub collaborators: SessionCollaborators,
    pub stations: Arc<ConfiguredStations>,
    /// Rate limiting is skipped when no Redis is configured.
    pub redis: Option<Arc<RedisClient>>,
    pub auth: AuthConfig,
    pub booking: BookingSettings,
}

impl AppState {
    pub fn new(
        collaborators: SessionCollaborators,
        stations: Arc<ConfiguredStations>,
        redis: Option<Arc<RedisClient>>,
        auth: AuthConfig,
        booking: BookingSettings,
    ) -> Self {
        let sessions = Arc::new(SessionRegistry::new(collaborators.clone(), booking.clone()));
        Self {
            sessions,
            collaborators,
            stations,
            redis,
            auth,
            booking,
        }
    }
}
