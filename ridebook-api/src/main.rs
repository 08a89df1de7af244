use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ridebook_api::{
    app,
    state::{AppState, AuthConfig, BookingSettings},
};
use ridebook_core::events::{BookingEventSink, NoopEventSink};
use ridebook_core::memory::{InMemoryBookingRepository, InMemoryDocumentStore, InMemoryLocalCache};
use ridebook_core::payment::DirectBookingApi;
use ridebook_core::repository::{BookingRepository, DocumentStore, LocalCache};
use ridebook_core::routing::StraightLineRouteProvider;
use ridebook_flow::SessionCollaborators;
use ridebook_store::{
    app_config::Config, ConfiguredStations, DbClient, EventProducer, PgBookingRepository, PgDocumentStore,
    RedisClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ridebook_api=debug,ridebook_flow=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Ridebook API on port {}", config.server.port);

    let (documents, bookings): (Arc<dyn DocumentStore>, Arc<dyn BookingRepository>) = if config.database.url.is_empty() {
        tracing::warn!("No database configured, user documents and bookings are kept in memory");
        let documents: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let bookings: Arc<dyn BookingRepository> = Arc::new(InMemoryBookingRepository::new());
        (documents, bookings)
    } else {
        let db = DbClient::new(&config.database.url)
            .await
            .context("Failed to connect to Postgres")?;
        db.migrate().await.context("Failed to run migrations")?;
        let documents: Arc<dyn DocumentStore> = Arc::new(PgDocumentStore::new(db.pool.clone()));
        let bookings: Arc<dyn BookingRepository> = Arc::new(PgBookingRepository::new(db.pool));
        (documents, bookings)
    };

    let redis = if config.redis.url.is_empty() {
        None
    } else {
        let client = RedisClient::new(&config.redis.url)
            .await
            .context("Failed to connect to Redis")?;
        Some(Arc::new(client))
    };
    let cache: Arc<dyn LocalCache> = match &redis {
        Some(client) => client.clone() as Arc<dyn LocalCache>,
        None => {
            tracing::warn!("No Redis configured, drafts are cached in memory");
            Arc::new(InMemoryLocalCache::new())
        }
    };

    let events: Arc<dyn BookingEventSink> = if config.kafka.brokers.is_empty() {
        tracing::warn!("No Kafka brokers configured, lifecycle events are dropped");
        Arc::new(NoopEventSink) as Arc<dyn BookingEventSink>
    } else {
        let producer = EventProducer::new(&config.kafka.brokers).context("Failed to create Kafka producer")?;
        Arc::new(producer) as Arc<dyn BookingEventSink>
    };

    let stations = Arc::new(ConfiguredStations::new(config.stations.clone()));
    let collaborators = SessionCollaborators {
        documents,
        bookings: bookings.clone(),
        cache,
        booking_api: Arc::new(DirectBookingApi::new(bookings)),
        stations: stations.clone(),
        routes: Arc::new(StraightLineRouteProvider::new(config.travel())),
        events,
    };

    let state = AppState::new(
        collaborators,
        stations,
        redis,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        BookingSettings {
            cache_key_prefix: config.booking.cache_key_prefix.clone(),
            rate_limit_per_minute: config.booking.rate_limit_per_minute,
            fares: config.fares(),
            session_idle_timeout: Duration::from_secs(config.booking.session_idle_seconds),
        },
    );
    state.sessions.clone().spawn_sweeper();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state).into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
