pub mod app_config;
pub mod database;
pub mod document_repo;
pub mod events;
pub mod redis_repo;
pub mod stations;

pub use database::DbClient;
pub use document_repo::{PgBookingRepository, PgDocumentStore};
pub use events::EventProducer;
pub use redis_repo::RedisClient;
pub use stations::ConfiguredStations;
