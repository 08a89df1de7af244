use ridebook_core::pricing::{FareEstimator, TravelTimeEstimator};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub booking: BookingConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub travel: TravelConfig,
    #[serde(default)]
    pub stations: Vec<StationConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Leaving a URL empty selects the in-process fallback for that backend.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    #[serde(default)]
    pub brokers: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    #[serde(default = "default_cache_prefix")]
    pub cache_key_prefix: String,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
    #[serde(default = "default_session_idle")]
    pub session_idle_seconds: u64,
}

fn default_cache_prefix() -> String {
    "booking".to_string()
}

fn default_rate_limit() -> i64 {
    120
}

fn default_session_idle() -> u64 {
    1800
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    pub distance_unit_meters: f64,
    pub rate_multiplier: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        let fares = FareEstimator::default();
        Self {
            distance_unit_meters: fares.distance_unit_meters,
            rate_multiplier: fares.rate_multiplier,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TravelConfig {
    pub walking_minutes_per_km: f64,
    pub driving_minutes_per_km: f64,
}

impl Default for TravelConfig {
    fn default() -> Self {
        let travel = TravelTimeEstimator::default();
        Self {
            walking_minutes_per_km: travel.walking_minutes_per_km,
            driving_minutes_per_km: travel.driving_minutes_per_km,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StationConfig {
    pub id: i64,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Developer overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `RIDEBOOK__SERVER__PORT=8080`
            .add_source(config::Environment::with_prefix("RIDEBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn fares(&self) -> FareEstimator {
        FareEstimator::new(self.pricing.distance_unit_meters, self.pricing.rate_multiplier)
    }

    pub fn travel(&self) -> TravelTimeEstimator {
        TravelTimeEstimator {
            walking_minutes_per_km: self.travel.walking_minutes_per_km,
            driving_minutes_per_km: self.travel.driving_minutes_per_km,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_engine_defaults() {
        let cfg: Config = serde_json::from_value(serde_json::json!({
            "server": {"port": 3000},
            "database": {},
            "redis": {},
            "kafka": {},
            "auth": {"jwt_secret": "s", "jwt_expiration_seconds": 60},
            "booking": {}
        }))
        .unwrap();

        assert_eq!(cfg.booking.cache_key_prefix, "booking");
        assert_eq!(cfg.booking.session_idle_seconds, 1800);
        assert_eq!(cfg.fares(), FareEstimator::default());
        assert_eq!(cfg.travel().driving_minutes_per_km, 2.0);
        assert!(cfg.stations.is_empty());
        assert!(cfg.database.url.is_empty());
    }
}
