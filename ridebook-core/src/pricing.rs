use serde::{Deserialize, Serialize};

/// Trip cost estimate from the car's unit price and the route distance.
///
/// The linear `price * distance` model is a stand-in; both the distance unit
/// and an overall multiplier come from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FareEstimator {
    /// Length of one priced unit of distance, in meters
    pub distance_unit_meters: f64,

    /// Applied on top of `price * units`
    pub rate_multiplier: f64,
}

impl Default for FareEstimator {
    fn default() -> Self {
        Self {
            distance_unit_meters: 1000.0,
            rate_multiplier: 1.0,
        }
    }
}

impl FareEstimator {
    pub fn new(distance_unit_meters: f64, rate_multiplier: f64) -> Self {
        Self {
            distance_unit_meters,
            rate_multiplier,
        }
    }

    /// Rounded cost, or `None` when the inputs cannot produce a meaningful number.
    pub fn estimate(&self, car_price: f64, distance_meters: f64) -> Option<i64> {
        if self.distance_unit_meters <= 0.0 || distance_meters < 0.0 || car_price < 0.0 {
            return None;
        }
        let cost = car_price * (distance_meters / self.distance_unit_meters) * self.rate_multiplier;
        cost.is_finite().then(|| cost.round() as i64)
    }
}

/// Minutes-per-kilometer heuristics used when a provider gives no duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TravelTimeEstimator {
    pub walking_minutes_per_km: f64,
    pub driving_minutes_per_km: f64,
}

impl Default for TravelTimeEstimator {
    fn default() -> Self {
        Self {
            walking_minutes_per_km: 12.0,
            driving_minutes_per_km: 2.0,
        }
    }
}

impl TravelTimeEstimator {
    pub fn walking_seconds(&self, distance_meters: f64) -> f64 {
        (distance_meters / 1000.0) * self.walking_minutes_per_km * 60.0
    }

    pub fn driving_seconds(&self, distance_meters: f64) -> f64 {
        (distance_meters / 1000.0) * self.driving_minutes_per_km * 60.0
    }
}
