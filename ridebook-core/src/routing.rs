use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::draft::{RouteInfo, StationId};
use crate::pricing::TravelTimeEstimator;
use crate::BoxError;

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance in meters.
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
    }
}

/// Mapping/directions provider.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn route(&self, from: Coordinates, to: Coordinates) -> Result<RouteInfo, BoxError>;
}

/// Resolves a station id to its location.
#[async_trait]
pub trait StationCatalog: Send + Sync {
    async fn coordinates(&self, station_id: StationId) -> Result<Option<Coordinates>, BoxError>;
}

/// Route provider that draws a straight line between the endpoints and derives
/// the duration from the configured driving pace.
pub struct StraightLineRouteProvider {
    travel: TravelTimeEstimator,
}

impl StraightLineRouteProvider {
    pub fn new(travel: TravelTimeEstimator) -> Self {
        Self { travel }
    }
}

#[async_trait]
impl RouteProvider for StraightLineRouteProvider {
    async fn route(&self, from: Coordinates, to: Coordinates) -> Result<RouteInfo, BoxError> {
        let distance = from.distance_to(&to);
        Ok(RouteInfo {
            distance,
            duration: self.travel.driving_seconds(distance),
            polyline: encode_polyline(&[from, to]),
        })
    }
}

/// Encode a path with the polyline algorithm (precision 1e5).
pub fn encode_polyline(points: &[Coordinates]) -> String {
    let mut out = String::new();
    let (mut prev_lat, mut prev_lng) = (0i64, 0i64);

    for point in points {
        let lat = (point.lat * 1e5).round() as i64;
        let lng = (point.lng * 1e5).round() as i64;
        encode_value(lat - prev_lat, &mut out);
        encode_value(lng - prev_lng, &mut out);
        prev_lat = lat;
        prev_lng = lng;
    }

    out
}

fn encode_value(value: i64, out: &mut String) {
    let mut v = value << 1;
    if value < 0 {
        v = !v;
    }
    while v >= 0x20 {
        out.push(char::from((((v & 0x1f) | 0x20) + 63) as u8));
        v >>= 5;
    }
    out.push(char::from((v + 63) as u8));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_polyline_reference_path() {
        let path = [
            Coordinates::new(38.5, -120.2),
            Coordinates::new(40.7, -120.95),
            Coordinates::new(43.252, -126.453),
        ];
        assert_eq!(encode_polyline(&path), "_p~iF~ps|U_ulLnnqC_mqNvxq`@");
    }

    #[test]
    fn test_one_degree_of_longitude_at_equator() {
        let d = Coordinates::new(0.0, 0.0).distance_to(&Coordinates::new(0.0, 1.0));
        assert!((d - 111_194.9).abs() < 1.0, "distance was {}", d);
    }

    #[tokio::test]
    async fn test_straight_line_route() {
        let provider = StraightLineRouteProvider::new(TravelTimeEstimator::default());
        let route = provider
            .route(Coordinates::new(0.0, 0.0), Coordinates::new(0.0, 1.0))
            .await
            .unwrap();

        assert!(route.distance > 111_000.0);
        assert!((route.duration - route.distance / 1000.0 * 120.0).abs() < 1e-6);
        assert!(!route.polyline.is_empty());
    }
}
