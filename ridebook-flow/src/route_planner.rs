use std::sync::Arc;

use ridebook_core::routing::{RouteProvider, StationCatalog};
use ridebook_core::{Outcome, RouteInfo, StationId};
use tracing::debug;

use crate::error::BookingError;
use crate::store::BookingStore;

/// Fetches the route between the selected stations and feeds it to the store.
pub struct RoutePlanner {
    store: Arc<BookingStore>,
    stations: Arc<dyn StationCatalog>,
    provider: Arc<dyn RouteProvider>,
}

impl RoutePlanner {
    pub fn new(
        store: Arc<BookingStore>,
        stations: Arc<dyn StationCatalog>,
        provider: Arc<dyn RouteProvider>,
    ) -> Self {
        Self {
            store,
            stations,
            provider,
        }
    }

    pub async fn plan(&self) -> Outcome {
        let draft = self.store.state();
        let (Some(from), Some(to)) = (draft.departure_station_id, draft.arrival_station_id) else {
            return Outcome::failed("Both stations must be selected before routing");
        };
        if !self.store.begin_route_fetch() {
            return Outcome::failed("Both stations must be selected before routing");
        }

        let result = self.fetch(from, to).await;

        // The user may have picked other stations while the fetch was running.
        let current = self.store.state();
        if current.departure_station_id != Some(from) || current.arrival_station_id != Some(to) {
            debug!("Discarding route {} -> {}: stations changed", from, to);
            return Outcome::failed("Stations changed while the route was loading");
        }

        match result {
            Ok(route) => {
                let message = format!("Route found: {:.0} m, {:.0} s", route.distance, route.duration);
                if self.store.set_route(route) {
                    Outcome::ok(message)
                } else {
                    Outcome::failed("Route no longer applies to the current stations")
                }
            }
            Err(e) => {
                self.store.fail_route(e.to_string());
                Outcome::failed(e.to_string())
            }
        }
    }

    async fn fetch(&self, from: StationId, to: StationId) -> Result<RouteInfo, BookingError> {
        let origin = self.locate(from).await?;
        let destination = self.locate(to).await?;
        self.provider
            .route(origin, destination)
            .await
            .map_err(BookingError::route)
    }

    async fn locate(&self, station_id: StationId) -> Result<ridebook_core::routing::Coordinates, BookingError> {
        self.stations
            .coordinates(station_id)
            .await
            .map_err(BookingError::route)?
            .ok_or_else(|| BookingError::Route(format!("unknown station {}", station_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ridebook_core::memory::InMemoryStationCatalog;
    use ridebook_core::pricing::TravelTimeEstimator;
    use ridebook_core::routing::{Coordinates, StraightLineRouteProvider};
    use ridebook_core::step::TransitionKind;
    use ridebook_core::{BoxError, RouteStatus};

    fn catalog() -> Arc<InMemoryStationCatalog> {
        Arc::new(
            InMemoryStationCatalog::new()
                .with_station(10, Coordinates::new(51.5007, -0.1246))
                .with_station(20, Coordinates::new(51.5081, -0.0759)),
        )
    }

    fn store_with_stations(arrival: StationId) -> Arc<BookingStore> {
        let store = Arc::new(BookingStore::default());
        assert!(store.select_departure(10));
        assert!(store.advance_step(3, TransitionKind::Navigation));
        assert!(store.select_arrival(arrival));
        store
    }

    struct FailingProvider;

    #[async_trait]
    impl RouteProvider for FailingProvider {
        async fn route(&self, _from: Coordinates, _to: Coordinates) -> Result<RouteInfo, BoxError> {
            Err("ZERO_RESULTS".into())
        }
    }

    #[tokio::test]
    async fn test_plan_sets_route() {
        let store = store_with_stations(20);
        let planner = RoutePlanner::new(
            store.clone(),
            catalog(),
            Arc::new(StraightLineRouteProvider::new(TravelTimeEstimator::default())),
        );

        let outcome = planner.plan().await;
        assert!(outcome.success, "{}", outcome.message);
        let draft = store.state();
        assert_eq!(draft.route_status, RouteStatus::Succeeded);
        let distance = draft.route.unwrap().distance;
        assert!(distance > 3_000.0 && distance < 4_000.0, "distance {}", distance);
    }

    #[tokio::test]
    async fn test_provider_error_marks_route_failed() {
        let store = store_with_stations(20);
        let planner = RoutePlanner::new(store.clone(), catalog(), Arc::new(FailingProvider));

        let outcome = planner.plan().await;
        assert!(!outcome.success);
        let draft = store.state();
        assert!(draft.route.is_none());
        assert_eq!(draft.route_status, RouteStatus::Failed);
        assert!(draft.route_error.unwrap().contains("ZERO_RESULTS"));
    }

    #[tokio::test]
    async fn test_unknown_station_fails() {
        let store = store_with_stations(99);
        let planner = RoutePlanner::new(
            store.clone(),
            catalog(),
            Arc::new(StraightLineRouteProvider::new(TravelTimeEstimator::default())),
        );

        let outcome = planner.plan().await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("unknown station 99"));
    }

    #[tokio::test]
    async fn test_plan_requires_both_stations() {
        let store = Arc::new(BookingStore::default());
        let planner = RoutePlanner::new(store.clone(), catalog(), Arc::new(FailingProvider));
        assert!(!planner.plan().await.success);
        assert_eq!(store.state().route_status, RouteStatus::Idle);
    }
}
