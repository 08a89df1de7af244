use async_trait::async_trait;
use ridebook_core::routing::{Coordinates, StationCatalog};
use ridebook_core::{BoxError, StationId};

use crate::app_config::StationConfig;

/// Station catalog read from the `stations` configuration section.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredStations {
    stations: Vec<StationConfig>,
}

impl ConfiguredStations {
    pub fn new(stations: Vec<StationConfig>) -> Self {
        Self { stations }
    }

    pub fn all(&self) -> &[StationConfig] {
        &self.stations
    }

    pub fn find(&self, station_id: StationId) -> Option<&StationConfig> {
        self.stations.iter().find(|s| s.id == station_id)
    }
}

#[async_trait]
impl StationCatalog for ConfiguredStations {
    async fn coordinates(&self, station_id: StationId) -> Result<Option<Coordinates>, BoxError> {
        Ok(self.find(station_id).map(|s| Coordinates::new(s.lat, s.lng)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_by_id() {
        let catalog = ConfiguredStations::new(vec![StationConfig {
            id: 4,
            name: "Harbour".to_string(),
            lat: 43.29,
            lng: 5.36,
        }]);

        let found = catalog.coordinates(4).await.unwrap().unwrap();
        assert_eq!(found, Coordinates::new(43.29, 5.36));
        assert!(catalog.coordinates(5).await.unwrap().is_none());
        assert_eq!(catalog.find(4).map(|s| s.name.as_str()), Some("Harbour"));
    }
}
