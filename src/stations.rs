use serde::Serialize;
use tracing::info;

pub type StationId = u64;

/// Line stations in north-to-south order; column pairs in the ridership
/// workbook follow the same order.
pub const STATION_NAMES: [&str; 13] = [
    "North Ave",
    "Quezon Ave",
    "GMA Kamuning",
    "Cubao",
    "Santolan",
    "Ortigas",
    "Shaw Blvd",
    "Boni Ave",
    "Guadalupe",
    "Buendia",
    "Ayala Ave",
    "Magallanes",
    "Taft",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Station {
    pub id: StationId,
    pub name: String,
}

#[derive(Debug, Default)]
pub struct StationCatalog {
    stations: Vec<Station>,
}

impl StationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the catalog with [`STATION_NAMES`] unless it already holds stations.
    /// Returns the number of stations inserted.
    pub fn preload(&mut self) -> usize {
        if !self.stations.is_empty() {
            info!(
                count = self.stations.len(),
                "Stations already exist, skipping preload"
            );
            return 0;
        }

        for name in STATION_NAMES {
            self.insert(name);
        }
        info!(count = self.stations.len(), "Stations preloaded");
        self.stations.len()
    }

    /// Insert a station by name; an existing station with the same name is returned as is.
    pub fn insert(&mut self, name: &str) -> &Station {
        if let Some(index) = self.stations.iter().position(|s| s.name == name) {
            return &self.stations[index];
        }
        let id = self.stations.last().map_or(1, |s| s.id + 1);
        self.stations.push(Station {
            id,
            name: name.to_string(),
        });
        &self.stations[self.stations.len() - 1]
    }

    pub fn all(&self) -> &[Station] {
        &self.stations
    }

    pub fn get(&self, id: StationId) -> Option<&Station> {
        self.stations.iter().find(|s| s.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}
