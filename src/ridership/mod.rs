use crate::stations::StationId;
use serde::Serialize;

pub mod import;

/// One imported row of the hourly ridership workbook for a single station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub station_id: StationId,
    pub year: String,
    pub month: String,
    pub time: Option<String>,
    pub entry_count: Option<u32>,
    pub exit_count: Option<u32>,
}

impl Sample {
    /// Entries plus exits, with absent counts treated as zero.
    pub fn total_riders(&self) -> f64 {
        f64::from(self.entry_count.unwrap_or(0)) + f64::from(self.exit_count.unwrap_or(0))
    }
}

/// Read-only view of the historical samples, grouped by station.
#[derive(Debug, Default)]
pub struct RidershipStore {
    samples: Vec<Sample>,
}

impl RidershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn extend(&mut self, samples: impl IntoIterator<Item = Sample>) {
        self.samples.extend(samples);
    }

    pub fn samples_for_station(&self, station_id: StationId) -> Vec<Sample> {
        self.filtered(|s| s.station_id == station_id)
    }

    pub fn samples_for_station_and_year(&self, station_id: StationId, year: &str) -> Vec<Sample> {
        self.filtered(|s| s.station_id == station_id && s.year == year)
    }

    pub fn samples_for_station_and_month(
        &self,
        station_id: StationId,
        month: &str,
    ) -> Vec<Sample> {
        self.filtered(|s| s.station_id == station_id && s.month == month)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn filtered(&self, predicate: impl Fn(&Sample) -> bool) -> Vec<Sample> {
        self.samples.iter().filter(|s| predicate(s)).cloned().collect()
    }
}
