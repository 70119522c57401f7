//! Short-term congestion forecast for a single station.
//!
//! The forecaster works on the station's historical hourly samples: it
//! averages them per time slot, smooths the series, extrapolates the recent
//! slope to the requested lookahead and maps the projection onto a congestion
//! band. Stations without enough history get an `Unknown` result instead of
//! an error.

use crate::config::ForecastSettings;
use crate::error::AppError;
use crate::ridership::Sample;
use crate::state::AppState;
use crate::stations::StationId;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, RwLock};
use time::{Duration, OffsetDateTime, UtcOffset};
use tracing::{info, warn};

pub mod jitter;
pub mod series;
pub mod time_slot;

use jitter::Jitter;
use series::{hourly_averages, min_max, smooth, trailing_triple};

pub const SMOOTHING_WINDOW: usize = 3;
pub const MIN_TIME_SLOTS: usize = 3;
/// Lower bound for a station's ridership range, so flat histories do not blow up normalization.
pub const MIN_LOCAL_RANGE: f64 = 1000.0;
pub const SIGMOID_STEEPNESS: f64 = 6.0;
pub const MIN_CONFIDENCE: f64 = 0.3;
pub const MAX_CONFIDENCE: f64 = 1.0;
const STABILITY_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CongestionLevel {
    Light,
    Moderate,
    Heavy,
    #[serde(rename = "Very Heavy")]
    VeryHeavy,
    Unknown,
}

impl CongestionLevel {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < 0.25 {
            Self::Light
        } else if ratio < 0.5 {
            Self::Moderate
        } else if ratio < 0.75 {
            Self::Heavy
        } else {
            Self::VeryHeavy
        }
    }

    /// Busier bands are harder to call, so they cap confidence lower.
    pub fn confidence_factor(self) -> f64 {
        match self {
            Self::Light | Self::Unknown => 1.0,
            Self::Moderate => 0.9,
            Self::Heavy => 0.75,
            Self::VeryHeavy => 0.6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "Light",
            Self::Moderate => "Moderate",
            Self::Heavy => "Heavy",
            Self::VeryHeavy => "Very Heavy",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastResult {
    pub station_id: StationId,
    pub predicted_ridership: u64,
    pub congestion_level: CongestionLevel,
    pub confidence: f64,
    pub minutes_ahead: u32,
    /// Target time of the forecast, or the invocation time for `Unknown` results.
    pub timestamp: OffsetDateTime,
}

impl ForecastResult {
    pub fn unknown(station_id: StationId, minutes_ahead: u32, now: OffsetDateTime) -> Self {
        Self {
            station_id,
            predicted_ridership: 0,
            congestion_level: CongestionLevel::Unknown,
            confidence: 0.0,
            minutes_ahead,
            timestamp: now,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.congestion_level == CongestionLevel::Unknown
    }
}

#[derive(Debug)]
pub struct Forecaster {
    settings: ForecastSettings,
    jitter: Box<dyn Jitter>,
    utc_offset: UtcOffset,
}

impl Forecaster {
    pub fn new(settings: ForecastSettings, jitter: Box<dyn Jitter>) -> Self {
        Self {
            settings,
            jitter,
            utc_offset: UtcOffset::UTC,
        }
    }

    /// Offset applied to the system clock to get station-local time.
    pub fn with_utc_offset(mut self, utc_offset: UtcOffset) -> Self {
        self.utc_offset = utc_offset;
        self
    }

    pub fn settings(&self) -> &ForecastSettings {
        &self.settings
    }

    pub fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.utc_offset)
    }

    pub fn forecast(
        &self,
        station_id: StationId,
        samples: &[Sample],
        minutes_ahead: u32,
    ) -> ForecastResult {
        self.forecast_at(station_id, samples, minutes_ahead, self.now())
    }

    pub fn forecast_at(
        &self,
        station_id: StationId,
        samples: &[Sample],
        minutes_ahead: u32,
        now: OffsetDateTime,
    ) -> ForecastResult {
        let averages = hourly_averages(samples);
        if averages.is_empty() {
            warn!(station_id, "No valid data found for station");
            return ForecastResult::unknown(station_id, minutes_ahead, now);
        }
        if averages.len() < MIN_TIME_SLOTS {
            warn!(
                station_id,
                slots = averages.len(),
                "Not enough hourly data for prediction"
            );
            return ForecastResult::unknown(station_id, minutes_ahead, now);
        }

        let values: Vec<f64> = averages.iter().map(|a| a.mean_riders).collect();
        let smoothed = smooth(&values, SMOOTHING_WINDOW);

        let lookahead = Duration::minutes(i64::from(minutes_ahead));
        // Time + Duration wraps at midnight, which is what slot matching wants.
        let target_hour = (now.time() + lookahead).hour();
        let target = now.checked_add(lookahead).unwrap_or_else(|| {
            warn!(minutes_ahead, "Forecast target out of calendar range, using current time");
            now
        });

        let last = smoothed.len() - 1;
        let index = averages
            .iter()
            .position(|a| a.slot_start.hour() >= target_hour)
            .unwrap_or(last)
            .min(last);

        let (y1, y2, y3) = trailing_triple(&smoothed, index);
        let slope = ((y3 - y2) + (y2 - y1)) / 2.0;
        let projected = (y3 + (f64::from(minutes_ahead) / 60.0) * slope).max(0.0);

        let (local_min, local_max) = min_max(&values).unwrap_or((0.0, 0.0));
        let local_range = (local_max - local_min).max(MIN_LOCAL_RANGE);
        let normalized = ((projected - local_min) / local_range).clamp(0.0, 1.0);

        let curved = 1.0 / (1.0 + (-SIGMOID_STEEPNESS * (normalized - 0.5)).exp());
        let ratio = curved * self.jitter.factor();

        let ForecastSettings {
            global_max,
            traffic_floor,
            ..
        } = self.settings;
        let scaled = (traffic_floor + ratio * (global_max - traffic_floor)).min(global_max);

        let level = CongestionLevel::from_ratio(ratio);

        let stability = 1.0 - (slope.abs() / (y3 + STABILITY_EPSILON)).min(1.0);
        let confidence = ((0.5 + 0.5 * stability) * level.confidence_factor())
            .clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);

        let predicted = (scaled * (0.8 + 0.4 * confidence)).clamp(0.0, global_max);

        info!(
            station_id,
            target_hour,
            slot = %averages[index].label,
            raw = projected,
            slope,
            ratio,
            predicted,
            level = %level,
            confidence,
            "Congestion forecast computed"
        );

        ForecastResult {
            station_id,
            predicted_ridership: predicted.round().min(global_max) as u64,
            congestion_level: level,
            confidence,
            minutes_ahead,
            timestamp: target,
        }
    }
}

/// Forecast for `station_id` using the samples currently held in `state`.
///
/// `minutes_ahead` falls back to the configured default when absent.
pub fn forecast_station(
    state: &Arc<RwLock<AppState>>,
    station_id: StationId,
    minutes_ahead: Option<u32>,
) -> Result<ForecastResult, AppError> {
    let (forecaster, samples) = read_inputs(state, station_id)?;
    let minutes_ahead = minutes_ahead.unwrap_or(forecaster.settings().default_minutes_ahead);
    Ok(forecaster.forecast(station_id, &samples, minutes_ahead))
}

pub fn forecast_station_at(
    state: &Arc<RwLock<AppState>>,
    station_id: StationId,
    minutes_ahead: Option<u32>,
    now: OffsetDateTime,
) -> Result<ForecastResult, AppError> {
    let (forecaster, samples) = read_inputs(state, station_id)?;
    let minutes_ahead = minutes_ahead.unwrap_or(forecaster.settings().default_minutes_ahead);
    Ok(forecaster.forecast_at(station_id, &samples, minutes_ahead, now))
}

fn read_inputs(
    state: &Arc<RwLock<AppState>>,
    station_id: StationId,
) -> Result<(Arc<Forecaster>, Vec<Sample>), AppError> {
    let guard = state.read().map_err(|_| AppError::StateLock)?;
    Ok((
        Arc::clone(guard.forecaster()),
        guard.ridership().samples_for_station(station_id),
    ))
}
