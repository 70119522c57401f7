use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::{Duration, UtcOffset};

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:4200";
pub const DEFAULT_RIDERSHIP_PATH: &str = "data/ridership.json";
pub const DEFAULT_GLOBAL_MAX: f64 = 130_771.0;
pub const DEFAULT_TRAFFIC_FLOOR: f64 = 200.0;
pub const DEFAULT_MINUTES_AHEAD: u32 = 15;
pub const DEFAULT_VERIFICATION_TTL_HOURS: i64 = 24;
pub const DEFAULT_RESET_TTL_HOURS: i64 = 1;
/// Upper bound for code and token lifetimes (one year).
pub const MAX_TTL_HOURS: i64 = 8_760;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub data: Option<DataSection>,
    #[serde(default)]
    pub forecast: Option<ForecastSection>,
    #[serde(default)]
    pub auth: Option<AuthSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
    /// Origin allowed by CORS (default: the Angular dev server)
    pub cors_origin: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataSection {
    /// JSON export of the hourly ridership workbook
    pub ridership_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ForecastSection {
    pub global_max: Option<f64>,
    pub traffic_floor: Option<f64>,
    pub default_minutes_ahead: Option<u32>,
    /// Makes the jitter sequence reproducible across restarts when set.
    pub jitter_seed: Option<u64>,
    /// Offset used as "local" wall-clock time; the host offset is used when absent.
    pub utc_offset_hours: Option<i8>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthSection {
    pub bcrypt_cost: Option<u32>,
    pub verification_ttl_hours: Option<i64>,
    pub reset_ttl_hours: Option<i64>,
}

/// Forecaster tuning resolved from `[forecast]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastSettings {
    pub global_max: f64,
    pub traffic_floor: f64,
    pub default_minutes_ahead: u32,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            global_max: DEFAULT_GLOBAL_MAX,
            traffic_floor: DEFAULT_TRAFFIC_FLOOR,
            default_minutes_ahead: DEFAULT_MINUTES_AHEAD,
        }
    }
}

/// Account-flow tuning resolved from `[auth]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSettings {
    pub bcrypt_cost: u32,
    pub verification_ttl: Duration,
    pub reset_ttl: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            bcrypt_cost: bcrypt::DEFAULT_COST,
            verification_ttl: Duration::hours(DEFAULT_VERIFICATION_TTL_HOURS),
            reset_ttl: Duration::hours(DEFAULT_RESET_TTL_HOURS),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        let forecast = self.forecast_settings();
        if !(forecast.global_max > forecast.traffic_floor) {
            return Err(ConfigError::Invalid(format!(
                "forecast.global_max ({}) must exceed forecast.traffic_floor ({})",
                forecast.global_max, forecast.traffic_floor
            )));
        }
        if let Some(hours) = self.forecast.as_ref().and_then(|f| f.utc_offset_hours)
            && UtcOffset::from_hms(hours, 0, 0).is_err()
        {
            return Err(ConfigError::Invalid(format!(
                "forecast.utc_offset_hours out of range: {hours}"
            )));
        }
        if let Some(auth) = &self.auth {
            for (key, hours) in [
                ("verification_ttl_hours", auth.verification_ttl_hours),
                ("reset_ttl_hours", auth.reset_ttl_hours),
            ] {
                if let Some(hours) = hours
                    && !(1..=MAX_TTL_HOURS).contains(&hours)
                {
                    return Err(ConfigError::Invalid(format!(
                        "auth.{key} must be within 1..={MAX_TTL_HOURS}, got {hours}"
                    )));
                }
            }
        }
        let cost = self.auth_settings().bcrypt_cost;
        if !(4..=31).contains(&cost) {
            return Err(ConfigError::Invalid(format!(
                "auth.bcrypt_cost must be within 4..=31, got {cost}"
            )));
        }
        Ok(())
    }

    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    pub fn cors_origin(&self) -> &str {
        self.server
            .as_ref()
            .and_then(|s| s.cors_origin.as_deref())
            .unwrap_or(DEFAULT_CORS_ORIGIN)
    }

    pub fn ridership_path(&self) -> Option<&Path> {
        let path = match self.data.as_ref() {
            Some(section) => section.ridership_path.as_deref()?,
            None => Path::new(DEFAULT_RIDERSHIP_PATH),
        };
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    }

    pub fn forecast_settings(&self) -> ForecastSettings {
        let defaults = ForecastSettings::default();
        match &self.forecast {
            Some(section) => ForecastSettings {
                global_max: section.global_max.unwrap_or(defaults.global_max),
                traffic_floor: section.traffic_floor.unwrap_or(defaults.traffic_floor),
                default_minutes_ahead: section
                    .default_minutes_ahead
                    .unwrap_or(defaults.default_minutes_ahead),
            },
            None => defaults,
        }
    }

    pub fn jitter_seed(&self) -> Option<u64> {
        self.forecast.as_ref().and_then(|f| f.jitter_seed)
    }

    pub fn utc_offset(&self) -> Option<UtcOffset> {
        let hours = self.forecast.as_ref()?.utc_offset_hours?;
        UtcOffset::from_hms(hours, 0, 0).ok()
    }

    pub fn auth_settings(&self) -> AuthSettings {
        let defaults = AuthSettings::default();
        match &self.auth {
            Some(section) => AuthSettings {
                bcrypt_cost: section.bcrypt_cost.unwrap_or(defaults.bcrypt_cost),
                verification_ttl: section
                    .verification_ttl_hours
                    .map(ttl_from_hours)
                    .unwrap_or(defaults.verification_ttl),
                reset_ttl: section
                    .reset_ttl_hours
                    .map(ttl_from_hours)
                    .unwrap_or(defaults.reset_ttl),
            },
            None => defaults,
        }
    }
}

/// Saturates instead of panicking; out-of-range values are rejected by `validate`.
fn ttl_from_hours(hours: i64) -> Duration {
    Duration::seconds(hours.saturating_mul(3_600))
}
