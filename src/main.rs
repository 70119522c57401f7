use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use time::UtcOffset;
use tracing::Level;
use traintrack::api;
use traintrack::config::{self, Config};
use traintrack::forecast::Forecaster;
use traintrack::forecast::jitter::{Jitter, SeededJitter, UniformJitter};
use traintrack::mailer::LogMailer;
use traintrack::ridership::import::import_from_path;
use traintrack::state::AppState;
use traintrack::users::accounts::AccountService;

fn init_tracing(level: &str) {
    let max_level = level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(max_level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(&config.logging.level);
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        app = %config.app.name,
        "traintrack starting"
    );

    let state = Arc::new(RwLock::new(build_state(&config)));
    load_ridership(&config, &state);

    let app = api::router(Arc::clone(&state), config.cors_origin());
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, cors_origin = config.cors_origin(), "API server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_state(config: &Config) -> AppState {
    let jitter: Box<dyn Jitter> = match config.jitter_seed() {
        Some(seed) => {
            tracing::info!(seed, "Using seeded forecast jitter");
            Box::new(SeededJitter::new(seed))
        }
        None => Box::new(UniformJitter),
    };
    let forecaster = Forecaster::new(config.forecast_settings(), jitter)
        .with_utc_offset(resolve_utc_offset(config));
    let accounts = AccountService::new(Arc::new(LogMailer), config.auth_settings());

    let mut state = AppState::new(forecaster, accounts);
    let added = state.stations_mut().preload();
    tracing::info!(added, total = state.stations().len(), "Station catalog ready");
    state
}

fn resolve_utc_offset(config: &Config) -> UtcOffset {
    if let Some(offset) = config.utc_offset() {
        return offset;
    }
    match UtcOffset::current_local_offset() {
        Ok(offset) => offset,
        Err(e) => {
            tracing::warn!(error = %e, "Local UTC offset unavailable, using UTC");
            UtcOffset::UTC
        }
    }
}

/// Import the ridership export; a missing or broken file leaves the store empty.
fn load_ridership(config: &Config, state: &Arc<RwLock<AppState>>) {
    let Some(path) = config.ridership_path() else {
        tracing::info!("No ridership path configured, starting without history");
        return;
    };

    let Ok(mut guard) = state.write() else {
        tracing::warn!("State lock poisoned while importing ridership");
        return;
    };
    match import_from_path(path, guard.stations()) {
        Ok(samples) => {
            let count = samples.len();
            guard.ridership_mut().extend(samples);
            tracing::info!(path = %path.display(), samples = count, "Ridership data loaded");
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to import ridership data");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_toml() -> Result<(), Box<dyn std::error::Error>> {
        let _config = config::load_default()?;
        Ok(())
    }

    #[test]
    fn state_from_default_config_has_all_stations() -> Result<(), Box<dyn std::error::Error>> {
        let config = config::load_default()?;
        let state = build_state(&config);
        assert_eq!(state.stations().len(), 13);
        assert_eq!(state.forecaster().settings().global_max, 130_771.0);
        Ok(())
    }
}
