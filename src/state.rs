use crate::config::{AuthSettings, ForecastSettings};
use crate::forecast::Forecaster;
use crate::forecast::jitter::UniformJitter;
use crate::mailer::LogMailer;
use crate::ridership::RidershipStore;
use crate::stations::StationCatalog;
use crate::users::accounts::AccountService;
use std::sync::Arc;

#[derive(Debug)]
pub struct AppState {
    stations: StationCatalog,
    ridership: RidershipStore,
    accounts: AccountService,
    forecaster: Arc<Forecaster>,
}

impl AppState {
    pub fn new(forecaster: Forecaster, accounts: AccountService) -> Self {
        Self {
            stations: StationCatalog::new(),
            ridership: RidershipStore::new(),
            accounts,
            forecaster: Arc::new(forecaster),
        }
    }

    pub fn stations(&self) -> &StationCatalog {
        &self.stations
    }

    pub fn stations_mut(&mut self) -> &mut StationCatalog {
        &mut self.stations
    }

    pub fn ridership(&self) -> &RidershipStore {
        &self.ridership
    }

    pub fn ridership_mut(&mut self) -> &mut RidershipStore {
        &mut self.ridership
    }

    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    pub fn accounts_mut(&mut self) -> &mut AccountService {
        &mut self.accounts
    }

    pub fn forecaster(&self) -> &Arc<Forecaster> {
        &self.forecaster
    }

    pub fn set_forecaster(&mut self, forecaster: Forecaster) {
        self.forecaster = Arc::new(forecaster);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(
            Forecaster::new(ForecastSettings::default(), Box::new(UniformJitter)),
            AccountService::new(Arc::new(LogMailer), AuthSettings::default()),
        )
    }
}
