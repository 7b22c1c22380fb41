//! Application state shared across routes

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use parking_lot::{Mutex, RwLock};
use tracing::warn;

use crate::commerce7::Commerce7Client;
use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::store::{Db, SettingsStore, StoreError};
use crate::sync::{spawn_scheduler, SchedulerHandle, SetupTracker, SyncService};
use crate::util::time::today_in;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Db,
    pub settings: SettingsStore,
    pub dashboard: Dashboard,
    pub sync: SyncService,
    pub setup: SetupTracker,
    initialized: Arc<AtomicBool>,
    init_error: Arc<RwLock<Option<String>>>,
    scheduler: Arc<Mutex<Option<SchedulerHandle>>>,
}

impl AppState {
    pub fn new(config: Config, db: Db) -> Self {
        let config = Arc::new(config);
        let client = Commerce7Client::new(&config);
        if !config.demo_mode && !client.has_credentials() {
            warn!("C7_TENANT or C7_AUTH_TOKEN is not set; data sync will fail until configured");
        }

        Self {
            settings: SettingsStore::new(db.clone()),
            dashboard: Dashboard::new(db.clone()),
            sync: SyncService::new(db.clone(), client, &config),
            setup: SetupTracker::default(),
            initialized: Arc::new(AtomicBool::new(false)),
            init_error: Arc::new(RwLock::new(None)),
            scheduler: Arc::new(Mutex::new(None)),
            config,
            db,
        }
    }

    /// Startup initialization has finished
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn mark_initialized(&self) {
        *self.init_error.write() = None;
        self.initialized.store(true, Ordering::Release);
    }

    pub fn set_init_error(&self, error: String) {
        *self.init_error.write() = Some(error);
    }

    pub fn init_error(&self) -> Option<String> {
        self.init_error.read().clone()
    }

    /// Today's date in the configured timezone
    pub async fn today(&self) -> Result<NaiveDate, StoreError> {
        Ok(today_in(self.settings.load().await?.tz()))
    }

    /// Start the daily scheduler, or move the running one to `tz`
    pub fn start_scheduler(&self, tz: Tz) {
        let mut slot = self.scheduler.lock();
        match slot.as_ref() {
            Some(handle) => handle.set_timezone(tz),
            None => *slot = Some(spawn_scheduler(self.sync.clone(), tz)),
        }
    }

    pub fn scheduler_running(&self) -> bool {
        self.scheduler.lock().is_some()
    }
}

#[cfg(test)]
impl AppState {
    pub async fn for_test() -> Self {
        let config = Config::for_test();
        let db = Db::connect(&config.db_path).await.unwrap();
        Self::new(config, db)
    }
}
