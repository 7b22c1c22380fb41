//! First-run setup: pull the reference year and the current period, pick the
//! team, build the reference table and compute the first scores.

use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{SyncError, SyncService};
use crate::scoring::{self, reference};
use crate::store::settings::{
    DEFAULT_TIMEZONE, FISCAL_YEAR_END, FISCAL_YEAR_START, TIMEZONE, YEAR_TYPE,
};
use crate::store::{OrderStore, YearType};
use crate::util::time::{add_years, format_date, start_of_year, today_in};
use crate::util::timezone::parse_timezone;

/// Setup stage reported to the browser while the wizard runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupStatus {
    NotStarted,
    Starting,
    Initializing,
    FetchingReferenceOrders,
    FetchingReferenceClubs,
    FetchingCurrentOrders,
    FetchingCurrentClubs,
    SettingActiveAssociates,
    GeneratingReference,
    Normalizing,
    CalculatingScores,
    Complete,
    Error,
}

impl SetupStatus {
    pub fn message(&self) -> &'static str {
        match self {
            SetupStatus::NotStarted => "Setup not started",
            SetupStatus::Starting => "Starting setup process...",
            SetupStatus::Initializing => "Initializing database...",
            SetupStatus::FetchingReferenceOrders => "Fetching reference period order data...",
            SetupStatus::FetchingReferenceClubs => "Fetching reference period club data...",
            SetupStatus::FetchingCurrentOrders => "Fetching current period order data...",
            SetupStatus::FetchingCurrentClubs => "Fetching current period club data...",
            SetupStatus::SettingActiveAssociates => "Setting up active associates...",
            SetupStatus::GeneratingReference => "Generating reference data...",
            SetupStatus::Normalizing => "Normalizing reference data...",
            SetupStatus::CalculatingScores => "Calculating initial SommScores...",
            SetupStatus::Complete => "Setup complete!",
            SetupStatus::Error => "Setup failed",
        }
    }

    pub fn is_running(&self) -> bool {
        !matches!(self, SetupStatus::NotStarted | SetupStatus::Complete | SetupStatus::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetupProgress {
    pub status: SetupStatus,
    pub message: String,
    pub error: Option<String>,
}

impl Default for SetupProgress {
    fn default() -> Self {
        Self::at(SetupStatus::NotStarted)
    }
}

impl SetupProgress {
    fn at(status: SetupStatus) -> Self {
        Self {
            status,
            message: status.message().to_string(),
            error: None,
        }
    }
}

/// Shared progress of the setup wizard
#[derive(Clone, Default)]
pub struct SetupTracker {
    inner: Arc<RwLock<SetupProgress>>,
}

impl SetupTracker {
    pub fn snapshot(&self) -> SetupProgress {
        self.inner.read().clone()
    }

    pub fn set(&self, status: SetupStatus) {
        info!(status = ?status, "Setup progress");
        *self.inner.write() = SetupProgress::at(status);
    }

    pub fn fail(&self, message: String) {
        *self.inner.write() = SetupProgress {
            status: SetupStatus::Error,
            message: message.clone(),
            error: Some(message),
        };
    }

    /// Move to `Starting` unless a run is already in flight
    pub fn try_start(&self) -> bool {
        let mut progress = self.inner.write();
        if progress.status.is_running() {
            return false;
        }
        *progress = SetupProgress::at(SetupStatus::Starting);
        true
    }
}

/// Options for the setup wizard; anything omitted uses the defaults
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetupRequest {
    #[serde(default)]
    pub year_type: Option<YearType>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Fully resolved setup parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SetupPlan {
    pub year_type: YearType,
    pub start: NaiveDate,
    pub timezone: String,
}

impl SetupRequest {
    pub fn resolve(self) -> SetupPlan {
        let timezone = self
            .timezone
            .filter(|tz| parse_timezone(tz).is_some())
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let today = today_in(parse_timezone(&timezone).unwrap_or(chrono_tz::Tz::UTC));
        SetupPlan {
            year_type: self.year_type.unwrap_or_default(),
            start: self.start_date.unwrap_or_else(|| start_of_year(today)),
            timezone,
        }
    }
}

/// Run the whole wizard, reporting each stage through `tracker`
pub async fn run_setup(
    sync: &SyncService,
    plan: SetupPlan,
    tracker: &SetupTracker,
) -> Result<(), SyncError> {
    let result = setup_steps(sync, &plan, tracker).await;
    match &result {
        Ok(()) => tracker.set(SetupStatus::Complete),
        Err(e) => {
            error!(error = %e, "Setup failed");
            tracker.fail(e.to_string());
        }
    }
    result
}

async fn setup_steps(
    sync: &SyncService,
    plan: &SetupPlan,
    tracker: &SetupTracker,
) -> Result<(), SyncError> {
    tracker.set(SetupStatus::Initializing);
    sync.db().migrate().await?;
    let settings_store = sync.settings();
    if settings_store.load().await?.is_initialized() {
        return Err(SyncError::AlreadyInitialized);
    }

    let today = today_in(parse_timezone(&plan.timezone).unwrap_or(chrono_tz::Tz::UTC));
    let (ref_start, ref_end) = reference::reference_period(plan.start);
    info!(start = %ref_start, end = %ref_end, "Reference period");

    let ingestor = sync.ingestor();
    tracker.set(SetupStatus::FetchingReferenceOrders);
    let added = ingestor.ingest_orders(ref_start, ref_end).await?;
    info!(added, "Reference period orders added");

    tracker.set(SetupStatus::FetchingReferenceClubs);
    let added = ingestor.ingest_clubs(ref_start, ref_end).await?;
    info!(added, "Reference period clubs added");

    tracker.set(SetupStatus::FetchingCurrentOrders);
    let added = ingestor.ingest_orders(plan.start, today).await?;
    info!(added, "Current period orders added");

    tracker.set(SetupStatus::FetchingCurrentClubs);
    let added = ingestor.ingest_clubs(plan.start, today).await?;
    info!(added, "Current period clubs added");

    tracker.set(SetupStatus::SettingActiveAssociates);
    let associates = OrderStore::new(sync.db().clone()).all_associates().await?;
    if !associates.is_empty() {
        settings_store.set_active_associates(&associates).await?;
        info!(count = associates.len(), "Active associates set");
    }

    let mut entries = vec![
        (YEAR_TYPE, plan.year_type.to_string()),
        (TIMEZONE, plan.timezone.clone()),
    ];
    if plan.year_type == YearType::Fiscal {
        let end = add_years(plan.start, 1) - chrono::Duration::days(1);
        entries.push((FISCAL_YEAR_START, format_date(plan.start)));
        entries.push((FISCAL_YEAR_END, format_date(end)));
    }
    settings_store.set_many(&entries).await?;

    tracker.set(SetupStatus::GeneratingReference);
    let settings = settings_store.load().await?;
    tracker.set(SetupStatus::Normalizing);
    reference::build_reference(sync.db(), &settings, plan.start).await?;

    tracker.set(SetupStatus::CalculatingScores);
    scoring::recalculate(sync.db(), plan.start, today).await?;

    // Watermark is today: everything from `plan.start` through today was just fetched
    settings_store.set_last_update(today).await?;
    Ok(())
}
