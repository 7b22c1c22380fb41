//! Update pipeline: ingest new Commerce7 data, then rescore the current year

pub mod scheduler;
pub mod setup;

use chrono::NaiveDate;
use tracing::info;

use crate::commerce7::Commerce7Client;
use crate::config::Config;
use crate::ingest::{IngestError, Ingestor};
use crate::scoring::{self, period::settings_year_start};
use crate::store::{Db, SettingsStore, StoreError};
use crate::util::time::{start_of_year, today_in};

pub use scheduler::{spawn_scheduler, SchedulerHandle};
pub use setup::{run_setup, SetupPlan, SetupProgress, SetupRequest, SetupStatus, SetupTracker};

/// Sync errors
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Application is already initialized")]
    AlreadyInitialized,
}

/// Outcome of one update run
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub orders_added: u64,
    pub clubs_added: u64,
    pub scores_written: usize,
}

/// Runs ingestion and scoring against one database
#[derive(Clone)]
pub struct SyncService {
    db: Db,
    settings: SettingsStore,
    ingestor: Ingestor,
}

impl SyncService {
    pub fn new(db: Db, client: Commerce7Client, config: &Config) -> Self {
        Self {
            settings: SettingsStore::new(db.clone()),
            ingestor: Ingestor::new(client, db.clone(), config),
            db,
        }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    /// Fetch orders and clubs for `[start, end]` and recompute this year's scores.
    ///
    /// `start` defaults to the last recorded update (else Jan 1), `end` to today
    /// in the configured timezone. The update watermark only advances when the
    /// range reaches today.
    pub async fn update_data(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<UpdateSummary, SyncError> {
        self.db.migrate().await?;

        let settings = self.settings.load().await?;
        let today = today_in(settings.tz());
        let start = start
            .or(settings.last_order_update)
            .unwrap_or_else(|| start_of_year(today));
        let end = end.unwrap_or(today);
        if start > end {
            return Err(SyncError::InvalidRange { start, end });
        }

        info!(start = %start, end = %end, "=== Update started ===");

        let orders_added = self.ingestor.ingest_orders(start, end).await?;
        let clubs_added = self.ingestor.ingest_clubs(start, end).await?;

        if end == today {
            self.settings.set_last_update(end).await?;
        }

        let score_start = settings_year_start(&settings, today);
        let scores_written = scoring::recalculate(&self.db, score_start, today).await?;

        info!(orders_added, clubs_added, scores_written, "=== Update complete ===");
        Ok(UpdateSummary {
            start,
            end,
            orders_added,
            clubs_added,
            scores_written,
        })
    }

    /// Recompute scores from the current scoring year start through today
    pub async fn recalculate_current_year(&self) -> Result<usize, SyncError> {
        let settings = self.settings.load().await?;
        let today = today_in(settings.tz());
        let start = settings_year_start(&settings, today);
        Ok(scoring::recalculate(&self.db, start, today).await?)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Mock Commerce7 serving fixed order and club pages
    pub async fn mock_commerce7(orders: serde_json::Value, clubs: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/order"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "orders": orders, "cursor": null })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/club-membership"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "clubMemberships": clubs, "cursor": null })),
            )
            .mount(&server)
            .await;
        server
    }

    pub async fn service_for(server: &MockServer) -> SyncService {
        let mut config = Config::for_test();
        config.c7_api_url = server.uri();
        let db = Db::connect(":memory:").await.unwrap();
        SyncService::new(db, Commerce7Client::new(&config), &config)
    }
}
