//! Startup initialization, run in the background after the listener is bound

use tracing::{error, info};

use super::AppState;
use crate::demo;
use crate::store::StoreError;
use crate::sync::SyncError;
use crate::util::time::today_in;

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Waiting for tables: {0:?}")]
    MissingTables(Vec<&'static str>),
}

/// Prepare the database and background jobs.
///
/// Demo mode replaces all data with generated data. Otherwise an already
/// configured install gets its scores refreshed and the scheduler started.
pub async fn initialize(state: &AppState) -> Result<(), InitError> {
    state.db.migrate().await?;
    let settings = state.settings.load().await?;

    if state.config.demo_mode {
        info!("Running in demo mode, generating fake data");
        demo::load_demo(&state.db, state.config.demo_seed, today_in(settings.tz())).await?;
    } else if settings.is_initialized() {
        let written = state.sync.recalculate_current_year().await?;
        info!(scores = written, "Scores refreshed at startup");
        state.start_scheduler(settings.tz());
    } else {
        info!("Not configured yet, waiting for the setup wizard");
    }

    let missing = state.db.missing_tables().await?;
    if !missing.is_empty() {
        return Err(InitError::MissingTables(missing));
    }
    Ok(())
}

/// Run [`initialize`] on a task and publish the outcome on `state`
pub fn spawn_initialization(state: AppState) {
    tokio::spawn(async move {
        match initialize(&state).await {
            Ok(()) => {
                state.mark_initialized();
                info!("Initialization complete");
            }
            Err(e) => {
                error!(error = %e, "Initialization failed");
                state.set_init_error(e.to_string());
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ScoreStore;

    #[tokio::test]
    async fn fresh_install_initializes_without_scheduler() {
        let state = AppState::for_test().await;
        initialize(&state).await.unwrap();
        assert!(!state.scheduler_running());
    }

    #[tokio::test]
    async fn configured_install_starts_the_scheduler() {
        let state = AppState::for_test().await;
        let today = state.today().await.unwrap();
        state.settings.set_last_update(today).await.unwrap();

        initialize(&state).await.unwrap();
        assert!(state.scheduler_running());
    }

    #[tokio::test]
    async fn demo_mode_generates_scores() {
        let mut config = crate::config::Config::for_test();
        config.demo_mode = true;
        let db = crate::store::Db::connect(":memory:").await.unwrap();
        let state = AppState::new(config, db);

        initialize(&state).await.unwrap();
        assert!(!ScoreStore::new(state.db.clone()).all_scores().await.unwrap().is_empty());
        assert!(!state.scheduler_running());
    }
}
