//! Daily update job at 01:00 in the configured timezone

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tracing::{error, info};

use super::SyncService;
use crate::util::timezone::next_daily_run;

/// Local wall-clock time of the daily update
pub fn run_at() -> NaiveTime {
    NaiveTime::from_hms_opt(1, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Lets the settings page move the job to a new timezone
#[derive(Clone)]
pub struct SchedulerHandle {
    tz_tx: watch::Sender<Tz>,
}

impl SchedulerHandle {
    pub fn set_timezone(&self, tz: Tz) {
        info!(timezone = %tz, "Rescheduling daily update");
        self.tz_tx.send_replace(tz);
    }

    pub fn timezone(&self) -> Tz {
        *self.tz_tx.borrow()
    }
}

/// Spawn the scheduler on the runtime
pub fn spawn_scheduler(sync: SyncService, tz: Tz) -> SchedulerHandle {
    let (tz_tx, tz_rx) = watch::channel(tz);
    tokio::spawn(async move {
        run(sync, tz_rx).await;
    });
    SchedulerHandle { tz_tx }
}

fn wait_for(now: DateTime<Utc>, next: DateTime<Utc>) -> std::time::Duration {
    (next - now).to_std().unwrap_or_default()
}

/// Outcome of one scheduler wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tick {
    Updated,
    Failed,
    Rescheduled,
    Stopped,
}

/// Wait up to `wait` for the next run, or return early on a timezone change
async fn tick(
    sync: &SyncService,
    tz_rx: &mut watch::Receiver<Tz>,
    wait: std::time::Duration,
) -> Tick {
    tokio::select! {
        _ = tokio::time::sleep(wait) => {
            info!("Running scheduled update");
            match sync.update_data(None, None).await {
                Ok(summary) => {
                    info!(
                        orders_added = summary.orders_added,
                        clubs_added = summary.clubs_added,
                        scores_written = summary.scores_written,
                        "Scheduled update finished"
                    );
                    Tick::Updated
                }
                Err(e) => {
                    error!(error = %e, "Scheduled update failed");
                    Tick::Failed
                }
            }
        }
        changed = tz_rx.changed() => match changed {
            Ok(()) => Tick::Rescheduled,
            Err(_) => Tick::Stopped,
        },
    }
}

/// Run updates forever. A failed update is logged and retried the next day.
pub async fn run(sync: SyncService, mut tz_rx: watch::Receiver<Tz>) {
    loop {
        let tz = *tz_rx.borrow_and_update();
        let now = Utc::now();
        let next = next_daily_run(now, tz, run_at());
        info!(timezone = %tz, next_run = %next, "Next scheduled update");

        if tick(&sync, &mut tz_rx, wait_for(now, next)).await == Tick::Stopped {
            info!("Scheduler handle dropped, stopping");
            return;
        }
    }
}
