//! Nightly structural sweep
//!
//! Fires once a day at a fixed wall-clock time in the org timezone (the
//! timer is re-armed after each fire instead of using a cron string, so
//! timezone and DST handling stay explicit). Step order within a sweep is
//! fixed: intake runs before exit/archive, so a record that both newly
//! qualifies and reaches the terminal QR status on the same night ends up
//! out of the recovery view.

use chrono::DateTime;
use chrono::Utc;
use chrono_tz::Tz;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use salv_common::time as clock;

use crate::db::audits;

pub struct NightlyStateSweep {
    pool: SqlitePool,
    tz: Tz,
    fire_hour: u32,
    fire_minute: u32,
}

/// Per-step counts of one sweep; steps that failed are logged and count 0
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub intake: u64,
    pub exited: u64,
    pub archived: u64,
}

impl NightlyStateSweep {
    pub fn new(pool: SqlitePool, tz: Tz, fire: (u32, u32)) -> Self {
        Self {
            pool,
            tz,
            fire_hour: fire.0,
            fire_minute: fire.1,
        }
    }

    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }

    async fn run(self, token: CancellationToken) {
        info!(
            "Nightly sweep scheduled daily at {:02}:{:02} ({})",
            self.fire_hour, self.fire_minute, self.tz
        );

        loop {
            let now = clock::now();
            let next = clock::next_occurrence(now, self.tz, self.fire_hour, self.fire_minute);
            let wait = (next - now).to_std().unwrap_or_default();
            info!("Next nightly sweep at {}", next);

            tokio::select! {
                _ = sleep(wait) => {
                    run_sweep(&self.pool, self.tz, clock::now()).await;
                }
                _ = token.cancelled() => {
                    info!("Nightly sweep stopping");
                    break;
                }
            }
        }
    }
}

/// One full sweep. Each step is independently fallible: a failed step is
/// logged and the remaining steps still run.
pub async fn run_sweep(pool: &SqlitePool, tz: Tz, now: DateTime<Utc>) -> SweepOutcome {
    let month = clock::month_tag(now, tz);
    let mut outcome = SweepOutcome::default();

    // Step A: recovery intake
    match audits::nightly_recovery_intake(pool, now, &month).await {
        Ok(n) => {
            outcome.intake = n;
            if n > 0 {
                info!("Nightly sweep: {} audit(s) moved into recovery ({})", n, month);
            }
        }
        Err(e) => error!("Nightly sweep: recovery intake failed: {}", e),
    }

    // Step B: recovery exit for finished audits
    match audits::recovery_exit_on_done(pool, now).await {
        Ok(n) => {
            outcome.exited = n;
            if n > 0 {
                info!("Nightly sweep: {} audit(s) left recovery as done", n);
            }
        }
        Err(e) => error!("Nightly sweep: recovery exit failed: {}", e),
    }

    // Step C: month-end archive, only on the last local calendar day
    if clock::is_last_day_of_month(now, tz) {
        match audits::archive_recovery_month(pool, &month, now).await {
            Ok(n) => {
                outcome.archived = n;
                info!("Nightly sweep: archived {} audit(s) from bucket {}", n, month);
            }
            Err(e) => error!("Nightly sweep: month-end archive failed: {}", e),
        }
    }

    outcome
}
