//! Daily liquidation sweep
//!
//! Structurally parallel to the recovery side of the nightly sweep: loaded
//! audits enter the current month's liquidation bucket, and on the last
//! local day of the month the bucket is soft-deleted so it cannot
//! accumulate across month boundaries. Runs a fixed offset after the
//! recovery sweep so status changes made by that sweep have settled.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use salv_common::time as clock;

use crate::db::audits;

/// Minutes after the nightly recovery sweep's fire time
const FIRE_OFFSET_MINUTES: u32 = 20;

pub struct LiquidacionSweep {
    pool: SqlitePool,
    tz: Tz,
    fire_hour: u32,
    fire_minute: u32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LiquidacionOutcome {
    pub intake: u64,
    pub archived: u64,
}

impl LiquidacionSweep {
    /// `nightly_fire` is the recovery sweep's (hour, minute); this job
    /// fires `FIRE_OFFSET_MINUTES` later
    pub fn new(pool: SqlitePool, tz: Tz, nightly_fire: (u32, u32)) -> Self {
        let total = nightly_fire.0 * 60 + nightly_fire.1 + FIRE_OFFSET_MINUTES;
        Self {
            pool,
            tz,
            fire_hour: (total / 60) % 24,
            fire_minute: total % 60,
        }
    }

    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }

    async fn run(self, token: CancellationToken) {
        info!(
            "Liquidation sweep scheduled daily at {:02}:{:02} ({})",
            self.fire_hour, self.fire_minute, self.tz
        );

        loop {
            let now = clock::now();
            let next = clock::next_occurrence(now, self.tz, self.fire_hour, self.fire_minute);
            let wait = (next - now).to_std().unwrap_or_default();

            tokio::select! {
                _ = sleep(wait) => {
                    run_sweep(&self.pool, self.tz, clock::now()).await;
                }
                _ = token.cancelled() => {
                    info!("Liquidation sweep stopping");
                    break;
                }
            }
        }
    }
}

/// One liquidation sweep; intake and archive fail independently
pub async fn run_sweep(pool: &SqlitePool, tz: Tz, now: DateTime<Utc>) -> LiquidacionOutcome {
    let month = clock::month_tag(now, tz);
    let mut outcome = LiquidacionOutcome::default();

    match audits::liquidacion_intake(pool, &month).await {
        Ok(n) => {
            outcome.intake = n;
            if n > 0 {
                info!("Liquidation sweep: {} audit(s) moved into bucket {}", n, month);
            }
        }
        Err(e) => error!("Liquidation sweep: intake failed: {}", e),
    }

    if clock::is_last_day_of_month(now, tz) {
        match audits::archive_liquidacion_month(pool, &month, now).await {
            Ok(n) => {
                outcome.archived = n;
                info!("Liquidation sweep: archived {} audit(s) from bucket {}", n, month);
            }
            Err(e) => error!("Liquidation sweep: month-end archive failed: {}", e),
        }
    }

    outcome
}
