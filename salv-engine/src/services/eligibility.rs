//! Timer-based recovery promotion
//!
//! Promotes individual audits into recovery as soon as their
//! `recoveryEligibleAt` timer elapses, independent of the nightly sweep.
//! The promotion is a single conditional update, so a slow tick still
//! running when the next one fires re-processes nothing.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use salv_common::{time as clock, Result};

use crate::db::{audits, users};
use crate::notify::NotificationGateway;

pub struct EligibilityScheduler {
    pool: SqlitePool,
    gateway: Arc<dyn NotificationGateway>,
    interval: Duration,
}

impl EligibilityScheduler {
    pub fn new(pool: SqlitePool, gateway: Arc<dyn NotificationGateway>, interval: Duration) -> Self {
        Self {
            pool,
            gateway,
            interval,
        }
    }

    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }

    async fn run(self, token: CancellationToken) {
        let mut tick = time::interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Eligibility scheduler started ({:?} interval)", self.interval);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    // A failed tick is terminal for that tick only; the
                    // predicate stays true so the next tick retries
                    if let Err(e) = run_tick(&self.pool, self.gateway.as_ref(), clock::now()).await {
                        error!("Eligibility tick failed: {}", e);
                    }
                }
                _ = token.cancelled() => {
                    info!("Eligibility scheduler stopping");
                    break;
                }
            }
        }
    }
}

/// One promotion pass. Returns the number of audits actually promoted by
/// this call; an overlapping or repeated pass finds nothing left to do.
pub async fn run_tick(
    pool: &SqlitePool,
    gateway: &dyn NotificationGateway,
    now: DateTime<Utc>,
) -> Result<usize> {
    let promoted = audits::promote_eligible(pool, now).await?;
    if promoted.is_empty() {
        return Ok(0);
    }

    info!("Promoted {} audit(s) to recovery", promoted.len());

    let resellers = users::active_reseller_ids(pool).await?;
    if resellers.is_empty() {
        warn!("No active resellers to notify about recovery promotions");
        return Ok(promoted.len());
    }

    for audit in &promoted {
        let hours = clock::hours_since(audit.status_updated_at, now);
        let subject = "Auditoría movida a recupero".to_string();
        let body = format!(
            "La auditoría {} pasó automáticamente a recupero. Estado actual: '{}' (hace {} horas).",
            audit.id, audit.status, hours
        );
        // The state transition already committed; a failed dispatch is
        // logged and never undoes it
        if let Err(e) = gateway.send(&resellers, &subject, &body).await {
            error!(audit_id = %audit.id, "Recovery promotion notification failed: {}", e);
        }
    }

    Ok(promoted.len())
}
