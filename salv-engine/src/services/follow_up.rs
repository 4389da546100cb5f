//! Follow-up escalation for stalled audits
//!
//! Detects audits stuck in a needs-attention status past the SLA and sends
//! one escalation per stall episode: a reminder to the advisor and an
//! annotated copy to the advisor's current supervisor. The
//! `followUpNotificationSent` flag closes the episode; the status-update
//! path resets it when the status changes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio::time::{self, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use salv_common::db::models::{status, AuditRecord};
use salv_common::{time as clock, Result};

use crate::db::{audits, users};
use crate::notify::NotificationGateway;

/// Delay before the first check, so a restart does not fire a burst of
/// checks while the rest of the process is still warming up
const INITIAL_DELAY: Duration = Duration::from_secs(90);

pub struct FollowUpEscalator {
    pool: SqlitePool,
    gateway: Arc<dyn NotificationGateway>,
    interval: Duration,
    sla_hours: i64,
}

impl FollowUpEscalator {
    pub fn new(
        pool: SqlitePool,
        gateway: Arc<dyn NotificationGateway>,
        interval: Duration,
        sla_hours: i64,
    ) -> Self {
        Self {
            pool,
            gateway,
            interval,
            sla_hours,
        }
    }

    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }

    async fn run(self, token: CancellationToken) {
        info!(
            "Follow-up escalator started ({:?} interval, {}h SLA)",
            self.interval, self.sla_hours
        );

        tokio::select! {
            _ = sleep(INITIAL_DELAY) => {}
            _ = token.cancelled() => return,
        }

        let mut tick = time::interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = run_check(&self.pool, self.gateway.as_ref(), self.sla_hours, clock::now()).await {
                        error!("Follow-up check failed: {}", e);
                    }
                }
                _ = token.cancelled() => {
                    info!("Follow-up escalator stopping");
                    break;
                }
            }
        }
    }
}

/// One stall check. Per-record failures are logged and skipped; the flag
/// commits only after the advisor dispatch succeeded, so delivery is
/// at-least-once across restarts.
pub async fn run_check(
    pool: &SqlitePool,
    gateway: &dyn NotificationGateway,
    sla_hours: i64,
    now: DateTime<Utc>,
) -> Result<usize> {
    let cutoff = now - chrono::Duration::hours(sla_hours);
    let stalled = audits::find_stalled(pool, cutoff).await?;
    if stalled.is_empty() {
        return Ok(0);
    }

    info!("Follow-up check: {} stalled audit(s)", stalled.len());

    let mut escalated = 0;
    for audit in &stalled {
        match escalate(pool, gateway, audit, now).await {
            Ok(true) => escalated += 1,
            Ok(false) => {}
            Err(e) => warn!(audit_id = %audit.id, "Escalation failed, will retry next check: {}", e),
        }
    }

    Ok(escalated)
}

async fn escalate(
    pool: &SqlitePool,
    gateway: &dyn NotificationGateway,
    audit: &AuditRecord,
    now: DateTime<Utc>,
) -> Result<bool> {
    let Some(asesor_id) = audit.asesor else {
        warn!(audit_id = %audit.id, "Stalled audit has no advisor assigned; nobody to remind");
        return Ok(false);
    };

    let advisor = users::find_user(pool, asesor_id).await?;
    let hours = clock::hours_since(audit.status_updated_at, now);
    let action = status::suggested_action(&audit.status);

    let subject = "Recordatorio de seguimiento".to_string();
    let body = format!(
        "La auditoría {} de {} lleva {} horas en estado '{}'. Próximo paso sugerido: {}.",
        audit.id, audit.nombre, hours, audit.status, action
    );
    gateway.send(&[asesor_id], &subject, &body).await?;

    // Supervisor resolution uses the advisor's *current* team; the stored
    // group reference is the secondary path
    let supervisor = match advisor.as_ref().and_then(|a| a.equipo.as_deref()) {
        Some(equipo) => users::find_supervisor_by_team(pool, equipo).await?,
        None => None,
    };
    let supervisor = match (supervisor, audit.grupo.as_deref()) {
        (Some(s), _) => Some(s),
        (None, Some(grupo)) => users::find_supervisor_by_group(pool, grupo).await?,
        (None, None) => None,
    };

    match supervisor {
        Some(supervisor) => {
            let sup_subject = "Aviso de seguimiento (caso de tu equipo)".to_string();
            let sup_body = format!(
                "Aviso secundario sobre el caso de un asesor a tu cargo: {}",
                body
            );
            // The advisor already got their reminder; a failed supervisor
            // copy does not reopen the episode
            if let Err(e) = gateway.send(&[supervisor.id], &sup_subject, &sup_body).await {
                error!(audit_id = %audit.id, "Supervisor copy failed: {}", e);
            }
        }
        None => {
            warn!(audit_id = %audit.id, asesor = %asesor_id, "No supervisor resolvable; advisor notified alone");
        }
    }

    audits::mark_follow_up_sent(pool, audit.id).await?;
    Ok(true)
}
