//! Supervisor attribution for finalized audits
//!
//! Resolves the supervisor who was organizationally responsible for the
//! audit's advisor at the moment the audit mattered, and persists that as
//! a write-once snapshot. Resolution gaps are warnings, not errors; the
//! caller proceeds with a degraded (no supervisor) result.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use salv_common::db::models::{status, AuditRecord, SupervisorSnapshot};
use salv_common::{Error, Result};

use crate::db::{audits, users};
use crate::services::team_history;

/// Reference date for historical attribution, first match wins:
/// explicit QR creation date, then the first status-history entry that
/// recorded the terminal QR status, then the scheduled timestamp, then now.
pub fn reference_date(audit: &AuditRecord) -> DateTime<Utc> {
    if let Some(at) = audit.fecha_creacion_qr {
        return at;
    }
    if let Some(entry) = audit
        .status_history
        .iter()
        .find(|e| status::is_qr_done(&e.status))
    {
        return entry.changed_at;
    }
    if let Some(at) = audit.scheduled_at {
        return at;
    }
    Utc::now()
}

/// Team the audit should be attributed to, first match wins: the advisor's
/// team-history period covering the reference date, the advisor's current
/// team, the audit's stored group reference.
pub async fn resolve_team(pool: &SqlitePool, audit: &AuditRecord) -> Result<Option<String>> {
    if let Some(asesor_id) = audit.asesor {
        if let Some(advisor) = users::find_user(pool, asesor_id).await? {
            let at = reference_date(audit);
            if let Some(team) = team_history::resolve_team_on(&advisor.historial_equipos, at) {
                return Ok(Some(team.to_string()));
            }
            if let Some(equipo) = advisor.equipo.filter(|e| !e.is_empty()) {
                return Ok(Some(equipo));
            }
        } else {
            warn!(audit_id = %audit.id, asesor = %asesor_id, "Advisor not found for attribution");
        }
    }

    Ok(audit.grupo.clone().filter(|g| !g.is_empty()))
}

/// Compute the supervisor snapshot for an audit, without persisting it
pub async fn attribute(pool: &SqlitePool, audit: &AuditRecord) -> Result<Option<SupervisorSnapshot>> {
    let Some(team) = resolve_team(pool, audit).await? else {
        warn!(audit_id = %audit.id, "No team resolvable for audit; attributing no supervisor");
        return Ok(None);
    };

    let supervisor = match users::find_supervisor_by_team(pool, &team).await? {
        Some(user) => Some(user),
        // The group reference may be a team id, a code, or a name; the
        // group lookup tries those in order
        None => users::find_supervisor_by_group(pool, &team).await?,
    };

    match supervisor {
        Some(user) => Ok(Some(SupervisorSnapshot {
            id: user.id,
            nombre: user.nombre,
            equipo: team,
        })),
        None => {
            warn!(audit_id = %audit.id, equipo = %team, "No active supervisor found for team");
            Ok(None)
        }
    }
}

/// Attribution entry point invoked when an audit reaches a terminal status.
/// The snapshot is written at most once; an existing snapshot is returned
/// untouched so historical reports never shift.
pub async fn finalize_attribution(
    pool: &SqlitePool,
    audit_id: Uuid,
) -> Result<Option<SupervisorSnapshot>> {
    let audit = audits::find_audit(pool, audit_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Audit {}", audit_id)))?;

    if let Some(existing) = &audit.supervisor_snapshot {
        return Ok(Some(existing.clone()));
    }

    let Some(snapshot) = attribute(pool, &audit).await? else {
        return Ok(None);
    };

    // Conditional write; if another caller won the race, theirs stands
    if !audits::set_supervisor_snapshot(pool, audit_id, &snapshot).await? {
        let current = audits::find_audit(pool, audit_id).await?;
        return Ok(current.and_then(|a| a.supervisor_snapshot));
    }

    Ok(Some(snapshot))
}
