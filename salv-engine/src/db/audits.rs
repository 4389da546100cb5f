//! Audit record persistence and the schedulers' conditional transitions

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use salv_common::db::models::{status, AuditRecord, StatusChange, SupervisorSnapshot};
use salv_common::{Error, Result};

use super::{parse_ts, parse_ts_opt, placeholders, ts};

/// Minimal projection returned by the eligibility promotion, enough to
/// compose the per-record reseller notification
#[derive(Debug, Clone)]
pub struct PromotedAudit {
    pub id: Uuid,
    pub status: String,
    pub status_updated_at: DateTime<Utc>,
}

fn uuid_from(s: String) -> Result<Uuid> {
    Uuid::parse_str(&s).map_err(|e| Error::InvalidInput(format!("Bad stored uuid '{}': {}", s, e)))
}

fn uuid_opt(s: Option<String>) -> Result<Option<Uuid>> {
    s.map(uuid_from).transpose()
}

fn audit_from_row(row: &SqliteRow) -> Result<AuditRecord> {
    let snapshot: Option<String> = row.get("supervisorSnapshot");
    let supervisor_snapshot: Option<SupervisorSnapshot> = snapshot
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| Error::InvalidInput(format!("Bad supervisorSnapshot JSON: {}", e)))?;

    let history: String = row.get("statusHistory");
    let status_history: Vec<StatusChange> = serde_json::from_str(&history)
        .map_err(|e| Error::InvalidInput(format!("Bad statusHistory JSON: {}", e)))?;

    Ok(AuditRecord {
        id: uuid_from(row.get("id"))?,
        nombre: row.get("nombre"),
        cuil: row.get("cuil"),
        telefono: row.get("telefono"),
        tipo_venta: row.get("tipoVenta"),
        obra_social_anterior: row.get("obraSocialAnterior"),
        obra_social_vendida: row.get("obraSocialVendida"),
        scheduled_at: parse_ts_opt(row.get("scheduledAt"))?,
        asesor: uuid_opt(row.get("asesor"))?,
        validador: uuid_opt(row.get("validador"))?,
        created_by: uuid_opt(row.get("createdBy"))?,
        auditor: uuid_opt(row.get("auditor"))?,
        administrador: uuid_opt(row.get("administrador"))?,
        quien_creo_qr: uuid_opt(row.get("quienCreoQr"))?,
        grupo: row.get("grupo"),
        status: row.get("status"),
        status_updated_at: parse_ts(&row.get::<String, _>("statusUpdatedAt"))?,
        recovery_eligible_at: parse_ts_opt(row.get("recoveryEligibleAt"))?,
        is_recovery: row.get::<i64, _>("isRecovery") != 0,
        recovery_moved_at: parse_ts_opt(row.get("recoveryMovedAt"))?,
        recovery_month: row.get("recoveryMonth"),
        recovery_deleted_at: parse_ts_opt(row.get("recoveryDeletedAt"))?,
        is_liquidacion: row.get::<i64, _>("isLiquidacion") != 0,
        liquidacion_month: row.get("liquidacionMonth"),
        liquidacion_deleted_at: parse_ts_opt(row.get("liquidacionDeletedAt"))?,
        is_recuperada: row.get::<i64, _>("isRecuperada") != 0,
        follow_up_notification_sent: row.get::<i64, _>("followUpNotificationSent") != 0,
        supervisor_snapshot,
        is_complete: row.get::<i64, _>("isComplete") != 0,
        fecha_creacion_qr: parse_ts_opt(row.get("fechaCreacionQr"))?,
        status_history,
        created_at: parse_ts(&row.get::<String, _>("createdAt"))?,
    })
}

/// Insert a full audit record (sales-intake path and tests)
pub async fn insert_audit(pool: &SqlitePool, audit: &AuditRecord) -> Result<()> {
    let snapshot = audit
        .supervisor_snapshot
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to serialize snapshot: {}", e)))?;
    let history = serde_json::to_string(&audit.status_history)
        .map_err(|e| Error::Internal(format!("Failed to serialize statusHistory: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO audits (
            id, nombre, cuil, telefono, tipoVenta,
            obraSocialAnterior, obraSocialVendida, scheduledAt,
            asesor, validador, createdBy, auditor, administrador, quienCreoQr,
            grupo, status, statusUpdatedAt, recoveryEligibleAt,
            isRecovery, recoveryMovedAt, recoveryMonth, recoveryDeletedAt,
            isLiquidacion, liquidacionMonth, liquidacionDeletedAt,
            isRecuperada, followUpNotificationSent, supervisorSnapshot,
            isComplete, fechaCreacionQr, statusHistory, createdAt
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(audit.id.to_string())
    .bind(&audit.nombre)
    .bind(&audit.cuil)
    .bind(&audit.telefono)
    .bind(&audit.tipo_venta)
    .bind(&audit.obra_social_anterior)
    .bind(&audit.obra_social_vendida)
    .bind(audit.scheduled_at.map(ts))
    .bind(audit.asesor.map(|u| u.to_string()))
    .bind(audit.validador.map(|u| u.to_string()))
    .bind(audit.created_by.map(|u| u.to_string()))
    .bind(audit.auditor.map(|u| u.to_string()))
    .bind(audit.administrador.map(|u| u.to_string()))
    .bind(audit.quien_creo_qr.map(|u| u.to_string()))
    .bind(&audit.grupo)
    .bind(&audit.status)
    .bind(ts(audit.status_updated_at))
    .bind(audit.recovery_eligible_at.map(ts))
    .bind(audit.is_recovery as i64)
    .bind(audit.recovery_moved_at.map(ts))
    .bind(&audit.recovery_month)
    .bind(audit.recovery_deleted_at.map(ts))
    .bind(audit.is_liquidacion as i64)
    .bind(&audit.liquidacion_month)
    .bind(audit.liquidacion_deleted_at.map(ts))
    .bind(audit.is_recuperada as i64)
    .bind(audit.follow_up_notification_sent as i64)
    .bind(snapshot)
    .bind(audit.is_complete as i64)
    .bind(audit.fecha_creacion_qr.map(ts))
    .bind(history)
    .bind(ts(audit.created_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load one audit by id
pub async fn find_audit(pool: &SqlitePool, id: Uuid) -> Result<Option<AuditRecord>> {
    let row = sqlx::query("SELECT * FROM audits WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(audit_from_row).transpose()
}

/// Timer-based recovery promotion: audits in an eligibility status whose
/// `recoveryEligibleAt` has elapsed and that are not yet in recovery.
/// Returns only the rows this call actually changed.
pub async fn promote_eligible(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<PromotedAudit>> {
    let sql = format!(
        r#"
        UPDATE audits
        SET isRecovery = 1, recoveryMovedAt = ?, recoveryDeletedAt = NULL
        WHERE status IN ({})
          AND recoveryEligibleAt IS NOT NULL
          AND recoveryEligibleAt <= ?
          AND isRecovery != 1
        RETURNING id, status, statusUpdatedAt
        "#,
        placeholders(status::ELIGIBILITY_STATUSES.len())
    );

    let mut query = sqlx::query(&sql).bind(ts(now));
    for s in status::ELIGIBILITY_STATUSES {
        query = query.bind(*s);
    }
    let rows = query.bind(ts(now)).fetch_all(pool).await?;

    rows.iter()
        .map(|row| {
            Ok(PromotedAudit {
                id: uuid_from(row.get("id"))?,
                status: row.get("status"),
                status_updated_at: parse_ts(&row.get::<String, _>("statusUpdatedAt"))?,
            })
        })
        .collect()
}

/// Nightly Step A: sweep qualifying statuses into the current month's
/// recovery bucket
pub async fn nightly_recovery_intake(
    pool: &SqlitePool,
    now: DateTime<Utc>,
    month: &str,
) -> Result<u64> {
    let sql = format!(
        r#"
        UPDATE audits
        SET isRecovery = 1, recoveryMovedAt = ?, recoveryMonth = ?, recoveryDeletedAt = NULL
        WHERE status IN ({})
          AND isRecovery != 1
        "#,
        placeholders(status::NIGHTLY_RECOVERY_STATUSES.len())
    );

    let mut query = sqlx::query(&sql).bind(ts(now)).bind(month);
    for s in status::NIGHTLY_RECOVERY_STATUSES {
        query = query.bind(*s);
    }
    Ok(query.execute(pool).await?.rows_affected())
}

/// Nightly Step B: soft-delete finished audits out of the recovery view.
/// The row stays, only the view predicate changes.
pub async fn recovery_exit_on_done(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE audits
        SET isRecovery = 0, recoveryDeletedAt = ?
        WHERE lower(status) = lower(?)
          AND isRecovery = 1
        "#,
    )
    .bind(ts(now))
    .bind(status::QR_REALIZADO)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Nightly Step C: month-end archive of the month's recovery bucket
pub async fn archive_recovery_month(
    pool: &SqlitePool,
    month: &str,
    now: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE audits
        SET isRecovery = 0, recoveryDeletedAt = ?
        WHERE recoveryMonth = ?
          AND isRecovery = 1
        "#,
    )
    .bind(ts(now))
    .bind(month)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Liquidation intake: loaded audits move into the current month's
/// liquidation bucket
pub async fn liquidacion_intake(
    pool: &SqlitePool,
    month: &str,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE audits
        SET isLiquidacion = 1, liquidacionMonth = ?, liquidacionDeletedAt = NULL
        WHERE status = ?
          AND isLiquidacion != 1
        "#,
    )
    .bind(month)
    .bind(status::CARGADA)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Month-end archive of the month's liquidation bucket, parallel to the
/// recovery archive
pub async fn archive_liquidacion_month(
    pool: &SqlitePool,
    month: &str,
    now: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE audits
        SET isLiquidacion = 0, liquidacionDeletedAt = ?
        WHERE liquidacionMonth = ?
          AND isLiquidacion = 1
        "#,
    )
    .bind(ts(now))
    .bind(month)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Audits stuck in a needs-attention status since before `cutoff` that
/// have not been escalated yet
pub async fn find_stalled(pool: &SqlitePool, cutoff: DateTime<Utc>) -> Result<Vec<AuditRecord>> {
    let sql = format!(
        r#"
        SELECT * FROM audits
        WHERE status IN ({})
          AND statusUpdatedAt <= ?
          AND followUpNotificationSent != 1
        ORDER BY statusUpdatedAt ASC
        "#,
        placeholders(status::FOLLOW_UP_STATUSES.len())
    );

    let mut query = sqlx::query(&sql);
    for s in status::FOLLOW_UP_STATUSES {
        query = query.bind(*s);
    }
    let rows = query.bind(ts(cutoff)).fetch_all(pool).await?;
    rows.iter().map(audit_from_row).collect()
}

/// Close the current stall episode; conditional so a concurrent check
/// cannot escalate the same record twice
pub async fn mark_follow_up_sent(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE audits
        SET followUpNotificationSent = 1
        WHERE id = ?
          AND followUpNotificationSent != 1
        "#,
    )
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Write-once supervisor snapshot; a second attribution attempt is a no-op
pub async fn set_supervisor_snapshot(
    pool: &SqlitePool,
    id: Uuid,
    snapshot: &SupervisorSnapshot,
) -> Result<bool> {
    let json = serde_json::to_string(snapshot)
        .map_err(|e| Error::Internal(format!("Failed to serialize snapshot: {}", e)))?;

    let result = sqlx::query(
        r#"
        UPDATE audits
        SET supervisorSnapshot = ?
        WHERE id = ?
          AND supervisorSnapshot IS NULL
        "#,
    )
    .bind(json)
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}
