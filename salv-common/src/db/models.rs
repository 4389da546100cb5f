//! Persisted models for audits and users
//!
//! Column names in the store (camelCase, Spanish domain terms) are
//! contract-significant for reporting/export tooling; the Rust structs use
//! snake_case and the query layer maps between the two.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain status labels and the status sets the schedulers select on
pub mod status {
    pub const PENDIENTE: &str = "Pendiente";
    pub const FALTA_CLAVE: &str = "Falta clave";
    pub const FALTA_DOCUMENTACION: &str = "Falta documentación";
    pub const FALTA_CLAVE_Y_DOC: &str = "Falta clave y documentación";
    pub const RECHAZADA: &str = "Rechazada";
    pub const QR_REALIZADO: &str = "QR realizado";
    pub const CARGADA: &str = "Cargada";
    pub const APROBADA: &str = "Aprobada";
    pub const NO_CONTESTA: &str = "No contesta";
    pub const LO_PIENSA: &str = "Lo piensa";
    pub const SE_CORTA: &str = "Se corta";
    pub const NO_RECIBE_MENSAJES: &str = "No recibe mensajes";

    /// Statuses eligible for the timer-based recovery promotion path
    pub const ELIGIBILITY_STATUSES: &[&str] = &[FALTA_CLAVE, RECHAZADA, FALTA_DOCUMENTACION];

    /// Statuses swept into recovery by the nightly intake step.
    ///
    /// TODO: confirm with product whether this set should match
    /// ELIGIBILITY_STATUSES; the two promotion paths use different sets
    /// and are kept separate until that is clarified.
    pub const NIGHTLY_RECOVERY_STATUSES: &[&str] =
        &[FALTA_CLAVE, FALTA_DOCUMENTACION, FALTA_CLAVE_Y_DOC, PENDIENTE];

    /// Needs-attention statuses watched by the follow-up escalator
    pub const FOLLOW_UP_STATUSES: &[&str] = &[
        FALTA_DOCUMENTACION,
        FALTA_CLAVE,
        FALTA_CLAVE_Y_DOC,
        NO_CONTESTA,
        LO_PIENSA,
        SE_CORTA,
        NO_RECIBE_MENSAJES,
    ];

    /// Terminal "QR done" check; the label is compared case-insensitively
    /// because legacy rows carry inconsistent casing
    pub fn is_qr_done(status: &str) -> bool {
        status.eq_ignore_ascii_case(QR_REALIZADO)
    }

    /// Suggested next action included in follow-up reminders
    pub fn suggested_action(status: &str) -> &'static str {
        match status {
            FALTA_DOCUMENTACION => "reclamar la documentación pendiente al afiliado",
            FALTA_CLAVE => "gestionar la clave fiscal con el afiliado",
            FALTA_CLAVE_Y_DOC => "gestionar clave y documentación pendientes",
            NO_CONTESTA => "reintentar el contacto en otra franja horaria",
            LO_PIENSA => "hacer seguimiento de la decisión del afiliado",
            SE_CORTA => "volver a llamar y confirmar los datos de contacto",
            NO_RECIBE_MENSAJES => "verificar el número y probar otro canal",
            _ => "revisar el caso y registrar el próximo paso",
        }
    }
}

/// User roles as stored in the `rol` column
pub mod rol {
    pub const ASESOR: &str = "asesor";
    pub const SUPERVISOR: &str = "supervisor";
    pub const LIDER_EQUIPO: &str = "lider de equipo";
    pub const REVENDEDOR: &str = "revendedor";
    pub const ADMINISTRADOR: &str = "administrador";

    /// Roles accepted as "the supervisor of a team"
    pub const SUPERVISOR_ROLES: &[&str] = &[SUPERVISOR, LIDER_EQUIPO];
}

/// Immutable supervisor attribution captured when an audit is finalized.
/// Serialized as-is into the `supervisorSnapshot` JSON column; never
/// recomputed afterward so historical reports stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorSnapshot {
    pub id: Uuid,
    pub nombre: String,
    pub equipo: String,
}

/// One entry of the audit's status-history log (`statusHistory` JSON column)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: String,
    pub changed_at: DateTime<Utc>,
}

/// One contiguous interval of an advisor's team membership
/// (`historialEquipos` JSON column on users)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamHistoryPeriod {
    pub equipo: String,
    pub fecha_inicio: DateTime<Utc>,
    /// None means the period is still open (current team)
    pub fecha_fin: Option<DateTime<Utc>>,
}

/// Derived read-side state over the recovery soft-delete fields, so view
/// predicates are defined once instead of re-derived at each call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryView {
    /// Never entered recovery, or not currently in it
    Active,
    /// Visible in the recovery bucket
    InRecovery,
    /// Left recovery by reaching the terminal QR status
    RecoveredOut,
    /// Soft-deleted by the month-end archive
    Archived,
}

/// One sales audit under review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub nombre: String,
    pub cuil: String,
    pub telefono: Option<String>,
    pub tipo_venta: Option<String>,
    pub obra_social_anterior: Option<String>,
    pub obra_social_vendida: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,

    // Actor references, nullable until assigned
    pub asesor: Option<Uuid>,
    pub validador: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub auditor: Option<Uuid>,
    pub administrador: Option<Uuid>,
    pub quien_creo_qr: Option<Uuid>,

    /// Stored group reference, fallback input for team resolution
    pub grupo: Option<String>,

    pub status: String,
    pub status_updated_at: DateTime<Utc>,

    // Recovery sub-state
    pub recovery_eligible_at: Option<DateTime<Utc>>,
    pub is_recovery: bool,
    pub recovery_moved_at: Option<DateTime<Utc>>,
    pub recovery_month: Option<String>,
    pub recovery_deleted_at: Option<DateTime<Utc>>,

    // Liquidation sub-state, structurally parallel to recovery
    pub is_liquidacion: bool,
    pub liquidacion_month: Option<String>,
    pub liquidacion_deleted_at: Option<DateTime<Utc>>,

    /// Manually-set salvage flag; only written through the admin tooling
    pub is_recuperada: bool,
    /// One-shot idempotency flag for the follow-up escalator
    pub follow_up_notification_sent: bool,

    pub supervisor_snapshot: Option<SupervisorSnapshot>,

    /// Whether all required evidence is attached; owned by the multimedia
    /// subsystem, read-only here
    pub is_complete: bool,

    /// Explicit QR creation date, first rung of the reference-date chain
    pub fecha_creacion_qr: Option<DateTime<Utc>>,
    pub status_history: Vec<StatusChange>,

    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Derived recovery view state
    pub fn recovery_view(&self) -> RecoveryView {
        if self.is_recovery {
            return RecoveryView::InRecovery;
        }
        match self.recovery_deleted_at {
            Some(_) if status::is_qr_done(&self.status) => RecoveryView::RecoveredOut,
            Some(_) => RecoveryView::Archived,
            None => RecoveryView::Active,
        }
    }

    /// Whether the record is visible in the liquidation view
    pub fn in_liquidacion_view(&self) -> bool {
        self.is_liquidacion && self.liquidacion_deleted_at.is_none()
    }
}

/// A platform user (advisor, supervisor, reseller, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub nombre: String,
    pub email: Option<String>,
    pub rol: String,
    /// Current team; team history lives in `historial_equipos`
    pub equipo: Option<String>,
    pub grupo: Option<String>,
    pub activo: bool,
    pub historial_equipos: Vec<TeamHistoryPeriod>,
}
