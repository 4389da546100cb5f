//! Shared fixtures for engine integration tests
#![allow(dead_code)] // each test binary uses a subset of the helpers

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use salv_common::db::models::{AuditRecord, TeamHistoryPeriod, User};
use salv_common::Result;
use salv_engine::db::{audits, users};
use salv_engine::notify::NotificationGateway;

pub async fn test_pool() -> SqlitePool {
    salv_common::db::init_memory_database()
        .await
        .expect("in-memory database")
}

pub fn utc(s: &str) -> DateTime<Utc> {
    s.parse().expect("valid test timestamp")
}

pub fn hours_ago(now: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
    now - Duration::hours(hours)
}

/// Minimal audit with the given status; tweak fields per test
pub fn audit(status: &str, now: DateTime<Utc>) -> AuditRecord {
    AuditRecord {
        id: Uuid::new_v4(),
        nombre: "Afiliado Prueba".to_string(),
        cuil: "20-12345678-9".to_string(),
        telefono: Some("11-5555-0000".to_string()),
        tipo_venta: Some("traspaso".to_string()),
        obra_social_anterior: None,
        obra_social_vendida: None,
        scheduled_at: None,
        asesor: None,
        validador: None,
        created_by: None,
        auditor: None,
        administrador: None,
        quien_creo_qr: None,
        grupo: None,
        status: status.to_string(),
        status_updated_at: now,
        recovery_eligible_at: None,
        is_recovery: false,
        recovery_moved_at: None,
        recovery_month: None,
        recovery_deleted_at: None,
        is_liquidacion: false,
        liquidacion_month: None,
        liquidacion_deleted_at: None,
        is_recuperada: false,
        follow_up_notification_sent: false,
        supervisor_snapshot: None,
        is_complete: false,
        fecha_creacion_qr: None,
        status_history: Vec::new(),
        created_at: now,
    }
}

pub async fn seed_audit(pool: &SqlitePool, record: &AuditRecord) {
    audits::insert_audit(pool, record).await.expect("seed audit");
}

pub fn user(nombre: &str, rol: &str, equipo: Option<&str>) -> User {
    User {
        id: Uuid::new_v4(),
        nombre: nombre.to_string(),
        email: None,
        rol: rol.to_string(),
        equipo: equipo.map(str::to_string),
        grupo: None,
        activo: true,
        historial_equipos: Vec::new(),
    }
}

pub async fn seed_user(pool: &SqlitePool, record: &User) {
    users::insert_user(pool, record).await.expect("seed user");
}

pub fn period(equipo: &str, start: &str, end: Option<&str>) -> TeamHistoryPeriod {
    fn date(s: &str) -> DateTime<Utc> {
        utc(&format!("{}T00:00:00Z", s))
    }
    TeamHistoryPeriod {
        equipo: equipo.to_string(),
        fecha_inicio: date(start),
        fecha_fin: end.map(date),
    }
}

/// One captured dispatch
#[derive(Debug, Clone)]
pub struct Sent {
    pub recipients: Vec<Uuid>,
    pub subject: String,
    pub body: String,
}

/// Gateway that records every dispatch for assertions
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("gateway lock").clone()
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn send(&self, recipient_ids: &[Uuid], subject: &str, body: &str) -> Result<()> {
        self.sent.lock().expect("gateway lock").push(Sent {
            recipients: recipient_ids.to_vec(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Gateway whose every dispatch fails
pub struct FailingGateway;

#[async_trait]
impl NotificationGateway for FailingGateway {
    async fn send(&self, _recipient_ids: &[Uuid], _subject: &str, _body: &str) -> Result<()> {
        Err(salv_common::Error::Notification("injected failure".to_string()))
    }
}
