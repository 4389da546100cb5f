//! Liquidation sweep: monthly bucket intake and month-end archive

mod helpers;

use chrono_tz::America::Argentina::Buenos_Aires;
use helpers::*;
use salv_common::db::models::status;
use salv_engine::db::audits;
use salv_engine::services::liquidacion;

#[tokio::test]
async fn loaded_audit_enters_current_liquidation_bucket() {
    let pool = test_pool().await;
    let now = utc("2025-11-15T20:00:00Z");

    let record = audit(status::CARGADA, hours_ago(now, 5));
    seed_audit(&pool, &record).await;

    let outcome = liquidacion::run_sweep(&pool, Buenos_Aires, now).await;
    assert_eq!(outcome.intake, 1);

    let stored = audits::find_audit(&pool, record.id).await.unwrap().unwrap();
    assert!(stored.is_liquidacion);
    assert_eq!(stored.liquidacion_month.as_deref(), Some("2025-11"));
    assert!(stored.in_liquidacion_view());
}

#[tokio::test]
async fn sweep_is_idempotent_for_already_bucketed_audits() {
    let pool = test_pool().await;
    let now = utc("2025-11-15T20:00:00Z");

    let record = audit(status::CARGADA, hours_ago(now, 5));
    seed_audit(&pool, &record).await;

    assert_eq!(liquidacion::run_sweep(&pool, Buenos_Aires, now).await.intake, 1);
    assert_eq!(liquidacion::run_sweep(&pool, Buenos_Aires, now).await.intake, 0);
}

#[tokio::test]
async fn month_end_archives_the_bucket() {
    let pool = test_pool().await;
    let eom = utc("2025-11-30T20:00:00Z");

    let mut record = audit(status::CARGADA, utc("2025-11-10T12:00:00Z"));
    record.is_liquidacion = true;
    record.liquidacion_month = Some("2025-11".to_string());
    seed_audit(&pool, &record).await;

    let outcome = liquidacion::run_sweep(&pool, Buenos_Aires, eom).await;
    assert_eq!(outcome.archived, 1);

    let stored = audits::find_audit(&pool, record.id).await.unwrap().unwrap();
    assert!(!stored.is_liquidacion);
    assert_eq!(stored.liquidacion_deleted_at, Some(eom));
    assert!(!stored.in_liquidacion_view());
}

#[tokio::test]
async fn re_intake_after_archive_clears_the_soft_delete() {
    let pool = test_pool().await;
    let eom = utc("2025-11-30T20:00:00Z");

    // Still Cargada when November is archived
    let record = audit(status::CARGADA, hours_ago(eom, 10));
    seed_audit(&pool, &record).await;

    let outcome = liquidacion::run_sweep(&pool, Buenos_Aires, eom).await;
    assert_eq!(outcome.intake, 1);
    assert_eq!(outcome.archived, 1);

    // Next day it re-enters December's bucket with a clean marker
    let outcome = liquidacion::run_sweep(&pool, Buenos_Aires, utc("2025-12-01T20:00:00Z")).await;
    assert_eq!(outcome.intake, 1);

    let stored = audits::find_audit(&pool, record.id).await.unwrap().unwrap();
    assert!(stored.is_liquidacion);
    assert_eq!(stored.liquidacion_deleted_at, None);
    assert_eq!(stored.liquidacion_month.as_deref(), Some("2025-12"));
    assert!(stored.in_liquidacion_view());
}

#[tokio::test]
async fn mid_month_sweep_does_not_archive() {
    let pool = test_pool().await;
    let now = utc("2025-11-15T20:00:00Z");

    let mut record = audit(status::CARGADA, utc("2025-11-10T12:00:00Z"));
    record.is_liquidacion = true;
    record.liquidacion_month = Some("2025-11".to_string());
    seed_audit(&pool, &record).await;

    let outcome = liquidacion::run_sweep(&pool, Buenos_Aires, now).await;
    assert_eq!(outcome.archived, 0);
    let stored = audits::find_audit(&pool, record.id).await.unwrap().unwrap();
    assert!(stored.is_liquidacion);
}
