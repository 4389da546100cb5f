//! Nightly sweep: intake, exit, month-end archive, step ordering

mod helpers;

use chrono_tz::America::Argentina::Buenos_Aires;
use helpers::*;
use salv_common::db::models::{status, RecoveryView};
use salv_engine::db::audits;
use salv_engine::services::nightly;

#[tokio::test]
async fn intake_moves_qualifying_audit_into_month_bucket() {
    let pool = test_pool().await;
    let now = utc("2025-11-15T20:00:00Z");

    let record = audit(status::PENDIENTE, hours_ago(now, 30));
    seed_audit(&pool, &record).await;

    let outcome = nightly::run_sweep(&pool, Buenos_Aires, now).await;
    assert_eq!(outcome.intake, 1);
    assert_eq!(outcome.archived, 0);

    let stored = audits::find_audit(&pool, record.id).await.unwrap().unwrap();
    assert!(stored.is_recovery);
    assert_eq!(stored.recovery_month.as_deref(), Some("2025-11"));
    assert_eq!(stored.recovery_moved_at, Some(now));
}

#[tokio::test]
async fn finished_audit_exits_recovery_without_losing_the_row() {
    let pool = test_pool().await;
    let now = utc("2025-11-15T20:00:00Z");

    // Legacy casing on purpose; the exit matches case-insensitively
    let mut record = audit("qr Realizado", hours_ago(now, 48));
    record.is_recovery = true;
    record.recovery_month = Some("2025-11".to_string());
    record.recovery_moved_at = Some(hours_ago(now, 48));
    seed_audit(&pool, &record).await;

    let outcome = nightly::run_sweep(&pool, Buenos_Aires, now).await;
    assert_eq!(outcome.exited, 1);

    let stored = audits::find_audit(&pool, record.id).await.unwrap().unwrap();
    assert!(!stored.is_recovery);
    assert_eq!(stored.recovery_deleted_at, Some(now));
    assert_eq!(stored.recovery_view(), RecoveryView::RecoveredOut);
    // The row itself survives, only the view predicate changed
    assert_eq!(stored.recovery_month.as_deref(), Some("2025-11"));
}

#[tokio::test]
async fn recovery_flag_and_soft_delete_are_mutually_exclusive() {
    let pool = test_pool().await;
    let now = utc("2025-11-30T20:00:00Z");

    let pending = audit(status::PENDIENTE, hours_ago(now, 10));
    seed_audit(&pool, &pending).await;
    let mut done = audit(status::QR_REALIZADO, hours_ago(now, 10));
    done.is_recovery = true;
    done.recovery_month = Some("2025-11".to_string());
    seed_audit(&pool, &done).await;

    nightly::run_sweep(&pool, Buenos_Aires, now).await;

    for id in [pending.id, done.id] {
        let stored = audits::find_audit(&pool, id).await.unwrap().unwrap();
        assert!(
            !(stored.is_recovery && stored.recovery_deleted_at.is_some()),
            "audit {} is both in recovery and soft-deleted",
            id
        );
    }
}

#[tokio::test]
async fn re_entry_after_month_end_archive_opens_a_clean_episode() {
    let pool = test_pool().await;
    let eom = utc("2025-11-30T20:00:00Z");

    // Still stuck in a qualifying status when November is archived
    let record = audit(status::PENDIENTE, hours_ago(eom, 10));
    seed_audit(&pool, &record).await;

    let outcome = nightly::run_sweep(&pool, Buenos_Aires, eom).await;
    assert_eq!(outcome.intake, 1);
    assert_eq!(outcome.archived, 1);

    // Next night: the audit re-enters the December bucket and the old
    // soft-delete marker must not survive into the new episode
    let next = utc("2025-12-01T20:00:00Z");
    let outcome = nightly::run_sweep(&pool, Buenos_Aires, next).await;
    assert_eq!(outcome.intake, 1);

    let stored = audits::find_audit(&pool, record.id).await.unwrap().unwrap();
    assert!(stored.is_recovery);
    assert_eq!(stored.recovery_deleted_at, None);
    assert_eq!(stored.recovery_month.as_deref(), Some("2025-12"));
    assert_eq!(stored.recovery_view(), RecoveryView::InRecovery);
}

#[tokio::test]
async fn month_end_archive_fires_only_on_last_local_day() {
    let pool = test_pool().await;

    let mut record = audit(status::FALTA_CLAVE, utc("2025-11-01T12:00:00Z"));
    record.is_recovery = true;
    record.recovery_month = Some("2025-11".to_string());
    seed_audit(&pool, &record).await;

    // Mid-month: Step C does not run
    let mid = nightly::run_sweep(&pool, Buenos_Aires, utc("2025-11-15T20:00:00Z")).await;
    assert_eq!(mid.archived, 0);
    let stored = audits::find_audit(&pool, record.id).await.unwrap().unwrap();
    assert!(stored.is_recovery);
    assert!(stored.recovery_deleted_at.is_none());

    // Last local day of November
    let eom = utc("2025-11-30T20:00:00Z");
    let outcome = nightly::run_sweep(&pool, Buenos_Aires, eom).await;
    assert_eq!(outcome.archived, 1);
    let stored = audits::find_audit(&pool, record.id).await.unwrap().unwrap();
    assert!(!stored.is_recovery);
    assert_eq!(stored.recovery_deleted_at, Some(eom));
    assert_eq!(stored.recovery_view(), RecoveryView::Archived);
}

#[tokio::test]
async fn archive_uses_org_timezone_for_the_month_boundary() {
    let pool = test_pool().await;

    let mut record = audit(status::FALTA_CLAVE, utc("2025-11-01T12:00:00Z"));
    record.is_recovery = true;
    record.recovery_month = Some("2025-11".to_string());
    seed_audit(&pool, &record).await;

    // 2025-12-01 01:30 UTC is still Nov 30 in Buenos Aires: archive runs
    let outcome = nightly::run_sweep(&pool, Buenos_Aires, utc("2025-12-01T01:30:00Z")).await;
    assert_eq!(outcome.archived, 1);
}

#[tokio::test]
async fn archive_leaves_other_month_buckets_alone() {
    let pool = test_pool().await;
    let eom = utc("2025-11-30T20:00:00Z");

    let mut stale = audit(status::FALTA_CLAVE, utc("2025-10-05T12:00:00Z"));
    stale.is_recovery = true;
    stale.recovery_month = Some("2025-10".to_string());
    seed_audit(&pool, &stale).await;

    let outcome = nightly::run_sweep(&pool, Buenos_Aires, eom).await;
    assert_eq!(outcome.archived, 0);

    let stored = audits::find_audit(&pool, stale.id).await.unwrap().unwrap();
    assert!(stored.is_recovery);
}

#[tokio::test]
async fn intake_runs_before_archive_within_one_sweep() {
    let pool = test_pool().await;
    let eom = utc("2025-11-30T20:00:00Z");

    // Newly qualifying on the last day of the month: Step A pulls it into
    // the November bucket, Step C archives that bucket in the same sweep
    let record = audit(status::PENDIENTE, hours_ago(eom, 6));
    seed_audit(&pool, &record).await;

    let outcome = nightly::run_sweep(&pool, Buenos_Aires, eom).await;
    assert_eq!(outcome.intake, 1);
    assert_eq!(outcome.archived, 1);

    let stored = audits::find_audit(&pool, record.id).await.unwrap().unwrap();
    assert!(!stored.is_recovery);
    assert_eq!(stored.recovery_deleted_at, Some(eom));
    assert_eq!(stored.recovery_month.as_deref(), Some("2025-11"));
}
