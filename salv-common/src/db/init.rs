//! Database initialization
//!
//! Creates the SQLite pool and the schema on first run. Timestamps are
//! stored as RFC3339 TEXT, booleans as INTEGER 0/1, embedded lists and
//! the supervisor snapshot as JSON TEXT. Column names are the external
//! reporting contract and must not be renamed.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL keeps concurrent scheduler ticks from serializing on reads
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// In-memory database for tests; same schema path as production
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_audits_table(pool).await?;
    create_users_table(pool).await?;
    Ok(())
}

async fn create_audits_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audits (
            id TEXT PRIMARY KEY,
            nombre TEXT NOT NULL,
            cuil TEXT NOT NULL,
            telefono TEXT,
            tipoVenta TEXT,
            obraSocialAnterior TEXT,
            obraSocialVendida TEXT,
            scheduledAt TIMESTAMP,
            asesor TEXT,
            validador TEXT,
            createdBy TEXT,
            auditor TEXT,
            administrador TEXT,
            quienCreoQr TEXT,
            grupo TEXT,
            status TEXT NOT NULL,
            statusUpdatedAt TIMESTAMP NOT NULL,
            recoveryEligibleAt TIMESTAMP,
            isRecovery INTEGER NOT NULL DEFAULT 0,
            recoveryMovedAt TIMESTAMP,
            recoveryMonth TEXT,
            recoveryDeletedAt TIMESTAMP,
            isLiquidacion INTEGER NOT NULL DEFAULT 0,
            liquidacionMonth TEXT,
            liquidacionDeletedAt TIMESTAMP,
            isRecuperada INTEGER NOT NULL DEFAULT 0,
            followUpNotificationSent INTEGER NOT NULL DEFAULT 0,
            supervisorSnapshot TEXT,
            isComplete INTEGER NOT NULL DEFAULT 0,
            fechaCreacionQr TIMESTAMP,
            statusHistory TEXT NOT NULL DEFAULT '[]',
            createdAt TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // The scheduler selection predicates all start from status
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_audits_status ON audits(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_audits_recovery ON audits(isRecovery, recoveryMonth)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            nombre TEXT NOT NULL,
            email TEXT,
            rol TEXT NOT NULL,
            equipo TEXT,
            grupo TEXT,
            activo INTEGER NOT NULL DEFAULT 1,
            historialEquipos TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_rol_equipo ON users(rol, equipo)")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_database_has_schema() {
        let pool = init_memory_database().await.unwrap();
        // Both tables queryable
        sqlx::query("SELECT COUNT(*) FROM audits").execute(&pool).await.unwrap();
        sqlx::query("SELECT COUNT(*) FROM users").execute(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_schema_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        create_schema(&pool).await.unwrap();
        create_schema(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_database_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("salv.db");
        let pool = init_database(&path).await.unwrap();
        assert!(path.exists());
        sqlx::query("SELECT COUNT(*) FROM audits").execute(&pool).await.unwrap();
    }
}
