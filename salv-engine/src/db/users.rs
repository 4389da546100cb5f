//! User lookups: advisors, supervisors, reseller recipients

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use salv_common::db::models::{rol, TeamHistoryPeriod, User};
use salv_common::{Error, Result};

use super::placeholders;

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let id: String = row.get("id");
    let history: String = row.get("historialEquipos");
    let historial_equipos: Vec<TeamHistoryPeriod> = serde_json::from_str(&history)
        .map_err(|e| Error::InvalidInput(format!("Bad historialEquipos JSON: {}", e)))?;

    Ok(User {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::InvalidInput(format!("Bad stored uuid '{}': {}", id, e)))?,
        nombre: row.get("nombre"),
        email: row.get("email"),
        rol: row.get("rol"),
        equipo: row.get("equipo"),
        grupo: row.get("grupo"),
        activo: row.get::<i64, _>("activo") != 0,
        historial_equipos,
    })
}

/// Insert a user (admin tooling and tests)
pub async fn insert_user(pool: &SqlitePool, user: &User) -> Result<()> {
    let history = serde_json::to_string(&user.historial_equipos)
        .map_err(|e| Error::Internal(format!("Failed to serialize historialEquipos: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO users (id, nombre, email, rol, equipo, grupo, activo, historialEquipos)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id.to_string())
    .bind(&user.nombre)
    .bind(&user.email)
    .bind(&user.rol)
    .bind(&user.equipo)
    .bind(&user.grupo)
    .bind(user.activo as i64)
    .bind(history)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load one user by id
pub async fn find_user(pool: &SqlitePool, id: Uuid) -> Result<Option<User>> {
    let row = sqlx::query("SELECT * FROM users WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(user_from_row).transpose()
}

/// Active reseller recipients for recovery promotion notifications
pub async fn active_reseller_ids(pool: &SqlitePool) -> Result<Vec<Uuid>> {
    let rows = sqlx::query("SELECT id FROM users WHERE rol = ? AND activo = 1")
        .bind(rol::REVENDEDOR)
        .fetch_all(pool)
        .await?;
    rows.iter()
        .map(|row| {
            let id: String = row.get("id");
            Uuid::parse_str(&id)
                .map_err(|e| Error::InvalidInput(format!("Bad stored uuid '{}': {}", id, e)))
        })
        .collect()
}

/// Active supervisor (or team-lead) of the given team, matched
/// case-insensitively on the team name
pub async fn find_supervisor_by_team(pool: &SqlitePool, equipo: &str) -> Result<Option<User>> {
    let sql = format!(
        r#"
        SELECT * FROM users
        WHERE rol IN ({})
          AND activo = 1
          AND equipo IS NOT NULL
          AND lower(equipo) = lower(?)
        ORDER BY nombre ASC
        LIMIT 1
        "#,
        placeholders(rol::SUPERVISOR_ROLES.len())
    );

    let mut query = sqlx::query(&sql);
    for r in rol::SUPERVISOR_ROLES {
        query = query.bind(*r);
    }
    let row = query.bind(equipo).fetch_optional(pool).await?;
    row.as_ref().map(user_from_row).transpose()
}

/// Secondary resolution path: match the audit's stored group reference
/// against the supervisor's team first, then against their group field
pub async fn find_supervisor_by_group(pool: &SqlitePool, grupo: &str) -> Result<Option<User>> {
    if let Some(user) = find_supervisor_by_team(pool, grupo).await? {
        return Ok(Some(user));
    }

    let sql = format!(
        r#"
        SELECT * FROM users
        WHERE rol IN ({})
          AND activo = 1
          AND grupo IS NOT NULL
          AND lower(grupo) = lower(?)
        ORDER BY nombre ASC
        LIMIT 1
        "#,
        placeholders(rol::SUPERVISOR_ROLES.len())
    );

    let mut query = sqlx::query(&sql);
    for r in rol::SUPERVISOR_ROLES {
        query = query.bind(*r);
    }
    let row = query.bind(grupo).fetch_optional(pool).await?;
    row.as_ref().map(user_from_row).transpose()
}
