//! Point-in-time team resolution and timeline validation
//!
//! An advisor's team history is a list of `[fechaInicio, fechaFin)`
//! intervals; an open period (`fechaFin = NULL`) extends indefinitely
//! forward. Resolution answers "which team did this advisor belong to at
//! instant T", which is what historical attribution needs instead of the
//! advisor's current team.

use chrono::{DateTime, Utc};

use salv_common::db::models::TeamHistoryPeriod;

/// Team the advisor belonged to at `at`, if any period covers it
pub fn resolve_team_on(periods: &[TeamHistoryPeriod], at: DateTime<Utc>) -> Option<&str> {
    periods
        .iter()
        .find(|p| p.fecha_inicio <= at && p.fecha_fin.map_or(true, |end| at < end))
        .map(|p| p.equipo.as_str())
}

/// Validate one advisor's full timeline. Pure check; violations come back
/// as human-readable findings for the editing flow, nothing is mutated or
/// auto-corrected.
pub fn validate_history(periods: &[TeamHistoryPeriod]) -> Vec<String> {
    let mut errors = Vec::new();

    let open_count = periods.iter().filter(|p| p.fecha_fin.is_none()).count();
    if open_count > 1 {
        errors.push(format!(
            "El historial tiene {} períodos abiertos (sin fechaFin); a lo sumo uno puede estar abierto",
            open_count
        ));
    }

    for p in periods {
        if let Some(end) = p.fecha_fin {
            if p.fecha_inicio >= end {
                errors.push(format!(
                    "El período del equipo '{}' comienza el {} pero termina el {}",
                    p.equipo,
                    p.fecha_inicio.format("%Y-%m-%d"),
                    end.format("%Y-%m-%d")
                ));
            }
        }
    }

    // Open periods extend to a far-future sentinel for this comparison only
    for (i, a) in periods.iter().enumerate() {
        for b in periods.iter().skip(i + 1) {
            if overlaps(a, b) {
                errors.push(format!(
                    "Los períodos de los equipos '{}' (desde {}) y '{}' (desde {}) se superponen",
                    a.equipo,
                    a.fecha_inicio.format("%Y-%m-%d"),
                    b.equipo,
                    b.fecha_inicio.format("%Y-%m-%d")
                ));
            }
        }
    }

    errors
}

fn overlaps(a: &TeamHistoryPeriod, b: &TeamHistoryPeriod) -> bool {
    let a_end = a.fecha_fin.unwrap_or(DateTime::<Utc>::MAX_UTC);
    let b_end = b.fecha_fin.unwrap_or(DateTime::<Utc>::MAX_UTC);
    a.fecha_inicio < b_end && a_end > b.fecha_inicio
}
