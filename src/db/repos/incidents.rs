use rusqlite::{params, Row};

use crate::db::models::{CreateIncidentInput, Incident, Severity};
use crate::db::repos::venues;
use crate::db::DbPool;
use crate::error::AppError;
use crate::notifications::{self, IncidentNotifier};
use crate::validation::{Validator, MAX_NOTES_LEN};

fn row_to_incident(row: &Row) -> rusqlite::Result<Incident> {
    Ok(Incident {
        id: row.get("id")?,
        venue_id: row.get("venue_id")?,
        event_id: row.get("event_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        severity: Severity::from_str_or_default(&row.get::<_, String>("severity")?),
        reported_by: row.get("reported_by")?,
        action_taken: row.get("action_taken")?,
        is_resolved: row.get::<_, i32>("is_resolved")? != 0,
        resolved_at: row.get("resolved_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<Incident, AppError> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT * FROM incidents WHERE id = ?1",
        params![id],
        row_to_incident,
    )
    .map_err(|e| AppError::from_missing(e, format!("Incident {id}")))
}

/// Incidents at a venue, open ones first, newest first within each group.
pub fn get_by_venue(
    pool: &DbPool,
    venue_id: &str,
    unresolved_only: bool,
) -> Result<Vec<Incident>, AppError> {
    let conn = pool.get()?;
    let sql = if unresolved_only {
        "SELECT * FROM incidents WHERE venue_id = ?1 AND is_resolved = 0 ORDER BY created_at DESC"
    } else {
        "SELECT * FROM incidents WHERE venue_id = ?1 ORDER BY is_resolved, created_at DESC"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![venue_id], row_to_incident)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

pub fn get_by_event(pool: &DbPool, event_id: &str) -> Result<Vec<Incident>, AppError> {
    let conn = pool.get()?;
    let mut stmt =
        conn.prepare("SELECT * FROM incidents WHERE event_id = ?1 ORDER BY created_at DESC")?;
    let rows = stmt.query_map(params![event_id], row_to_incident)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

/// Record an incident. High and critical incidents are handed to `notifier`
/// after the row is stored.
pub fn create(
    pool: &DbPool,
    input: CreateIncidentInput,
    notifier: &dyn IncidentNotifier,
) -> Result<Incident, AppError> {
    let mut v = Validator::new();
    v.name("title", &input.title);
    if let Some(ref d) = input.description {
        v.max_len("description", d, MAX_NOTES_LEN);
    }
    v.finish()?;

    let venue = venues::get_by_id(pool, &input.venue_id)?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let severity = input.severity.unwrap_or_default();

    {
        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO incidents (id, venue_id, event_id, title, description, severity, reported_by, is_resolved, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)",
            params![
                id,
                input.venue_id,
                input.event_id,
                input.title.trim(),
                input.description,
                severity.as_str(),
                input.reported_by,
                now
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(f, _)
                if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
            {
                AppError::NotFound(format!(
                    "Event {}",
                    input.event_id.as_deref().unwrap_or_default()
                ))
            }
            other => AppError::Database(other),
        })?;
    }

    let incident = get_by_id(pool, &id)?;
    tracing::info!(incident_id = %id, venue_id = %venue.id, severity = severity.as_str(), "Incident reported");
    notifications::notify_incident_reported(notifier, &venue.name, &incident);
    Ok(incident)
}

pub fn resolve(pool: &DbPool, id: &str, action_taken: &str) -> Result<Incident, AppError> {
    let mut v = Validator::new();
    v.non_empty("action_taken", action_taken);
    v.max_len("action_taken", action_taken, MAX_NOTES_LEN);
    v.finish()?;

    let current = get_by_id(pool, id)?;
    if current.is_resolved {
        return Err(AppError::InvalidOperation(format!(
            "Incident {id} is already resolved"
        )));
    }

    let now = chrono::Utc::now().to_rfc3339();
    {
        let conn = pool.get()?;
        conn.execute(
            "UPDATE incidents SET is_resolved = 1, action_taken = ?1, resolved_at = ?2, updated_at = ?2 WHERE id = ?3",
            params![action_taken.trim(), now, id],
        )?;
    }
    get_by_id(pool, id)
}

pub fn delete(pool: &DbPool, id: &str) -> Result<bool, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute("DELETE FROM incidents WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}
