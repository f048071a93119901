use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{CreateEventInput, Event, UpdateEventInput};
use crate::db::DbPool;
use crate::error::AppError;
use crate::validation::{Validator, MAX_NOTES_LEN};

fn row_to_event(row: &Row) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get("id")?,
        venue_id: row.get("venue_id")?,
        event_type_id: row.get("event_type_id")?,
        date: row.get("date")?,
        total_attendance: row.get("total_attendance")?,
        total_capacity: row.get("total_capacity")?,
        is_locked: row.get::<_, i32>("is_locked")? != 0,
        counted_by: row.get("counted_by")?,
        notes: row.get("notes")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<Event, AppError> {
    let conn = pool.get()?;
    conn.query_row("SELECT * FROM events WHERE id = ?1", params![id], row_to_event)
        .map_err(|e| AppError::from_missing(e, format!("Event {id}")))
}

/// Events at a venue, newest first.
pub fn get_by_venue(pool: &DbPool, venue_id: &str, limit: u32) -> Result<Vec<Event>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM events WHERE venue_id = ?1 ORDER BY date DESC, created_at DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![venue_id, limit], row_to_event)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

/// Events at a venue with `from <= date <= to` (inclusive, `YYYY-MM-DD`).
pub fn get_by_venue_between(
    pool: &DbPool,
    venue_id: &str,
    from: &str,
    to: &str,
) -> Result<Vec<Event>, AppError> {
    let mut v = Validator::new();
    v.date("from", from);
    v.date("to", to);
    v.finish()?;

    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM events WHERE venue_id = ?1 AND date BETWEEN ?2 AND ?3 ORDER BY date, created_at",
    )?;
    let rows = stmt.query_map(params![venue_id, from, to], row_to_event)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

/// Create an event together with one area count per active area template
/// of the venue. Each count starts at zero with the template's current
/// capacity copied in.
pub fn create(pool: &DbPool, input: CreateEventInput) -> Result<Event, AppError> {
    let mut v = Validator::new();
    v.non_empty("venue_id", &input.venue_id);
    v.date("date", &input.date);
    if let Some(ref notes) = input.notes {
        v.max_len("notes", notes, MAX_NOTES_LEN);
    }
    v.finish()?;

    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    let venue_active: Option<i32> = tx
        .query_row(
            "SELECT is_active FROM venues WHERE id = ?1",
            params![input.venue_id],
            |row| row.get(0),
        )
        .optional()?;
    match venue_active {
        None => return Err(AppError::NotFound(format!("Venue {}", input.venue_id))),
        Some(0) => {
            return Err(AppError::InvalidOperation(format!(
                "Venue {} is inactive",
                input.venue_id
            )))
        }
        Some(_) => {}
    }

    if let Some(ref type_id) = input.event_type_id {
        let exists: Option<String> = tx
            .query_row(
                "SELECT id FROM event_types WHERE id = ?1",
                params![type_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!("EventType {type_id}")));
        }
    }

    let areas: Vec<(String, i64)> = {
        let mut stmt = tx.prepare(
            "SELECT id, capacity FROM area_templates
             WHERE venue_id = ?1 AND is_active = 1
             ORDER BY sort_order, created_at",
        )?;
        let rows = stmt.query_map(params![input.venue_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };
    if areas.is_empty() {
        return Err(AppError::InvalidOperation(format!(
            "Venue {} has no active areas to count",
            input.venue_id
        )));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let total_capacity: i64 = areas.iter().map(|(_, cap)| cap).sum();

    tx.execute(
        "INSERT INTO events (id, venue_id, event_type_id, date, total_attendance, total_capacity, is_locked, counted_by, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, 0, ?6, ?7, ?8, ?8)",
        params![
            id,
            input.venue_id,
            input.event_type_id,
            input.date,
            total_capacity,
            input.counted_by,
            input.notes,
            now
        ],
    )?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO area_counts (id, event_id, area_template_id, count, capacity, notes, history, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, NULL, '[]', ?5)",
        )?;
        for (area_id, capacity) in &areas {
            stmt.execute(params![
                uuid::Uuid::new_v4().to_string(),
                id,
                area_id,
                capacity,
                now
            ])?;
        }
    }

    tx.commit()?;
    drop(conn);

    tracing::info!(event_id = %id, venue_id = %input.venue_id, date = %input.date, areas = areas.len(), "Created event");
    get_by_id(pool, &id)
}

/// Edit descriptive fields. Locked events are read-only.
pub fn update(pool: &DbPool, id: &str, input: UpdateEventInput) -> Result<Event, AppError> {
    let current = get_by_id(pool, id)?;
    if current.is_locked {
        return Err(AppError::Locked(format!("Event {id}")));
    }

    let mut v = Validator::new();
    if let Some(Some(ref notes)) = input.notes {
        v.max_len("notes", notes, MAX_NOTES_LEN);
    }
    v.finish()?;

    let now = chrono::Utc::now().to_rfc3339();
    let conn = pool.get()?;
    conn.execute(
        "UPDATE events SET event_type_id = ?1, counted_by = ?2, notes = ?3, updated_at = ?4 WHERE id = ?5",
        params![
            input.event_type_id.unwrap_or(current.event_type_id),
            input.counted_by.unwrap_or(current.counted_by),
            input.notes.unwrap_or(current.notes),
            now,
            id
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            AppError::NotFound("EventType".into())
        }
        other => AppError::Database(other),
    })?;

    get_by_id(pool, id)
}

pub fn set_locked(pool: &DbPool, id: &str, locked: bool) -> Result<Event, AppError> {
    let conn = pool.get()?;
    let now = chrono::Utc::now().to_rfc3339();
    let rows = conn.execute(
        "UPDATE events SET is_locked = ?1, updated_at = ?2 WHERE id = ?3",
        params![locked as i32, now, id],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("Event {id}")));
    }
    tracing::info!(event_id = %id, locked, "Event lock changed");
    drop(conn);
    get_by_id(pool, id)
}

/// Recompute `total_attendance` and `total_capacity` from the event's area
/// counts. Runs on the caller's connection so it can share a transaction
/// with the count write. Returns the new attendance total.
pub(crate) fn recompute_totals(conn: &Connection, id: &str, now: &str) -> Result<i64, AppError> {
    let (attendance, capacity): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(count), 0), COALESCE(SUM(capacity), 0) FROM area_counts WHERE event_id = ?1",
        params![id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    conn.execute(
        "UPDATE events SET total_attendance = ?1, total_capacity = ?2, updated_at = ?3 WHERE id = ?4",
        params![attendance, capacity, now, id],
    )?;
    Ok(attendance)
}

/// Reconcile an event's totals with its area counts.
pub fn refresh_totals(pool: &DbPool, id: &str) -> Result<Event, AppError> {
    get_by_id(pool, id)?;
    {
        let conn = pool.get()?;
        recompute_totals(&conn, id, &chrono::Utc::now().to_rfc3339())?;
    }
    get_by_id(pool, id)
}

/// Delete the event; its area counts go with it.
pub fn delete(pool: &DbPool, id: &str) -> Result<bool, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute("DELETE FROM events WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use crate::db::init_test_db;
    use crate::db::repos::{area_counts, area_templates, venues};

    #[test]
    fn test_create_snapshots_active_areas() {
        let pool = init_test_db().unwrap();
        let v = fixtures::venue(&pool, "MC");
        let a = fixtures::area(&pool, &v.id, "A", 200);
        fixtures::area(&pool, &v.id, "B", 100);
        let retired = fixtures::area(&pool, &v.id, "Old Wing", 75);
        area_templates::remove(&pool, &retired.id).unwrap();

        let e = fixtures::event(&pool, &v.id, "2024-03-10");
        assert_eq!(e.total_attendance, 0);
        assert_eq!(e.total_capacity, 300);
        assert!(!e.is_locked);
        assert_eq!(e.counted_by.as_deref(), Some("usher"));

        let counts = area_counts::get_by_event(&pool, &e.id).unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].area_template_id, a.id);
        assert_eq!(counts[0].capacity, 200);
        assert!(counts.iter().all(|c| c.count == 0 && c.history.is_empty()));
    }

    #[test]
    fn test_create_rejects_bad_input() {
        let pool = init_test_db().unwrap();
        let v = fixtures::venue(&pool, "MC");

        let no_areas = create(
            &pool,
            CreateEventInput {
                venue_id: v.id.clone(),
                event_type_id: None,
                date: "2024-03-10".into(),
                counted_by: None,
                notes: None,
            },
        );
        assert!(matches!(no_areas, Err(AppError::InvalidOperation(_))));

        fixtures::area(&pool, &v.id, "A", 10);
        let bad_date = create(
            &pool,
            CreateEventInput {
                venue_id: v.id.clone(),
                event_type_id: None,
                date: "10/03/2024".into(),
                counted_by: None,
                notes: None,
            },
        );
        assert!(matches!(bad_date, Err(AppError::Validation(_))));

        let bad_type = create(
            &pool,
            CreateEventInput {
                venue_id: v.id.clone(),
                event_type_id: Some("nope".into()),
                date: "2024-03-10".into(),
                counted_by: None,
                notes: None,
            },
        );
        assert!(matches!(bad_type, Err(AppError::NotFound(_))));

        venues::set_active(&pool, &v.id, false).unwrap();
        let inactive = create(
            &pool,
            CreateEventInput {
                venue_id: v.id,
                event_type_id: None,
                date: "2024-03-10".into(),
                counted_by: None,
                notes: None,
            },
        );
        assert!(matches!(inactive, Err(AppError::InvalidOperation(_))));
    }

    #[test]
    fn test_listing_and_date_range() {
        let pool = init_test_db().unwrap();
        let v = fixtures::venue(&pool, "MC");
        fixtures::area(&pool, &v.id, "A", 10);
        fixtures::event(&pool, &v.id, "2024-03-03");
        fixtures::event(&pool, &v.id, "2024-03-10");
        fixtures::event(&pool, &v.id, "2024-03-17");

        let latest = get_by_venue(&pool, &v.id, 2).unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].date, "2024-03-17");

        let march = get_by_venue_between(&pool, &v.id, "2024-03-01", "2024-03-10").unwrap();
        let dates: Vec<&str> = march.iter().map(|e| e.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-03-03", "2024-03-10"]);
    }

    #[test]
    fn test_locked_event_is_read_only() {
        let pool = init_test_db().unwrap();
        let (_v, _a, _b, e) = fixtures::two_area_event(&pool);

        let locked = set_locked(&pool, &e.id, true).unwrap();
        assert!(locked.is_locked);
        let err = update(
            &pool,
            &e.id,
            UpdateEventInput {
                notes: Some(Some("late".into())),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Locked(_)));

        set_locked(&pool, &e.id, false).unwrap();
        let updated = update(
            &pool,
            &e.id,
            UpdateEventInput {
                notes: Some(Some("late".into())),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("late"));
        assert_eq!(updated.counted_by.as_deref(), Some("usher"));
    }

    #[test]
    fn test_refresh_totals_repairs_drift() {
        let pool = init_test_db().unwrap();
        let (_v, _a, _b, e) = fixtures::two_area_event(&pool);
        {
            let conn = pool.get().unwrap();
            conn.execute(
                "UPDATE area_counts SET count = 7 WHERE event_id = ?1",
                params![e.id],
            )
            .unwrap();
        }
        let e = refresh_totals(&pool, &e.id).unwrap();
        assert_eq!(e.total_attendance, 14);
        assert_eq!(e.total_capacity, 300);
    }

    #[test]
    fn test_delete_cascades_counts() {
        let pool = init_test_db().unwrap();
        let (_v, _a, _b, e) = fixtures::two_area_event(&pool);
        assert!(delete(&pool, &e.id).unwrap());
        assert!(area_counts::get_by_event(&pool, &e.id).unwrap().is_empty());
        assert!(matches!(get_by_id(&pool, &e.id), Err(AppError::NotFound(_))));
    }
}
