use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

use crate::db::models::{
    AreaCount, AreaCountView, AreaType, CountChange, CountHistoryEntry, CountWrite,
    MAX_HISTORY_ENTRIES,
};
use crate::db::repos::events;
use crate::db::DbPool;
use crate::error::AppError;
use crate::validation::{self, Validator, MAX_NOTES_LEN};

/// A corrupt history column should not make the count unreadable.
fn parse_history(id: &str, raw: &str) -> Vec<CountHistoryEntry> {
    match serde_json::from_str(raw) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(area_count_id = %id, error = %e, "Discarding unreadable count history");
            Vec::new()
        }
    }
}

fn row_to_area_count(row: &Row) -> rusqlite::Result<AreaCount> {
    let id: String = row.get("id")?;
    let history_raw: String = row.get("history")?;
    let history = parse_history(&id, &history_raw);
    Ok(AreaCount {
        id,
        event_id: row.get("event_id")?,
        area_template_id: row.get("area_template_id")?,
        count: row.get("count")?,
        capacity: row.get("capacity")?,
        notes: row.get("notes")?,
        history,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_view(row: &Row) -> rusqlite::Result<AreaCountView> {
    Ok(AreaCountView {
        id: row.get("id")?,
        event_id: row.get("event_id")?,
        area_template_id: row.get("area_template_id")?,
        area_name: row.get("area_name")?,
        area_type: AreaType::from_str_or_default(&row.get::<_, String>("area_type")?),
        sort_order: row.get("sort_order")?,
        count: row.get("count")?,
        capacity: row.get("capacity")?,
        notes: row.get("notes")?,
        updated_at: row.get("updated_at")?,
    })
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<AreaCount, AppError> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT * FROM area_counts WHERE id = ?1",
        params![id],
        row_to_area_count,
    )
    .map_err(|e| AppError::from_missing(e, format!("AreaCount {id}")))
}

/// Area counts of an event in the areas' display order.
pub fn get_by_event(pool: &DbPool, event_id: &str) -> Result<Vec<AreaCount>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT ac.* FROM area_counts ac
         JOIN area_templates t ON t.id = ac.area_template_id
         WHERE ac.event_id = ?1
         ORDER BY t.sort_order, t.created_at",
    )?;
    let rows = stmt.query_map(params![event_id], row_to_area_count)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

pub fn get_views_by_event(pool: &DbPool, event_id: &str) -> Result<Vec<AreaCountView>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT ac.id, ac.event_id, ac.area_template_id, t.name AS area_name, t.area_type,
                t.sort_order, ac.count, ac.capacity, ac.notes, ac.updated_at
         FROM area_counts ac
         JOIN area_templates t ON t.id = ac.area_template_id
         WHERE ac.event_id = ?1
         ORDER BY t.sort_order, t.created_at",
    )?;
    let rows = stmt.query_map(params![event_id], row_to_view)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

pub fn update_notes(
    pool: &DbPool,
    id: &str,
    notes: Option<String>,
) -> Result<AreaCount, AppError> {
    if let Some(ref n) = notes {
        let mut v = Validator::new();
        v.max_len("notes", n, MAX_NOTES_LEN);
        v.finish()?;
    }

    {
        let conn = pool.get()?;
        let locked: Option<i32> = conn
            .query_row(
                "SELECT e.is_locked FROM area_counts ac JOIN events e ON e.id = ac.event_id WHERE ac.id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match locked {
            None => return Err(AppError::NotFound(format!("AreaCount {id}"))),
            Some(1) => return Err(AppError::Locked(format!("AreaCount {id}"))),
            Some(_) => {}
        }
        conn.execute(
            "UPDATE area_counts SET notes = ?1, updated_at = ?2 WHERE id = ?3",
            params![notes, chrono::Utc::now().to_rfc3339(), id],
        )?;
    }
    get_by_id(pool, id)
}

/// Apply one count change atomically.
///
/// The read of the current value, the write, the history append and the
/// event total recompute all happen inside one `BEGIN IMMEDIATE`
/// transaction, so concurrent writers serialize and the event total always
/// equals the sum of its area counts. A change that leaves the value as it
/// is writes nothing.
pub fn apply_count(pool: &DbPool, id: &str, change: CountChange) -> Result<CountWrite, AppError> {
    match change {
        CountChange::Increment(n) | CountChange::Decrement(n) => validation::check_amount(n)?,
        CountChange::Set(n) => {
            validation::check_count(n, 0)?;
        }
    }

    let mut conn = pool.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let (event_id, old, capacity, history_raw, locked): (String, i64, i64, String, i32) = tx
        .query_row(
            "SELECT ac.event_id, ac.count, ac.capacity, ac.history, e.is_locked
             FROM area_counts ac JOIN events e ON e.id = ac.event_id
             WHERE ac.id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )
        .map_err(|e| AppError::from_missing(e, format!("AreaCount {id}")))?;

    if locked != 0 {
        return Err(AppError::Locked(format!("Event {event_id}")));
    }

    let new = change.apply_to(old);
    if new == old {
        let total: i64 = tx.query_row(
            "SELECT total_attendance FROM events WHERE id = ?1",
            params![event_id],
            |row| row.get(0),
        )?;
        return Ok(CountWrite {
            area_count_id: id.to_string(),
            event_id,
            old,
            new,
            capacity,
            total_attendance: total,
        });
    }

    if let validation::CapacityCheck::Over { by } = validation::check_count(new, capacity)? {
        tracing::warn!(area_count_id = %id, count = new, capacity, over_by = by, "Area over capacity");
    }

    let now = chrono::Utc::now().to_rfc3339();
    let mut history = parse_history(id, &history_raw);
    history.push(CountHistoryEntry {
        from: old,
        to: new,
        at: now.clone(),
    });
    if history.len() > MAX_HISTORY_ENTRIES {
        let excess = history.len() - MAX_HISTORY_ENTRIES;
        history.drain(..excess);
    }
    let history_json = serde_json::to_string(&history)?;

    tx.execute(
        "UPDATE area_counts SET count = ?1, history = ?2, updated_at = ?3 WHERE id = ?4",
        params![new, history_json, now, id],
    )?;
    let total = events::recompute_totals(&tx, &event_id, &now)?;
    tx.commit()?;

    tracing::debug!(area_count_id = %id, event_id = %event_id, old, new, total, "Count written");
    Ok(CountWrite {
        area_count_id: id.to_string(),
        event_id,
        old,
        new,
        capacity,
        total_attendance: total,
    })
}
