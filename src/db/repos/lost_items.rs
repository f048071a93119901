use rusqlite::{params, Row};

use crate::db::models::{CreateLostItemInput, LostItem, LostItemStatus};
use crate::db::DbPool;
use crate::error::AppError;
use crate::validation::{Validator, MAX_NAME_LEN, MAX_NOTES_LEN};

fn row_to_lost_item(row: &Row) -> rusqlite::Result<LostItem> {
    Ok(LostItem {
        id: row.get("id")?,
        venue_id: row.get("venue_id")?,
        event_id: row.get("event_id")?,
        description: row.get("description")?,
        category: row.get("category")?,
        found_location: row.get("found_location")?,
        found_by: row.get("found_by")?,
        status: LostItemStatus::from_str_or_default(&row.get::<_, String>("status")?),
        claimed_by: row.get("claimed_by")?,
        claimed_at: row.get("claimed_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<LostItem, AppError> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT * FROM lost_items WHERE id = ?1",
        params![id],
        row_to_lost_item,
    )
    .map_err(|e| AppError::from_missing(e, format!("LostItem {id}")))
}

/// Items logged at a venue, newest first, optionally filtered by status.
pub fn get_by_venue(
    pool: &DbPool,
    venue_id: &str,
    status: Option<LostItemStatus>,
) -> Result<Vec<LostItem>, AppError> {
    let conn = pool.get()?;
    let items = match status {
        Some(s) => {
            let mut stmt = conn.prepare(
                "SELECT * FROM lost_items WHERE venue_id = ?1 AND status = ?2 ORDER BY created_at DESC",
            )?;
            let rows = stmt.query_map(params![venue_id, s.as_str()], row_to_lost_item)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT * FROM lost_items WHERE venue_id = ?1 ORDER BY created_at DESC",
            )?;
            let rows = stmt.query_map(params![venue_id], row_to_lost_item)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(items)
}

pub fn create(pool: &DbPool, input: CreateLostItemInput) -> Result<LostItem, AppError> {
    let category = input
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("other")
        .to_lowercase();

    let mut v = Validator::new();
    v.non_empty("description", &input.description);
    v.max_len("description", &input.description, MAX_NOTES_LEN);
    v.max_len("category", &category, MAX_NAME_LEN);
    v.finish()?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO lost_items (id, venue_id, event_id, description, category, found_location, found_by, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            id,
            input.venue_id,
            input.event_id,
            input.description.trim(),
            category,
            input.found_location,
            input.found_by,
            LostItemStatus::Found.as_str(),
            now
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            AppError::NotFound(format!("Venue {} or its event", input.venue_id))
        }
        other => AppError::Database(other),
    })?;

    tracing::debug!(lost_item_id = %id, venue_id = %input.venue_id, "Logged lost item");
    get_by_id(pool, &id)
}

fn require_found(item: &LostItem) -> Result<(), AppError> {
    if item.status != LostItemStatus::Found {
        return Err(AppError::InvalidOperation(format!(
            "LostItem {} is already {}",
            item.id,
            item.status.as_str()
        )));
    }
    Ok(())
}

pub fn mark_claimed(pool: &DbPool, id: &str, claimed_by: &str) -> Result<LostItem, AppError> {
    let mut v = Validator::new();
    v.name("claimed_by", claimed_by);
    v.finish()?;

    let item = get_by_id(pool, id)?;
    require_found(&item)?;

    let now = chrono::Utc::now().to_rfc3339();
    {
        let conn = pool.get()?;
        conn.execute(
            "UPDATE lost_items SET status = ?1, claimed_by = ?2, claimed_at = ?3, updated_at = ?3 WHERE id = ?4",
            params![LostItemStatus::Claimed.as_str(), claimed_by.trim(), now, id],
        )?;
    }
    get_by_id(pool, id)
}

pub fn mark_disposed(pool: &DbPool, id: &str) -> Result<LostItem, AppError> {
    let item = get_by_id(pool, id)?;
    require_found(&item)?;

    {
        let conn = pool.get()?;
        conn.execute(
            "UPDATE lost_items SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                LostItemStatus::Disposed.as_str(),
                chrono::Utc::now().to_rfc3339(),
                id
            ],
        )?;
    }
    get_by_id(pool, id)
}

pub fn delete(pool: &DbPool, id: &str) -> Result<bool, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute("DELETE FROM lost_items WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}
