use rusqlite::{params, Row};

use crate::db::models::{CreateEventTypeInput, DayType, EventType, UpdateEventTypeInput};
use crate::db::DbPool;
use crate::error::AppError;
use crate::validation::Validator;

fn row_to_event_type(row: &Row) -> rusqlite::Result<EventType> {
    Ok(EventType {
        id: row.get("id")?,
        name: row.get("name")?,
        day_type: DayType::from_str_or_default(&row.get::<_, String>("day_type")?),
        time_label: row.get("time_label")?,
        is_active: row.get::<_, i32>("is_active")? != 0,
        sort_order: row.get("sort_order")?,
        created_at: row.get("created_at")?,
    })
}

pub fn get_all(pool: &DbPool, include_inactive: bool) -> Result<Vec<EventType>, AppError> {
    let conn = pool.get()?;
    let sql = if include_inactive {
        "SELECT * FROM event_types ORDER BY sort_order, name"
    } else {
        "SELECT * FROM event_types WHERE is_active = 1 ORDER BY sort_order, name"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], row_to_event_type)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<EventType, AppError> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT * FROM event_types WHERE id = ?1",
        params![id],
        row_to_event_type,
    )
    .map_err(|e| AppError::from_missing(e, format!("EventType {id}")))
}

pub fn create(pool: &DbPool, input: CreateEventTypeInput) -> Result<EventType, AppError> {
    let name = input.name.trim().to_string();
    let mut v = Validator::new();
    v.name("name", &name);
    if let Some(ref label) = input.time_label {
        v.max_len("time_label", label, 40);
    }
    v.finish()?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let day_type = input.day_type.unwrap_or_default();

    let conn = pool.get()?;
    let sort_order = match input.sort_order {
        Some(order) => order,
        None => {
            let max: i32 = conn.query_row(
                "SELECT COALESCE(MAX(sort_order), -1) FROM event_types",
                [],
                |row| row.get(0),
            )?;
            max + 1
        }
    };

    conn.execute(
        "INSERT INTO event_types (id, name, day_type, time_label, is_active, sort_order, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)",
        params![
            id,
            name,
            day_type.as_str(),
            input.time_label.unwrap_or_default(),
            sort_order,
            now
        ],
    )
    .map_err(|e| AppError::from_unique(e, format!("EventType {name}")))?;

    get_by_id(pool, &id)
}

pub fn update(pool: &DbPool, id: &str, input: UpdateEventTypeInput) -> Result<EventType, AppError> {
    let current = get_by_id(pool, id)?;

    let name = input.name.as_deref().map(str::trim).unwrap_or(current.name.as_str()).to_string();
    let mut v = Validator::new();
    v.name("name", &name);
    v.finish()?;

    let conn = pool.get()?;
    conn.execute(
        "UPDATE event_types SET name = ?1, day_type = ?2, time_label = ?3, is_active = ?4 WHERE id = ?5",
        params![
            name,
            input.day_type.unwrap_or(current.day_type).as_str(),
            input.time_label.unwrap_or(current.time_label),
            input.is_active.unwrap_or(current.is_active) as i32,
            id
        ],
    )
    .map_err(|e| AppError::from_unique(e, format!("EventType {name}")))?;

    get_by_id(pool, id)
}

/// Hard delete. Events of this type keep existing with no type.
pub fn delete(pool: &DbPool, id: &str) -> Result<bool, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute("DELETE FROM event_types WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}
