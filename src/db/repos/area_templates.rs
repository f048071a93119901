use rusqlite::{params, Row};

use crate::db::models::{
    AreaTemplate, AreaType, CreateAreaTemplateInput, Removal, UpdateAreaTemplateInput,
};
use crate::db::repos::venues;
use crate::db::DbPool;
use crate::error::AppError;
use crate::validation::{Validator, MAX_CAPACITY};

fn row_to_area(row: &Row) -> rusqlite::Result<AreaTemplate> {
    Ok(AreaTemplate {
        id: row.get("id")?,
        venue_id: row.get("venue_id")?,
        name: row.get("name")?,
        area_type: AreaType::from_str_or_default(&row.get::<_, String>("area_type")?),
        capacity: row.get("capacity")?,
        is_active: row.get::<_, i32>("is_active")? != 0,
        sort_order: row.get("sort_order")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub fn get_by_venue(
    pool: &DbPool,
    venue_id: &str,
    include_inactive: bool,
) -> Result<Vec<AreaTemplate>, AppError> {
    let conn = pool.get()?;
    let sql = if include_inactive {
        "SELECT * FROM area_templates WHERE venue_id = ?1 ORDER BY sort_order, created_at"
    } else {
        "SELECT * FROM area_templates WHERE venue_id = ?1 AND is_active = 1 ORDER BY sort_order, created_at"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![venue_id], row_to_area)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<AreaTemplate, AppError> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT * FROM area_templates WHERE id = ?1",
        params![id],
        row_to_area,
    )
    .map_err(|e| AppError::from_missing(e, format!("AreaTemplate {id}")))
}

pub fn create(pool: &DbPool, input: CreateAreaTemplateInput) -> Result<AreaTemplate, AppError> {
    let mut v = Validator::new();
    v.name("name", &input.name);
    v.range("capacity", input.capacity, 0, MAX_CAPACITY);
    v.finish()?;

    let venue = venues::get_by_id(pool, &input.venue_id)?;
    if !venue.is_active {
        return Err(AppError::InvalidOperation(format!(
            "Venue {} is inactive",
            venue.code
        )));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let area_type = input.area_type.unwrap_or_default();

    let conn = pool.get()?;

    // Auto-compute sort_order from MAX(sort_order) + 1 within the venue if not provided
    let sort_order = match input.sort_order {
        Some(order) => order,
        None => {
            let max: i32 = conn.query_row(
                "SELECT COALESCE(MAX(sort_order), -1) FROM area_templates WHERE venue_id = ?1",
                params![input.venue_id],
                |row| row.get(0),
            )?;
            max + 1
        }
    };

    conn.execute(
        "INSERT INTO area_templates (id, venue_id, name, area_type, capacity, is_active, sort_order, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?7)",
        params![
            id,
            input.venue_id,
            input.name.trim(),
            area_type.as_str(),
            input.capacity,
            sort_order,
            now
        ],
    )?;

    get_by_id(pool, &id)
}

/// Capacity edits only affect events created afterwards; existing area
/// counts keep their snapshot.
pub fn update(
    pool: &DbPool,
    id: &str,
    input: UpdateAreaTemplateInput,
) -> Result<AreaTemplate, AppError> {
    get_by_id(pool, id)?;

    let mut v = Validator::new();
    if let Some(ref name) = input.name {
        v.name("name", name);
    }
    if let Some(capacity) = input.capacity {
        v.range("capacity", capacity, 0, MAX_CAPACITY);
    }
    v.finish()?;

    let now = chrono::Utc::now().to_rfc3339();
    let conn = pool.get()?;

    let mut sets: Vec<String> = vec!["updated_at = ?1".into()];
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(now)];

    push_field!(input.name, "name", sets, param_values, |v: String| v.trim().to_string());
    push_field!(input.area_type, "area_type", sets, param_values, |v: AreaType| v.as_str());
    push_field!(input.capacity, "capacity", sets, param_values);
    push_field!(input.is_active, "is_active", sets, param_values, |v: bool| v as i32);

    param_values.push(Box::new(id.to_string()));
    let sql = format!(
        "UPDATE area_templates SET {} WHERE id = ?{}",
        sets.join(", "),
        param_values.len()
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    conn.execute(&sql, params_ref.as_slice())?;

    get_by_id(pool, id)
}

pub fn reorder(pool: &DbPool, venue_id: &str, ordered_ids: &[String]) -> Result<(), AppError> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    let now = chrono::Utc::now().to_rfc3339();
    {
        let mut stmt = tx.prepare(
            "UPDATE area_templates SET sort_order = ?1, updated_at = ?2 WHERE id = ?3 AND venue_id = ?4",
        )?;
        for (idx, id) in ordered_ids.iter().enumerate() {
            let affected = stmt.execute(params![idx as i32, now, id, venue_id])?;
            if affected == 0 {
                return Err(AppError::NotFound(format!("AreaTemplate {id}")));
            }
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn usage_count(pool: &DbPool, id: &str) -> Result<i64, AppError> {
    let conn = pool.get()?;
    let n = conn.query_row(
        "SELECT COUNT(*) FROM area_counts WHERE area_template_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(n)
}

/// Delete when no event has counted the area, deactivate otherwise.
pub fn remove(pool: &DbPool, id: &str) -> Result<Removal, AppError> {
    get_by_id(pool, id)?;
    if usage_count(pool, id)? > 0 {
        update(
            pool,
            id,
            UpdateAreaTemplateInput {
                is_active: Some(false),
                ..Default::default()
            },
        )?;
        return Ok(Removal::Deactivated);
    }
    let conn = pool.get()?;
    conn.execute("DELETE FROM area_templates WHERE id = ?1", params![id])?;
    Ok(Removal::Deleted)
}
