use rusqlite::{params, Row};

use crate::db::models::{CreateUserInput, User, UserRole};
use crate::db::DbPool;
use crate::error::AppError;
use crate::validation::Validator;

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        role: UserRole::from_str_or_default(&row.get::<_, String>("role")?),
        is_active: row.get::<_, i32>("is_active")? != 0,
        created_at: row.get("created_at")?,
    })
}

pub fn get_all(pool: &DbPool, include_inactive: bool) -> Result<Vec<User>, AppError> {
    let conn = pool.get()?;
    let sql = if include_inactive {
        "SELECT * FROM users ORDER BY name COLLATE NOCASE"
    } else {
        "SELECT * FROM users WHERE is_active = 1 ORDER BY name COLLATE NOCASE"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], row_to_user)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<User, AppError> {
    let conn = pool.get()?;
    conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], row_to_user)
        .map_err(|e| AppError::from_missing(e, format!("User {id}")))
}

pub fn create(pool: &DbPool, input: CreateUserInput) -> Result<User, AppError> {
    let email = input.email.trim().to_lowercase();

    let mut v = Validator::new();
    v.name("name", &input.name);
    v.email("email", &email);
    v.finish()?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let role = input.role.unwrap_or_default();

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO users (id, name, email, role, is_active, created_at) VALUES (?1, ?2, ?3, ?4, 1, ?5)",
        params![id, input.name.trim(), email, role.as_str(), now],
    )
    .map_err(|e| AppError::from_unique(e, format!("User {email}")))?;

    get_by_id(pool, &id)
}

pub fn set_role(pool: &DbPool, id: &str, role: UserRole) -> Result<User, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "UPDATE users SET role = ?1 WHERE id = ?2",
        params![role.as_str(), id],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("User {id}")));
    }
    get_by_id(pool, id)
}

pub fn set_active(pool: &DbPool, id: &str, active: bool) -> Result<User, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "UPDATE users SET is_active = ?1 WHERE id = ?2",
        params![active as i32, id],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("User {id}")));
    }
    get_by_id(pool, id)
}

pub fn delete(pool: &DbPool, id: &str) -> Result<bool, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}
