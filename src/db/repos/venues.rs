use rusqlite::{params, OptionalExtension, Row};

use crate::db::models::{CreateVenueInput, Removal, UpdateVenueInput, Venue};
use crate::db::DbPool;
use crate::error::AppError;
use crate::validation::{Validator, MAX_NAME_LEN};

fn row_to_venue(row: &Row) -> rusqlite::Result<Venue> {
    Ok(Venue {
        id: row.get("id")?,
        name: row.get("name")?,
        location: row.get("location")?,
        code: row.get("code")?,
        is_active: row.get::<_, i32>("is_active")? != 0,
        contact_person: row.get("contact_person")?,
        contact_phone: row.get("contact_phone")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Codes are stored uppercase and trimmed.
fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn get_all(pool: &DbPool, include_inactive: bool) -> Result<Vec<Venue>, AppError> {
    let conn = pool.get()?;
    let sql = if include_inactive {
        "SELECT * FROM venues ORDER BY name COLLATE NOCASE"
    } else {
        "SELECT * FROM venues WHERE is_active = 1 ORDER BY name COLLATE NOCASE"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], row_to_venue)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<Venue, AppError> {
    let conn = pool.get()?;
    conn.query_row("SELECT * FROM venues WHERE id = ?1", params![id], row_to_venue)
        .map_err(|e| AppError::from_missing(e, format!("Venue {id}")))
}

pub fn get_by_code(pool: &DbPool, code: &str) -> Result<Option<Venue>, AppError> {
    let conn = pool.get()?;
    let venue = conn
        .query_row(
            "SELECT * FROM venues WHERE code = ?1",
            params![normalize_code(code)],
            row_to_venue,
        )
        .optional()?;
    Ok(venue)
}

pub fn create(pool: &DbPool, input: CreateVenueInput) -> Result<Venue, AppError> {
    let code = normalize_code(&input.code);
    let location = input.location.unwrap_or_default();

    let mut v = Validator::new();
    v.name("name", &input.name);
    v.code("code", &code);
    v.max_len("location", &location, MAX_NAME_LEN * 2);
    if let Some(ref phone) = input.contact_phone {
        v.phone("contact_phone", phone);
    }
    v.finish()?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO venues (id, name, location, code, is_active, contact_person, contact_phone, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?7)",
        params![
            id,
            input.name.trim(),
            location.trim(),
            code,
            input.contact_person,
            input.contact_phone,
            now
        ],
    )
    .map_err(|e| AppError::from_unique(e, format!("Venue code {code}")))?;

    tracing::debug!(venue_id = %id, code = %code, "Created venue");
    get_by_id(pool, &id)
}

pub fn update(pool: &DbPool, id: &str, input: UpdateVenueInput) -> Result<Venue, AppError> {
    // Verify exists
    get_by_id(pool, id)?;

    let code = input.code.as_deref().map(normalize_code);

    let mut v = Validator::new();
    if let Some(ref name) = input.name {
        v.name("name", name);
    }
    if let Some(ref code) = code {
        v.code("code", code);
    }
    if let Some(Some(ref phone)) = input.contact_phone {
        v.phone("contact_phone", phone);
    }
    v.finish()?;

    let now = chrono::Utc::now().to_rfc3339();
    let conn = pool.get()?;

    let code_label = code.clone().unwrap_or_default();

    // Build dynamic SET clause
    let mut sets: Vec<String> = vec!["updated_at = ?1".into()];
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(now)];

    push_field!(input.name, "name", sets, param_values, |v: String| v.trim().to_string());
    push_field!(code, "code", sets, param_values);
    push_field!(input.location, "location", sets, param_values, |v: String| v.trim().to_string());
    push_field!(input.contact_person, "contact_person", sets, param_values);
    push_field!(input.contact_phone, "contact_phone", sets, param_values);
    push_field!(input.is_active, "is_active", sets, param_values, |v: bool| v as i32);

    param_values.push(Box::new(id.to_string()));
    let sql = format!(
        "UPDATE venues SET {} WHERE id = ?{}",
        sets.join(", "),
        param_values.len()
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    conn.execute(&sql, params_ref.as_slice())
        .map_err(|e| AppError::from_unique(e, format!("Venue code {code_label}")))?;

    get_by_id(pool, id)
}

pub fn set_active(pool: &DbPool, id: &str, active: bool) -> Result<Venue, AppError> {
    let conn = pool.get()?;
    let now = chrono::Utc::now().to_rfc3339();
    let rows = conn.execute(
        "UPDATE venues SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
        params![active as i32, now, id],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("Venue {id}")));
    }
    get_by_id(pool, id)
}

/// Number of events recorded at the venue.
pub fn event_count(pool: &DbPool, id: &str) -> Result<i64, AppError> {
    let conn = pool.get()?;
    let n = conn.query_row(
        "SELECT COUNT(*) FROM events WHERE venue_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(n)
}

/// Hard delete. Refused while events exist, since deleting would cascade
/// away their counts.
pub fn delete(pool: &DbPool, id: &str) -> Result<bool, AppError> {
    let events = event_count(pool, id)?;
    if events > 0 {
        return Err(AppError::HasDependencies(format!(
            "Venue {id} has {events} recorded event(s)"
        )));
    }
    let conn = pool.get()?;
    let rows = conn.execute("DELETE FROM venues WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

/// Delete when unused, deactivate otherwise.
pub fn remove(pool: &DbPool, id: &str) -> Result<Removal, AppError> {
    match delete(pool, id) {
        Ok(true) => Ok(Removal::Deleted),
        Ok(false) => Err(AppError::NotFound(format!("Venue {id}"))),
        Err(AppError::HasDependencies(reason)) => {
            tracing::info!(venue_id = %id, %reason, "Venue in use, deactivating instead");
            set_active(pool, id, false)?;
            Ok(Removal::Deactivated)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;

    fn input(name: &str, code: &str) -> CreateVenueInput {
        CreateVenueInput {
            name: name.into(),
            code: code.into(),
            location: Some("Downtown".into()),
            contact_person: None,
            contact_phone: None,
        }
    }

    #[test]
    fn test_venue_crud() {
        let pool = init_test_db().unwrap();

        let main = create(&pool, input("Main Campus", "mc")).unwrap();
        assert_eq!(main.code, "MC");
        assert!(main.is_active);
        assert_eq!(main.location, "Downtown");

        let north = create(&pool, input("North Campus", "NC")).unwrap();

        let all = get_all(&pool, false).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Main Campus");

        assert_eq!(get_by_code(&pool, " mc ").unwrap().unwrap().id, main.id);
        assert!(get_by_code(&pool, "ZZ").unwrap().is_none());

        let updated = update(
            &pool,
            &north.id,
            UpdateVenueInput {
                name: Some("North Site".into()),
                contact_phone: Some(Some("555-0199".into())),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.name, "North Site");
        assert_eq!(updated.contact_phone.as_deref(), Some("555-0199"));
        assert_eq!(updated.code, "NC");

        set_active(&pool, &north.id, false).unwrap();
        assert_eq!(get_all(&pool, false).unwrap().len(), 1);
        assert_eq!(get_all(&pool, true).unwrap().len(), 2);

        assert!(delete(&pool, &north.id).unwrap());
        assert!(matches!(get_by_id(&pool, &north.id), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_duplicate_code_is_already_exists() {
        let pool = init_test_db().unwrap();
        create(&pool, input("Main Campus", "MC")).unwrap();
        let err = create(&pool, input("Other", "mc")).unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));

        let other = create(&pool, input("Other", "OT")).unwrap();
        let err = update(
            &pool,
            &other.id,
            UpdateVenueInput {
                code: Some("MC".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));
    }

    #[test]
    fn test_validation_reports_every_field() {
        let pool = init_test_db().unwrap();
        let err = create(
            &pool,
            CreateVenueInput {
                name: "".into(),
                code: "x".into(),
                location: None,
                contact_person: None,
                contact_phone: Some("call me".into()),
            },
        )
        .unwrap_err();
        match err {
            AppError::Validation(errors) => {
                assert!(errors.has_field("name"));
                assert!(errors.has_field("code"));
                assert!(errors.has_field("contact_phone"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_remove_deactivates_venue_with_events() {
        let pool = init_test_db().unwrap();
        let unused = create(&pool, input("Unused", "UN")).unwrap();
        assert_eq!(remove(&pool, &unused.id).unwrap(), Removal::Deleted);

        let used = create(&pool, input("Used", "US")).unwrap();
        {
            let conn = pool.get().unwrap();
            conn.execute(
                "INSERT INTO events (id, venue_id, date, created_at, updated_at) VALUES ('e1', ?1, '2024-03-10', 'now', 'now')",
                params![used.id],
            )
            .unwrap();
        }
        assert!(matches!(delete(&pool, &used.id), Err(AppError::HasDependencies(_))));
        assert_eq!(remove(&pool, &used.id).unwrap(), Removal::Deactivated);
        assert!(!get_by_id(&pool, &used.id).unwrap().is_active);
        assert!(matches!(remove(&pool, "missing"), Err(AppError::NotFound(_))));
    }
}
