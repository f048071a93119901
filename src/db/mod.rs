#[macro_use]
pub mod macros;
pub mod changes;
#[cfg(test)]
pub mod fixtures;
pub mod migrations;
pub mod models;
pub mod repos;

use r2d2::{Builder, CustomizeConnection, Pool};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

use crate::error::AppError;
use changes::{ChangeNotifier, CheckinPublisher};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Connection customizer that sets per-connection SQLite pragmas and
/// installs the change-notification hooks.
#[derive(Debug)]
struct SqlitePragmaCustomizer {
    notifier: ChangeNotifier,
}

impl CustomizeConnection<rusqlite::Connection, rusqlite::Error> for SqlitePragmaCustomizer {
    fn on_acquire(&self, conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -8000;",
        )?;
        self.notifier.install(conn)
    }
}

/// Pool builder wired to `notifier`: hooks on every connection, staged
/// commits published on checkin.
fn pool_builder(notifier: ChangeNotifier) -> Builder<SqliteConnectionManager> {
    Pool::builder()
        .event_handler(Box::new(CheckinPublisher::new(notifier.clone())))
        .connection_customizer(Box::new(SqlitePragmaCustomizer { notifier }))
}

/// Initialize the database: create file, enable WAL + foreign keys, run migrations.
///
/// A migration failure is returned before the pool is handed out, so callers
/// never see a partially migrated store.
pub fn init_db(
    data_dir: &Path,
    db_file: &str,
    max_size: u32,
    notifier: ChangeNotifier,
) -> Result<DbPool, AppError> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join(db_file);

    tracing::info!(path = %db_path.display(), "Initializing database");

    let manager = SqliteConnectionManager::file(&db_path);
    let pool = pool_builder(notifier).max_size(max_size).build(manager)?;

    // Set WAL journal mode (database-wide, only needs to run once)
    {
        let conn = pool.get()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        tracing::debug!("SQLite pragmas configured (WAL, FK, busy_timeout)");
    }

    {
        let mut conn = pool.get()?;
        let version = migrations::run(&mut conn)?;
        tracing::info!(version, "Schema ready");
    }

    tracing::info!("Database initialized successfully");
    Ok(pool)
}

#[cfg(test)]
pub fn init_test_db() -> Result<DbPool, AppError> {
    init_test_db_with(ChangeNotifier::default())
}

#[cfg(test)]
pub fn init_test_db_with(notifier: ChangeNotifier) -> Result<DbPool, AppError> {
    use std::time::Duration;

    // Use a unique temp file for each test to avoid in-memory connection issues with r2d2.
    let tmp = std::env::temp_dir().join(format!("headcount_test_{}.db", uuid::Uuid::new_v4()));
    let manager = SqliteConnectionManager::file(&tmp);
    let pool = pool_builder(notifier)
        .max_size(2)
        .connection_timeout(Duration::from_secs(5))
        .build(manager)?;

    let mut conn = pool.get()?;
    migrations::run(&mut conn)?;
    drop(conn);
    Ok(pool)
}
