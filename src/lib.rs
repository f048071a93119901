pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod logging;
pub mod notifications;
pub mod validation;

use config::AppConfig;
use db::changes::ChangeNotifier;
use db::repos::venues;
use db::DbPool;
use error::AppError;
use notifications::{IncidentNotifier, LogNotifier};
use std::sync::Arc;

pub struct AppState {
    pub db: DbPool,
    /// Commit notifications for every connection in `db`.
    pub changes: ChangeNotifier,
    pub config: AppConfig,
    /// Receives high-severity incident notifications.
    pub notifier: Arc<dyn IncidentNotifier>,
}

/// Open (and migrate) the store described by `config`.
pub fn open(config: AppConfig) -> Result<AppState, AppError> {
    let changes = ChangeNotifier::default();
    let db = db::init_db(
        &config.data_dir,
        &config.db_file,
        config.pool_size,
        changes.clone(),
    )?;
    Ok(AppState {
        db,
        changes,
        config,
        notifier: Arc::new(LogNotifier),
    })
}

/// Process entry point: configure, open the store and report its state.
pub fn run() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    let _log_guard = logging::init(&config)?;
    logging::install_crash_hook(&config.data_dir);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        db = %config.db_path().display(),
        "Starting headcount"
    );

    let state = open(config)?;

    let status = {
        let conn = state.db.get()?;
        db::migrations::status(&conn)?
    };
    let venue_count = venues::get_all(&state.db, true)?.len();
    tracing::info!(
        schema_version = status.current_version,
        target_version = status.target_version,
        venues = venue_count,
        "Store ready"
    );

    let crashes = logging::read_crash_logs(&state.config.data_dir);
    if !crashes.is_empty() {
        tracing::warn!(count = crashes.len(), latest = %crashes[0].filename, "Previous crash reports found");
    }

    Ok(())
}
