use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;
use crate::error::AppError;

const DEFAULT_FILTER: &str = "info,headcount=debug";

const CRASH_DIR: &str = "crash_logs";

/// Data directory the crash hook writes under.
static CRASH_DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Resolve the filter: `HEADCOUNT_LOG`, then `RUST_LOG`, then the default.
fn env_filter(config: &AppConfig) -> EnvFilter {
    if let Some(ref directive) = config.log_filter {
        if let Ok(filter) = EnvFilter::try_new(directive) {
            return filter;
        }
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize tracing with stdout and daily-rolling file layers.
///
/// - Stdout: compact, human-readable for the console
/// - File: JSON lines in `<data_dir>/logs/headcount.log.YYYY-MM-DD`
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the file writer.
pub fn init(config: &AppConfig) -> Result<WorkerGuard, AppError> {
    let logs_dir = config.logs_dir();
    std::fs::create_dir_all(&logs_dir)?;

    let file_appender = tracing_appender::rolling::daily(&logs_dir, "headcount.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .compact();

    let file_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(true)
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Internal(format!("Tracing already initialized: {e}")))?;

    tracing::debug!(logs_dir = %logs_dir.display(), "Tracing initialized");
    Ok(guard)
}

/// One panic, as written to `<data_dir>/crash_logs/crash_<stamp>.log`.
#[derive(Debug, Clone)]
pub struct CrashReport {
    pub at: chrono::DateTime<chrono::Local>,
    pub message: String,
    pub location: Option<String>,
    pub thread: String,
    pub backtrace: String,
}

impl CrashReport {
    pub fn file_name(&self) -> String {
        format!("crash_{}.log", self.at.format("%Y%m%d_%H%M%S"))
    }

    /// Plain `key: value` lines followed by the backtrace.
    pub fn render(&self, data_dir: &Path) -> String {
        let mut out = format!("headcount {} crashed\n", env!("CARGO_PKG_VERSION"));
        out.push_str(&format!("at: {}\n", self.at.to_rfc3339()));
        out.push_str(&format!("schema: v{}\n", crate::db::migrations::TARGET_VERSION));
        out.push_str(&format!("data_dir: {}\n", data_dir.display()));
        out.push_str(&format!("thread: {}\n", self.thread));
        out.push_str(&format!("panic: {}\n", self.message));
        if let Some(ref loc) = self.location {
            out.push_str(&format!("location: {loc}\n"));
        }
        out.push_str("\nbacktrace:\n");
        out.push_str(&self.backtrace);
        out
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "<non-string payload>".to_string()
    }
}

/// Install a panic hook that records each panic through `tracing` and in a
/// crash file under `data_dir`, then defers to the previous hook.
pub fn install_crash_hook(data_dir: &Path) {
    if std::env::var("RUST_BACKTRACE").is_err() {
        std::env::set_var("RUST_BACKTRACE", "full");
    }

    if let Err(e) = std::fs::create_dir_all(data_dir.join(CRASH_DIR)) {
        tracing::warn!(error = %e, "Cannot create crash log directory");
    }
    CRASH_DATA_DIR.set(data_dir.to_path_buf()).ok();

    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let thread = std::thread::current();
        let report = CrashReport {
            at: chrono::Local::now(),
            message: panic_message(info.payload()),
            location: info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column())),
            thread: thread.name().unwrap_or("<unnamed>").to_string(),
            backtrace: std::backtrace::Backtrace::force_capture().to_string(),
        };
        tracing::error!(
            panic = %report.message,
            location = report.location.as_deref().unwrap_or("<unknown>"),
            thread = %report.thread,
            "headcount panicked"
        );

        if let Some(data_dir) = CRASH_DATA_DIR.get() {
            let path = data_dir.join(CRASH_DIR).join(report.file_name());
            match std::fs::write(&path, report.render(data_dir)) {
                Ok(()) => tracing::error!(path = %path.display(), "Crash report written"),
                Err(e) => tracing::error!(error = %e, "Crash report could not be written"),
            }
        }

        prev_hook(info);
    }));

    tracing::info!("Crash hook installed");
}

#[derive(Debug, serde::Serialize, Clone)]
pub struct CrashLogEntry {
    pub filename: String,
    pub content: String,
}

/// Read crash logs from disk (most recent first, max 10).
pub fn read_crash_logs(data_dir: &Path) -> Vec<CrashLogEntry> {
    let crash_dir = data_dir.join(CRASH_DIR);
    let mut entries = Vec::new();

    if let Ok(dir) = std::fs::read_dir(&crash_dir) {
        for entry in dir.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e == "log").unwrap_or(false) {
                if let Ok(content) = std::fs::read_to_string(&path) {
                    entries.push(CrashLogEntry {
                        filename: path.file_name().unwrap_or_default().to_string_lossy().into(),
                        content,
                    });
                }
            }
        }
    }

    // Filenames carry the timestamp, so name order is time order.
    entries.sort_by(|a, b| b.filename.cmp(&a.filename));
    entries.truncate(10);
    entries
}

/// Clear all crash logs.
pub fn clear_crash_logs(data_dir: &Path) {
    let crash_dir = data_dir.join(CRASH_DIR);
    if let Ok(dir) = std::fs::read_dir(&crash_dir) {
        for entry in dir.flatten() {
            let _ = std::fs::remove_file(entry.path());
        }
    }
}
