use serde::Serialize;

use crate::validation::ValidationErrors;

/// App-wide error type. Every fallible function returns `Result<T, AppError>`.
/// Serializes cleanly for the UI bridge so screens get structured error messages.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(ValidationErrors),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A count mutation reached a locked event.
    #[error("Event is locked: {0}")]
    Locked(String),

    #[error("Has dependencies: {0}")]
    HasDependencies(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Map a SQLite UNIQUE violation to `AlreadyExists`; anything else stays a database error.
    pub fn from_unique(err: rusqlite::Error, what: impl Into<String>) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                AppError::AlreadyExists(what.into())
            }
            _ => AppError::Database(err),
        }
    }

    /// Map `QueryReturnedNoRows` to `NotFound`.
    pub fn from_missing(err: rusqlite::Error, what: impl Into<String>) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => AppError::NotFound(what.into()),
            other => AppError::Database(other),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database",
            AppError::Pool(_) => "pool",
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation",
            AppError::AlreadyExists(_) => "already_exists",
            AppError::Locked(_) => "locked",
            AppError::HasDependencies(_) => "has_dependencies",
            AppError::InvalidOperation(_) => "invalid_operation",
            AppError::Migration(_) => "migration",
            AppError::Io(_) => "io",
            AppError::Serde(_) => "serde",
            AppError::Internal(_) => "internal",
        }
    }
}

/// Serialized as `{ error: "...", kind: "...", fields?: [...] }` for frontend consumption.
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let fields = match self {
            AppError::Validation(errors) => Some(errors),
            _ => None,
        };
        let mut s = serializer.serialize_struct("AppError", if fields.is_some() { 3 } else { 2 })?;
        s.serialize_field("error", &self.to_string())?;
        s.serialize_field("kind", self.kind())?;
        if let Some(errors) = fields {
            s.serialize_field("fields", &errors.errors)?;
        }
        s.end()
    }
}
