//! Versioned schema migrations.
//!
//! The schema version lives in `PRAGMA user_version`. A fresh database is at
//! version 0 and walks every step up to [`TARGET_VERSION`]; an existing one
//! resumes from wherever it stopped. Each step runs in its own transaction
//! together with the version bump, so a failed step leaves the store at the
//! previous version with its previous schema.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::AppError;

/// Schema version this build expects.
pub const TARGET_VERSION: u32 = 5;

/// One schema-definition operation inside a step.
#[derive(Debug, Clone)]
pub enum SchemaOp {
    /// Full `CREATE TABLE IF NOT EXISTS` statement.
    CreateTable { name: &'static str, sql: &'static str },
    /// `ALTER TABLE .. ADD COLUMN`, skipped when the column is already there.
    AddColumn {
        table: &'static str,
        column: &'static str,
        definition: &'static str,
    },
    CreateIndex {
        name: &'static str,
        table: &'static str,
        columns: &'static [&'static str],
        unique: bool,
    },
    DropTable { name: &'static str },
    /// `INSERT INTO to (dst..) SELECT src.. FROM from`, one `(src, dst)` pair per column.
    CopyRows {
        from: &'static str,
        to: &'static str,
        columns: &'static [(&'static str, &'static str)],
    },
    RenameTable { from: &'static str, to: &'static str },
}

impl SchemaOp {
    fn apply(&self, conn: &Connection) -> Result<(), AppError> {
        match self {
            SchemaOp::CreateTable { sql, .. } => conn.execute_batch(sql)?,
            SchemaOp::AddColumn {
                table,
                column,
                definition,
            } => {
                if column_exists(conn, table, column)? {
                    tracing::debug!(table, column, "Column already present, skipping");
                } else {
                    conn.execute_batch(&format!(
                        "ALTER TABLE {table} ADD COLUMN {column} {definition};"
                    ))?;
                }
            }
            SchemaOp::CreateIndex {
                name,
                table,
                columns,
                unique,
            } => {
                let unique = if *unique { "UNIQUE " } else { "" };
                conn.execute_batch(&format!(
                    "CREATE {unique}INDEX IF NOT EXISTS {name} ON {table}({});",
                    columns.join(", ")
                ))?;
            }
            SchemaOp::DropTable { name } => {
                conn.execute_batch(&format!("DROP TABLE IF EXISTS {name};"))?;
            }
            SchemaOp::CopyRows { from, to, columns } => {
                let src: Vec<&str> = columns.iter().map(|(s, _)| *s).collect();
                let dst: Vec<&str> = columns.iter().map(|(_, d)| *d).collect();
                let copied = conn.execute(
                    &format!(
                        "INSERT INTO {to} ({}) SELECT {} FROM {from}",
                        dst.join(", "),
                        src.join(", ")
                    ),
                    [],
                )?;
                tracing::debug!(from, to, rows = copied, "Copied rows");
            }
            SchemaOp::RenameTable { from, to } => {
                conn.execute_batch(&format!("ALTER TABLE {from} RENAME TO {to};"))?;
            }
        }
        Ok(())
    }
}

/// A single versioned step.
#[derive(Debug, Clone)]
pub struct Migration {
    pub from: u32,
    pub to: u32,
    pub description: &'static str,
    pub ops: Vec<SchemaOp>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current_version: u32,
    pub target_version: u32,
    /// `(from, to)` of every step that would run.
    pub pending: Vec<(u32, u32)>,
}

pub fn current_version(conn: &Connection) -> Result<u32, AppError> {
    let v: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    u32::try_from(v).map_err(|_| AppError::Migration(format!("invalid stored schema version {v}")))
}

fn set_version(conn: &Connection, version: u32) -> Result<(), AppError> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))?;
    Ok(())
}

pub fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, AppError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        params![table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool, AppError> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Check the step list: every step advances, and no two steps start at the same version.
fn validate_steps(steps: &[Migration]) -> Result<(), AppError> {
    for (i, step) in steps.iter().enumerate() {
        if step.to <= step.from {
            return Err(AppError::Migration(format!(
                "step {}->{} does not advance the schema",
                step.from, step.to
            )));
        }
        if steps[..i].iter().any(|s| s.from == step.from) {
            return Err(AppError::Migration(format!(
                "more than one step starts at version {}",
                step.from
            )));
        }
    }
    Ok(())
}

/// Resolve the chain of steps from `current` to `target`.
fn plan(steps: &[Migration], current: u32, target: u32) -> Result<Vec<&Migration>, AppError> {
    validate_steps(steps)?;
    if current > target {
        return Err(AppError::Migration(format!(
            "stored schema version {current} is newer than supported version {target}"
        )));
    }

    let mut chain = Vec::new();
    let mut version = current;
    while version != target {
        let step = steps
            .iter()
            .find(|s| s.from == version && s.to <= target)
            .ok_or_else(|| {
                AppError::Migration(format!(
                    "no migration path from version {version} to {target}"
                ))
            })?;
        chain.push(step);
        version = step.to;
    }
    Ok(chain)
}

pub fn status(conn: &Connection) -> Result<SchemaStatus, AppError> {
    let current_version = current_version(conn)?;
    let steps = all_steps();
    let pending = plan(&steps, current_version, TARGET_VERSION)?
        .into_iter()
        .map(|s| (s.from, s.to))
        .collect();
    Ok(SchemaStatus {
        current_version,
        target_version: TARGET_VERSION,
        pending,
    })
}

/// Bring the store to [`TARGET_VERSION`]. Returns the resulting version.
pub fn run(conn: &mut Connection) -> Result<u32, AppError> {
    run_to(conn, &all_steps(), TARGET_VERSION)
}

/// Apply `steps` until the store reaches `target`.
///
/// Foreign-key enforcement is switched off for the run (the pragma is a no-op
/// inside a transaction, so it has to happen here) because table rebuilds
/// drop parent tables that still have child rows. Each step is checked with
/// `PRAGMA foreign_key_check` before it commits.
pub fn run_to(conn: &mut Connection, steps: &[Migration], target: u32) -> Result<u32, AppError> {
    let current = current_version(conn)?;
    let chain = plan(steps, current, target)?;
    if chain.is_empty() {
        tracing::debug!(version = current, "Schema up to date");
        return Ok(current);
    }

    tracing::info!(from = current, to = target, steps = chain.len(), "Running database migrations");

    conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
    let result = chain.iter().try_for_each(|step| apply_step(conn, step));
    let restored = conn.execute_batch("PRAGMA foreign_keys = ON;");

    result?;
    restored?;

    let version = current_version(conn)?;
    tracing::info!(version, "Database migrations complete");
    Ok(version)
}

fn apply_step(conn: &mut Connection, step: &Migration) -> Result<(), AppError> {
    let tx = conn.transaction()?;

    for op in &step.ops {
        op.apply(&tx).map_err(|e| {
            AppError::Migration(format!(
                "{}->{} ({}): {op:?}: {e}",
                step.from, step.to, step.description
            ))
        })?;
    }

    let violations = {
        let mut stmt = tx.prepare("PRAGMA foreign_key_check")?;
        let mut rows = stmt.query([])?;
        let mut n = 0usize;
        while rows.next()?.is_some() {
            n += 1;
        }
        n
    };
    if violations > 0 {
        return Err(AppError::Migration(format!(
            "{}->{} ({}): {violations} foreign key violation(s)",
            step.from, step.to, step.description
        )));
    }

    set_version(&tx, step.to)?;
    tx.commit()?;

    tracing::info!(from = step.from, to = step.to, "Applied migration: {}", step.description);
    Ok(())
}

// ============================================================================
// Steps
// ============================================================================

pub fn all_steps() -> Vec<Migration> {
    vec![
        Migration {
            from: 0,
            to: 1,
            description: "initial schema",
            ops: v1_initial(),
        },
        Migration {
            from: 1,
            to: 2,
            description: "event types and branch contact details",
            ops: v2_event_types(),
        },
        Migration {
            from: 2,
            to: 3,
            description: "lost items, incidents and count history",
            ops: v3_lost_items_incidents(),
        },
        Migration {
            from: 3,
            to: 4,
            description: "unique branch codes and event type names, composite indices",
            ops: v4_unique_and_composite_indices(),
        },
        Migration {
            from: 4,
            to: 5,
            description: "rename branches to venues",
            ops: v5_branches_to_venues(),
        },
    ]
}

fn v1_initial() -> Vec<SchemaOp> {
    vec![
        SchemaOp::CreateTable {
            name: "branches",
            sql: "CREATE TABLE IF NOT EXISTS branches (
                id          TEXT PRIMARY KEY NOT NULL,
                name        TEXT NOT NULL,
                location    TEXT NOT NULL DEFAULT '',
                code        TEXT NOT NULL,
                is_active   INTEGER NOT NULL DEFAULT 1,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );",
        },
        SchemaOp::CreateTable {
            name: "area_templates",
            sql: "CREATE TABLE IF NOT EXISTS area_templates (
                id          TEXT PRIMARY KEY NOT NULL,
                branch_id   TEXT NOT NULL REFERENCES branches(id) ON DELETE CASCADE,
                name        TEXT NOT NULL,
                area_type   TEXT NOT NULL DEFAULT 'seating',
                capacity    INTEGER NOT NULL DEFAULT 0,
                is_active   INTEGER NOT NULL DEFAULT 1,
                sort_order  INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );",
        },
        SchemaOp::CreateIndex {
            name: "index_area_templates_branch_id",
            table: "area_templates",
            columns: &["branch_id"],
            unique: false,
        },
        SchemaOp::CreateTable {
            name: "events",
            sql: "CREATE TABLE IF NOT EXISTS events (
                id                TEXT PRIMARY KEY NOT NULL,
                branch_id         TEXT NOT NULL REFERENCES branches(id) ON DELETE CASCADE,
                date              TEXT NOT NULL,
                total_attendance  INTEGER NOT NULL DEFAULT 0,
                total_capacity    INTEGER NOT NULL DEFAULT 0,
                is_locked         INTEGER NOT NULL DEFAULT 0,
                counted_by        TEXT,
                notes             TEXT,
                created_at        TEXT NOT NULL,
                updated_at        TEXT NOT NULL
            );",
        },
        SchemaOp::CreateIndex {
            name: "index_events_branch_id",
            table: "events",
            columns: &["branch_id"],
            unique: false,
        },
        SchemaOp::CreateTable {
            name: "area_counts",
            sql: "CREATE TABLE IF NOT EXISTS area_counts (
                id                TEXT PRIMARY KEY NOT NULL,
                event_id          TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                area_template_id  TEXT NOT NULL REFERENCES area_templates(id) ON DELETE CASCADE,
                count             INTEGER NOT NULL DEFAULT 0,
                capacity          INTEGER NOT NULL DEFAULT 0,
                notes             TEXT,
                updated_at        TEXT NOT NULL
            );",
        },
        SchemaOp::CreateIndex {
            name: "index_area_counts_event_id",
            table: "area_counts",
            columns: &["event_id"],
            unique: false,
        },
        SchemaOp::CreateIndex {
            name: "index_area_counts_area_template_id",
            table: "area_counts",
            columns: &["area_template_id"],
            unique: false,
        },
        SchemaOp::CreateTable {
            name: "users",
            sql: "CREATE TABLE IF NOT EXISTS users (
                id          TEXT PRIMARY KEY NOT NULL,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL,
                role        TEXT NOT NULL DEFAULT 'counter',
                is_active   INTEGER NOT NULL DEFAULT 1,
                created_at  TEXT NOT NULL
            );",
        },
        SchemaOp::CreateIndex {
            name: "index_users_email",
            table: "users",
            columns: &["email"],
            unique: true,
        },
    ]
}

fn v2_event_types() -> Vec<SchemaOp> {
    vec![
        SchemaOp::CreateTable {
            name: "event_types",
            sql: "CREATE TABLE IF NOT EXISTS event_types (
                id          TEXT PRIMARY KEY NOT NULL,
                name        TEXT NOT NULL,
                day_type    TEXT NOT NULL DEFAULT 'sunday',
                time_label  TEXT NOT NULL DEFAULT '',
                is_active   INTEGER NOT NULL DEFAULT 1,
                sort_order  INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );",
        },
        SchemaOp::AddColumn {
            table: "events",
            column: "event_type_id",
            definition: "TEXT REFERENCES event_types(id) ON DELETE SET NULL",
        },
        SchemaOp::CreateIndex {
            name: "index_events_event_type_id",
            table: "events",
            columns: &["event_type_id"],
            unique: false,
        },
        SchemaOp::CreateIndex {
            name: "index_events_branch_id_event_type_id",
            table: "events",
            columns: &["branch_id", "event_type_id"],
            unique: false,
        },
        SchemaOp::AddColumn {
            table: "branches",
            column: "contact_person",
            definition: "TEXT",
        },
        SchemaOp::AddColumn {
            table: "branches",
            column: "contact_phone",
            definition: "TEXT",
        },
    ]
}

fn v3_lost_items_incidents() -> Vec<SchemaOp> {
    vec![
        SchemaOp::CreateTable {
            name: "lost_items",
            sql: "CREATE TABLE IF NOT EXISTS lost_items (
                id              TEXT PRIMARY KEY NOT NULL,
                branch_id       TEXT NOT NULL REFERENCES branches(id) ON DELETE CASCADE,
                event_id        TEXT REFERENCES events(id) ON DELETE SET NULL,
                description     TEXT NOT NULL,
                category        TEXT NOT NULL DEFAULT 'other',
                found_location  TEXT,
                found_by        TEXT,
                status          TEXT NOT NULL DEFAULT 'found',
                claimed_by      TEXT,
                claimed_at      TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );",
        },
        SchemaOp::CreateIndex {
            name: "index_lost_items_branch_id",
            table: "lost_items",
            columns: &["branch_id"],
            unique: false,
        },
        SchemaOp::CreateIndex {
            name: "index_lost_items_event_id",
            table: "lost_items",
            columns: &["event_id"],
            unique: false,
        },
        SchemaOp::CreateTable {
            name: "incidents",
            sql: "CREATE TABLE IF NOT EXISTS incidents (
                id            TEXT PRIMARY KEY NOT NULL,
                branch_id     TEXT NOT NULL REFERENCES branches(id) ON DELETE CASCADE,
                event_id      TEXT REFERENCES events(id) ON DELETE SET NULL,
                title         TEXT NOT NULL,
                description   TEXT,
                severity      TEXT NOT NULL DEFAULT 'low',
                reported_by   TEXT,
                action_taken  TEXT,
                is_resolved   INTEGER NOT NULL DEFAULT 0,
                resolved_at   TEXT,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            );",
        },
        SchemaOp::CreateIndex {
            name: "index_incidents_branch_id",
            table: "incidents",
            columns: &["branch_id"],
            unique: false,
        },
        SchemaOp::CreateIndex {
            name: "index_incidents_event_id",
            table: "incidents",
            columns: &["event_id"],
            unique: false,
        },
        SchemaOp::AddColumn {
            table: "area_counts",
            column: "history",
            definition: "TEXT NOT NULL DEFAULT '[]'",
        },
    ]
}

const EVENT_TYPE_COLUMNS: &[(&str, &str)] = &[
    ("id", "id"),
    ("name", "name"),
    ("day_type", "day_type"),
    ("time_label", "time_label"),
    ("is_active", "is_active"),
    ("sort_order", "sort_order"),
    ("created_at", "created_at"),
];

/// Duplicate branch codes or event type names fail the step; nothing is
/// deduplicated. `event_types` is rebuilt so the constraint lives in the
/// table definition, and `(event_id, area_template_id)` stays non-unique
/// because earlier versions never prevented repeated pairs.
fn v4_unique_and_composite_indices() -> Vec<SchemaOp> {
    vec![
        SchemaOp::CreateIndex {
            name: "index_branches_code",
            table: "branches",
            columns: &["code"],
            unique: true,
        },
        SchemaOp::CreateTable {
            name: "event_types_new",
            sql: "CREATE TABLE IF NOT EXISTS event_types_new (
                id          TEXT PRIMARY KEY NOT NULL,
                name        TEXT NOT NULL UNIQUE,
                day_type    TEXT NOT NULL DEFAULT 'sunday',
                time_label  TEXT NOT NULL DEFAULT '',
                is_active   INTEGER NOT NULL DEFAULT 1,
                sort_order  INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );",
        },
        SchemaOp::CopyRows {
            from: "event_types",
            to: "event_types_new",
            columns: EVENT_TYPE_COLUMNS,
        },
        SchemaOp::DropTable {
            name: "event_types",
        },
        SchemaOp::RenameTable {
            from: "event_types_new",
            to: "event_types",
        },
        SchemaOp::CreateIndex {
            name: "index_event_types_name",
            table: "event_types",
            columns: &["name"],
            unique: true,
        },
        SchemaOp::CreateIndex {
            name: "index_events_branch_id_date",
            table: "events",
            columns: &["branch_id", "date"],
            unique: false,
        },
        SchemaOp::CreateIndex {
            name: "index_area_counts_event_id_area_template_id",
            table: "area_counts",
            columns: &["event_id", "area_template_id"],
            unique: false,
        },
    ]
}

const BRANCH_TO_VENUE_COLUMNS: &[(&str, &str)] = &[
    ("id", "id"),
    ("name", "name"),
    ("location", "location"),
    ("code", "code"),
    ("is_active", "is_active"),
    ("contact_person", "contact_person"),
    ("contact_phone", "contact_phone"),
    ("created_at", "created_at"),
    ("updated_at", "updated_at"),
];

const AREA_TEMPLATE_COLUMNS: &[(&str, &str)] = &[
    ("id", "id"),
    ("branch_id", "venue_id"),
    ("name", "name"),
    ("area_type", "area_type"),
    ("capacity", "capacity"),
    ("is_active", "is_active"),
    ("sort_order", "sort_order"),
    ("created_at", "created_at"),
    ("updated_at", "updated_at"),
];

const EVENT_COLUMNS: &[(&str, &str)] = &[
    ("id", "id"),
    ("branch_id", "venue_id"),
    ("event_type_id", "event_type_id"),
    ("date", "date"),
    ("total_attendance", "total_attendance"),
    ("total_capacity", "total_capacity"),
    ("is_locked", "is_locked"),
    ("counted_by", "counted_by"),
    ("notes", "notes"),
    ("created_at", "created_at"),
    ("updated_at", "updated_at"),
];

const LOST_ITEM_COLUMNS: &[(&str, &str)] = &[
    ("id", "id"),
    ("branch_id", "venue_id"),
    ("event_id", "event_id"),
    ("description", "description"),
    ("category", "category"),
    ("found_location", "found_location"),
    ("found_by", "found_by"),
    ("status", "status"),
    ("claimed_by", "claimed_by"),
    ("claimed_at", "claimed_at"),
    ("created_at", "created_at"),
    ("updated_at", "updated_at"),
];

const INCIDENT_COLUMNS: &[(&str, &str)] = &[
    ("id", "id"),
    ("branch_id", "venue_id"),
    ("event_id", "event_id"),
    ("title", "title"),
    ("description", "description"),
    ("severity", "severity"),
    ("reported_by", "reported_by"),
    ("action_taken", "action_taken"),
    ("is_resolved", "is_resolved"),
    ("resolved_at", "resolved_at"),
    ("created_at", "created_at"),
    ("updated_at", "updated_at"),
];

/// `branches` becomes `venues` and every `branch_id` becomes `venue_id`.
/// Child tables are rebuilt (create `*_new`, copy, drop, rename) so their
/// foreign keys point at `venues` with the same cascade policy as before,
/// then every index is recreated under its new name.
fn v5_branches_to_venues() -> Vec<SchemaOp> {
    vec![
        SchemaOp::CreateTable {
            name: "venues",
            sql: "CREATE TABLE IF NOT EXISTS venues (
                id              TEXT PRIMARY KEY NOT NULL,
                name            TEXT NOT NULL,
                location        TEXT NOT NULL DEFAULT '',
                code            TEXT NOT NULL,
                is_active       INTEGER NOT NULL DEFAULT 1,
                contact_person  TEXT,
                contact_phone   TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );",
        },
        SchemaOp::CopyRows {
            from: "branches",
            to: "venues",
            columns: BRANCH_TO_VENUE_COLUMNS,
        },
        // area_templates
        SchemaOp::CreateTable {
            name: "area_templates_new",
            sql: "CREATE TABLE IF NOT EXISTS area_templates_new (
                id          TEXT PRIMARY KEY NOT NULL,
                venue_id    TEXT NOT NULL REFERENCES venues(id) ON DELETE CASCADE,
                name        TEXT NOT NULL,
                area_type   TEXT NOT NULL DEFAULT 'seating',
                capacity    INTEGER NOT NULL DEFAULT 0,
                is_active   INTEGER NOT NULL DEFAULT 1,
                sort_order  INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );",
        },
        SchemaOp::CopyRows {
            from: "area_templates",
            to: "area_templates_new",
            columns: AREA_TEMPLATE_COLUMNS,
        },
        SchemaOp::DropTable {
            name: "area_templates",
        },
        SchemaOp::RenameTable {
            from: "area_templates_new",
            to: "area_templates",
        },
        // events
        SchemaOp::CreateTable {
            name: "events_new",
            sql: "CREATE TABLE IF NOT EXISTS events_new (
                id                TEXT PRIMARY KEY NOT NULL,
                venue_id          TEXT NOT NULL REFERENCES venues(id) ON DELETE CASCADE,
                event_type_id     TEXT REFERENCES event_types(id) ON DELETE SET NULL,
                date              TEXT NOT NULL,
                total_attendance  INTEGER NOT NULL DEFAULT 0,
                total_capacity    INTEGER NOT NULL DEFAULT 0,
                is_locked         INTEGER NOT NULL DEFAULT 0,
                counted_by        TEXT,
                notes             TEXT,
                created_at        TEXT NOT NULL,
                updated_at        TEXT NOT NULL
            );",
        },
        SchemaOp::CopyRows {
            from: "events",
            to: "events_new",
            columns: EVENT_COLUMNS,
        },
        SchemaOp::DropTable { name: "events" },
        SchemaOp::RenameTable {
            from: "events_new",
            to: "events",
        },
        // lost_items
        SchemaOp::CreateTable {
            name: "lost_items_new",
            sql: "CREATE TABLE IF NOT EXISTS lost_items_new (
                id              TEXT PRIMARY KEY NOT NULL,
                venue_id        TEXT NOT NULL REFERENCES venues(id) ON DELETE CASCADE,
                event_id        TEXT REFERENCES events(id) ON DELETE SET NULL,
                description     TEXT NOT NULL,
                category        TEXT NOT NULL DEFAULT 'other',
                found_location  TEXT,
                found_by        TEXT,
                status          TEXT NOT NULL DEFAULT 'found',
                claimed_by      TEXT,
                claimed_at      TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );",
        },
        SchemaOp::CopyRows {
            from: "lost_items",
            to: "lost_items_new",
            columns: LOST_ITEM_COLUMNS,
        },
        SchemaOp::DropTable { name: "lost_items" },
        SchemaOp::RenameTable {
            from: "lost_items_new",
            to: "lost_items",
        },
        // incidents
        SchemaOp::CreateTable {
            name: "incidents_new",
            sql: "CREATE TABLE IF NOT EXISTS incidents_new (
                id            TEXT PRIMARY KEY NOT NULL,
                venue_id      TEXT NOT NULL REFERENCES venues(id) ON DELETE CASCADE,
                event_id      TEXT REFERENCES events(id) ON DELETE SET NULL,
                title         TEXT NOT NULL,
                description   TEXT,
                severity      TEXT NOT NULL DEFAULT 'low',
                reported_by   TEXT,
                action_taken  TEXT,
                is_resolved   INTEGER NOT NULL DEFAULT 0,
                resolved_at   TEXT,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            );",
        },
        SchemaOp::CopyRows {
            from: "incidents",
            to: "incidents_new",
            columns: INCIDENT_COLUMNS,
        },
        SchemaOp::DropTable { name: "incidents" },
        SchemaOp::RenameTable {
            from: "incidents_new",
            to: "incidents",
        },
        SchemaOp::DropTable { name: "branches" },
        // indices
        SchemaOp::CreateIndex {
            name: "index_venues_code",
            table: "venues",
            columns: &["code"],
            unique: true,
        },
        SchemaOp::CreateIndex {
            name: "index_area_templates_venue_id",
            table: "area_templates",
            columns: &["venue_id"],
            unique: false,
        },
        SchemaOp::CreateIndex {
            name: "index_events_venue_id",
            table: "events",
            columns: &["venue_id"],
            unique: false,
        },
        SchemaOp::CreateIndex {
            name: "index_events_event_type_id",
            table: "events",
            columns: &["event_type_id"],
            unique: false,
        },
        SchemaOp::CreateIndex {
            name: "index_events_venue_id_date",
            table: "events",
            columns: &["venue_id", "date"],
            unique: false,
        },
        SchemaOp::CreateIndex {
            name: "index_events_venue_id_event_type_id",
            table: "events",
            columns: &["venue_id", "event_type_id"],
            unique: false,
        },
        SchemaOp::CreateIndex {
            name: "index_lost_items_venue_id",
            table: "lost_items",
            columns: &["venue_id"],
            unique: false,
        },
        SchemaOp::CreateIndex {
            name: "index_lost_items_event_id",
            table: "lost_items",
            columns: &["event_id"],
            unique: false,
        },
        SchemaOp::CreateIndex {
            name: "index_incidents_venue_id",
            table: "incidents",
            columns: &["venue_id"],
            unique: false,
        },
        SchemaOp::CreateIndex {
            name: "index_incidents_event_id",
            table: "incidents",
            columns: &["event_id"],
            unique: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path().join("migrate.db")).unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        (dir, conn)
    }

    fn index_names(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = ?1 AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap();
        stmt.query_map(params![table], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<String>, _>>()
            .unwrap()
    }

    fn index_is_unique(conn: &Connection, name: &str) -> bool {
        let sql: String = conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'index' AND name = ?1",
                params![name],
                |row| row.get(0),
            )
            .unwrap();
        sql.starts_with("CREATE UNIQUE INDEX")
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    fn seed_v3(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO branches (id, name, location, code, is_active, contact_person, contact_phone, created_at, updated_at)
             VALUES ('b1', 'Main Campus', 'Downtown', 'MC', 1, 'Ann', '555-0100', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z'),
                    ('b2', 'North Campus', 'Uptown', 'NC', 0, NULL, NULL, '2024-01-02T00:00:00Z', '2024-01-02T00:00:00Z');
             INSERT INTO event_types (id, name, day_type, time_label, is_active, sort_order, created_at)
             VALUES ('t1', 'Sunday 9am', 'sunday', '9:00 AM', 1, 0, '2024-01-01T00:00:00Z');
             INSERT INTO area_templates (id, branch_id, name, area_type, capacity, is_active, sort_order, created_at, updated_at)
             VALUES ('a1', 'b1', 'Main Hall', 'seating', 200, 1, 0, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z'),
                    ('a2', 'b1', 'Balcony', 'seating', 100, 1, 1, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z'),
                    ('a3', 'b2', 'Lobby', 'standing', 50, 1, 0, '2024-01-02T00:00:00Z', '2024-01-02T00:00:00Z');
             INSERT INTO events (id, branch_id, date, total_attendance, total_capacity, is_locked, counted_by, notes, created_at, updated_at, event_type_id)
             VALUES ('e1', 'b1', '2024-03-10', 250, 300, 1, 'Ann', 'rainy', '2024-03-10T09:00:00Z', '2024-03-10T11:00:00Z', 't1'),
                    ('e2', 'b2', '2024-03-10', 0, 50, 0, NULL, NULL, '2024-03-10T09:00:00Z', '2024-03-10T09:00:00Z', NULL);
             INSERT INTO area_counts (id, event_id, area_template_id, count, capacity, notes, updated_at, history)
             VALUES ('c1', 'e1', 'a1', 150, 200, NULL, '2024-03-10T10:00:00Z', '[]'),
                    ('c2', 'e1', 'a2', 100, 100, 'full', '2024-03-10T10:00:00Z', '[]'),
                    ('c3', 'e2', 'a3', 0, 50, NULL, '2024-03-10T09:00:00Z', '[]');
             INSERT INTO lost_items (id, branch_id, event_id, description, category, status, created_at, updated_at)
             VALUES ('l1', 'b1', 'e1', 'Blue umbrella', 'other', 'found', '2024-03-10T12:00:00Z', '2024-03-10T12:00:00Z');
             INSERT INTO incidents (id, branch_id, event_id, title, severity, is_resolved, created_at, updated_at)
             VALUES ('i1', 'b1', 'e1', 'Slip in lobby', 'medium', 0, '2024-03-10T10:30:00Z', '2024-03-10T10:30:00Z');",
        )
        .unwrap();
    }

    #[test]
    fn test_fresh_database_reaches_target() {
        let (_dir, mut conn) = fresh();
        assert_eq!(current_version(&conn).unwrap(), 0);
        assert_eq!(run(&mut conn).unwrap(), TARGET_VERSION);
        assert_eq!(current_version(&conn).unwrap(), TARGET_VERSION);

        for table in [
            "venues",
            "area_templates",
            "event_types",
            "events",
            "area_counts",
            "users",
            "lost_items",
            "incidents",
        ] {
            assert!(table_exists(&conn, table).unwrap(), "missing table {table}");
        }
        assert!(!table_exists(&conn, "branches").unwrap());
        assert!(column_exists(&conn, "events", "venue_id").unwrap());
        assert!(!column_exists(&conn, "events", "branch_id").unwrap());

        // Foreign keys are enforced again afterwards.
        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0)).unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_run_is_noop_when_current() {
        let (_dir, mut conn) = fresh();
        run(&mut conn).unwrap();
        assert_eq!(run(&mut conn).unwrap(), TARGET_VERSION);
        assert!(status(&conn).unwrap().pending.is_empty());
    }

    #[test]
    fn test_status_lists_pending_steps() {
        let (_dir, mut conn) = fresh();
        run_to(&mut conn, &all_steps(), 2).unwrap();
        let s = status(&conn).unwrap();
        assert_eq!(s.current_version, 2);
        assert_eq!(s.target_version, TARGET_VERSION);
        assert_eq!(s.pending, vec![(2, 3), (3, 4), (4, 5)]);
    }

    #[test]
    fn test_v3_to_v4_adds_unique_branch_code_index() {
        let (_dir, mut conn) = fresh();
        run_to(&mut conn, &all_steps(), 3).unwrap();
        conn.execute_batch(
            "INSERT INTO branches (id, name, code, created_at, updated_at)
             VALUES ('b1', 'Main Campus', 'MC', 'now', 'now'),
                    ('b2', 'North Campus', 'NC', 'now', 'now');",
        )
        .unwrap();

        run_to(&mut conn, &all_steps(), 4).unwrap();

        assert!(index_names(&conn, "branches").contains(&"index_branches_code".to_string()));
        assert!(index_is_unique(&conn, "index_branches_code"));

        let mut stmt = conn.prepare("SELECT code FROM branches ORDER BY id").unwrap();
        let codes: Vec<String> = stmt
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(codes, vec!["MC".to_string(), "NC".to_string()]);

        let dup = conn.execute(
            "INSERT INTO branches (id, name, code, created_at, updated_at) VALUES ('b3', 'X', 'MC', 'now', 'now')",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_duplicate_codes_abort_step_and_keep_version() {
        let (_dir, mut conn) = fresh();
        run_to(&mut conn, &all_steps(), 3).unwrap();
        conn.execute_batch(
            "INSERT INTO branches (id, name, code, created_at, updated_at)
             VALUES ('b1', 'One', 'MC', 'now', 'now'), ('b2', 'Two', 'MC', 'now', 'now');",
        )
        .unwrap();

        let err = run(&mut conn).unwrap_err();
        assert!(matches!(err, AppError::Migration(_)));
        assert_eq!(current_version(&conn).unwrap(), 3);
        // Rolled back: none of the step's indices exist.
        assert!(!index_names(&conn, "events").contains(&"index_events_branch_id_date".to_string()));
        assert_eq!(count(&conn, "branches"), 2);
    }

    #[test]
    fn test_v3_to_v4_rebuilds_event_types_with_unique_name() {
        let (_dir, mut conn) = fresh();
        run_to(&mut conn, &all_steps(), 3).unwrap();
        conn.execute_batch(
            "INSERT INTO branches (id, name, code, created_at, updated_at) VALUES ('b1', 'Main Campus', 'MC', 'now', 'now');
             INSERT INTO event_types (id, name, day_type, time_label, is_active, sort_order, created_at)
             VALUES ('t1', 'Sunday 9am', 'sunday', '9:00 AM', 1, 0, '2024-01-01T00:00:00Z'),
                    ('t2', 'Wednesday', 'midweek', '7:00 PM', 0, 1, '2024-01-02T00:00:00Z');
             INSERT INTO events (id, branch_id, event_type_id, date, created_at, updated_at)
             VALUES ('e1', 'b1', 't2', '2024-03-13', 'now', 'now');",
        )
        .unwrap();

        run_to(&mut conn, &all_steps(), 4).unwrap();

        assert_eq!(count(&conn, "event_types"), 2);
        assert!(!table_exists(&conn, "event_types_new").unwrap());
        assert!(index_is_unique(&conn, "index_event_types_name"));
        let (name, day, label, active, order): (String, String, String, i64, i64) = conn
            .query_row(
                "SELECT name, day_type, time_label, is_active, sort_order FROM event_types WHERE id = 't2'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
            )
            .unwrap();
        assert_eq!((name.as_str(), day.as_str(), label.as_str()), ("Wednesday", "midweek", "7:00 PM"));
        assert_eq!((active, order), (0, 1));

        let table_sql: String = conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = 'event_types'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert!(table_sql.contains("UNIQUE"));

        let dup = conn.execute(
            "INSERT INTO event_types (id, name, created_at) VALUES ('t3', 'Sunday 9am', 'now')",
            [],
        );
        assert!(dup.is_err());

        // Events still point at the rebuilt table.
        let etype: Option<String> = conn
            .query_row("SELECT event_type_id FROM events WHERE id = 'e1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(etype.as_deref(), Some("t2"));
        let mut check = conn.prepare("PRAGMA foreign_key_check").unwrap();
        assert!(check.query([]).unwrap().next().unwrap().is_none());
    }

    #[test]
    fn test_duplicate_event_type_names_abort_step_and_keep_version() {
        let (_dir, mut conn) = fresh();
        run_to(&mut conn, &all_steps(), 3).unwrap();
        conn.execute_batch(
            "INSERT INTO event_types (id, name, created_at)
             VALUES ('t1', 'Sunday 9am', 'now'), ('t2', 'Sunday 9am', 'now');",
        )
        .unwrap();

        let err = run(&mut conn).unwrap_err();
        assert!(matches!(err, AppError::Migration(_)));
        assert_eq!(current_version(&conn).unwrap(), 3);
        assert_eq!(count(&conn, "event_types"), 2);
        assert!(!table_exists(&conn, "event_types_new").unwrap());
        assert!(!index_names(&conn, "branches").contains(&"index_branches_code".to_string()));
    }

    #[test]
    fn test_repeated_area_count_pairs_survive_migration() {
        let (_dir, mut conn) = fresh();
        run_to(&mut conn, &all_steps(), 3).unwrap();
        conn.execute_batch(
            "INSERT INTO branches (id, name, code, created_at, updated_at) VALUES ('b1', 'Main Campus', 'MC', 'now', 'now');
             INSERT INTO area_templates (id, branch_id, name, capacity, created_at, updated_at)
             VALUES ('a1', 'b1', 'Main Hall', 200, 'now', 'now');
             INSERT INTO events (id, branch_id, date, created_at, updated_at)
             VALUES ('e1', 'b1', '2024-03-10', 'now', 'now');
             INSERT INTO area_counts (id, event_id, area_template_id, count, capacity, updated_at)
             VALUES ('c1', 'e1', 'a1', 40, 200, 'now'), ('c2', 'e1', 'a1', 55, 200, 'now');",
        )
        .unwrap();

        assert_eq!(run(&mut conn).unwrap(), TARGET_VERSION);

        assert_eq!(count(&conn, "area_counts"), 2);
        let counts: Vec<i64> = conn
            .prepare("SELECT count FROM area_counts ORDER BY id")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(counts, vec![40, 55]);
    }

    #[test]
    fn test_early_steps_preserve_rows_and_fill_defaults() {
        let (_dir, mut conn) = fresh();
        run_to(&mut conn, &all_steps(), 1).unwrap();
        conn.execute_batch(
            "INSERT INTO branches (id, name, location, code, is_active, created_at, updated_at)
             VALUES ('b1', 'Main Campus', 'Downtown', 'MC', 1, '2024-01-01T00:00:00Z', '2024-01-05T00:00:00Z'),
                    ('b2', 'North Campus', '', 'NC', 0, '2024-01-02T00:00:00Z', '2024-01-02T00:00:00Z');
             INSERT INTO area_templates (id, branch_id, name, area_type, capacity, is_active, sort_order, created_at, updated_at)
             VALUES ('a1', 'b1', 'Main Hall', 'seating', 200, 1, 0, 'now', 'now');
             INSERT INTO events (id, branch_id, date, total_attendance, total_capacity, is_locked, counted_by, notes, created_at, updated_at)
             VALUES ('e1', 'b1', '2024-03-10', 150, 200, 1, 'Ann', 'rainy', 'now', 'now');
             INSERT INTO area_counts (id, event_id, area_template_id, count, capacity, notes, updated_at)
             VALUES ('c1', 'e1', 'a1', 150, 200, 'packed', '2024-03-10T10:00:00Z');
             INSERT INTO users (id, name, email, role, is_active, created_at)
             VALUES ('u1', 'Ann', 'ann@example.com', 'admin', 1, 'now');",
        )
        .unwrap();
        let tables = ["branches", "area_templates", "events", "area_counts", "users"];
        let before: Vec<i64> = tables.iter().map(|t| count(&conn, t)).collect();

        run_to(&mut conn, &all_steps(), 2).unwrap();
        let after: Vec<i64> = tables.iter().map(|t| count(&conn, t)).collect();
        assert_eq!(before, after);

        let (location, person, phone, updated): (String, Option<String>, Option<String>, String) = conn
            .query_row(
                "SELECT location, contact_person, contact_phone, updated_at FROM branches WHERE id = 'b1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .unwrap();
        assert_eq!(location, "Downtown");
        assert!(person.is_none() && phone.is_none());
        assert_eq!(updated, "2024-01-05T00:00:00Z");

        let (etype, total, locked, by, notes): (Option<String>, i64, i64, Option<String>, Option<String>) = conn
            .query_row(
                "SELECT event_type_id, total_attendance, is_locked, counted_by, notes FROM events WHERE id = 'e1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
            )
            .unwrap();
        assert!(etype.is_none());
        assert_eq!((total, locked), (150, 1));
        assert_eq!(by.as_deref(), Some("Ann"));
        assert_eq!(notes.as_deref(), Some("rainy"));

        run_to(&mut conn, &all_steps(), 3).unwrap();
        let after: Vec<i64> = tables.iter().map(|t| count(&conn, t)).collect();
        assert_eq!(before, after);

        let (value, cap, notes, history): (i64, i64, Option<String>, String) = conn
            .query_row(
                "SELECT count, capacity, notes, history FROM area_counts WHERE id = 'c1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .unwrap();
        assert_eq!((value, cap), (150, 200));
        assert_eq!(notes.as_deref(), Some("packed"));
        assert_eq!(history, "[]");

        run(&mut conn).unwrap();
        let email: String = conn
            .query_row("SELECT email FROM users WHERE id = 'u1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(email, "ann@example.com");
        assert_eq!(count(&conn, "venues"), 2);
        assert_eq!(count(&conn, "area_counts"), 1);
    }

    #[test]
    fn test_rename_preserves_rows_and_values() {
        let (_dir, mut conn) = fresh();
        run_to(&mut conn, &all_steps(), 4).unwrap();
        seed_v3(&conn);

        let before: Vec<(String, i64)> = [
            "branches",
            "area_templates",
            "event_types",
            "events",
            "area_counts",
            "lost_items",
            "incidents",
        ]
        .iter()
        .map(|t| (t.to_string(), count(&conn, t)))
        .collect();

        run(&mut conn).unwrap();

        for (table, n) in before {
            let after_table = if table == "branches" { "venues" } else { table.as_str() };
            assert_eq!(count(&conn, after_table), n, "row count changed for {table}");
        }

        let (name, location, code, active, person, phone): (String, String, String, i64, Option<String>, Option<String>) = conn
            .query_row(
                "SELECT name, location, code, is_active, contact_person, contact_phone FROM venues WHERE id = 'b1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?)),
            )
            .unwrap();
        assert_eq!(name, "Main Campus");
        assert_eq!(location, "Downtown");
        assert_eq!(code, "MC");
        assert_eq!(active, 1);
        assert_eq!(person.as_deref(), Some("Ann"));
        assert_eq!(phone.as_deref(), Some("555-0100"));

        let (venue, etype, total, cap, locked, by, notes): (String, Option<String>, i64, i64, i64, Option<String>, Option<String>) = conn
            .query_row(
                "SELECT venue_id, event_type_id, total_attendance, total_capacity, is_locked, counted_by, notes FROM events WHERE id = 'e1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?, r.get(6)?)),
            )
            .unwrap();
        assert_eq!(venue, "b1");
        assert_eq!(etype.as_deref(), Some("t1"));
        assert_eq!((total, cap, locked), (250, 300, 1));
        assert_eq!(by.as_deref(), Some("Ann"));
        assert_eq!(notes.as_deref(), Some("rainy"));

        let area_venue: String = conn
            .query_row("SELECT venue_id FROM area_templates WHERE id = 'a3'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(area_venue, "b2");

        let (c2_count, c2_notes): (i64, Option<String>) = conn
            .query_row("SELECT count, notes FROM area_counts WHERE id = 'c2'", [], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap();
        assert_eq!(c2_count, 100);
        assert_eq!(c2_notes.as_deref(), Some("full"));
    }

    #[test]
    fn test_rename_recreates_indices_by_name() {
        let (_dir, mut conn) = fresh();
        run(&mut conn).unwrap();

        assert_eq!(index_names(&conn, "venues"), vec!["index_venues_code"]);
        assert!(index_is_unique(&conn, "index_venues_code"));
        assert_eq!(
            index_names(&conn, "events"),
            vec![
                "index_events_event_type_id",
                "index_events_venue_id",
                "index_events_venue_id_date",
                "index_events_venue_id_event_type_id",
            ]
        );
        assert_eq!(index_names(&conn, "area_templates"), vec!["index_area_templates_venue_id"]);
        assert!(index_names(&conn, "area_counts")
            .contains(&"index_area_counts_event_id_area_template_id".to_string()));
        assert!(!index_is_unique(&conn, "index_area_counts_event_id_area_template_id"));
        assert!(index_is_unique(&conn, "index_event_types_name"));
        assert_eq!(
            index_names(&conn, "incidents"),
            vec!["index_incidents_event_id", "index_incidents_venue_id"]
        );
    }

    #[test]
    fn test_cascade_policies_survive_rebuild() {
        let (_dir, mut conn) = fresh();
        run_to(&mut conn, &all_steps(), 4).unwrap();
        seed_v3(&conn);
        run(&mut conn).unwrap();

        // Deleting an event type nulls the reference instead of deleting the event.
        conn.execute("DELETE FROM event_types WHERE id = 't1'", []).unwrap();
        let etype: Option<String> = conn
            .query_row("SELECT event_type_id FROM events WHERE id = 'e1'", [], |r| r.get(0))
            .unwrap();
        assert!(etype.is_none());

        // Deleting an event keeps its lost items and incidents, nulling the link.
        conn.execute("DELETE FROM events WHERE id = 'e1'", []).unwrap();
        assert_eq!(count(&conn, "area_counts"), 1);
        let item_event: Option<String> = conn
            .query_row("SELECT event_id FROM lost_items WHERE id = 'l1'", [], |r| r.get(0))
            .unwrap();
        assert!(item_event.is_none());
        assert_eq!(count(&conn, "incidents"), 1);

        // Deleting a venue cascades to everything it owns.
        conn.execute("DELETE FROM venues WHERE id = 'b1'", []).unwrap();
        assert_eq!(count(&conn, "area_templates"), 1);
        assert_eq!(count(&conn, "lost_items"), 0);
        assert_eq!(count(&conn, "incidents"), 0);
        conn.execute("DELETE FROM venues WHERE id = 'b2'", []).unwrap();
        assert_eq!(count(&conn, "events"), 0);
        assert_eq!(count(&conn, "area_counts"), 0);
    }

    #[test]
    fn test_missing_step_is_fatal() {
        let (_dir, mut conn) = fresh();
        let mut steps = all_steps();
        steps.retain(|s| s.from != 2);
        let err = run_to(&mut conn, &steps, TARGET_VERSION).unwrap_err();
        assert!(matches!(err, AppError::Migration(ref m) if m.contains("no migration path from version 2")));
        // The path is resolved before anything runs.
        assert_eq!(current_version(&conn).unwrap(), 0);
    }

    #[test]
    fn test_newer_store_is_rejected() {
        let (_dir, mut conn) = fresh();
        conn.execute_batch("PRAGMA user_version = 9;").unwrap();
        assert!(matches!(run(&mut conn), Err(AppError::Migration(_))));
    }

    #[test]
    fn test_invalid_step_lists_are_rejected() {
        let (_dir, mut conn) = fresh();
        let backwards = vec![Migration {
            from: 1,
            to: 1,
            description: "bad",
            ops: vec![],
        }];
        assert!(run_to(&mut conn, &backwards, 1).is_err());

        let mut duplicated = all_steps();
        duplicated.push(Migration {
            from: 0,
            to: 2,
            description: "shortcut",
            ops: vec![],
        });
        assert!(run_to(&mut conn, &duplicated, TARGET_VERSION).is_err());
    }

    #[test]
    fn test_add_column_guard_tolerates_existing_column() {
        let (_dir, mut conn) = fresh();
        run_to(&mut conn, &all_steps(), 2).unwrap();
        // A partially applied earlier run already added the history column.
        conn.execute_batch("ALTER TABLE area_counts ADD COLUMN history TEXT NOT NULL DEFAULT '[]';")
            .unwrap();
        assert_eq!(run_to(&mut conn, &all_steps(), 3).unwrap(), 3);
    }
}
