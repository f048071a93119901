//! Per-table change notifications.
//!
//! Every pooled connection gets SQLite update/commit/rollback hooks. Table
//! names touched by a transaction are collected by the update hook and staged
//! by the commit hook; a rollback discards them. SQLite runs the commit hook
//! before the commit is durable, so staged changes are only published once
//! the connection is checked back into the pool ([`CheckinPublisher`]). A
//! subscriber that re-runs its query on any connection then sees the commit.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use r2d2::event::{CheckinEvent, HandleEvent};
use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::db::DbPool;
use crate::error::AppError;

/// Capacity of the broadcast channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Tables written by one committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableChange {
    pub tables: BTreeSet<String>,
}

impl TableChange {
    pub fn touches(&self, tables: &[&str]) -> bool {
        tables.iter().any(|t| self.tables.contains(*t))
    }
}

/// Commits whose hook has fired, keyed by the thread that ran them.
type Staged = Arc<Mutex<Vec<(ThreadId, BTreeSet<String>)>>>;

#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<TableChange>,
    staged: Staged,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            staged: Arc::default(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TableChange> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Install the hooks on a connection. Called once per pooled connection.
    pub fn install(&self, conn: &Connection) -> rusqlite::Result<()> {
        let pending: Arc<Mutex<BTreeSet<String>>> = Arc::new(Mutex::new(BTreeSet::new()));

        let on_update = pending.clone();
        conn.update_hook(Some(
            move |_action: rusqlite::hooks::Action, _db: &str, table: &str, _rowid: i64| {
                if let Ok(mut set) = on_update.lock() {
                    if !set.contains(table) {
                        set.insert(table.to_string());
                    }
                }
            },
        ))?;

        let on_commit = pending.clone();
        let staged = self.staged.clone();
        conn.commit_hook(Some(move || {
            let tables = match on_commit.lock() {
                Ok(mut set) => std::mem::take(&mut *set),
                Err(_) => BTreeSet::new(),
            };
            if !tables.is_empty() {
                if let Ok(mut staged) = staged.lock() {
                    staged.push((thread::current().id(), tables));
                }
            }
            false
        }))?;

        let on_rollback = pending;
        conn.rollback_hook(Some(move || {
            if let Ok(mut set) = on_rollback.lock() {
                set.clear();
            }
        }))?;
        Ok(())
    }

    /// Publish the commits staged by the calling thread. Returns how many
    /// notifications were sent. Only call once the committing statement has
    /// returned.
    pub fn publish_committed(&self) -> usize {
        let current = thread::current().id();
        let ready: Vec<BTreeSet<String>> = match self.staged.lock() {
            Ok(mut staged) => {
                let (mine, others): (Vec<_>, Vec<_>) =
                    staged.drain(..).partition(|(owner, _)| *owner == current);
                *staged = others;
                mine.into_iter().map(|(_, tables)| tables).collect()
            }
            Err(_) => return 0,
        };
        let sent = ready.len();
        for tables in ready {
            // No receivers is fine: nobody is watching.
            let _ = self.tx.send(TableChange { tables });
        }
        sent
    }

    /// Build a live query over `tables`.
    pub fn watch<T, F>(&self, pool: &DbPool, tables: &[&'static str], query: F) -> LiveQuery<T>
    where
        F: Fn(&DbPool) -> Result<T, AppError> + Send + Sync + 'static,
    {
        LiveQuery {
            pool: pool.clone(),
            tables: tables.to_vec(),
            rx: self.subscribe(),
            query: Box::new(query),
        }
    }
}

/// Pool event handler that publishes a thread's staged commits when it
/// returns a connection.
#[derive(Debug)]
pub struct CheckinPublisher {
    notifier: ChangeNotifier,
}

impl CheckinPublisher {
    pub fn new(notifier: ChangeNotifier) -> Self {
        Self { notifier }
    }
}

impl HandleEvent for CheckinPublisher {
    fn handle_checkin(&self, _event: CheckinEvent) {
        self.notifier.publish_committed();
    }
}

/// A query that is re-run whenever one of its tables changes.
pub struct LiveQuery<T> {
    pool: DbPool,
    tables: Vec<&'static str>,
    rx: broadcast::Receiver<TableChange>,
    query: Box<dyn Fn(&DbPool) -> Result<T, AppError> + Send + Sync>,
}

impl<T> LiveQuery<T> {
    pub fn current(&self) -> Result<T, AppError> {
        (self.query)(&self.pool)
    }

    /// Wait for the next relevant change and return the fresh result.
    pub async fn changed(&mut self) -> Result<T, AppError> {
        loop {
            match self.rx.recv().await {
                Ok(change) if change.touches(&self.tables) => return self.current(),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Live query lagged, re-running");
                    return self.current();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(AppError::Internal("change notifier closed".into()));
                }
            }
        }
    }

    /// Drain pending notifications without waiting. Returns a fresh result
    /// if any of them touched a watched table.
    pub fn poll(&mut self) -> Option<Result<T, AppError>> {
        let mut relevant = false;
        loop {
            match self.rx.try_recv() {
                Ok(change) => relevant |= change.touches(&self.tables),
                Err(broadcast::error::TryRecvError::Lagged(_)) => relevant = true,
                Err(_) => break,
            }
        }
        relevant.then(|| self.current())
    }
}
