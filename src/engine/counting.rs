use std::collections::VecDeque;

use serde::Serialize;

use crate::db::models::{AreaCount, CountChange, CountWrite};
use crate::db::repos::{area_counts, events};
use crate::db::DbPool;
use crate::error::AppError;
use crate::validation::{self, CapacityCheck};

/// Maximum undo entries kept per session. The oldest entry is dropped first.
pub const MAX_UNDO_DEPTH: usize = 200;

// =============================================================================
// CountAction
// =============================================================================

/// One applied count change, replayable in either direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountAction {
    pub area_count_id: String,
    pub old: i64,
    pub new: i64,
}

// =============================================================================
// CountOutcome
// =============================================================================

/// What a session operation did. Ignored calls are outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CountOutcome {
    Applied {
        area_count_id: String,
        old: i64,
        new: i64,
        /// Event total after the write.
        total: i64,
        /// The new count exceeds the area's capacity snapshot. Warning only.
        over_capacity: bool,
    },
    /// The event is locked; nothing was written.
    Locked,
    /// The change would leave the count where it is (e.g. decrement at zero).
    Unchanged,
    NothingToUndo,
    NothingToRedo,
}

impl CountOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CountOutcome::Applied { .. })
    }
}

// =============================================================================
// CountingSession
// =============================================================================

/// Live counting of one event.
///
/// Holds an in-memory mirror of the event's area counts plus undo/redo
/// stacks. Every mutation is persisted through [`area_counts::apply_count`]
/// first; the mirror and the stacks only change once the write has
/// committed, so a failed write leaves the session exactly as it was.
///
/// While the event is locked, increments, decrements, sets, undo and redo
/// all return [`CountOutcome::Locked`]. The stacks are kept across
/// lock/unlock.
#[derive(Debug)]
pub struct CountingSession {
    event_id: String,
    counts: Vec<AreaCount>,
    total: i64,
    locked: bool,
    undo: VecDeque<CountAction>,
    redo: Vec<CountAction>,
}

impl CountingSession {
    /// Load an event and its area counts.
    pub fn open(pool: &DbPool, event_id: &str) -> Result<Self, AppError> {
        let event = events::get_by_id(pool, event_id)?;
        let counts = area_counts::get_by_event(pool, event_id)?;
        tracing::debug!(event_id, areas = counts.len(), locked = event.is_locked, "Counting session opened");
        Ok(Self {
            event_id: event.id,
            counts,
            total: event.total_attendance,
            locked: event.is_locked,
            undo: VecDeque::new(),
            redo: Vec::new(),
        })
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    /// Mirrored area counts in display order.
    pub fn counts(&self) -> &[AreaCount] {
        &self.counts
    }

    pub fn count_of(&self, area_count_id: &str) -> Option<i64> {
        self.counts
            .iter()
            .find(|c| c.id == area_count_id)
            .map(|c| c.count)
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn can_undo(&self) -> bool {
        !self.locked && !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.locked && !self.redo.is_empty()
    }

    pub fn increment(
        &mut self,
        pool: &DbPool,
        area_count_id: &str,
        amount: i64,
    ) -> Result<CountOutcome, AppError> {
        self.mutate(pool, area_count_id, CountChange::Increment(amount))
    }

    /// Floors at zero; a decrement at zero is [`CountOutcome::Unchanged`].
    pub fn decrement(
        &mut self,
        pool: &DbPool,
        area_count_id: &str,
        amount: i64,
    ) -> Result<CountOutcome, AppError> {
        self.mutate(pool, area_count_id, CountChange::Decrement(amount))
    }

    pub fn set_count(
        &mut self,
        pool: &DbPool,
        area_count_id: &str,
        value: i64,
    ) -> Result<CountOutcome, AppError> {
        self.mutate(pool, area_count_id, CountChange::Set(value))
    }

    /// Restore the value before the most recent applied change.
    pub fn undo(&mut self, pool: &DbPool) -> Result<CountOutcome, AppError> {
        if self.locked {
            return Ok(CountOutcome::Locked);
        }
        let action = match self.undo.back() {
            Some(action) => action.clone(),
            None => return Ok(CountOutcome::NothingToUndo),
        };
        let write = match self.write(pool, &action.area_count_id, CountChange::Set(action.old))? {
            Some(write) => write,
            None => return Ok(CountOutcome::Locked),
        };
        self.undo.pop_back();
        self.redo.push(action);
        Ok(self.outcome(write))
    }

    /// Re-apply the most recently undone change.
    pub fn redo(&mut self, pool: &DbPool) -> Result<CountOutcome, AppError> {
        if self.locked {
            return Ok(CountOutcome::Locked);
        }
        let action = match self.redo.last() {
            Some(action) => action.clone(),
            None => return Ok(CountOutcome::NothingToRedo),
        };
        let write = match self.write(pool, &action.area_count_id, CountChange::Set(action.new))? {
            Some(write) => write,
            None => return Ok(CountOutcome::Locked),
        };
        self.redo.pop();
        self.push_undo(action);
        Ok(self.outcome(write))
    }

    pub fn lock(&mut self, pool: &DbPool) -> Result<(), AppError> {
        events::set_locked(pool, &self.event_id, true)?;
        self.locked = true;
        Ok(())
    }

    pub fn unlock(&mut self, pool: &DbPool) -> Result<(), AppError> {
        events::set_locked(pool, &self.event_id, false)?;
        self.locked = false;
        Ok(())
    }

    /// Reload the mirror and lock flag from the store. Undo/redo stacks are
    /// left alone.
    pub fn refresh(&mut self, pool: &DbPool) -> Result<(), AppError> {
        let event = events::get_by_id(pool, &self.event_id)?;
        self.counts = area_counts::get_by_event(pool, &self.event_id)?;
        self.total = event.total_attendance;
        self.locked = event.is_locked;
        Ok(())
    }

    fn mutate(
        &mut self,
        pool: &DbPool,
        area_count_id: &str,
        change: CountChange,
    ) -> Result<CountOutcome, AppError> {
        if self.locked {
            tracing::debug!(event_id = %self.event_id, area_count_id, "Ignoring count change on locked event");
            return Ok(CountOutcome::Locked);
        }
        let write = match self.write(pool, area_count_id, change)? {
            Some(write) => write,
            None => return Ok(CountOutcome::Locked),
        };
        if !write.changed() {
            return Ok(CountOutcome::Unchanged);
        }
        self.push_undo(CountAction {
            area_count_id: write.area_count_id.clone(),
            old: write.old,
            new: write.new,
        });
        self.redo.clear();
        Ok(self.outcome(write))
    }

    /// Persist one change and update the mirror. `None` means the store
    /// reported the event locked (by another session); the flag is mirrored.
    fn write(
        &mut self,
        pool: &DbPool,
        area_count_id: &str,
        change: CountChange,
    ) -> Result<Option<CountWrite>, AppError> {
        let idx = self
            .counts
            .iter()
            .position(|c| c.id == area_count_id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "AreaCount {area_count_id} in event {}",
                    self.event_id
                ))
            })?;

        let write = match area_counts::apply_count(pool, area_count_id, change) {
            Ok(write) => write,
            Err(AppError::Locked(_)) => {
                tracing::warn!(event_id = %self.event_id, "Event was locked elsewhere");
                self.locked = true;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.counts[idx].count = write.new;
        self.total = write.total_attendance;
        Ok(Some(write))
    }

    fn push_undo(&mut self, action: CountAction) {
        if self.undo.len() >= MAX_UNDO_DEPTH {
            self.undo.pop_front();
        }
        self.undo.push_back(action);
    }

    fn outcome(&self, write: CountWrite) -> CountOutcome {
        let over_capacity = matches!(
            validation::check_count(write.new, write.capacity),
            Ok(CapacityCheck::Over { .. })
        );
        CountOutcome::Applied {
            area_count_id: write.area_count_id,
            old: write.old,
            new: write.new,
            total: write.total_attendance,
            over_capacity,
        }
    }
}
