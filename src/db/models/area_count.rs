use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::AreaType;

/// Persisted history entries kept per area count.
pub const MAX_HISTORY_ENTRIES: usize = 100;

/// One applied change to an area count, serialized into `area_counts.history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CountHistoryEntry {
    pub from: i64,
    pub to: i64,
    pub at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AreaCount {
    pub id: String,
    pub event_id: String,
    pub area_template_id: String,
    pub count: i64,
    /// Copied from the template when the event was created.
    pub capacity: i64,
    pub notes: Option<String>,
    pub history: Vec<CountHistoryEntry>,
    pub updated_at: String,
}

impl AreaCount {
    pub fn is_over_capacity(&self) -> bool {
        self.capacity > 0 && self.count > self.capacity
    }
}

/// Area count joined with its template, in display order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AreaCountView {
    pub id: String,
    pub event_id: String,
    pub area_template_id: String,
    pub area_name: String,
    pub area_type: AreaType,
    pub sort_order: i32,
    pub count: i64,
    pub capacity: i64,
    pub notes: Option<String>,
    pub updated_at: String,
}

/// A count write requested by the counting engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountChange {
    Increment(i64),
    /// Floors at zero.
    Decrement(i64),
    Set(i64),
}

impl CountChange {
    pub fn apply_to(self, current: i64) -> i64 {
        match self {
            CountChange::Increment(n) => current.saturating_add(n),
            CountChange::Decrement(n) => current.saturating_sub(n).max(0),
            CountChange::Set(n) => n,
        }
    }
}

/// Result of a committed count write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountWrite {
    pub area_count_id: String,
    pub event_id: String,
    pub old: i64,
    pub new: i64,
    pub capacity: i64,
    /// Event total after the write.
    pub total_attendance: i64,
}

impl CountWrite {
    pub fn changed(&self) -> bool {
        self.old != self.new
    }
}
