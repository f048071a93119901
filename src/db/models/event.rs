use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ============================================================================
// Events (one counted occurrence at a venue)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Event {
    pub id: String,
    pub venue_id: String,
    pub event_type_id: Option<String>,
    /// `YYYY-MM-DD`
    pub date: String,
    /// Sum of the event's area counts.
    pub total_attendance: i64,
    /// Sum of the event's capacity snapshots.
    pub total_capacity: i64,
    pub is_locked: bool,
    pub counted_by: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Event {
    /// Attendance as a percentage of capacity, `None` when capacity is zero.
    pub fn fill_percent(&self) -> Option<f64> {
        if self.total_capacity > 0 {
            Some(self.total_attendance as f64 * 100.0 / self.total_capacity as f64)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateEventInput {
    pub venue_id: String,
    pub event_type_id: Option<String>,
    pub date: String,
    pub counted_by: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UpdateEventInput {
    pub event_type_id: Option<Option<String>>,
    pub counted_by: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}
