use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }

    /// Badge color (hex) used by the UI.
    pub fn color(self) -> &'static str {
        match self {
            Severity::Low => "#4CAF50",
            Severity::Medium => "#FFC107",
            Severity::High => "#FF9800",
            Severity::Critical => "#F44336",
        }
    }

    /// High and critical incidents are pushed to the notification collaborator.
    pub fn requires_notification(self) -> bool {
        self >= Severity::High
    }

    pub fn from_str_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "medium" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Low,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Incident {
    pub id: String,
    pub venue_id: String,
    pub event_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub severity: Severity,
    pub reported_by: Option<String>,
    pub action_taken: Option<String>,
    pub is_resolved: bool,
    pub resolved_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateIncidentInput {
    pub venue_id: String,
    pub event_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub severity: Option<Severity>,
    pub reported_by: Option<String>,
}
