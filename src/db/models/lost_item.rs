use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum LostItemStatus {
    #[default]
    Found,
    Claimed,
    Disposed,
}

impl LostItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LostItemStatus::Found => "found",
            LostItemStatus::Claimed => "claimed",
            LostItemStatus::Disposed => "disposed",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            LostItemStatus::Found => "Awaiting owner",
            LostItemStatus::Claimed => "Claimed",
            LostItemStatus::Disposed => "Disposed",
        }
    }

    pub fn from_str_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "claimed" => LostItemStatus::Claimed,
            "disposed" => LostItemStatus::Disposed,
            _ => LostItemStatus::Found,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LostItem {
    pub id: String,
    pub venue_id: String,
    pub event_id: Option<String>,
    pub description: String,
    pub category: String,
    pub found_location: Option<String>,
    pub found_by: Option<String>,
    pub status: LostItemStatus,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateLostItemInput {
    pub venue_id: String,
    pub event_id: Option<String>,
    pub description: String,
    pub category: Option<String>,
    pub found_location: Option<String>,
    pub found_by: Option<String>,
}
