use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ============================================================================
// Area type
// ============================================================================

/// Kind of counted space. Stored as its lowercase name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum AreaType {
    #[default]
    Seating,
    Standing,
    Parking,
    Overflow,
    Children,
    Other,
}

impl AreaType {
    pub const ALL: [AreaType; 6] = [
        AreaType::Seating,
        AreaType::Standing,
        AreaType::Parking,
        AreaType::Overflow,
        AreaType::Children,
        AreaType::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AreaType::Seating => "seating",
            AreaType::Standing => "standing",
            AreaType::Parking => "parking",
            AreaType::Overflow => "overflow",
            AreaType::Children => "children",
            AreaType::Other => "other",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AreaType::Seating => "Seating",
            AreaType::Standing => "Standing",
            AreaType::Parking => "Parking",
            AreaType::Overflow => "Overflow",
            AreaType::Children => "Children's Area",
            AreaType::Other => "Other",
        }
    }

    /// Icon identifier understood by the UI layer.
    pub fn icon(self) -> &'static str {
        match self {
            AreaType::Seating => "event_seat",
            AreaType::Standing => "groups",
            AreaType::Parking => "local_parking",
            AreaType::Overflow => "meeting_room",
            AreaType::Children => "child_care",
            AreaType::Other => "place",
        }
    }

    /// Resolve a stored value. Matching is case-insensitive; unknown values
    /// fall back to `Other` so rows written by other versions still load.
    pub fn from_str_or_default(value: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(value.trim()))
            .unwrap_or(AreaType::Other)
    }
}

// ============================================================================
// Area templates
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AreaTemplate {
    pub id: String,
    pub venue_id: String,
    pub name: String,
    pub area_type: AreaType,
    pub capacity: i64,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateAreaTemplateInput {
    pub venue_id: String,
    pub name: String,
    pub area_type: Option<AreaType>,
    pub capacity: i64,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UpdateAreaTemplateInput {
    pub name: Option<String>,
    pub area_type: Option<AreaType>,
    pub capacity: Option<i64>,
    pub is_active: Option<bool>,
}
