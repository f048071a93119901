use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum DayType {
    #[default]
    Sunday,
    Saturday,
    Weekday,
    Special,
}

impl DayType {
    pub const ALL: [DayType; 4] = [
        DayType::Sunday,
        DayType::Saturday,
        DayType::Weekday,
        DayType::Special,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DayType::Sunday => "sunday",
            DayType::Saturday => "saturday",
            DayType::Weekday => "weekday",
            DayType::Special => "special",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            DayType::Sunday => "Sunday",
            DayType::Saturday => "Saturday",
            DayType::Weekday => "Weekday",
            DayType::Special => "Special Event",
        }
    }

    /// Unknown stored values resolve to `Special`.
    pub fn from_str_or_default(value: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(value.trim()))
            .unwrap_or(DayType::Special)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EventType {
    pub id: String,
    pub name: String,
    pub day_type: DayType,
    pub time_label: String,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateEventTypeInput {
    pub name: String,
    pub day_type: Option<DayType>,
    pub time_label: Option<String>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UpdateEventTypeInput {
    pub name: Option<String>,
    pub day_type: Option<DayType>,
    pub time_label: Option<String>,
    pub is_active: Option<bool>,
}
