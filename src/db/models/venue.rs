use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ============================================================================
// Venues
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Venue {
    pub id: String,
    pub name: String,
    pub location: String,
    pub code: String,
    pub is_active: bool,
    pub contact_person: Option<String>,
    pub contact_phone: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateVenueInput {
    pub name: String,
    pub code: String,
    pub location: Option<String>,
    pub contact_person: Option<String>,
    pub contact_phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UpdateVenueInput {
    pub name: Option<String>,
    pub code: Option<String>,
    pub location: Option<String>,
    pub contact_person: Option<Option<String>>,
    pub contact_phone: Option<Option<String>>,
    pub is_active: Option<bool>,
}
