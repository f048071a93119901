use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum UserRole {
    Admin,
    #[default]
    Counter,
    Viewer,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Counter => "counter",
            UserRole::Viewer => "viewer",
        }
    }

    /// Unknown stored roles get the least privilege.
    pub fn from_str_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => UserRole::Admin,
            "counter" => UserRole::Counter,
            _ => UserRole::Viewer,
        }
    }

    pub fn can_manage_setup(self) -> bool {
        matches!(self, UserRole::Admin)
    }

    pub fn can_count(self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Counter)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateUserInput {
    pub name: String,
    pub email: String,
    pub role: Option<UserRole>,
}
