mod area;
mod area_count;
mod event;
mod event_type;
mod incident;
mod lost_item;
mod user;
mod venue;

pub use area::*;
pub use area_count::*;
pub use event::*;
pub use event_type::*;
pub use incident::*;
pub use lost_item::*;
pub use user::*;
pub use venue::*;

/// Result of removing a setup record: hard-deleted when nothing refers to it,
/// otherwise soft-deactivated so historical rows keep their references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Removal {
    Deleted,
    Deactivated,
}
