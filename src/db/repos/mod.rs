pub mod area_counts;
pub mod area_templates;
pub mod event_types;
pub mod events;
pub mod incidents;
pub mod lost_items;
pub mod users;
pub mod venues;
