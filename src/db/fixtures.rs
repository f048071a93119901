//! Shared setup for repository and engine tests.

use crate::db::models::{
    AreaTemplate, AreaType, CreateAreaTemplateInput, CreateEventInput, CreateVenueInput, Event,
    Venue,
};
use crate::db::repos::{area_templates, events, venues};
use crate::db::DbPool;

pub fn venue(pool: &DbPool, code: &str) -> Venue {
    venues::create(
        pool,
        CreateVenueInput {
            name: format!("Venue {code}"),
            code: code.into(),
            location: None,
            contact_person: None,
            contact_phone: None,
        },
    )
    .unwrap()
}

pub fn area(pool: &DbPool, venue_id: &str, name: &str, capacity: i64) -> AreaTemplate {
    area_templates::create(
        pool,
        CreateAreaTemplateInput {
            venue_id: venue_id.into(),
            name: name.into(),
            area_type: Some(AreaType::Seating),
            capacity,
            sort_order: None,
        },
    )
    .unwrap()
}

pub fn event(pool: &DbPool, venue_id: &str, date: &str) -> Event {
    events::create(
        pool,
        CreateEventInput {
            venue_id: venue_id.into(),
            event_type_id: None,
            date: date.into(),
            counted_by: Some("usher".into()),
            notes: None,
        },
    )
    .unwrap()
}

/// Venue with areas A (capacity 200) and B (capacity 100) and one event.
pub fn two_area_event(pool: &DbPool) -> (Venue, AreaTemplate, AreaTemplate, Event) {
    let v = venue(pool, "MC");
    let a = area(pool, &v.id, "A", 200);
    let b = area(pool, &v.id, "B", 100);
    let e = event(pool, &v.id, "2024-03-10");
    (v, a, b, e)
}
