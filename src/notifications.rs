use std::sync::Mutex;

use crate::db::models::{Incident, Severity};

/// Delivers a notification somewhere a person will see it.
///
/// The store only decides *when* to notify; how the message reaches anyone
/// (OS toast, push, email) belongs to the host application.
pub trait IncidentNotifier: Send + Sync {
    fn send(&self, title: &str, body: &str);
}

/// Writes notifications to the log. Used when no host delivery is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl IncidentNotifier for LogNotifier {
    fn send(&self, title: &str, body: &str) {
        tracing::warn!(target: "headcount::notifications", %title, %body, "Incident notification");
    }
}

/// Keeps every sent notification in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl MemoryNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        match self.sent.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl IncidentNotifier for MemoryNotifier {
    fn send(&self, title: &str, body: &str) {
        let mut guard = match self.sent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push((title.to_string(), body.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Public notification helpers
// ---------------------------------------------------------------------------

/// Notify about a newly reported incident if its severity warrants it.
/// Returns whether a notification went out.
pub fn notify_incident_reported(
    notifier: &dyn IncidentNotifier,
    venue_name: &str,
    incident: &Incident,
) -> bool {
    if !incident.severity.requires_notification() {
        return false;
    }
    let body = match incident.reported_by {
        Some(ref who) => format!("{}: {} (reported by {})", venue_name, incident.title, who),
        None => format!("{}: {}", venue_name, incident.title),
    };
    notifier.send(&title_for(incident.severity), &body);
    true
}

fn title_for(severity: Severity) -> String {
    format!("{} Incident", severity.display_name())
}
