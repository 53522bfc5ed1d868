use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use calendar_cell::CalendarEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Success,
    Error,
}

/// One attempted reminder send, append-only. At most one `Success` may exist
/// per `(appointment_id, template_key)`; once present the pair is permanently
/// excluded from selection for that template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderRecord {
    pub appointment_id: String,
    pub template_key: String,
    pub sent_at: DateTime<Utc>,
    pub status: ReminderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

/// Read-only appointment view derived from a calendar event. Patient details
/// live in the event description written at booking time.
#[derive(Debug, Clone)]
pub struct Appointment {
    pub id: String,
    pub patient_name: String,
    pub phone: String,
    pub start_time: DateTime<Utc>,
    pub modality: String,
    pub location: String,
}

impl Appointment {
    /// Derive an appointment from an event. Returns `None` for cancelled
    /// events, events without a concrete start, or events with no
    /// resolvable phone number.
    pub fn from_event(event: &CalendarEvent) -> Option<Self> {
        if event.is_cancelled() {
            return None;
        }
        let start_time = event.start.date_time?;

        let description = event.description.as_deref().unwrap_or("");
        let phone = field(description, "Phone")
            .or_else(|| embedded_phone(description))?;

        let patient_name = field(description, "Name")
            .or_else(|| {
                event
                    .summary
                    .as_deref()
                    .and_then(|s| s.strip_prefix("Appointment - "))
                    .map(|s| s.trim().to_string())
            })
            .unwrap_or_else(|| "Patient".to_string());

        Some(Self {
            id: event.id.clone(),
            patient_name,
            phone,
            start_time,
            modality: field(description, "Modality").unwrap_or_else(|| "in-person".to_string()),
            location: event
                .location
                .clone()
                .unwrap_or_else(|| "the clinic".to_string()),
        })
    }
}

fn field(description: &str, label: &str) -> Option<String> {
    let pattern = Regex::new(&format!(r"(?im)^\s*{}\s*:\s*(.+)$", label)).ok()?;
    pattern
        .captures(description)
        .map(|caps| caps[1].trim().to_string())
        .filter(|v| !v.is_empty())
}

fn embedded_phone(description: &str) -> Option<String> {
    let pattern = Regex::new(r"\+?\d[\d\s-]{6,14}\d").ok()?;
    pattern.find(description).map(|m| m.as_str().to_string())
}
