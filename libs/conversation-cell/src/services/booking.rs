use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use regex::Regex;
use tracing::{debug, info, warn};

use calendar_cell::{CalendarApi, CalendarEvent, CreateEventRequest};
use shared_config::AppConfig;
use shared_utils::datetime::DateTimeExtractor;

use crate::services::extractors::{
    modality_chain, name_chain, phone_chain, reason_chain, ExtractionContext,
    FieldExtractorChain,
};

/// Handles the booking side-effect triggered by a confirmation phrase in an
/// outgoing reply: re-check the calendar, and only create the event when the
/// slot is still free. A slot gone busy in the meantime is a race with a
/// concurrent booking; the event is withheld silently and the conversation
/// reconciles on a later turn.
pub struct BookingService {
    calendar: Arc<dyn CalendarApi>,
    datetime: DateTimeExtractor,
    slot_duration: Duration,
    clinic_location: String,
    names: FieldExtractorChain,
    phones: FieldExtractorChain,
    reasons: FieldExtractorChain,
    modalities: FieldExtractorChain,
    confirmation: Regex,
    cancellation: Regex,
}

impl BookingService {
    pub fn new(config: &AppConfig, calendar: Arc<dyn CalendarApi>) -> Self {
        let offset = FixedOffset::east_opt(config.local_utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
        Self {
            calendar,
            datetime: DateTimeExtractor::new(offset),
            slot_duration: Duration::minutes(config.slot_duration_minutes),
            clinic_location: config.clinic_location.clone(),
            names: name_chain(),
            phones: phone_chain(),
            reasons: reason_chain(),
            modalities: modality_chain(),
            confirmation: Regex::new(
                r"(?i)\byour appointment (?:is|has been) (?:booked|confirmed) for\b([^.!\n]+)",
            )
            .unwrap(),
            cancellation: Regex::new(
                r"(?i)\byour appointment\b[^.!\n]*\bhas been cancelled\b|\bi(?:'ve| have) cancelled your appointment\b",
            )
            .unwrap(),
        }
    }

    pub fn matches_confirmation(&self, text: &str) -> bool {
        self.confirmation.is_match(text)
    }

    pub fn matches_cancellation(&self, text: &str) -> bool {
        self.cancellation.is_match(text)
    }

    /// Create the calendar event named by a confirmation phrase, unless the
    /// target slot turned busy since it was offered. Returns `Ok(None)` both
    /// when the text carries no confirmation and on the busy race.
    pub async fn confirm_booking(
        &self,
        final_text: &str,
        transcript: &str,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CalendarEvent>> {
        let phrase = match self.confirmation.captures(final_text) {
            Some(caps) => caps[1].to_string(),
            None => return Ok(None),
        };

        let parsed = self
            .datetime
            .extract(&phrase, now)
            .ok_or_else(|| anyhow!("Confirmation phrase has no parseable date/time: {}", phrase))?;
        if parsed.start <= now {
            return Err(anyhow!("Confirmation names a past instant: {}", parsed.start));
        }

        let start = parsed.start;
        let end = start + self.slot_duration;

        // Re-check: the slot may have been taken since it was offered.
        let busy = self.calendar.list_busy(start, end).await?;
        if busy.iter().any(|b| b.overlaps(start, end)) {
            info!(
                "Slot {} already busy at confirmation time for {}, withholding event",
                start, phone
            );
            return Ok(None);
        }

        let ctx = ExtractionContext { transcript, phone };
        let name = self.names.resolve(&ctx);
        let contact = self.phones.resolve(&ctx);
        let reason = self.reasons.resolve(&ctx);
        let modality = self.modalities.resolve(&ctx);

        let event = self
            .calendar
            .create_event(CreateEventRequest {
                summary: format!("Appointment - {}", name),
                description: format!(
                    "Name: {}\nPhone: {}\nReason: {}\nModality: {}",
                    name, contact, reason, modality
                ),
                start,
                end,
                location: self.clinic_location.clone(),
            })
            .await?;

        info!("Created appointment event {} at {} for {}", event.id, start, phone);
        Ok(Some(event))
    }
}

/// Cancellation collaborator. The engine forwards the raw reply text and
/// never waits on or surfaces the outcome.
#[async_trait]
pub trait CancellationSink: Send + Sync {
    async fn forward(&self, phone: &str, text: &str) -> Result<()>;
}

/// Resolves the cancelled appointment on the clinic calendar and deletes it.
pub struct CalendarCancellation {
    calendar: Arc<dyn CalendarApi>,
    datetime: DateTimeExtractor,
}

impl CalendarCancellation {
    pub fn new(config: &AppConfig, calendar: Arc<dyn CalendarApi>) -> Self {
        let offset = FixedOffset::east_opt(config.local_utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
        Self {
            calendar,
            datetime: DateTimeExtractor::new(offset),
        }
    }
}

#[async_trait]
impl CancellationSink for CalendarCancellation {
    async fn forward(&self, phone: &str, text: &str) -> Result<()> {
        // Without a parseable date/time the event cannot be located; search
        // the coming two weeks for an event carrying the patient's phone.
        let now = Utc::now();
        let (window_start, window_end) = match self.datetime.extract(text, now) {
            Some(parsed) => (parsed.start - Duration::hours(12), parsed.start + Duration::hours(12)),
            None => (now, now + Duration::days(14)),
        };

        let events = self.calendar.list_events(window_start, window_end).await?;
        let target = events.iter().find(|e| {
            !e.is_cancelled()
                && e.description
                    .as_deref()
                    .map(|d| d.contains(phone))
                    .unwrap_or(false)
        });

        match target {
            Some(event) => {
                debug!("Deleting cancelled appointment event {}", event.id);
                self.calendar.delete_event(&event.id).await
            }
            None => {
                warn!("No appointment event found to cancel for {}", phone);
                Ok(())
            }
        }
    }
}
