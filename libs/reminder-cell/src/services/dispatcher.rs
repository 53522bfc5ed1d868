use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use calendar_cell::CalendarApi;
use messaging_cell::MessagingGateway;
use shared_config::AppConfig;

use crate::error::ReminderError;
use crate::models::{Appointment, ReminderRecord, ReminderStatus};
use crate::services::ledger::ReminderLedger;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub candidates: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped_no_phone: usize,
    pub skipped_already_sent: usize,
}

/// Daily reminder job. Selection excludes every appointment that already has
/// a ledger record for the template key, so re-running after a crash only
/// picks up the unprocessed tail of the batch.
pub struct ReminderDispatcher {
    calendar: Arc<dyn CalendarApi>,
    gateway: Arc<dyn MessagingGateway>,
    ledger: Arc<dyn ReminderLedger>,
    offset: FixedOffset,
    delay_min_secs: u64,
    delay_max_secs: u64,
}

impl ReminderDispatcher {
    pub fn new(
        config: &AppConfig,
        calendar: Arc<dyn CalendarApi>,
        gateway: Arc<dyn MessagingGateway>,
        ledger: Arc<dyn ReminderLedger>,
    ) -> Self {
        let offset = FixedOffset::east_opt(config.local_utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
        Self {
            calendar,
            gateway,
            ledger,
            offset,
            delay_min_secs: config.reminder_delay_min_secs,
            delay_max_secs: config.reminder_delay_max_secs,
        }
    }

    pub async fn run_once(
        &self,
        template_key: &str,
        days_before: i64,
        batch_limit: usize,
    ) -> Result<RunSummary, ReminderError> {
        self.run_once_at(template_key, days_before, batch_limit, Utc::now())
            .await
    }

    /// One dispatch pass over the target day, `days_before` days ahead of
    /// `now`. Every attempt is recorded before the next appointment is
    /// touched.
    pub async fn run_once_at(
        &self,
        template_key: &str,
        days_before: i64,
        batch_limit: usize,
        now: DateTime<Utc>,
    ) -> Result<RunSummary, ReminderError> {
        if template_key.is_empty() {
            return Err(ReminderError::NotConfigured(
                "Empty reminder template key".to_string(),
            ));
        }

        let (span_start, span_end) = self.target_day_span(now, days_before);
        info!(
            "Reminder run for template {} over {} .. {}",
            template_key, span_start, span_end
        );

        let events = self
            .calendar
            .list_events(span_start, span_end)
            .await
            .map_err(|e| ReminderError::Calendar(e.to_string()))?;

        let mut summary = RunSummary::default();
        let mut selected: Vec<Appointment> = Vec::new();

        for event in &events {
            if event.is_cancelled() {
                continue;
            }
            let Some(start) = event.start.date_time else {
                continue;
            };
            if start < span_start || start >= span_end {
                continue;
            }

            match Appointment::from_event(event) {
                Some(appointment) => {
                    let done = self
                        .ledger
                        .has_record(&appointment.id, template_key)
                        .await
                        .map_err(|e| ReminderError::Ledger(e.to_string()))?;
                    if done {
                        summary.skipped_already_sent += 1;
                        debug!("Appointment {} already handled, skipping", appointment.id);
                    } else {
                        selected.push(appointment);
                    }
                }
                None => {
                    summary.skipped_no_phone += 1;
                    warn!(
                        "Event {} has no resolvable phone number, skipping reminder",
                        event.id
                    );
                }
            }
        }

        selected.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        selected.truncate(batch_limit);
        summary.candidates = selected.len();

        for appointment in selected {
            self.pace().await;

            let message = render_reminder(&appointment, self.offset);
            let record = match self.gateway.send_text(&appointment.phone, &message).await {
                Ok(receipt) => {
                    summary.sent += 1;
                    info!(
                        "Reminder sent for appointment {} to {}",
                        appointment.id, appointment.phone
                    );
                    ReminderRecord {
                        appointment_id: appointment.id.clone(),
                        template_key: template_key.to_string(),
                        sent_at: Utc::now(),
                        status: ReminderStatus::Success,
                        message_id: receipt.message_id,
                        error_detail: None,
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(
                        "Reminder send failed for appointment {} to {}: {}",
                        appointment.id, appointment.phone, e
                    );
                    ReminderRecord {
                        appointment_id: appointment.id.clone(),
                        template_key: template_key.to_string(),
                        sent_at: Utc::now(),
                        status: ReminderStatus::Error,
                        message_id: None,
                        error_detail: Some(e.to_string()),
                    }
                }
            };

            // Record before moving on: a crash here leaves this appointment
            // marked and only the unprocessed rest eligible next run.
            self.ledger
                .append(record)
                .await
                .map_err(|e| ReminderError::Ledger(e.to_string()))?;
        }

        info!(
            "Reminder run complete: {} sent, {} failed, {} skipped (done), {} skipped (no phone)",
            summary.sent, summary.failed, summary.skipped_already_sent, summary.skipped_no_phone
        );
        Ok(summary)
    }

    /// Full local-time span of the target day, as UTC instants.
    fn target_day_span(&self, now: DateTime<Utc>, days_before: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        let target_day = now.with_timezone(&self.offset).date_naive() + Duration::days(days_before);
        let start = self
            .offset
            .from_local_datetime(&target_day.and_time(NaiveTime::MIN))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now);
        (start, start + Duration::days(1))
    }

    /// Randomized human-like pacing between sends.
    async fn pace(&self) {
        if self.delay_max_secs == 0 {
            return;
        }
        // An inverted min/max pair collapses to a fixed delay at max rather
        // than panicking in gen_range and killing the schedule task.
        let min = self.delay_min_secs.min(self.delay_max_secs);
        let secs = rand::thread_rng().gen_range(min..=self.delay_max_secs);
        debug!("Pacing {}s before next reminder", secs);
        tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
    }
}

fn render_reminder(appointment: &Appointment, offset: FixedOffset) -> String {
    let local = appointment.start_time.with_timezone(&offset);
    format!(
        "Hi {}! A reminder of your {} appointment on {} at {} ({}). See you soon!",
        appointment.patient_name,
        appointment.modality,
        local.format("%A %d %B"),
        local.format("%H:%M"),
        appointment.location,
    )
}
