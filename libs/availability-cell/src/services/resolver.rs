use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, FixedOffset, TimeZone, Utc};
use tracing::{debug, warn};

use calendar_cell::CalendarApi;
use shared_config::AppConfig;

use crate::models::{Slot, WorkingHoursTemplate};

/// Turns calendar busy data plus the weekly working-hours template into an
/// ordered list of offerable slots.
pub struct AvailabilityResolver {
    calendar: Arc<dyn CalendarApi>,
    template: WorkingHoursTemplate,
    offset: FixedOffset,
    slot_duration: Duration,
    buffer: Duration,
    min_advance: Duration,
}

impl AvailabilityResolver {
    pub fn new(config: &AppConfig, calendar: Arc<dyn CalendarApi>) -> Result<Self> {
        let template = WorkingHoursTemplate::from_json(&config.working_hours_json)?;
        let offset = FixedOffset::east_opt(config.local_utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());

        Ok(Self {
            calendar,
            template,
            offset,
            slot_duration: Duration::minutes(config.slot_duration_minutes),
            buffer: Duration::minutes(config.slot_buffer_minutes),
            min_advance: Duration::minutes(config.min_advance_minutes),
        })
    }

    /// Scan `day_span` consecutive days starting at the day containing `from`
    /// and return free slots in chronological order, capped per day and in
    /// total. A busy-lookup failure drops that day's slots and continues.
    pub async fn resolve(
        &self,
        from: DateTime<Utc>,
        day_span: i64,
        per_day_cap: usize,
        total_cap: usize,
    ) -> Result<Vec<Slot>> {
        debug!("Resolving availability from {} over {} days", from, day_span);

        let earliest = from + self.min_advance;
        let first_day = from.with_timezone(&self.offset).date_naive();
        let mut slots: Vec<Slot> = Vec::new();

        'days: for day_offset in 0..day_span {
            let day = first_day + Duration::days(day_offset);
            let weekday = day.weekday().num_days_from_sunday();
            let intervals = self.template.intervals_for(weekday);
            if intervals.is_empty() {
                continue;
            }

            let day_start = self.local_instant(day, chrono::NaiveTime::MIN);
            let day_end = day_start + Duration::days(1);

            let busy = match self.calendar.list_busy(day_start, day_end).await {
                Ok(busy) => busy,
                Err(e) => {
                    // Unknown availability: be conservative, offer nothing
                    // for this day and keep scanning the rest.
                    warn!("Busy lookup failed for {}: {} - skipping day", day, e);
                    continue;
                }
            };

            let mut day_count = 0usize;
            for (open, close) in intervals {
                let open_instant = self.local_instant(day, *open) + self.buffer;
                let close_instant = self.local_instant(day, *close) - self.buffer;

                let mut cursor = open_instant;
                while cursor + self.slot_duration <= close_instant {
                    let slot_end = cursor + self.slot_duration;

                    let conflicts = busy.iter().any(|b| b.overlaps(cursor, slot_end));
                    if cursor >= earliest && !conflicts {
                        slots.push(self.build_slot(cursor, slot_end));
                        day_count += 1;
                        if slots.len() >= total_cap {
                            break 'days;
                        }
                        if day_count >= per_day_cap {
                            continue 'days;
                        }
                    }

                    cursor = slot_end;
                }
            }
        }

        debug!("Resolved {} offerable slots", slots.len());
        Ok(slots)
    }

    fn local_instant(&self, day: chrono::NaiveDate, time: chrono::NaiveTime) -> DateTime<Utc> {
        self.offset
            .from_local_datetime(&day.and_time(time))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            // A fixed offset maps every local datetime exactly once.
            .unwrap_or_else(|| Utc.from_utc_datetime(&day.and_time(time)))
    }

    fn build_slot(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Slot {
        let local = start.with_timezone(&self.offset);
        Slot {
            start_time: start,
            end_time: end,
            day_label: local.format("%a %d %b").to_string(),
            display_label: local.format("%a %d %b %H:%M").to_string(),
        }
    }
}
