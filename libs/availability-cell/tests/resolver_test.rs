use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use availability_cell::AvailabilityResolver;
use calendar_cell::{BusyInterval, CalendarApi, CalendarEvent, CreateEventRequest};
use shared_utils::test_utils::test_config;

struct MockCalendar {
    busy: Vec<BusyInterval>,
    failing_days: HashSet<NaiveDate>,
}

impl MockCalendar {
    fn free() -> Self {
        Self {
            busy: vec![],
            failing_days: HashSet::new(),
        }
    }

    fn with_busy(busy: Vec<BusyInterval>) -> Self {
        Self {
            busy,
            failing_days: HashSet::new(),
        }
    }
}

#[async_trait]
impl CalendarApi for MockCalendar {
    async fn list_busy(
        &self,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>> {
        if self.failing_days.contains(&day_start.date_naive()) {
            return Err(anyhow!("calendar unavailable"));
        }
        Ok(self
            .busy
            .iter()
            .filter(|b| b.overlaps(day_start, day_end))
            .cloned()
            .collect())
    }

    async fn list_events(
        &self,
        _time_min: DateTime<Utc>,
        _time_max: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        Ok(vec![])
    }

    async fn create_event(&self, _request: CreateEventRequest) -> Result<CalendarEvent> {
        Err(anyhow!("not supported in this test"))
    }

    async fn delete_event(&self, _event_id: &str) -> Result<()> {
        Ok(())
    }

    async fn patch_event(&self, _event_id: &str, _fields: Value) -> Result<CalendarEvent> {
        Err(anyhow!("not supported in this test"))
    }
}

fn monday_7am() -> DateTime<Utc> {
    // 2025-03-10 is a Monday
    Utc.with_ymd_and_hms(2025, 3, 10, 7, 0, 0).unwrap()
}

fn resolver_with(
    calendar: MockCalendar,
    working_hours: &str,
    buffer_minutes: i64,
) -> AvailabilityResolver {
    let mut config = test_config();
    config.working_hours_json = working_hours.to_string();
    config.slot_buffer_minutes = buffer_minutes;
    AvailabilityResolver::new(&config, Arc::new(calendar)).unwrap()
}

#[tokio::test]
async fn monday_morning_yields_four_hourly_slots() {
    let resolver = resolver_with(MockCalendar::free(), r#"{"1":[["08:00","12:00"]]}"#, 0);

    let slots = resolver.resolve(monday_7am(), 1, 10, 20).await.unwrap();

    let starts: Vec<u32> = slots
        .iter()
        .map(|s| s.start_time.format("%H").to_string().parse().unwrap())
        .collect();
    assert_eq!(starts, vec![8, 9, 10, 11]);

    for slot in &slots {
        assert_eq!((slot.end_time - slot.start_time).num_minutes(), 60);
    }
}

#[tokio::test]
async fn busy_window_drops_every_overlapping_slot() {
    let busy = vec![BusyInterval {
        start: Utc.with_ymd_and_hms(2025, 3, 10, 9, 30, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2025, 3, 10, 10, 30, 0).unwrap(),
    }];
    let resolver = resolver_with(
        MockCalendar::with_busy(busy),
        r#"{"1":[["08:00","12:00"]]}"#,
        0,
    );

    let slots = resolver.resolve(monday_7am(), 1, 10, 20).await.unwrap();

    // 09:00-10:00 and 10:00-11:00 both overlap 09:30-10:30
    let starts: Vec<u32> = slots
        .iter()
        .map(|s| s.start_time.format("%H").to_string().parse().unwrap())
        .collect();
    assert_eq!(starts, vec![8, 11]);
}

#[tokio::test]
async fn closed_days_produce_no_slots() {
    // Template only covers Monday; scan includes Sunday through Tuesday
    let resolver = resolver_with(MockCalendar::free(), r#"{"1":[["08:00","12:00"]]}"#, 0);

    let sunday = Utc.with_ymd_and_hms(2025, 3, 9, 7, 0, 0).unwrap();
    let slots = resolver.resolve(sunday, 3, 10, 40).await.unwrap();

    assert!(slots.iter().all(|s| s.start_time.date_naive()
        == NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()));
    assert_eq!(slots.len(), 4);
}

#[tokio::test]
async fn empty_template_yields_empty_result_not_error() {
    let resolver = resolver_with(MockCalendar::free(), "{}", 0);
    let slots = resolver.resolve(monday_7am(), 5, 10, 20).await.unwrap();
    assert!(slots.is_empty());
}

#[tokio::test]
async fn advance_notice_filters_near_slots() {
    let resolver = resolver_with(MockCalendar::free(), r#"{"1":[["08:00","12:00"]]}"#, 0);

    // 07:30 request with 60 minutes notice: the 08:00 slot is too soon
    let from = Utc.with_ymd_and_hms(2025, 3, 10, 7, 30, 0).unwrap();
    let slots = resolver.resolve(from, 1, 10, 20).await.unwrap();

    let starts: Vec<u32> = slots
        .iter()
        .map(|s| s.start_time.format("%H").to_string().parse().unwrap())
        .collect();
    assert_eq!(starts, vec![9, 10, 11]);
}

#[tokio::test]
async fn buffer_shrinks_both_interval_ends() {
    let resolver = resolver_with(MockCalendar::free(), r#"{"1":[["08:00","12:00"]]}"#, 30);

    let slots = resolver.resolve(monday_7am(), 1, 10, 20).await.unwrap();

    // Trimmed to 08:30-11:30, so three 60-minute slots fit
    assert_eq!(slots.len(), 3);
    assert_eq!(
        slots[0].start_time,
        Utc.with_ymd_and_hms(2025, 3, 10, 8, 30, 0).unwrap()
    );
    assert_eq!(
        slots[2].end_time,
        Utc.with_ymd_and_hms(2025, 3, 10, 11, 30, 0).unwrap()
    );
}

#[tokio::test]
async fn no_partial_trailing_slot() {
    // 08:00-12:30 with 60-minute slots: 12:00-13:00 would cross the close
    let resolver = resolver_with(MockCalendar::free(), r#"{"1":[["08:00","12:30"]]}"#, 0);

    let slots = resolver.resolve(monday_7am(), 1, 10, 20).await.unwrap();
    assert_eq!(slots.len(), 4);
    assert_eq!(
        slots.last().unwrap().end_time,
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn failing_day_is_dropped_without_aborting_scan() {
    let mut calendar = MockCalendar::free();
    calendar
        .failing_days
        .insert(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());

    // Monday and Tuesday both open; Monday's busy lookup fails
    let resolver = resolver_with(
        calendar,
        r#"{"1":[["08:00","12:00"]],"2":[["08:00","12:00"]]}"#,
        0,
    );

    let slots = resolver.resolve(monday_7am(), 2, 10, 20).await.unwrap();

    assert!(!slots.is_empty());
    assert!(slots.iter().all(|s| s.start_time.date_naive()
        == NaiveDate::from_ymd_opt(2025, 3, 11).unwrap()));
}

#[tokio::test]
async fn caps_limit_per_day_and_total() {
    let resolver = resolver_with(
        MockCalendar::free(),
        r#"{"1":[["08:00","12:00"]],"2":[["08:00","12:00"]]}"#,
        0,
    );

    let per_day = resolver.resolve(monday_7am(), 2, 2, 20).await.unwrap();
    assert_eq!(per_day.len(), 4);

    let total = resolver.resolve(monday_7am(), 2, 10, 3).await.unwrap();
    assert_eq!(total.len(), 3);
}

#[tokio::test]
async fn slots_are_chronological_across_days() {
    let resolver = resolver_with(
        MockCalendar::free(),
        r#"{"1":[["08:00","12:00"]],"2":[["08:00","12:00"]]}"#,
        0,
    );

    let slots = resolver.resolve(monday_7am(), 2, 10, 20).await.unwrap();
    for pair in slots.windows(2) {
        assert!(pair[0].start_time < pair[1].start_time);
    }
}

#[tokio::test]
async fn labels_render_local_day_and_time() {
    let resolver = resolver_with(MockCalendar::free(), r#"{"1":[["08:00","12:00"]]}"#, 0);
    let slots = resolver.resolve(monday_7am(), 1, 10, 20).await.unwrap();

    assert_eq!(slots[0].day_label, "Mon 10 Mar");
    assert_eq!(slots[0].display_label, "Mon 10 Mar 08:00");
}
