use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// An offerable appointment slot. Labels are rendered in the clinic's
/// local offset so they can be shown to the patient verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub day_label: String,
    pub display_label: String,
}

/// Per-weekday open intervals, keyed 0 (Sunday) through 6 (Saturday).
/// Days with no entry are closed; the resolver never special-cases them.
#[derive(Debug, Clone)]
pub struct WorkingHoursTemplate {
    days: BTreeMap<u32, Vec<(NaiveTime, NaiveTime)>>,
}

impl WorkingHoursTemplate {
    /// Parse from the config JSON blob, e.g.
    /// `{"1":[["08:00","12:00"],["14:00","18:00"]]}`.
    pub fn from_json(raw: &str) -> Result<Self> {
        let parsed: BTreeMap<String, Vec<(String, String)>> = serde_json::from_str(raw)?;

        let mut days = BTreeMap::new();
        for (key, intervals) in parsed {
            let weekday: u32 = key
                .parse()
                .map_err(|_| anyhow!("Invalid weekday key in working hours: {}", key))?;
            if weekday > 6 {
                return Err(anyhow!("Weekday must be between 0 (Sunday) and 6 (Saturday)"));
            }

            let mut day_intervals = Vec::with_capacity(intervals.len());
            for (open, close) in intervals {
                let open = NaiveTime::parse_from_str(&open, "%H:%M")
                    .map_err(|_| anyhow!("Invalid opening time: {}", open))?;
                let close = NaiveTime::parse_from_str(&close, "%H:%M")
                    .map_err(|_| anyhow!("Invalid closing time: {}", close))?;
                if open >= close {
                    return Err(anyhow!("Opening time must be before closing time"));
                }
                day_intervals.push((open, close));
            }

            // Intervals per day must be increasing and non-overlapping.
            for pair in day_intervals.windows(2) {
                if pair[1].0 < pair[0].1 {
                    return Err(anyhow!(
                        "Working-hours intervals for weekday {} overlap or are out of order",
                        weekday
                    ));
                }
            }

            days.insert(weekday, day_intervals);
        }

        Ok(Self { days })
    }

    pub fn intervals_for(&self, weekday: u32) -> &[(NaiveTime, NaiveTime)] {
        self.days.get(&weekday).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}
