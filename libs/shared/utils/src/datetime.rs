use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc, Weekday,
};
use regex::Regex;

/// Result of scanning free text for a date/time expression.
#[derive(Debug, Clone, PartialEq)]
pub struct DateTimeMatch {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Whether the text carried an explicit clock time (as opposed to a bare day).
    pub explicit_time: bool,
}

/// Extracts date/time expressions from conversational text.
///
/// Understands ISO dates, `dd/mm[/yyyy]`, today/tomorrow, weekday names,
/// 24h clock times and `N am/pm`. A bare day resolves to 09:00 local;
/// a bare time resolves to the next occurrence of that time.
pub struct DateTimeExtractor {
    offset: FixedOffset,
    iso_date: Regex,
    slash_date: Regex,
    month_date: Regex,
    clock_time: Regex,
    meridiem_time: Regex,
    weekday: Regex,
    relative_day: Regex,
}

impl DateTimeExtractor {
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            offset,
            iso_date: Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap(),
            slash_date: Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{4}))?\b").unwrap(),
            month_date: Regex::new(
                r"(?i)\b(\d{1,2})\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*(?:\s+(\d{4}))?\b",
            )
            .unwrap(),
            clock_time: Regex::new(r"\b(\d{1,2}):(\d{2})\b").unwrap(),
            meridiem_time: Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b").unwrap(),
            weekday: Regex::new(
                r"(?i)\b(?:next\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
            )
            .unwrap(),
            relative_day: Regex::new(r"(?i)\b(today|tomorrow)\b").unwrap(),
        }
    }

    /// Scan `text` for a date and/or time expression relative to `now`.
    /// Returns `None` when nothing recognizable is present.
    pub fn extract(&self, text: &str, now: DateTime<Utc>) -> Option<DateTimeMatch> {
        let local_now = now.with_timezone(&self.offset);
        let date = self.find_date(text, local_now.date_naive());
        let time = self.find_time(text);

        let (day, clock, explicit_time) = match (date, time) {
            (Some(day), Some(clock)) => (day, clock, true),
            (Some(day), None) => (day, NaiveTime::from_hms_opt(9, 0, 0).unwrap(), false),
            (None, Some(clock)) => {
                // Bare time: today if still ahead, otherwise tomorrow.
                let day = if clock > local_now.time() {
                    local_now.date_naive()
                } else {
                    local_now.date_naive() + Duration::days(1)
                };
                (day, clock, true)
            }
            (None, None) => return None,
        };

        let local_start = self.offset.from_local_datetime(&day.and_time(clock)).single()?;
        let start = local_start.with_timezone(&Utc);

        Some(DateTimeMatch {
            start,
            end: start + Duration::hours(1),
            explicit_time,
        })
    }

    fn find_date(&self, text: &str, today: NaiveDate) -> Option<NaiveDate> {
        if let Some(caps) = self.iso_date.captures(text) {
            let year: i32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let day: u32 = caps[3].parse().ok()?;
            return NaiveDate::from_ymd_opt(year, month, day);
        }

        if let Some(caps) = self.slash_date.captures(text) {
            let day: u32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let year: i32 = caps
                .get(3)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(today.year());
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                // A past dd/mm without a year means the next occurrence.
                if date < today && caps.get(3).is_none() {
                    return NaiveDate::from_ymd_opt(year + 1, month, day);
                }
                return Some(date);
            }
            return None;
        }

        if let Some(caps) = self.month_date.captures(text) {
            let day: u32 = caps[1].parse().ok()?;
            let month = match caps[2].to_lowercase().as_str() {
                "jan" => 1,
                "feb" => 2,
                "mar" => 3,
                "apr" => 4,
                "may" => 5,
                "jun" => 6,
                "jul" => 7,
                "aug" => 8,
                "sep" => 9,
                "oct" => 10,
                "nov" => 11,
                _ => 12,
            };
            let year: i32 = caps
                .get(3)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(today.year());
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                if date < today && caps.get(3).is_none() {
                    return NaiveDate::from_ymd_opt(year + 1, month, day);
                }
                return Some(date);
            }
            return None;
        }

        if let Some(caps) = self.relative_day.captures(text) {
            return match caps[1].to_lowercase().as_str() {
                "today" => Some(today),
                _ => Some(today + Duration::days(1)),
            };
        }

        if let Some(caps) = self.weekday.captures(text) {
            let target = match caps[1].to_lowercase().as_str() {
                "monday" => Weekday::Mon,
                "tuesday" => Weekday::Tue,
                "wednesday" => Weekday::Wed,
                "thursday" => Weekday::Thu,
                "friday" => Weekday::Fri,
                "saturday" => Weekday::Sat,
                _ => Weekday::Sun,
            };
            let mut ahead =
                (target.num_days_from_monday() as i64) - (today.weekday().num_days_from_monday() as i64);
            if ahead <= 0 {
                ahead += 7;
            }
            return Some(today + Duration::days(ahead));
        }

        None
    }

    fn find_time(&self, text: &str) -> Option<NaiveTime> {
        if let Some(caps) = self.meridiem_time.captures(text) {
            let mut hour: u32 = caps[1].parse().ok()?;
            let minute: u32 = caps
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            let meridiem = caps[3].to_lowercase();
            if hour == 12 {
                hour = 0;
            }
            if meridiem == "pm" {
                hour += 12;
            }
            return NaiveTime::from_hms_opt(hour, minute, 0);
        }

        if let Some(caps) = self.clock_time.captures(text) {
            let hour: u32 = caps[1].parse().ok()?;
            let minute: u32 = caps[2].parse().ok()?;
            if hour < 24 && minute < 60 {
                return NaiveTime::from_hms_opt(hour, minute, 0);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> DateTimeExtractor {
        DateTimeExtractor::new(FixedOffset::east_opt(0).unwrap())
    }

    fn now() -> DateTime<Utc> {
        // Wednesday
        Utc.with_ymd_and_hms(2025, 3, 5, 10, 0, 0).unwrap()
    }

    #[test]
    fn extracts_iso_date_with_time() {
        let m = extractor().extract("can I come on 2025-03-10 at 14:30?", now()).unwrap();
        assert_eq!(m.start, Utc.with_ymd_and_hms(2025, 3, 10, 14, 30, 0).unwrap());
        assert!(m.explicit_time);
    }

    #[test]
    fn bare_day_defaults_to_nine() {
        let m = extractor().extract("maybe tomorrow works", now()).unwrap();
        assert_eq!(m.start, Utc.with_ymd_and_hms(2025, 3, 6, 9, 0, 0).unwrap());
        assert!(!m.explicit_time);
    }

    #[test]
    fn weekday_resolves_to_next_occurrence() {
        // "monday" said on a Wednesday is five days out
        let m = extractor().extract("monday please", now()).unwrap();
        assert_eq!(m.start.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
    }

    #[test]
    fn same_weekday_rolls_a_full_week() {
        let m = extractor().extract("next wednesday", now()).unwrap();
        assert_eq!(m.start.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 12).unwrap());
    }

    #[test]
    fn bare_past_time_rolls_to_tomorrow() {
        let m = extractor().extract("at 8am", now()).unwrap();
        assert_eq!(m.start, Utc.with_ymd_and_hms(2025, 3, 6, 8, 0, 0).unwrap());
    }

    #[test]
    fn pm_time_converts_to_24h() {
        let m = extractor().extract("friday 3pm", now()).unwrap();
        assert_eq!(m.start, Utc.with_ymd_and_hms(2025, 3, 7, 15, 0, 0).unwrap());
    }

    #[test]
    fn slash_date_without_year_rolls_forward() {
        let m = extractor().extract("on 02/01", now()).unwrap();
        assert_eq!(m.start.date_naive(), NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
    }

    #[test]
    fn month_name_date_with_time() {
        // The shape of slot display labels
        let m = extractor().extract("Mon 10 Mar at 10:00", now()).unwrap();
        assert_eq!(m.start, Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap());
        assert!(m.explicit_time);
    }

    #[test]
    fn past_month_name_rolls_to_next_year() {
        let m = extractor().extract("12 Jan at 09:00", now()).unwrap();
        assert_eq!(m.start.date_naive(), NaiveDate::from_ymd_opt(2026, 1, 12).unwrap());
    }

    #[test]
    fn no_expression_yields_none() {
        assert!(extractor().extract("hello, I have a question", now()).is_none());
    }

    #[test]
    fn respects_local_offset() {
        let ex = DateTimeExtractor::new(FixedOffset::west_opt(5 * 3600).unwrap());
        let m = ex.extract("2025-03-10 at 14:00", now()).unwrap();
        assert_eq!(m.start, Utc.with_ymd_and_hms(2025, 3, 10, 19, 0, 0).unwrap());
    }
}
