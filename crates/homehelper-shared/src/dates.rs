//! Calendar-date comparison and display formatting for chat timestamps.
//!
//! Every instant travels as UTC; comparisons and formatting happen in the
//! session's fixed offset so that date separators match what the user sees.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// The calendar date of an instant as seen from `offset`.
pub fn calendar_date(at: DateTime<Utc>, offset: &FixedOffset) -> NaiveDate {
    at.with_timezone(offset).date_naive()
}

/// Whether two instants fall on different calendar days in `offset`.
pub fn is_different_date(a: DateTime<Utc>, b: DateTime<Utc>, offset: &FixedOffset) -> bool {
    calendar_date(a, offset) != calendar_date(b, offset)
}

/// Time of day, e.g. `3:45 pm`.
pub fn format_chat_time(at: DateTime<Utc>, offset: &FixedOffset) -> String {
    at.with_timezone(offset).format("%-I:%M %P").to_string()
}

/// Short numeric date and time, e.g. `11/08/25 10:00 am`.
pub fn format_chat_short_date_time(at: DateTime<Utc>, offset: &FixedOffset) -> String {
    at.with_timezone(offset)
        .format("%d/%m/%y %I:%M %P")
        .to_string()
}

/// The label shown next to a message: time only for today, otherwise the
/// short date and time.
pub fn format_message_date(at: DateTime<Utc>, now: DateTime<Utc>, offset: &FixedOffset) -> String {
    if is_different_date(at, now, offset) {
        format_chat_short_date_time(at, offset)
    } else {
        format_chat_time(at, offset)
    }
}

/// Full date used by separators, e.g. `11 August 2025`.
pub fn format_full_date(date: NaiveDate) -> String {
    date.format("%-d %B %Y").to_string()
}

/// Coarse age of a timestamp, e.g. `now`, `5 mins ago`, `1 day ago`.
pub fn format_relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - at).num_minutes();
    let hours = minutes / 60;
    let days = hours / 24;

    if minutes < 1 {
        "now".to_string()
    } else if minutes < 60 {
        plural(minutes, "min")
    } else if hours < 24 {
        plural(hours, "hour")
    } else {
        plural(days, "day")
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_different_date_depends_on_offset() {
        let a = at("2025-01-01T10:00:00Z");
        let b = at("2025-01-01T12:00:00Z");
        assert!(!is_different_date(a, b, &utc()));

        // 13 hours ahead pushes the second instant past midnight.
        let nz = FixedOffset::east_opt(13 * 3600).unwrap();
        assert!(is_different_date(a, b, &nz));
    }

    #[test]
    fn test_message_date_today_vs_earlier() {
        let now = at("2025-08-11T22:00:00Z");
        assert_eq!(format_message_date(at("2025-08-11T15:45:00Z"), now, &utc()), "3:45 pm");
        assert_eq!(
            format_message_date(at("2025-08-10T09:05:00Z"), now, &utc()),
            "10/08/25 09:05 am"
        );
    }

    #[test]
    fn test_full_date() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 11).unwrap();
        assert_eq!(format_full_date(date), "11 August 2025");
    }

    #[test]
    fn test_relative_time_buckets() {
        let now = at("2025-08-11T12:00:00Z");
        assert_eq!(format_relative_time(at("2025-08-11T11:59:30Z"), now), "now");
        assert_eq!(format_relative_time(at("2025-08-11T11:59:00Z"), now), "1 min ago");
        assert_eq!(format_relative_time(at("2025-08-11T11:55:00Z"), now), "5 mins ago");
        assert_eq!(format_relative_time(at("2025-08-11T11:00:00Z"), now), "1 hour ago");
        assert_eq!(format_relative_time(at("2025-08-11T02:00:00Z"), now), "10 hours ago");
        assert_eq!(format_relative_time(at("2025-08-08T12:00:00Z"), now), "3 days ago");
    }
}
