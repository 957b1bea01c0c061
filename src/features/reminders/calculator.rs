//! # Schedule Calculator
//!
//! Pure schedule arithmetic: next-trigger instants per recurrence frequency,
//! and UTC-to-local conversion. This module is the crate's single timezone
//! boundary; everything else works in UTC instants and the tuples returned
//! here.
//!
//! - **Version**: 1.1.0
//! - **Since**: 2.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Calendar-aware monthly arithmetic with end-of-month clamping
//! - 1.0.0: Initial release

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use log::warn;

use crate::core::ScheduleError;
use crate::database::Frequency;

/// Compute the next trigger instant after `from`.
///
/// Daily and weekly are fixed offsets. Monthly advances one calendar month,
/// clamping the day to the shorter month's last day (Jan 31 -> Feb 28/29).
/// The result is always strictly greater than `from`.
pub fn next_trigger(frequency: Frequency, from: DateTime<Utc>) -> DateTime<Utc> {
    match frequency {
        Frequency::Daily => from + Duration::hours(24),
        Frequency::Weekly => from + Duration::days(7),
        Frequency::Monthly => add_one_month(from),
    }
}

fn add_one_month(from: DateTime<Utc>) -> DateTime<Utc> {
    let date = from.date_naive();
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    let day = date.day().min(days_in_month(year, month));
    let next_date = NaiveDate::from_ymd_opt(year, month, day).unwrap_or(date);
    next_date.and_time(from.time()).and_utc()
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// Convert a UTC instant to the wall-clock calendar date and hour in the
/// given IANA zone.
pub fn local_civil(
    timezone: &str,
    instant: DateTime<Utc>,
) -> Result<(NaiveDate, u32), ScheduleError> {
    let tz: Tz = timezone
        .parse()
        .map_err(|_| ScheduleError::InvalidTimezone(timezone.to_string()))?;
    let local = instant.with_timezone(&tz);
    Ok((local.date_naive(), local.hour()))
}

/// Like `local_civil`, but an unresolvable zone falls back to UTC with a
/// warning instead of failing — a bad stored zone must not starve the user
/// or abort the sweep.
pub fn local_civil_or_utc(timezone: &str, instant: DateTime<Utc>) -> (NaiveDate, u32) {
    match local_civil(timezone, instant) {
        Ok(civil) => civil,
        Err(e) => {
            warn!("{e}; using UTC");
            (instant.date_naive(), instant.hour())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_next_trigger_always_advances() {
        let instants = [
            instant("2024-01-01T00:00:00Z"),
            instant("2024-01-31T09:00:00Z"),
            instant("2024-02-29T23:59:59Z"),
            instant("2024-12-31T12:00:00Z"),
        ];
        for freq in [Frequency::Daily, Frequency::Weekly, Frequency::Monthly] {
            for from in instants {
                assert!(
                    next_trigger(freq, from) > from,
                    "{freq} from {from} did not advance"
                );
            }
        }
    }

    #[test]
    fn test_daily_and_weekly_offsets() {
        let from = instant("2024-01-01T09:00:00Z");
        assert_eq!(
            next_trigger(Frequency::Daily, from),
            instant("2024-01-02T09:00:00Z")
        );
        assert_eq!(
            next_trigger(Frequency::Weekly, from),
            instant("2024-01-08T09:00:00Z")
        );
    }

    #[test]
    fn test_monthly_clamps_to_shorter_month() {
        // Non-leap year: Jan 31 -> Feb 28
        assert_eq!(
            next_trigger(Frequency::Monthly, instant("2023-01-31T10:00:00Z")),
            instant("2023-02-28T10:00:00Z")
        );
        // Leap year: Jan 31 -> Feb 29
        assert_eq!(
            next_trigger(Frequency::Monthly, instant("2024-01-31T10:00:00Z")),
            instant("2024-02-29T10:00:00Z")
        );
        // Mar 31 -> Apr 30
        assert_eq!(
            next_trigger(Frequency::Monthly, instant("2024-03-31T08:30:00Z")),
            instant("2024-04-30T08:30:00Z")
        );
    }

    #[test]
    fn test_monthly_plain_and_year_rollover() {
        assert_eq!(
            next_trigger(Frequency::Monthly, instant("2024-04-15T07:00:00Z")),
            instant("2024-05-15T07:00:00Z")
        );
        assert_eq!(
            next_trigger(Frequency::Monthly, instant("2024-12-31T07:00:00Z")),
            instant("2025-01-31T07:00:00Z")
        );
    }

    #[test]
    fn test_local_civil_new_york_evening() {
        // 23:00 UTC in June is 19:00 EDT the same calendar day
        let (date, hour) =
            local_civil("America/New_York", instant("2024-06-15T23:00:00Z")).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
        assert_eq!(hour, 19);

        // Half past the hour is still inside the window
        let (date, hour) =
            local_civil("America/New_York", instant("2024-06-15T23:30:00Z")).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
        assert_eq!(hour, 19);
    }

    #[test]
    fn test_local_civil_crosses_utc_midnight() {
        // 02:00 UTC on the 16th is still the evening of the 15th on the US
        // west coast; local-date dedup must not confuse the two days.
        let (date, hour) =
            local_civil("America/Los_Angeles", instant("2024-06-16T02:00:00Z")).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
        assert_eq!(hour, 19);
    }

    #[test]
    fn test_local_civil_dst_transition() {
        // US spring-forward 2024-03-10: 07:00 UTC jumps 02:00 EST -> 03:00 EDT
        let (_, hour) =
            local_civil("America/New_York", instant("2024-03-10T07:30:00Z")).unwrap();
        assert_eq!(hour, 3);

        // Fall-back 2024-11-03: 06:30 UTC is 01:30 EST (second occurrence)
        let (_, hour) =
            local_civil("America/New_York", instant("2024-11-03T06:30:00Z")).unwrap();
        assert_eq!(hour, 1);
    }

    #[test]
    fn test_invalid_timezone() {
        let err = local_civil("Mars/Olympus", instant("2024-06-15T23:00:00Z")).unwrap_err();
        assert_eq!(err, ScheduleError::InvalidTimezone("Mars/Olympus".to_string()));

        // Fallback helper resolves to UTC civil time
        let (date, hour) = local_civil_or_utc("Mars/Olympus", instant("2024-06-15T23:00:00Z"));
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
        assert_eq!(hour, 23);
    }
}
