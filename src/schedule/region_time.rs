//! Fixed-rule clock for the supported power region.
//!
//! The region observes EU-style daylight saving: +3 from the last Sunday of
//! March 01:00 UTC until the last Sunday of October 01:00 UTC, +2 otherwise.
//! This is a calendar rule, not a timezone database; other regions need a
//! different rule.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};

pub const STANDARD_OFFSET_HOURS: i32 = 2;
pub const DAYLIGHT_OFFSET_HOURS: i32 = 3;

/// Last Sunday of `month` (which must have 31 days) at 01:00 UTC.
fn last_sunday_switch(year: i32, month: u32) -> Option<DateTime<Utc>> {
    let last_day = NaiveDate::from_ymd_opt(year, month, 31)?;
    let back = last_day.weekday().num_days_from_sunday();
    let sunday = last_day - Duration::days(i64::from(back));
    Some(sunday.and_hms_opt(1, 0, 0)?.and_utc())
}

/// UTC offset of the region, in hours, at `now`.
pub fn region_offset_hours(now: DateTime<Utc>) -> i32 {
    let year = now.year();
    match (last_sunday_switch(year, 3), last_sunday_switch(year, 10)) {
        (Some(dst_start), Some(dst_end)) if dst_start <= now && now < dst_end => {
            DAYLIGHT_OFFSET_HOURS
        }
        _ => STANDARD_OFFSET_HOURS,
    }
}

/// Region wall-clock time at `now`.
pub fn region_now(now: DateTime<Utc>) -> NaiveDateTime {
    let offset = Duration::hours(i64::from(region_offset_hours(now)));
    (now + offset).naive_utc()
}

/// `HH:MM` on the region's wall clock.
pub fn region_clock(now: DateTime<Utc>) -> String {
    region_now(now).format("%H:%M").to_string()
}

/// Schedule lookup key for a civil date: local midnight as UTC epoch seconds.
///
/// The offset is the one in force at that midnight. It is evaluated two hours
/// before the naive midnight, which is always before the 01:00 UTC switch on
/// a change day.
pub fn day_key(date: NaiveDate) -> i64 {
    let midnight = date.and_time(chrono::NaiveTime::MIN).and_utc();
    let offset = region_offset_hours(midnight - Duration::hours(i64::from(STANDARD_OFFSET_HOURS)));
    midnight.timestamp() - i64::from(offset) * 3600
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_march_switch_happens_at_one_utc() {
        // 2025-03-30 is the last Sunday of March.
        assert_eq!(region_offset_hours(utc(2025, 3, 30, 0, 59, 59)), 2);
        assert_eq!(region_offset_hours(utc(2025, 3, 30, 1, 0, 0)), 3);
    }

    #[test]
    fn test_october_switch_happens_at_one_utc() {
        // 2025-10-26 is the last Sunday of October.
        assert_eq!(region_offset_hours(utc(2025, 10, 26, 0, 59, 59)), 3);
        assert_eq!(region_offset_hours(utc(2025, 10, 26, 1, 0, 0)), 2);
    }

    #[test]
    fn test_last_day_of_month_is_sunday() {
        // 2024-03-31 is itself a Sunday.
        assert_eq!(region_offset_hours(utc(2024, 3, 31, 0, 30, 0)), 2);
        assert_eq!(region_offset_hours(utc(2024, 3, 31, 1, 0, 0)), 3);
    }

    #[test]
    fn test_winter_and_summer() {
        assert_eq!(region_offset_hours(utc(2025, 1, 15, 12, 0, 0)), 2);
        assert_eq!(region_offset_hours(utc(2025, 7, 1, 12, 0, 0)), 3);
        assert_eq!(region_offset_hours(utc(2025, 12, 31, 23, 0, 0)), 2);
    }

    #[test]
    fn test_region_clock() {
        assert_eq!(region_clock(utc(2025, 1, 15, 21, 5, 0)), "23:05");
        assert_eq!(region_clock(utc(2025, 7, 1, 21, 5, 0)), "00:05");
    }

    #[test]
    fn test_day_key_is_local_midnight() {
        let winter = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        assert_eq!(day_key(winter), utc(2025, 1, 14, 22, 0, 0).timestamp());

        let summer = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert_eq!(day_key(summer), utc(2025, 6, 30, 21, 0, 0).timestamp());
    }

    #[test]
    fn test_day_key_on_change_days() {
        // Midnight precedes the switch, so the old offset still applies.
        let spring = NaiveDate::from_ymd_opt(2025, 3, 30).unwrap();
        assert_eq!(day_key(spring), utc(2025, 3, 29, 22, 0, 0).timestamp());

        let autumn = NaiveDate::from_ymd_opt(2025, 10, 26).unwrap();
        assert_eq!(day_key(autumn), utc(2025, 10, 25, 21, 0, 0).timestamp());

        let after_autumn = NaiveDate::from_ymd_opt(2025, 10, 27).unwrap();
        assert_eq!(day_key(after_autumn), utc(2025, 10, 26, 22, 0, 0).timestamp());
    }
}
