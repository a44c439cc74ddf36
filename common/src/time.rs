//! Time helpers shared across the pipeline.

use chrono::{DateTime, NaiveTime, TimeZone};

/// Truncate a timestamp to 00:00:00 of the same calendar day, keeping the
/// original timezone.
///
/// Used as the lower bound of the conversion lookup window. If local
/// midnight does not exist (a DST gap), the timestamp is returned unchanged
/// rather than guessing an adjacent instant.
pub fn start_of_day<Tz: TimeZone>(date: &DateTime<Tz>) -> DateTime<Tz> {
    let midnight = date.date_naive().and_time(NaiveTime::MIN);
    date.timezone()
        .from_local_datetime(&midnight)
        .earliest()
        .unwrap_or_else(|| date.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike, Utc};

    #[test]
    fn truncates_utc_to_midnight() {
        let date = Utc::now();
        let start = start_of_day(&date);
        assert_eq!(start.hour(), 0);
        assert_eq!(start.minute(), 0);
        assert_eq!(start.second(), 0);
        assert_eq!(start.date_naive(), date.date_naive());
    }

    #[test]
    fn keeps_the_original_offset() {
        let tz = FixedOffset::east_opt(5 * 3600).unwrap();
        let date = tz.with_ymd_and_hms(2024, 3, 15, 17, 42, 9).unwrap();
        let start = start_of_day(&date);
        assert_eq!(start.offset(), date.offset());
        assert_eq!(start.hour(), 0);
        // Midnight in +05:00 is 19:00 UTC of the previous day.
        assert_eq!(
            start.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2024, 3, 14, 19, 0, 0).unwrap()
        );
    }
}
