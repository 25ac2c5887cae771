//! Conversion between caller-supplied zoned instants and the canonical (UTC)
//! timestamps stored in the `prices` table.
//!
//! Every query goes through [`to_canonical_checked`] before touching the database,
//! so comparisons in SQL always happen between UTC timestamps in [`TIMESTAMP_FORMAT`].

use chrono::{DateTime, Datelike, DurationRound, NaiveDateTime, TimeDelta, TimeZone, Timelike, Utc};

use super::error::StorageError;

/// Column format of `start`, `end` and `updated_at`. Lexicographic order of the
/// formatted text equals chronological order for years 0 through 9999 only.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const MIN_YEAR: i32 = 0;
const MAX_YEAR: i32 = 9999;

/// Normalize any zoned instant to the canonical zone.
pub fn to_canonical<Tz: TimeZone>(instant: &DateTime<Tz>) -> DateTime<Utc> {
    instant.with_timezone(&Utc)
}

/// Normalize to the canonical zone, rejecting instants whose stored text would
/// not sort chronologically.
pub fn to_canonical_checked<Tz: TimeZone>(instant: &DateTime<Tz>) -> Result<DateTime<Utc>, StorageError> {
    let canonical = to_canonical(instant);
    check_representable(&canonical)?;
    Ok(canonical)
}

fn check_representable(instant: &DateTime<Utc>) -> Result<(), StorageError> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&instant.year()) {
        return Err(StorageError::InvalidInput(format!(
            "{} is outside the storable years {}..={}",
            instant, MIN_YEAR, MAX_YEAR
        )));
    }
    Ok(())
}

/// Reject instants with a sub-second part, which the stored text cannot hold.
pub fn check_whole_second(instant: &DateTime<Utc>) -> Result<(), StorageError> {
    if instant.nanosecond() != 0 {
        return Err(StorageError::InvalidInput(format!(
            "{} has a sub-second part",
            instant
        )));
    }
    Ok(())
}

pub fn format_timestamp(instant: &DateTime<Utc>) -> String {
    instant.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp back into UTC.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, StorageError> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| StorageError::MalformedTimestamp(format!("{}: {}", text, e)))
}

/// Truncate an instant down to the start of its hour, discarding minutes,
/// seconds and sub-second precision.
pub fn truncate_to_hour(instant: &DateTime<Utc>) -> Result<DateTime<Utc>, StorageError> {
    instant
        .duration_trunc(TimeDelta::hours(1))
        .map_err(|e| StorageError::InvalidInput(format!("Cannot truncate {} to the hour: {}", instant, e)))
}

/// Round up to the next whole second, so that `stored >= ceil(x)` equals
/// `stored >= x` for whole-second stored timestamps.
pub fn ceil_to_second(instant: &DateTime<Utc>) -> Result<DateTime<Utc>, StorageError> {
    let floor = instant
        .duration_trunc(TimeDelta::seconds(1))
        .map_err(|e| StorageError::InvalidInput(format!("Cannot round {}: {}", instant, e)))?;
    let ceil = if floor == *instant { floor } else { floor + TimeDelta::seconds(1) };
    check_representable(&ceil)?;
    Ok(ceil)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_to_canonical_from_offset() {
        let eet = FixedOffset::east_opt(2 * 3600).unwrap();
        let local = eet.with_ymd_and_hms(2022, 11, 2, 3, 20, 0).unwrap();

        assert_eq!(
            to_canonical(&local),
            Utc.with_ymd_and_hms(2022, 11, 2, 1, 20, 0).unwrap()
        );
    }

    #[test]
    fn test_to_canonical_from_named_zone_dst() {
        let helsinki = chrono_tz::Europe::Helsinki;
        let summer = helsinki.with_ymd_and_hms(2022, 7, 1, 12, 0, 0).unwrap();
        let winter = helsinki.with_ymd_and_hms(2022, 12, 1, 12, 0, 0).unwrap();

        assert_eq!(format_timestamp(&to_canonical(&summer)), "2022-07-01 09:00:00");
        assert_eq!(format_timestamp(&to_canonical(&winter)), "2022-12-01 10:00:00");
    }

    #[test]
    fn test_format_and_parse() {
        let instant = Utc.with_ymd_and_hms(2022, 11, 2, 23, 0, 0).unwrap();
        let text = format_timestamp(&instant);

        assert_eq!(text, "2022-11-02 23:00:00");
        assert_eq!(parse_timestamp(&text).unwrap(), instant);
    }

    #[test]
    fn test_format_drops_subseconds() {
        let instant = Utc.with_ymd_and_hms(2022, 11, 2, 1, 2, 3).unwrap() + TimeDelta::milliseconds(999);
        assert_eq!(format_timestamp(&instant), "2022-11-02 01:02:03");
    }

    #[test]
    fn test_parse_malformed() {
        let result = parse_timestamp("2022-11-02T01:00:00Z");
        assert!(matches!(result, Err(StorageError::MalformedTimestamp(_))));
    }

    #[test]
    fn test_truncate_to_hour() {
        let instant = Utc.with_ymd_and_hms(2022, 11, 2, 17, 30, 59).unwrap() + TimeDelta::milliseconds(5);
        assert_eq!(
            truncate_to_hour(&instant).unwrap(),
            Utc.with_ymd_and_hms(2022, 11, 2, 17, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_truncate_uses_canonical_hour() {
        // +05:30 has a half-hour offset, the canonical hour is what counts
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let local = ist.with_ymd_and_hms(2022, 11, 2, 9, 10, 0).unwrap();

        assert_eq!(
            truncate_to_hour(&to_canonical(&local)).unwrap(),
            Utc.with_ymd_and_hms(2022, 11, 2, 3, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_text_order_is_chronological() {
        let earlier = format_timestamp(&Utc.with_ymd_and_hms(2022, 11, 2, 9, 0, 0).unwrap());
        let later = format_timestamp(&Utc.with_ymd_and_hms(2022, 11, 2, 10, 0, 0).unwrap());
        assert!(earlier < later);
    }

    #[test]
    fn test_checked_rejects_five_digit_years() {
        let far = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        let last = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();

        assert!(format_timestamp(&far) < format_timestamp(&last));
        assert!(matches!(to_canonical_checked(&far), Err(StorageError::InvalidInput(_))));
        assert_eq!(to_canonical_checked(&last).unwrap(), last);
    }

    #[test]
    fn test_checked_rejects_negative_years() {
        let ancient = Utc.with_ymd_and_hms(-1, 1, 1, 0, 0, 0).unwrap();
        assert!(to_canonical_checked(&ancient).is_err());
    }

    #[test]
    fn test_ceil_to_second() {
        let whole = Utc.with_ymd_and_hms(2022, 11, 2, 0, 0, 0).unwrap();

        assert_eq!(ceil_to_second(&whole).unwrap(), whole);
        assert_eq!(
            ceil_to_second(&(whole + TimeDelta::milliseconds(500))).unwrap(),
            whole + TimeDelta::seconds(1)
        );
    }

    #[test]
    fn test_ceil_past_last_storable_second() {
        let last = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap() + TimeDelta::milliseconds(1);
        assert!(ceil_to_second(&last).is_err());
    }

    #[test]
    fn test_check_whole_second() {
        let whole = Utc.with_ymd_and_hms(2022, 11, 2, 1, 0, 0).unwrap();

        assert!(check_whole_second(&whole).is_ok());
        assert!(check_whole_second(&(whole + TimeDelta::nanoseconds(1))).is_err());
    }
}
