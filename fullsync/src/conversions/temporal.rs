//! Text formats of temporal values.
//!
//! The `*_FORMAT` constants parse the `ISO` datestyle output of Postgres. The `format_*`
//! functions render the ISO-8601 strings stored in row sets.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const TIME_FORMAT: &str = "%H:%M:%S%.f";

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Timestamp with a `+HHMM` or `+HH` offset.
pub const TIMESTAMPTZ_FORMAT_HHMM: &str = "%Y-%m-%d %H:%M:%S%.f%#z";

/// Timestamp with a `+HH:MM` offset.
pub const TIMESTAMPTZ_FORMAT_HH_MM: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

/// `YYYY-MM-DD`.
pub fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `HH:MM:SS`, followed by `.ffffff` when there is a fractional part.
pub fn format_time(time: &NaiveTime) -> String {
    if time.nanosecond() == 0 {
        time.format("%H:%M:%S").to_string()
    } else {
        time.format("%H:%M:%S%.6f").to_string()
    }
}

/// `YYYY-MM-DDTHH:MM:SS[.ffffff]`.
pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    format!(
        "{}T{}",
        format_date(&timestamp.date()),
        format_time(&timestamp.time())
    )
}

/// `YYYY-MM-DDTHH:MM:SS[.ffffff]Z`, always in UTC.
pub fn format_timestamptz(timestamp: &DateTime<Utc>) -> String {
    format!("{}Z", format_timestamp(&timestamp.naive_utc()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn renders_iso_8601() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 5).unwrap();
        let time = NaiveTime::from_hms_micro_opt(9, 3, 7, 120).unwrap();

        assert_eq!(format_date(&date), "2023-01-05");
        assert_eq!(format_time(&time), "09:03:07.000120");
        assert_eq!(
            format_timestamp(&date.and_hms_opt(23, 59, 0).unwrap()),
            "2023-01-05T23:59:00"
        );
        assert_eq!(
            format_timestamptz(&Utc.with_ymd_and_hms(2023, 1, 1, 12, 30, 0).unwrap()),
            "2023-01-01T12:30:00Z"
        );
    }

    #[test]
    fn parses_postgres_iso_datestyle() {
        let parsed =
            NaiveDateTime::parse_from_str("2023-01-05 10:00:00.5", TIMESTAMP_FORMAT).unwrap();
        assert_eq!(format_timestamp(&parsed), "2023-01-05T10:00:00.500000");

        let with_offset = DateTime::parse_from_str(
            "2023-01-05 10:00:00+02",
            TIMESTAMPTZ_FORMAT_HHMM,
        )
        .unwrap();
        assert_eq!(
            format_timestamptz(&with_offset.with_timezone(&Utc)),
            "2023-01-05T08:00:00Z"
        );
    }
}
