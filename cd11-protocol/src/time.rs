//! CD-1.1 julian-date timestamp conversion.
//!
//! Timestamps travel on the wire as 20-character strings of the form
//! `yyyyddd hh:mm:ss.mmm`, e.g. `2017346 23:20:00.142` for
//! 2017-12-13T23:20:00.142Z.

use crate::error::CodecError;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc};

/// Wire width of a CD-1.1 timestamp field.
pub const TIMESTAMP_LEN: usize = 20;

/// Formats a UTC instant as a 20-character julian-date string.
///
/// Sub-millisecond precision is truncated; the wire format carries
/// milliseconds only.
pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    format!(
        "{:04}{:03} {:02}:{:02}:{:02}.{:03}",
        t.year(),
        t.ordinal(),
        t.hour(),
        t.minute(),
        t.second(),
        t.timestamp_subsec_millis()
    )
}

/// Parses a julian-date string back into a UTC instant.
pub fn parse_timestamp(jd: &str) -> Result<DateTime<Utc>, CodecError> {
    // The byte-index slicing below is only safe on all-ASCII input;
    // multibyte text coming off the wire must fail, not panic.
    if jd.len() != TIMESTAMP_LEN || !jd.is_ascii() {
        return Err(CodecError::BadTimestamp(jd.to_string()));
    }
    let bad = || CodecError::BadTimestamp(jd.to_string());

    let year: i32 = jd[0..4].parse().map_err(|_| bad())?;
    let ordinal: u32 = jd[4..7].parse().map_err(|_| bad())?;
    let date = NaiveDate::from_yo_opt(year, ordinal).ok_or_else(bad)?;
    let time = NaiveTime::parse_from_str(jd[8..].trim(), "%H:%M:%S%.3f").map_err(|_| bad())?;

    Ok(DateTime::from_naive_utc_and_offset(date.and_time(time), Utc))
}

/// Whether `jd` is of the form `yyyyddd hh:mm:ss.mmm`.
pub fn valid_timestamp(jd: &str) -> bool {
    parse_timestamp(jd).is_ok()
}
