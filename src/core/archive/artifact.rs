//! Artifact naming: `YYYYMMDD-HHMMSS.ffff.jpg`.
//!
//! The first eight characters are the capture date; per-day folders and
//! remote date purges both key on them.

use chrono::{DateTime, NaiveDate, TimeZone, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;

pub const ARTIFACT_EXTENSION: &str = "jpg";

static ARTIFACT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{8}-\d{6}\.\d{4}\.jpg$").expect("valid artifact regex"));

/// Name without extension, e.g. `20240131-235959.1234`.
pub fn artifact_stem<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    // 1e-4 s resolution; leap-second nanos clamp to the last slot
    let ten_thousandths = (at.nanosecond() / 100_000).min(9_999);
    format!("{}.{:04}", at.format("%Y%m%d-%H%M%S"), ten_thousandths)
}

pub fn artifact_file_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}.{}", artifact_stem(at), ARTIFACT_EXTENSION)
}

/// `YYYYMMDD` prefix of a name, if it has one.
pub fn date_prefix(name: &str) -> Option<&str> {
    let prefix = name.get(..8)?;
    prefix.bytes().all(|b| b.is_ascii_digit()).then_some(prefix)
}

/// Capture date encoded in an artifact name.
pub fn artifact_date(name: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date_prefix(name)?, "%Y%m%d").ok()
}

pub fn is_artifact_name(name: &str) -> bool {
    ARTIFACT_NAME.is_match(name)
}
