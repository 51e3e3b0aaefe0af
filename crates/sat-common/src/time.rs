//! Time handling for satellite scan tokens and product metadata stamps.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Layout of the digits in a dataset valid-time token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenFormat {
    /// `YYYYDDDHHMM...` (day of year), as in GOES-R ABI file names.
    #[default]
    Ordinal,
    /// `YYYYMMDDHHMM...`
    Calendar,
}

impl TokenFormat {
    fn minute_digits(&self) -> (usize, &'static str) {
        match self {
            TokenFormat::Ordinal => (11, "%Y%j%H%M"),
            TokenFormat::Calendar => (12, "%Y%m%d%H%M"),
        }
    }
}

/// Parse a scan-start token to minute resolution.
///
/// Accepts an optional leading `s` (e.g. `s20230861801170`). Digits past the
/// minute field (seconds, tenths) are ignored, so tokens of different precision
/// normalize to the same instant.
pub fn parse_token(token: &str, format: TokenFormat) -> Result<DateTime<Utc>, TimeParseError> {
    let digits = token.strip_prefix('s').unwrap_or(token);
    let (needed, pattern) = format.minute_digits();

    let minute = digits
        .get(..needed)
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| TimeParseError::InvalidToken(token.to_string()))?;

    let ndt = NaiveDateTime::parse_from_str(minute, pattern)
        .map_err(|_| TimeParseError::InvalidToken(token.to_string()))?;
    Ok(Utc.from_utc_datetime(&ndt))
}

/// Parse the `start_date_time` global attribute (`%Y%j%H%M%S`).
pub fn parse_start_date_time(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim().trim_matches('"');
    let digits = if s.len() > 13 {
        s.get(..13)
            .ok_or_else(|| TimeParseError::InvalidFormat(s.to_string()))?
    } else {
        s
    };
    NaiveDateTime::parse_from_str(digits, "%Y%j%H%M%S")
        .map(|ndt| Utc.from_utc_datetime(&ndt))
        .map_err(|_| TimeParseError::InvalidFormat(s.to_string()))
}

/// Truncate to the top of the hour.
pub fn truncate_to_hour(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt - Duration::minutes(dt.minute() as i64)
        - Duration::seconds(dt.second() as i64)
        - Duration::nanoseconds(dt.nanosecond() as i64)
}

/// Minute stamp used for frame `valid` and rollup `lastReloadTime`: `YYYYMMDDHHMM`.
pub fn minute_stamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%d%H%M").to_string()
}

/// Run stamp used to name per-run metadata documents: `YYYYMMDDHH00`.
pub fn run_stamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%d%H00").to_string()
}

/// Parse a `YYYYMMDDHHMM` stamp.
pub fn parse_minute_stamp(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    NaiveDateTime::parse_from_str(s, "%Y%m%d%H%M")
        .map(|ndt| Utc.from_utc_datetime(&ndt))
        .map_err(|_| TimeParseError::InvalidFormat(s.to_string()))
}

/// Date-partitioned directory for a frame: `YYYY/MM/DD/HH00`.
pub fn storage_path(dt: DateTime<Utc>) -> String {
    dt.format("%Y/%m/%d/%H00").to_string()
}

/// Frame file name within its hour directory: `MM.png`.
pub fn frame_file_name(dt: DateTime<Utc>) -> String {
    dt.format("%M.png").to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid valid-time token: {0}")]
    InvalidToken(String),

    #[error("Invalid time format: {0}")]
    InvalidFormat(String),
}
