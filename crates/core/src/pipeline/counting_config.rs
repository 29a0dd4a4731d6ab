use chrono::{FixedOffset, Offset, Utc};
use thiserror::Error;

use crate::detection::domain::crowd_status::CrowdClassifier;
use crate::shared::constants::{DEFAULT_CROWD_THRESHOLD, DEFAULT_UTC_OFFSET};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("invalid UTC offset '{0}', expected [+-]HH:MM")]
    UtcOffset(String),
}

/// Startup settings shared by every processed item.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CountingConfig {
    /// More than this many people in a frame is crowded.
    pub crowd_threshold: usize,
    /// Offset for the localized `created_at` column.
    pub utc_offset: FixedOffset,
}

impl CountingConfig {
    pub fn new(crowd_threshold: usize, utc_offset: FixedOffset) -> Self {
        Self {
            crowd_threshold,
            utc_offset,
        }
    }

    pub fn classifier(&self) -> CrowdClassifier {
        CrowdClassifier::new(self.crowd_threshold)
    }
}

impl Default for CountingConfig {
    fn default() -> Self {
        Self {
            crowd_threshold: DEFAULT_CROWD_THRESHOLD,
            utc_offset: parse_utc_offset(DEFAULT_UTC_OFFSET).unwrap_or_else(|_| utc()),
        }
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Parses `+07:00`, `-05:30`, `+0700` or `Z`.
pub fn parse_utc_offset(s: &str) -> Result<FixedOffset, ConfigError> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return Ok(utc());
    }
    let err = || ConfigError::UtcOffset(s.to_string());

    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(err()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(err());
    }
    let hours: i32 = digits[..2].parse().map_err(|_| err())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| err())?;
    if hours > 23 || minutes > 59 {
        return Err(err());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(err)
}
