/// Fixed UTC offsets in `±HH:MM` form
///
/// Only numeric offsets are supported. There is no timezone database lookup,
/// so DST and named zones are the caller's problem.

use chrono::{FixedOffset, Offset, Utc};
use std::fmt;

/// Length of the textual form, e.g. "-06:00"
pub const OFFSET_TEXT_LEN: usize = 6;

const MINUTES_PER_HOUR: i32 = 60;
const HOURS_PER_DAY: i32 = 24;

/// A signed offset from UTC, remembered exactly as the client wrote it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtcOffset {
    text: String,
    fixed: FixedOffset,
}

impl UtcOffset {
    /// The `+00:00` offset that `Z` normalizes to
    pub fn utc() -> Self {
        Self {
            text: "+00:00".to_string(),
            fixed: Utc.fix(),
        }
    }

    /// Parse a strict `±HH:MM` offset.
    /// Returns None unless hours are 00-23 and minutes are 00-59.
    pub fn parse(text: &str) -> Option<Self> {
        if !has_offset_shape(text) {
            return None;
        }

        let bytes = text.as_bytes();
        let sign = if bytes[0] == b'-' { -1 } else { 1 };
        let hours = two_digits(bytes[1], bytes[2]);
        let minutes = two_digits(bytes[4], bytes[5]);

        if hours >= HOURS_PER_DAY || minutes >= MINUTES_PER_HOUR {
            return None;
        }

        let total_minutes = sign * (hours * MINUTES_PER_HOUR + minutes);
        let fixed = FixedOffset::east_opt(total_minutes * 60)?;

        Some(Self {
            text: text.to_string(),
            fixed,
        })
    }

    /// The offset text, e.g. "-06:00"
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Signed offset in minutes (east of UTC is positive)
    pub fn total_minutes(&self) -> i32 {
        self.fixed.local_minus_utc() / 60
    }

    pub fn fixed(&self) -> FixedOffset {
        self.fixed
    }
}

impl fmt::Display for UtcOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Check that `text` looks like `[+-]\d{2}:\d{2}` without judging the range
pub fn has_offset_shape(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() == OFFSET_TEXT_LEN
        && matches!(bytes[0], b'+' | b'-')
        && bytes[1].is_ascii_digit()
        && bytes[2].is_ascii_digit()
        && bytes[3] == b':'
        && bytes[4].is_ascii_digit()
        && bytes[5].is_ascii_digit()
}

fn two_digits(tens: u8, ones: u8) -> i32 {
    i32::from(tens - b'0') * 10 + i32::from(ones - b'0')
}
