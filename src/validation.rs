/// Timestamp validation for wake-time requests
///
/// A timestamp is accepted only when it carries an explicit offset (`Z` or
/// `±HH:MM`). The offset suffix is checked before the date itself, so text
/// that is not date-shaped at all is reported as a missing offset.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use std::borrow::Cow;
use thiserror::Error;

use crate::offset::{self, UtcOffset, OFFSET_TEXT_LEN};
use crate::sleep::MAX_MINUTES_FROM_NOW;

/// Position of the date/time separator in `YYYY-MM-DDTHH:MM`
const DATE_LEN: usize = 10;

/// Accepted date-time bodies (after the offset suffix is removed)
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// A full day of headroom either side covers every offset shift
const MINUTES_PER_DAY: i64 = 24 * 60;

/// Why a timestamp was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Timestamp must be a string")]
    NotText,
    #[error("Timestamp cannot be empty")]
    Empty,
    #[error("Timestamp must include an explicit timezone offset (e.g., -06:00 or Z)")]
    MissingOffset,
    #[error("Timestamp is not a valid ISO-8601 date")]
    Unparseable,
}

impl ValidationError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::NotText | ValidationError::Empty | ValidationError::Unparseable => {
                "INVALID_FORMAT"
            }
            ValidationError::MissingOffset => "MISSING_OFFSET",
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// A timestamp that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTimestamp {
    pub instant: DateTime<Utc>,
    /// `+00:00` for `Z`, otherwise the offset exactly as written
    pub offset: UtcOffset,
}

/// Validate an arbitrary JSON value as a timestamp
pub fn validate_timestamp(input: &Value) -> Result<ValidTimestamp, ValidationError> {
    match input {
        Value::String(text) => validate_str(text),
        _ => Err(ValidationError::NotText),
    }
}

/// Validate timestamp text
pub fn validate_str(input: &str) -> Result<ValidTimestamp, ValidationError> {
    if input.trim().is_empty() {
        return Err(ValidationError::Empty);
    }

    let (body, offset_text) = split_offset(input).ok_or(ValidationError::MissingOffset)?;

    let offset = match offset_text {
        None => UtcOffset::utc(),
        Some(text) => UtcOffset::parse(text).ok_or(ValidationError::Unparseable)?,
    };

    let instant = parse_instant(body, &offset).ok_or(ValidationError::Unparseable)?;

    if !has_headroom(instant) {
        return Err(ValidationError::Unparseable);
    }

    Ok(ValidTimestamp { instant, offset })
}

/// Split off the trailing offset.
/// Returns (body, None) for a `Z`/`z` suffix, (body, Some("±HH:MM")) for a numeric one.
fn split_offset(input: &str) -> Option<(&str, Option<&str>)> {
    if let Some(body) = input.strip_suffix(['Z', 'z']) {
        return Some((body, None));
    }

    let split_at = input.len().checked_sub(OFFSET_TEXT_LEN)?;
    if !input.is_char_boundary(split_at) {
        return None;
    }

    let (body, suffix) = input.split_at(split_at);
    offset::has_offset_shape(suffix).then_some((body, Some(suffix)))
}

fn parse_instant(body: &str, offset: &UtcOffset) -> Option<DateTime<Utc>> {
    let body = normalize_separator(body.trim_start());

    let naive = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&body, format).ok())?;

    let local = offset.fixed().from_local_datetime(&naive).single()?;
    Some(local.with_timezone(&Utc))
}

/// Accept `t` or a single space in place of the `T` separator
fn normalize_separator(body: &str) -> Cow<'_, str> {
    match body.as_bytes().get(DATE_LEN) {
        Some(b't') | Some(b' ') => {
            Cow::Owned(format!("{}T{}", &body[..DATE_LEN], &body[DATE_LEN + 1..]))
        }
        _ => Cow::Borrowed(body),
    }
}

/// The calculator must be able to add every cycle and shift by any offset
fn has_headroom(instant: DateTime<Utc>) -> bool {
    let ahead = Duration::minutes(i64::from(MAX_MINUTES_FROM_NOW) + MINUTES_PER_DAY);
    let behind = Duration::minutes(MINUTES_PER_DAY);

    instant.checked_add_signed(ahead).is_some() && instant.checked_sub_signed(behind).is_some()
}
