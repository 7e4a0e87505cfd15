//! Wake-time API: JSON in, JSON out
//!
//! Glues the validator and the calculator together behind
//! `POST /v1/wake-times`. Everything here is synchronous; the server only
//! hands over the request body and maps the result to a status code.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::sleep::{calculate_wake_times, WakeTimeOption};
use crate::validation::validate_timestamp;

pub const WAKE_TIMES_PATH: &str = "/v1/wake-times";

pub const INVALID_JSON: &str = "INVALID_JSON";
pub const MISSING_FIELD: &str = "MISSING_FIELD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WakeTimeResponse {
    pub options: [WakeTimeOption; 5],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// `{"error": {"code": ..., "message": ...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }

    pub fn invalid_json() -> Self {
        Self::new(INVALID_JSON, "Request body must be valid JSON")
    }

    pub fn missing_field() -> Self {
        Self::new(MISSING_FIELD, "Field 'now' is required")
    }
}

/// Handle a raw `POST /v1/wake-times` body.
/// Every `Err` maps to HTTP 400.
pub fn handle_wake_times(body: &[u8]) -> Result<WakeTimeResponse, ErrorResponse> {
    let request: Value = serde_json::from_slice(body).map_err(|e| {
        debug!("Rejecting unparseable body: {}", e);
        ErrorResponse::invalid_json()
    })?;

    let now = request.get("now").filter(|v| is_present(v)).ok_or_else(|| {
        debug!("Rejecting request without 'now'");
        ErrorResponse::missing_field()
    })?;

    respond_to(now)
}

/// Validate `now` and calculate options
pub fn respond_to(now: &Value) -> Result<WakeTimeResponse, ErrorResponse> {
    let valid = validate_timestamp(now).map_err(|e| {
        debug!("Rejecting timestamp {}: {}", now, e.code());
        ErrorResponse::new(e.code(), e.message())
    })?;

    Ok(WakeTimeResponse {
        options: calculate_wake_times(valid.instant, &valid.offset),
    })
}

/// A field counts as missing when absent or empty-ish: null, false, 0 and ""
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => true,
    }
}
