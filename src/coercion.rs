//! Value coercion for `@move`/`@copy` rewrite rules.
//!
//! Each coercion parses a raw scalar into a typed value, treating failure as
//! absent rather than propagating an error — a rewrite rule's target is
//! simply left unset (or falls back to its `default`) when coercion fails.
//! Timestamp parsing uses `chrono`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::{PipelineError, Result};

/// The five coercions available for `@move`/`@copy`'s object-form arg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoerceType {
    Integer,
    Long,
    String,
    Timestamp,
    Downcase,
    Upcase,
}

impl CoerceType {
    pub fn parse_name(name: &str) -> Result<Self> {
        match name {
            "integer" => Ok(CoerceType::Integer),
            "long" => Ok(CoerceType::Long),
            "string" => Ok(CoerceType::String),
            "timestamp" => Ok(CoerceType::Timestamp),
            "downcase" => Ok(CoerceType::Downcase),
            "upcase" => Ok(CoerceType::Upcase),
            other => Err(PipelineError::rule_load(format!("unsupported @move/@copy coercion type: {other}"))),
        }
    }
}

/// Applies a coercion to a source value. Returns `None` when the coercion
/// cannot produce a value, which the caller treats the same as an absent
/// source (falls back to `default`, otherwise the rewrite rule is a no-op
/// for that target).
pub fn coerce(value: &Value, kind: CoerceType) -> Option<Value> {
    match kind {
        CoerceType::Integer | CoerceType::Long => coerce_integer(value),
        CoerceType::String => Some(Value::String(crate::path::to_display_string(value))),
        CoerceType::Timestamp => coerce_timestamp(value),
        CoerceType::Downcase => value.as_str().map(|s| Value::String(s.to_ascii_lowercase())),
        CoerceType::Upcase => value.as_str().map(|s| Value::String(s.to_ascii_uppercase())),
    }
}

/// Accepts decimal, hex (`0x`-prefixed), or numeric-string values; rejects
/// anything else.
fn coerce_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) => n.as_i64().map(Value::from),
        Value::String(s) => {
            let s = s.trim();
            let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                i64::from_str_radix(hex, 16).ok()
            } else {
                s.parse::<i64>().ok()
            };
            parsed.map(Value::from)
        }
        _ => None,
    }
}

/// Parses an ISO-8601-like timestamp or an epoch-seconds number into the
/// canonical form this crate uses throughout: integer milliseconds since the
/// Unix epoch.
fn coerce_timestamp(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) => {
            let secs = n.as_f64()?;
            Some(Value::from((secs * 1000.0).round() as i64))
        }
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(Value::from(dt.timestamp_millis()));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                let dt = DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc);
                return Some(Value::from(dt.timestamp_millis()));
            }
            if let Ok(secs) = s.parse::<f64>() {
                return Some(Value::from((secs * 1000.0).round() as i64));
            }
            None
        }
        _ => None,
    }
}
