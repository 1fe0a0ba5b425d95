//! Raw event records as returned by the remote calendar service.
//!
//! A record is an untyped JSON object. Nothing here validates the record;
//! the typed accessors only answer "is this field present and does it have a
//! usable shape". Turning a record into an event happens in [`crate::event`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ParseError, ParseResult};

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// One calendar event exactly as the remote service sent it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteEventRecord(Map<String, Value>);

/// A timestamp read from a record, before any timezone is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawTime {
    /// An absolute instant (epoch milliseconds or an offset-qualified string).
    Instant(DateTime<Utc>),
    /// A wall-clock time with no zone information.
    Local(NaiveDateTime),
    /// A bare calendar date.
    Date(NaiveDate),
}

impl From<Map<String, Value>> for RemoteEventRecord {
    fn from(fields: Map<String, Value>) -> Self {
        RemoteEventRecord(fields)
    }
}

impl RemoteEventRecord {
    /// Wrap a JSON value. Returns `None` unless the value is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(RemoteEventRecord(fields)),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Look up a field; explicit JSON nulls count as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// First present field among `keys`.
    pub(crate) fn first(&self, keys: &[&'static str]) -> Option<(&'static str, &Value)> {
        keys.iter().find_map(|k| self.get(k).map(|v| (*k, v)))
    }

    /// Text field; numbers are rendered, empty strings count as absent.
    pub(crate) fn text(&self, keys: &[&'static str]) -> Option<String> {
        let (_, value) = self.first(keys)?;
        let text = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }

    pub(crate) fn flag(&self, keys: &[&'static str]) -> Option<bool> {
        match self.first(keys)?.1 {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            _ => None,
        }
    }

    pub(crate) fn integer(&self, keys: &[&'static str]) -> Option<i64> {
        match self.first(keys)?.1 {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub(crate) fn float(&self, keys: &[&'static str]) -> Option<f64> {
        match self.first(keys)?.1 {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Timestamp field. `Ok(None)` when absent, an error when present but unreadable.
    pub(crate) fn timestamp(&self, keys: &[&'static str]) -> ParseResult<Option<RawTime>> {
        let Some((field, value)) = self.first(keys) else {
            return Ok(None);
        };

        match value {
            Value::Number(n) => n
                .as_i64()
                .and_then(DateTime::from_timestamp_millis)
                .map(|dt| Some(RawTime::Instant(dt)))
                .ok_or_else(|| ParseError::invalid(field, format!("is not a valid epoch: {n}"))),
            Value::String(s) => parse_time_str(s.trim())
                .map(Some)
                .ok_or_else(|| ParseError::invalid(field, format!("is not a timestamp: '{s}'"))),
            other => Err(ParseError::invalid(
                field,
                format!("has unexpected type: {other}"),
            )),
        }
    }

    /// List field; a lone scalar is treated as a one-element list.
    pub(crate) fn list(&self, keys: &[&'static str]) -> Vec<&Value> {
        match self.first(keys) {
            Some((_, Value::Array(items))) => items.iter().filter(|v| !v.is_null()).collect(),
            Some((_, value)) => vec![value],
            None => Vec::new(),
        }
    }
}

fn parse_time_str(s: &str) -> Option<RawTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(RawTime::Instant(dt.with_timezone(&Utc)));
    }

    if let Some(naive) = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(RawTime::Local(naive));
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(RawTime::Date)
}
