//! Raw trace file model
//!
//! A trace file is either a bare JSON array of events or an object carrying a
//! `traceEvents` array. Events are decoded into [`RawEvent`] without any
//! interpretation; the [`crate::store`] gives them meaning.

use crate::domain::TraceError;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::path::Path;

/// One instrumentation record exactly as it appears in the file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub cat: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ph: String,
    /// Microseconds
    #[serde(default)]
    pub ts: f64,
    /// Microseconds
    #[serde(default)]
    pub dur: Option<f64>,
    #[serde(default)]
    pub pid: i64,
    #[serde(default)]
    pub tid: i64,
    #[serde(default)]
    pub args: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "deserialize_optional_string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub id2: Option<RawId2>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string_or_number")]
    pub bind_id: Option<String>,
}

/// Structured id: exactly one half is expected to be present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawId2 {
    #[serde(default, deserialize_with = "deserialize_optional_string_or_number")]
    pub global: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string_or_number")]
    pub local: Option<String>,
}

impl RawEvent {
    /// Convenience constructor used by tests and synthetic inputs.
    #[must_use]
    pub fn new(ph: &str, name: &str, cat: &str, ts: f64) -> Self {
        Self {
            cat: cat.to_string(),
            name: name.to_string(),
            ph: ph.to_string(),
            ts,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn on_thread(mut self, pid: i64, tid: i64) -> Self {
        self.pid = pid;
        self.tid = tid;
        self
    }

    #[must_use]
    pub fn with_dur(mut self, dur: f64) -> Self {
        self.dur = Some(dur);
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    #[must_use]
    pub fn with_args(mut self, args: Value) -> Self {
        if let Value::Object(map) = args {
            self.args = Some(map);
        }
        self
    }
}

/// The decoded contents of a trace file
#[derive(Debug, Default)]
pub struct TraceFile {
    pub events: Vec<RawEvent>,
}

impl TraceFile {
    /// Parse a trace file from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse trace JSON held in memory
    pub fn parse(content: &str) -> Result<Self, TraceError> {
        let json: Value = serde_json::from_str(content)?;
        Self::from_value(json)
    }

    pub fn from_value(json: Value) -> Result<Self, TraceError> {
        let array = match json {
            Value::Array(_) => json,
            Value::Object(mut map) => map
                .remove("traceEvents")
                .filter(Value::is_array)
                .ok_or(TraceError::MissingEventArray)?,
            _ => return Err(TraceError::MissingEventArray),
        };
        let events: Vec<RawEvent> = serde_json::from_value(array)?;
        Ok(Self { events })
    }
}

/// Ids appear as strings in most producers and as bare numbers in some.
pub(crate) fn deserialize_optional_string_or_number<'de, D>(
    deserializer: D,
) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| value_to_id(&v)))
}

pub(crate) fn deserialize_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_optional_string_or_number(deserializer)?.unwrap_or_default())
}

/// Render a JSON scalar the way it would print in a join key.
pub(crate) fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_form() {
        let trace = TraceFile::parse(
            r#"{"traceEvents":[{"cat":"toplevel","name":"RunTask","ph":"X","ts":10,"dur":5,"pid":1,"tid":2}]}"#,
        )
        .unwrap();
        assert_eq!(trace.events.len(), 1);
        assert_eq!(trace.events[0].dur, Some(5.0));
        assert_eq!(trace.events[0].tid, 2);
    }

    #[test]
    fn test_parse_array_form_with_numeric_ids() {
        let trace =
            TraceFile::parse(r#"[{"ph":"b","name":"a","id":42,"id2":{"local":"0x1"},"ts":0}]"#)
                .unwrap();
        let event = &trace.events[0];
        assert_eq!(event.id.as_deref(), Some("42"));
        assert_eq!(
            event.id2.as_ref().and_then(|id2| id2.local.as_deref()),
            Some("0x1")
        );
    }

    #[test]
    fn test_object_without_events_is_rejected() {
        let err = TraceFile::parse(r#"{"metadata":{}}"#).unwrap_err();
        assert!(matches!(err, TraceError::MissingEventArray));
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        let err = TraceFile::parse("[{").unwrap_err();
        assert!(matches!(err, TraceError::Json(_)));
    }
}
