//! Single trace events and their argument helpers.

use super::phase::Phase;
use crate::domain::ThreadId;
use log::{debug, warn};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Category carried by DevTools timeline instrumentation and metadata events
pub const DEVTOOLS_TIMELINE_CATEGORY: &str = "disabled-by-default-devtools.timeline";
/// Category older backends use to mark macro-task boundaries
pub const LEGACY_TOP_LEVEL_CATEGORY: &str = "toplevel";

/// One instrumentation record owned by the event store (or a synthetic one
/// derived from a CPU profile). The phase never changes after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Comma-separated category string as recorded
    pub categories: String,
    pub name: String,
    pub phase: Phase,
    /// Milliseconds
    pub start_time: f64,
    /// Milliseconds; `None` until bound by a duration or a matching End
    pub end_time: Option<f64>,
    pub thread: ThreadId,
    pub args: Map<String, Value>,
    pub id: Option<String>,
    pub bind_id: Option<String>,
}

impl Event {
    #[must_use]
    pub fn new(
        categories: impl Into<String>,
        name: impl Into<String>,
        phase: Phase,
        start_time: f64,
        thread: ThreadId,
    ) -> Self {
        Self {
            categories: categories.into(),
            name: name.into(),
            phase,
            start_time,
            end_time: None,
            thread,
            args: Map::new(),
            id: None,
            bind_id: None,
        }
    }

    /// Duration in ms, zero for events without an end.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end_time.map_or(0.0, |end| end - self.start_time)
    }

    #[must_use]
    pub fn end_or_start(&self) -> f64 {
        self.end_time.unwrap_or(self.start_time)
    }

    #[must_use]
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.split(',').any(|c| c == category)
    }

    /// A macro-task boundary on its thread.
    #[must_use]
    pub fn is_top_level(&self) -> bool {
        (self.has_category(DEVTOOLS_TIMELINE_CATEGORY) && self.name == "RunTask")
            || self.has_category(LEGACY_TOP_LEVEL_CATEGORY)
            || (self.has_category(DEVTOOLS_TIMELINE_CATEGORY) && self.name == "Program")
    }

    /// Bind the end time. An end earlier than the start is ignored and
    /// reported as `false`.
    pub fn set_end_time(&mut self, end_time: f64) -> bool {
        if end_time < self.start_time {
            debug!(
                "Event out of order: {} ends at {end_time} before its start {}",
                self.name, self.start_time
            );
            return false;
        }
        self.end_time = Some(end_time);
        true
    }

    /// Merge arguments; later values win.
    pub fn add_args(&mut self, args: Map<String, Value>) {
        for (key, value) in args {
            if self.args.contains_key(&key) {
                warn!(
                    "Same argument name ({key}) is used for begin and end phases of {}",
                    self.name
                );
            }
            self.args.insert(key, value);
        }
    }

    /// Close a Begin event with its matching End.
    pub(crate) fn complete(&mut self, end: &Event) -> bool {
        if end.args.is_empty() {
            debug!("Missing mandatory event argument on end of {}", self.name);
        } else {
            self.add_args(end.args.clone());
        }
        self.set_end_time(end.start_time)
    }

    #[must_use]
    pub fn arg(&self, key: &str) -> Option<&Value> {
        self.args.get(key)
    }

    fn arg_object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.args.get(key).and_then(Value::as_object)
    }

    /// `args.data`
    #[must_use]
    pub fn data(&self) -> Option<&Map<String, Value>> {
        self.arg_object("data")
    }

    /// `args.beginData`
    #[must_use]
    pub fn begin_data(&self) -> Option<&Map<String, Value>> {
        self.arg_object("beginData")
    }

    /// `args.endData`
    #[must_use]
    pub fn end_data(&self) -> Option<&Map<String, Value>> {
        self.arg_object("endData")
    }

    /// `args.data`, falling back to `args.beginData`
    #[must_use]
    pub fn data_or_begin_data(&self) -> Option<&Map<String, Value>> {
        self.data().or_else(|| self.begin_data())
    }

    /// A string field of `args.data`
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data()?.get(key)?.as_str()
    }

    /// Chronological order by start time only. Used with stable sorts so that
    /// ties keep arrival order.
    #[must_use]
    pub fn compare_start_time(a: &Event, b: &Event) -> Ordering {
        a.start_time.total_cmp(&b.start_time)
    }
}

/// Truthiness of a JSON value as trace producers use it (missing, null,
/// false, 0 and "" all mean "unset").
#[must_use]
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(name: &str, categories: &str) -> Event {
        Event::new(categories, name, Phase::Complete, 10.0, ThreadId(0))
    }

    #[test]
    fn test_top_level_detection() {
        assert!(event("RunTask", DEVTOOLS_TIMELINE_CATEGORY).is_top_level());
        assert!(event("ThreadControllerImpl::RunTask", "foo,toplevel").is_top_level());
        assert!(event("Program", DEVTOOLS_TIMELINE_CATEGORY).is_top_level());
        assert!(!event("RunTask", "devtools.timeline").is_top_level());
    }

    #[test]
    fn test_end_before_start_is_ignored() {
        let mut e = event("Layout", "devtools.timeline");
        assert!(!e.set_end_time(5.0));
        assert_eq!(e.end_time, None);
        assert!(e.set_end_time(12.5));
        assert!((e.duration() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_complete_merges_end_args() {
        let mut begin = event("Layout", "devtools.timeline");
        begin.add_args(json!({"beginData": {"frame": "f1"}}).as_object().unwrap().clone());
        let mut end = event("Layout", "devtools.timeline");
        end.start_time = 14.0;
        end.add_args(json!({"endData": {"rootNode": 7}}).as_object().unwrap().clone());
        assert!(begin.complete(&end));
        assert_eq!(begin.end_time, Some(14.0));
        assert_eq!(begin.begin_data().unwrap()["frame"], "f1");
        assert_eq!(begin.end_data().unwrap()["rootNode"], 7);
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(is_truthy(Some(&json!("f"))));
        assert!(is_truthy(Some(&json!({}))));
    }
}
