//! Per-event side table filled in by the classifier.
//!
//! Events stay immutable after the store is finalized; everything the
//! classifier learns about one event lives in its [`Annotation`].

use super::record_type::WarningType;
use crate::domain::EventId;
use crate::profile::CallFrame;

/// Script position of `FunctionCall`/`EvaluateScript`/`v8.compile`, 0-based.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptLocation {
    pub url: Option<String>,
    pub line_number: Option<i64>,
    pub column_number: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
    pub warning: Option<WarningType>,
    pub url: Option<String>,
    pub backend_node_id: Option<i64>,
    /// Leaf-first, 0-based line and column numbers
    pub stack_trace: Option<Vec<CallFrame>>,
    /// Picture snapshot recorded for a paint
    pub picture: Option<EventId>,
    pub initiator: Option<EventId>,
    pub frame_id: String,
    pub time_waiting_for_main_thread: Option<f64>,
    /// Duration minus the duration of nested children, clamped at zero
    pub self_time: f64,
    /// Self time before clamping, kept only when it went negative
    pub raw_self_time: Option<f64>,
    pub script_location: Option<ScriptLocation>,
}

/// Dense annotation table indexed by [`EventId`], grown on demand.
#[derive(Debug, Default)]
pub struct Annotations {
    entries: Vec<Annotation>,
}

impl Annotations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: EventId) -> Option<&Annotation> {
        self.entries.get(id.index())
    }

    pub fn get_mut(&mut self, id: EventId) -> &mut Annotation {
        if id.index() >= self.entries.len() {
            self.entries.resize_with(id.index() + 1, Annotation::default);
        }
        &mut self.entries[id.index()]
    }

    #[must_use]
    pub fn warning(&self, id: EventId) -> Option<WarningType> {
        self.get(id).and_then(|a| a.warning)
    }

    #[must_use]
    pub fn initiator(&self, id: EventId) -> Option<EventId> {
        self.get(id).and_then(|a| a.initiator)
    }

    #[must_use]
    pub fn frame_id(&self, id: EventId) -> &str {
        self.get(id).map_or("", |a| a.frame_id.as_str())
    }

    /// Link `id` to the event that caused it. An event without a url of its
    /// own inherits the initiator's.
    pub fn set_initiator(&mut self, id: EventId, initiator: Option<EventId>) {
        let inherited = initiator
            .and_then(|i| self.get(i))
            .and_then(|a| a.url.clone());
        let annotation = self.get_mut(id);
        annotation.initiator = initiator;
        if annotation.url.is_none() {
            annotation.url = inherited;
        }
    }
}
