//! One id space for raw and synthetic events.
//!
//! Raw events keep the ids the store gave them. Events derived during
//! reconstruction (JS samples, JS frames, sync copies of async spans) are
//! appended behind them, so an [`EventId`] always resolves to exactly one
//! event and side tables never need to know where an event came from.

use crate::domain::{EventId, Pid};
use crate::store::{is_truthy, Event, EventStore};
use serde_json::Value;

/// Read access to events by id.
pub trait EventSource {
    fn event(&self, id: EventId) -> &Event;
}

impl EventSource for EventStore {
    fn event(&self, id: EventId) -> &Event {
        EventStore::event(self, id)
    }
}

/// Store events plus the synthetic events appended while reconstructing.
pub struct EventArena<'a> {
    store: &'a EventStore,
    synthetic: Vec<Event>,
}

impl<'a> EventArena<'a> {
    #[must_use]
    pub fn new(store: &'a EventStore) -> Self {
        Self {
            store,
            synthetic: Vec::new(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &'a EventStore {
        self.store
    }

    pub fn push(&mut self, event: Event) -> EventId {
        let id = EventId(self.store.events().len() + self.synthetic.len());
        self.synthetic.push(event);
        id
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) -> Vec<EventId> {
        events.into_iter().map(|event| self.push(event)).collect()
    }

    /// Process id owning the event's thread
    #[must_use]
    pub fn pid_of(&self, event: &Event) -> Pid {
        self.store.thread(event.thread).pid
    }

    #[must_use]
    pub fn into_synthetic(self) -> Vec<Event> {
        self.synthetic
    }
}

impl EventSource for EventArena<'_> {
    fn event(&self, id: EventId) -> &Event {
        let raw = self.store.events().len();
        if id.index() < raw {
            self.store.event(id)
        } else {
            &self.synthetic[id.index() - raw]
        }
    }
}

/// `data.frame`, falling back to `beginData.frame`; empty when absent.
#[must_use]
pub fn event_frame_id(event: &Event) -> &str {
    event
        .data_or_begin_data()
        .and_then(|data| data.get("frame"))
        .and_then(Value::as_str)
        .unwrap_or("")
}

/// Process-scoped join key `"{pid}.{value}"` built from a `data` (or
/// `beginData`) field. `None` when the field is unset.
#[must_use]
pub fn global_event_id(event: &Event, pid: Pid, field: &str) -> Option<String> {
    let key = json_key(event.data_or_begin_data()?.get(field))?;
    Some(format!("{}.{key}", pid.0))
}

/// Map key for an id-like JSON value: strings as-is, anything else in its
/// JSON form. `None` when the value is unset.
#[must_use]
pub fn json_key(value: Option<&Value>) -> Option<String> {
    if !is_truthy(value) {
        return None;
    }
    Some(match value? {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}
