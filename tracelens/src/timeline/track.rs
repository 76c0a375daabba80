//! Tracks: per-thread event lanes and the named lanes for async groups.

use super::arena::EventArena;
use crate::domain::{AsyncEventId, EventId, ThreadId};
use crate::store::{Event, Phase};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TrackType {
    MainThread,
    Worker,
    Input,
    Animation,
    Timings,
    Console,
    Raster,
    Gpu,
    Other,
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TrackType::MainThread => "main",
            TrackType::Worker => "worker",
            TrackType::Input => "input",
            TrackType::Animation => "animation",
            TrackType::Timings => "timings",
            TrackType::Console => "console",
            TrackType::Raster => "raster",
            TrackType::Gpu => "gpu",
            TrackType::Other => "other",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    pub name: String,
    pub kind: TrackType,
    pub url: Option<String>,
    pub thread: Option<ThreadId>,
    pub for_main_frame: bool,
    /// Outermost duration events
    pub tasks: Vec<EventId>,
    pub events: Vec<EventId>,
    pub async_events: Vec<AsyncEventId>,
    /// Async spans as complete events, for tracks with no events of their own
    synthesized: Vec<EventId>,
}

impl Track {
    #[must_use]
    pub fn new(kind: TrackType) -> Self {
        Self {
            name: String::new(),
            kind,
            url: None,
            thread: None,
            for_main_frame: false,
            tasks: Vec::new(),
            events: Vec::new(),
            async_events: Vec::new(),
            synthesized: Vec::new(),
        }
    }

    /// The track's own events, or its async spans as complete events when it
    /// has none. Spans that do not nest properly yield nothing.
    #[must_use]
    pub fn sync_events(&self) -> &[EventId] {
        if self.events.is_empty() {
            &self.synthesized
        } else {
            &self.events
        }
    }

    /// Build the complete-event copies behind [`Track::sync_events`].
    pub(crate) fn synthesize_sync_events(&mut self, arena: &mut EventArena<'_>) {
        if !self.events.is_empty() || self.async_events.is_empty() {
            return;
        }
        let store = arena.store();
        let mut copies: Vec<Event> = Vec::with_capacity(self.async_events.len());
        let mut open_ends: Vec<f64> = Vec::new();
        for &id in &self.async_events {
            let span = store.async_event(id);
            let start = span.start_time;
            let end = span.end_time.unwrap_or(start);
            while open_ends.last().is_some_and(|&top| start >= top) {
                open_ends.pop();
            }
            if open_ends.last().is_some_and(|&top| end > top) {
                return;
            }
            let mut copy = Event::new(span.categories.clone(), span.name.clone(), Phase::Complete, start, span.thread);
            copy.set_end_time(end);
            copy.add_args(span.args.clone());
            copies.push(copy);
            open_ends.push(end);
        }
        self.synthesized = arena.extend(copies);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelOptions;
    use crate::store::EventStore;
    use crate::timeline::arena::EventSource;
    use crate::trace_data::RawEvent;

    fn store(raw: Vec<RawEvent>) -> EventStore {
        EventStore::from_raw(raw, &ModelOptions::lenient()).unwrap()
    }

    #[test]
    fn test_nested_async_spans_become_sync_events() {
        let store = store(vec![
            RawEvent::new("b", "measure", "blink.user_timing", 1000.0).with_id("1"),
            RawEvent::new("b", "inner", "blink.user_timing", 2000.0).with_id("2"),
            RawEvent::new("e", "inner", "blink.user_timing", 3000.0).with_id("2"),
            RawEvent::new("e", "measure", "blink.user_timing", 5000.0).with_id("1"),
        ]);
        let mut arena = EventArena::new(&store);
        let mut track = Track::new(TrackType::Timings);
        track.async_events = store.thread(ThreadId(0)).async_events().to_vec();
        track.synthesize_sync_events(&mut arena);
        let spans: Vec<(String, f64, f64)> = track
            .sync_events()
            .iter()
            .map(|&id| {
                let e = arena.event(id);
                (e.name.clone(), e.start_time, e.duration())
            })
            .collect();
        assert_eq!(
            spans,
            vec![("measure".to_string(), 1.0, 4.0), ("inner".to_string(), 2.0, 1.0)]
        );
    }

    #[test]
    fn test_overlapping_async_spans_yield_nothing() {
        let store = store(vec![
            RawEvent::new("b", "a", "blink.user_timing", 1000.0).with_id("1"),
            RawEvent::new("b", "b", "blink.user_timing", 2000.0).with_id("2"),
            RawEvent::new("e", "a", "blink.user_timing", 3000.0).with_id("1"),
            RawEvent::new("e", "b", "blink.user_timing", 5000.0).with_id("2"),
        ]);
        let mut arena = EventArena::new(&store);
        let mut track = Track::new(TrackType::Timings);
        track.async_events = store.thread(ThreadId(0)).async_events().to_vec();
        track.synthesize_sync_events(&mut arena);
        assert!(track.sync_events().is_empty());
    }
}
