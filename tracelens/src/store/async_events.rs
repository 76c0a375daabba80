//! Async operation stitching.
//!
//! Async phases are collected during ingestion and replayed here once every
//! event is known, in start-time order (ties keep arrival order), because the
//! fragments of one operation may arrive out of thread/process order.
//!
//! Two pairing schemes coexist:
//!
//! - **Legacy** (`S`/`T`/`p`/`F`): keyed by `category.name.id`, one open
//!   operation per key.
//! - **Nestable** (`b`/`n`/`e`): keyed by `category.id`, with a stack per key
//!   so same-key operations can nest. End pops (LIFO).

use super::event::Event;
use super::phase::Phase;
use super::EventStore;
use crate::diagnostics::Anomaly;
use crate::domain::{AsyncEventId, EventId, ThreadId, TraceError};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A stitched async operation: the begin event plus every step that joined it.
#[derive(Debug, Clone)]
pub struct AsyncEvent {
    pub categories: String,
    pub name: String,
    /// Phase of the opening step
    pub phase: Phase,
    pub start_time: f64,
    /// Start time of the terminating step, once seen
    pub end_time: Option<f64>,
    pub thread: ThreadId,
    pub args: Map<String, Value>,
    /// Never empty; `steps[0]` is the begin event
    pub steps: Vec<EventId>,
}

impl AsyncEvent {
    fn open(begin_id: EventId, begin: &Event) -> Self {
        Self {
            categories: begin.categories.clone(),
            name: begin.name.clone(),
            phase: begin.phase,
            start_time: begin.start_time,
            end_time: None,
            thread: begin.thread,
            args: begin.args.clone(),
            steps: vec![begin_id],
        }
    }

    #[must_use]
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.split(',').any(|c| c == category)
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end_time.map_or(0.0, |end| end - self.start_time)
    }

    #[must_use]
    pub fn last_step(&self) -> EventId {
        self.steps[self.steps.len() - 1]
    }
}

/// Open operations during the replay
#[derive(Default)]
struct OpenAsync {
    legacy: HashMap<String, AsyncEventId>,
    nestable: HashMap<String, Vec<AsyncEventId>>,
}

impl EventStore {
    pub(super) fn process_pending_async_events(&mut self) -> Result<(), TraceError> {
        let mut pending = std::mem::take(&mut self.pending_async);
        let events = &self.events;
        pending.sort_by(|a, b| Event::compare_start_time(&events[a.index()], &events[b.index()]));

        let mut open = OpenAsync::default();
        for id in pending {
            if self.events[id.index()].phase.is_nestable_async() {
                self.add_nestable_async_event(&mut open, id);
            } else {
                self.add_legacy_async_event(&mut open, id)?;
            }
        }
        self.close_open_async_events(open);
        Ok(())
    }

    fn add_nestable_async_event(&mut self, open: &mut OpenAsync, id: EventId) {
        let event = &self.events[id.index()];
        let phase = event.phase;
        let key = format!("{}.{}", event.categories, event.id.as_deref().unwrap_or(""));
        match phase {
            Phase::NestableAsyncBegin => {
                let async_id = self.open_async_event(id);
                open.nestable.entry(key).or_default().push(async_id);
            }
            Phase::NestableAsyncInstant => {
                match open.nestable.get(&key).and_then(|stack| stack.last()) {
                    Some(&top) => self.add_step(top, id),
                    None => self.record_stray(id),
                }
            }
            Phase::NestableAsyncEnd => {
                let Some(top) = open.nestable.get_mut(&key).and_then(Vec::pop) else {
                    self.record_stray(id);
                    return;
                };
                let top_name = &self.async_events[top.index()].name;
                let end_name = &self.events[id.index()].name;
                if top_name != end_name {
                    self.diagnostics.record(
                        Anomaly::NestableNameMismatch,
                        format_args!("{top_name} vs. {end_name}, key: {key}"),
                    );
                    return;
                }
                self.add_step(top, id);
            }
            _ => {}
        }
    }

    fn add_legacy_async_event(
        &mut self,
        open: &mut OpenAsync,
        id: EventId,
    ) -> Result<(), TraceError> {
        let event = &self.events[id.index()];
        let key = format!(
            "{}.{}.{}",
            event.categories,
            event.name,
            event.id.as_deref().unwrap_or("")
        );
        let existing = open.legacy.get(&key).copied();

        if event.phase == Phase::AsyncBegin {
            if existing.is_some() {
                self.diagnostics.record(
                    Anomaly::DuplicateAsyncBegin,
                    format_args!("{} has already been started", event.name),
                );
                return Ok(());
            }
            let async_id = self.open_async_event(id);
            open.legacy.insert(key, async_id);
            return Ok(());
        }

        let Some(async_id) = existing else {
            self.record_stray(id);
            return Ok(());
        };
        match event.phase {
            Phase::AsyncEnd => {
                self.add_step(async_id, id);
                open.legacy.remove(&key);
            }
            Phase::AsyncStepInto | Phase::AsyncStepPast => {
                let last = &self.events[self.async_events[async_id.index()].last_step().index()];
                if last.phase != Phase::AsyncBegin && last.phase != event.phase {
                    let err = TraceError::AsyncPhaseMismatch {
                        name: event.name.clone(),
                        previous: last.phase.code(),
                        previous_time: last.start_time,
                        phase: event.phase.code(),
                        time: event.start_time,
                    };
                    if self.strict {
                        return Err(err);
                    }
                    self.diagnostics.record(Anomaly::AsyncPhaseMismatch, err);
                    return Ok(());
                }
                self.add_step(async_id, id);
            }
            _ => {}
        }
        Ok(())
    }

    fn open_async_event(&mut self, begin: EventId) -> AsyncEventId {
        let event = &self.events[begin.index()];
        let async_id = AsyncEventId(self.async_events.len());
        let thread = event.thread;
        self.async_events.push(AsyncEvent::open(begin, event));
        self.threads[thread.index()].async_events.push(async_id);
        async_id
    }

    /// Append a step; an end step closes both the operation and its begin event.
    fn add_step(&mut self, async_id: AsyncEventId, step: EventId) {
        let (phase, time) = {
            let event = &self.events[step.index()];
            (event.phase, event.start_time)
        };
        let operation = &mut self.async_events[async_id.index()];
        operation.steps.push(step);
        if matches!(phase, Phase::AsyncEnd | Phase::NestableAsyncEnd) {
            if time >= operation.start_time {
                operation.end_time = Some(time);
            }
            let begin = operation.steps[0];
            if !self.events[begin.index()].set_end_time(time) {
                self.diagnostics
                    .record(Anomaly::OutOfOrderEnd, &self.events[begin.index()].name);
            }
        }
    }

    fn record_stray(&mut self, id: EventId) {
        let event = &self.events[id.index()];
        self.diagnostics.record(
            Anomaly::StrayAsyncEvent,
            format_args!("{} ({}) at {}ms", event.name, event.phase.code(), event.start_time),
        );
    }

    /// Operations still open after the replay end at the maximum record time.
    fn close_open_async_events(&mut self, open: OpenAsync) {
        let maximum = self.maximum_record_time;
        let mut legacy: Vec<AsyncEventId> = open.legacy.into_values().collect();
        legacy.sort_unstable();
        for async_id in legacy {
            let operation = &mut self.async_events[async_id.index()];
            operation.end_time = Some(maximum.max(operation.start_time));
            let begin = operation.steps[0];
            self.events[begin.index()].set_end_time(maximum);
            self.diagnostics
                .record(Anomaly::UnclosedAsync, &self.async_events[async_id.index()].name);
        }
        let mut nestable: Vec<AsyncEventId> = open.nestable.into_values().flatten().collect();
        nestable.sort_unstable();
        for async_id in nestable {
            let operation = &mut self.async_events[async_id.index()];
            operation.end_time = Some(maximum.max(operation.start_time));
            self.diagnostics
                .record(Anomaly::UnclosedAsync, &self.async_events[async_id.index()].name);
        }
    }
}
