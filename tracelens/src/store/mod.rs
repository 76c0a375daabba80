//! Event Store
//!
//! Owns every raw event of one loaded trace, grouped process → thread, and
//! turns the flat stream into balanced intervals and stitched async
//! operations.
//!
//! # Lifecycle
//!
//! ```text
//! RawEvent stream
//!     │
//!     ├──► ingest()    ← per event: phase decode, join key, top-level dedup,
//!     │                  metadata, min/max record time, pending async list
//!     │
//!     └──► finalize()  ← async replay (sorted, deferred), then per thread:
//!                        stable sort + Begin/End stitching
//! ```
//!
//! After `finalize()` the store is read-only. Later stages attach what they
//! derive through side tables keyed by [`EventId`], never by mutating events.

pub mod async_events;
pub mod event;
pub mod phase;
pub mod process;

pub use async_events::AsyncEvent;
pub use event::{is_truthy, Event, DEVTOOLS_TIMELINE_CATEGORY, LEGACY_TOP_LEVEL_CATEGORY};
pub use phase::Phase;
pub use process::{Process, Thread};

use crate::config::ModelOptions;
use crate::diagnostics::{Anomaly, ModelDiagnostics};
use crate::domain::{AsyncEventId, EventId, Pid, ThreadId, Tid, TraceError};
use crate::trace_data::RawEvent;
use log::error;
use process::compare_named;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Thread name of the browser process's main thread
pub const BROWSER_MAIN_THREAD_NAME: &str = "CrBrowserMain";

#[derive(Debug)]
pub struct EventStore {
    events: Vec<Event>,
    async_events: Vec<AsyncEvent>,
    threads: Vec<Thread>,
    processes: Vec<Process>,
    process_by_pid: HashMap<Pid, usize>,
    process_by_name: HashMap<String, usize>,
    /// Sample-phase events keyed by (pid, id), in arrival order
    profile_groups: HashMap<(Pid, String), Vec<EventId>>,
    devtools_metadata: Vec<EventId>,
    /// Async-phase events awaiting the deferred replay in `finalize()`
    pending_async: Vec<EventId>,
    minimum_record_time: f64,
    maximum_record_time: f64,
    strict: bool,
    finalized: bool,
    diagnostics: ModelDiagnostics,
}

impl EventStore {
    #[must_use]
    pub fn new(options: &ModelOptions) -> Self {
        Self {
            events: Vec::new(),
            async_events: Vec::new(),
            threads: Vec::new(),
            processes: Vec::new(),
            process_by_pid: HashMap::new(),
            process_by_name: HashMap::new(),
            profile_groups: HashMap::new(),
            devtools_metadata: Vec::new(),
            pending_async: Vec::new(),
            minimum_record_time: 0.0,
            maximum_record_time: 0.0,
            strict: options.strict,
            finalized: false,
            diagnostics: ModelDiagnostics::new(),
        }
    }

    /// Ingest a complete trace and finalize it.
    pub fn from_raw(
        events: impl IntoIterator<Item = RawEvent>,
        options: &ModelOptions,
    ) -> Result<Self, TraceError> {
        let mut store = Self::new(options);
        store.ingest(events)?;
        store.finalize()?;
        Ok(store)
    }

    /// Append raw events. May be called several times before `finalize()`.
    pub fn ingest(&mut self, events: impl IntoIterator<Item = RawEvent>) -> Result<(), TraceError> {
        for raw in events {
            self.add_event(raw)?;
        }
        Ok(())
    }

    /// Close dangling state: replay async phases, then stitch every thread.
    /// Calling it twice is a no-op.
    pub fn finalize(&mut self) -> Result<(), TraceError> {
        if self.finalized {
            return Ok(());
        }
        self.process_pending_async_events()?;
        for index in 0..self.threads.len() {
            self.complete_thread(ThreadId(index));
        }
        self.finalized = true;
        Ok(())
    }

    // === INGESTION ===

    fn add_event(&mut self, raw: RawEvent) -> Result<(), TraceError> {
        let Some(phase) = Phase::from_code(&raw.ph) else {
            self.diagnostics.record(
                Anomaly::UnknownPhase,
                format_args!("'{}' on {} at {}us", raw.ph, raw.name, raw.ts),
            );
            return Ok(());
        };

        let pid = Pid(raw.pid);
        let process = self.ensure_process(pid);
        let timestamp = raw.ts / 1000.0;
        // Records for unrelated threads may arrive out of order. A zero
        // timestamp never sets the minimum, so a window opened by an event
        // at ts 0 starts at the next recorded activity.
        if raw.ts != 0.0
            && (self.minimum_record_time == 0.0 || timestamp < self.minimum_record_time)
            && phase.marks_activity()
        {
            self.minimum_record_time = timestamp;
        }
        let end_timestamp = (raw.ts + raw.dur.unwrap_or(0.0)) / 1000.0;
        self.maximum_record_time = self.maximum_record_time.max(end_timestamp);

        let thread = self.ensure_thread(process, Tid(raw.tid));
        let id = self.extract_id(&raw);
        let metadata = (phase == Phase::Metadata).then(|| (raw.name.clone(), raw.args.clone()));
        let (event, has_payload) = build_event(raw, phase, thread, id);
        if !has_payload {
            if self.strict {
                return Err(TraceError::MissingSnapshot {
                    name: event.name,
                    time: event.start_time,
                });
            }
            self.diagnostics.record(
                Anomaly::MissingSnapshot,
                format_args!("{} at {}ms", event.name, event.start_time),
            );
        }
        let Some(event_id) = self.add_thread_event(event) else {
            return Ok(());
        };

        if phase == Phase::Sample {
            let key = (pid, self.events[event_id.index()].id.clone().unwrap_or_default());
            self.profile_groups.entry(key).or_default().push(event_id);
            return Ok(());
        }
        if phase.is_async() {
            self.pending_async.push(event_id);
        }
        if self.events[event_id.index()].has_category(DEVTOOLS_TIMELINE_CATEGORY) {
            self.devtools_metadata.push(event_id);
        }
        if let Some((name, Some(args))) = metadata {
            self.apply_metadata(&name, &args, process, thread);
        }
        Ok(())
    }

    /// Push an event onto its thread, dropping nested top-level duplicates.
    fn add_thread_event(&mut self, event: Event) -> Option<EventId> {
        let thread = &mut self.threads[event.thread.index()];
        let event_id = EventId(self.events.len());
        if event.is_top_level() {
            if let Some(last) = thread.last_top_level {
                let last = &self.events[last.index()];
                if last.end_time.is_some_and(|end| end > event.start_time) {
                    self.diagnostics.record(
                        Anomaly::DroppedTopLevel,
                        format_args!("{} at {}ms", event.name, event.start_time),
                    );
                    return None;
                }
            }
            thread.last_top_level = Some(event_id);
        }
        thread.events.push(event_id);
        self.events.push(event);
        Some(event_id)
    }

    fn apply_metadata(
        &mut self,
        name: &str,
        args: &Map<String, Value>,
        process: usize,
        thread: ThreadId,
    ) {
        let metadata_name = name;
        let sort_index = args.get("sort_index").and_then(Value::as_i64);
        let name = args.get("name").and_then(Value::as_str);
        match metadata_name {
            "process_sort_index" => {
                if let Some(index) = sort_index {
                    self.processes[process].sort_index = index;
                }
            }
            "process_name" => {
                if let Some(name) = name {
                    self.processes[process].name = name.to_string();
                    self.process_by_name.insert(name.to_string(), process);
                }
            }
            "thread_sort_index" => {
                if let Some(index) = sort_index {
                    self.threads[thread.index()].sort_index = index;
                }
            }
            "thread_name" => {
                if let Some(name) = name {
                    self.threads[thread.index()].name = name.to_string();
                    self.processes[process]
                        .thread_by_name
                        .insert(name.to_string(), thread);
                }
            }
            _ => {}
        }
    }

    fn ensure_process(&mut self, pid: Pid) -> usize {
        if let Some(&index) = self.process_by_pid.get(&pid) {
            return index;
        }
        let index = self.processes.len();
        self.processes.push(Process::new(pid));
        self.process_by_pid.insert(pid, index);
        index
    }

    fn ensure_thread(&mut self, process: usize, tid: Tid) -> ThreadId {
        if let Some(thread) = self.processes[process].thread_by_tid(tid) {
            return thread;
        }
        let id = ThreadId(self.threads.len());
        let pid = self.processes[process].pid;
        self.threads.push(Thread::new(id, pid, tid));
        let process = &mut self.processes[process];
        process.threads.push(id);
        process.thread_by_tid.insert(tid, id);
        id
    }

    /// Join key of a raw event.
    ///
    /// An explicit id (prefixed by its scope when present) wins. Otherwise a
    /// structured `id2` must carry exactly one of `global`/`local`; local ids
    /// are scoped by process.
    fn extract_id(&mut self, raw: &RawEvent) -> Option<String> {
        let scope = raw.scope.as_deref().unwrap_or("");
        let Some(id2) = raw.id2.as_ref() else {
            return match (&raw.id, scope.is_empty()) {
                (Some(id), false) => Some(format!("{scope}@{id}")),
                (id, _) => id.clone(),
            };
        };
        match (&id2.global, &id2.local) {
            (Some(global), None) => Some(format!(":{scope}:{global}")),
            (None, Some(local)) => Some(format!(":{scope}:{}:{local}", raw.pid)),
            _ => {
                self.diagnostics.record(
                    Anomaly::MalformedId,
                    format_args!(
                        "id2 at {}ms must have exactly one of 'local' and 'global'",
                        raw.ts / 1000.0
                    ),
                );
                None
            }
        }
    }

    // === THREAD COMPLETION ===

    /// Stable-sort a thread and pair its Begin/End events.
    fn complete_thread(&mut self, thread: ThreadId) {
        let events = &self.events;
        let async_events = &self.async_events;
        let record = &mut self.threads[thread.index()];
        record.async_events.sort_by(|a, b| {
            async_events[a.index()]
                .start_time
                .total_cmp(&async_events[b.index()].start_time)
        });
        record
            .events
            .sort_by(|a, b| Event::compare_start_time(&events[a.index()], &events[b.index()]));

        let ordered = std::mem::take(&mut record.events);
        let mut kept = Vec::with_capacity(ordered.len());
        let mut stack: Vec<EventId> = Vec::new();
        for id in ordered {
            match self.events[id.index()].phase {
                Phase::End => {
                    // Unbalanced ends are legitimate when the trace starts mid-task
                    let Some(top) = stack.pop() else {
                        let end = &self.events[id.index()];
                        self.diagnostics.record(
                            Anomaly::UnbalancedEnd,
                            format_args!("{} at {}ms", end.name, end.start_time),
                        );
                        continue;
                    };
                    let end = self.events[id.index()].clone();
                    let begin = &mut self.events[top.index()];
                    if begin.name != end.name || begin.categories != end.categories {
                        self.diagnostics.record(
                            Anomaly::MismatchedEnd,
                            format_args!(
                                "{} at {}ms vs. {} at {}ms",
                                begin.name, begin.start_time, end.name, end.start_time
                            ),
                        );
                    } else if !begin.complete(&end) {
                        self.diagnostics.record(Anomaly::OutOfOrderEnd, &end.name);
                    }
                    continue;
                }
                Phase::Begin => stack.push(id),
                _ => {}
            }
            kept.push(id);
        }
        let maximum = self.maximum_record_time;
        while let Some(open) = stack.pop() {
            let event = &mut self.events[open.index()];
            event.set_end_time(maximum);
            self.diagnostics.record(
                Anomaly::UnclosedBegin,
                format_args!("{} at {}ms", event.name, event.start_time),
            );
        }
        self.threads[thread.index()].events = kept;
    }

    // === ACCESSORS ===

    #[must_use]
    pub fn event(&self, id: EventId) -> &Event {
        &self.events[id.index()]
    }

    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    #[must_use]
    pub fn async_event(&self, id: AsyncEventId) -> &AsyncEvent {
        &self.async_events[id.index()]
    }

    #[must_use]
    pub fn thread(&self, id: ThreadId) -> &Thread {
        &self.threads[id.index()]
    }

    #[must_use]
    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    #[must_use]
    pub fn process_by_pid(&self, pid: Pid) -> Option<&Process> {
        self.process_by_pid.get(&pid).map(|&index| &self.processes[index])
    }

    #[must_use]
    pub fn process_by_name(&self, name: &str) -> Option<&Process> {
        self.process_by_name
            .get(name)
            .map(|&index| &self.processes[index])
    }

    #[must_use]
    pub fn thread_by_name(&self, process_name: &str, thread_name: &str) -> Option<ThreadId> {
        self.process_by_name(process_name)?.thread_by_name(thread_name)
    }

    /// Processes by sort index, then name
    #[must_use]
    pub fn sorted_processes(&self) -> Vec<&Process> {
        let mut processes: Vec<&Process> = self.processes.iter().collect();
        processes.sort_by(|a, b| compare_named(a.sort_index, &a.name, b.sort_index, &b.name));
        processes
    }

    /// Threads of one process by sort index, then name
    #[must_use]
    pub fn sorted_threads(&self, process: &Process) -> Vec<ThreadId> {
        let mut threads = process.threads.clone();
        threads.sort_by(|a, b| {
            let (a, b) = (&self.threads[a.index()], &self.threads[b.index()]);
            compare_named(a.sort_index, &a.name, b.sort_index, &b.name)
        });
        threads
    }

    /// Chunk group of a sample-phase event
    #[must_use]
    pub fn profile_group(&self, event: EventId) -> Option<&[EventId]> {
        let event = self.event(event);
        let pid = self.thread(event.thread).pid;
        let key = (pid, event.id.clone().unwrap_or_default());
        self.profile_groups.get(&key).map(Vec::as_slice)
    }

    /// Events in the DevTools timeline category, in arrival order
    #[must_use]
    pub fn devtools_metadata_events(&self) -> &[EventId] {
        &self.devtools_metadata
    }

    #[must_use]
    pub fn minimum_record_time(&self) -> f64 {
        self.minimum_record_time
    }

    #[must_use]
    pub fn maximum_record_time(&self) -> f64 {
        self.maximum_record_time
    }

    #[must_use]
    pub fn diagnostics(&self) -> &ModelDiagnostics {
        &self.diagnostics
    }

    pub(crate) fn take_diagnostics(&mut self) -> ModelDiagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    /// The browser process's main thread.
    ///
    /// Tries, in order: the only `CrBrowserMain` thread; the `CrBrowserMain`
    /// thread of the only process named `*browser`; the thread of the only
    /// `TracingStartedInBrowser` metadata event.
    #[must_use]
    pub fn browser_main_thread(&self) -> Option<ThreadId> {
        let processes = self.sorted_processes();
        if processes.is_empty() {
            return None;
        }
        let mut browser_processes = Vec::new();
        let mut browser_main_threads = Vec::new();
        for process in &processes {
            if process.name.to_lowercase().ends_with("browser") {
                browser_processes.push(*process);
            }
            browser_main_threads.extend(
                self.sorted_threads(process)
                    .into_iter()
                    .filter(|&t| self.thread(t).name == BROWSER_MAIN_THREAD_NAME),
            );
        }
        if let [thread] = browser_main_threads.as_slice() {
            return Some(*thread);
        }
        if let [process] = browser_processes.as_slice() {
            return process.thread_by_name(BROWSER_MAIN_THREAD_NAME);
        }
        let started: Vec<EventId> = self
            .devtools_metadata
            .iter()
            .copied()
            .filter(|&e| self.event(e).name == "TracingStartedInBrowser")
            .collect();
        if let [event] = started.as_slice() {
            return Some(self.event(*event).thread);
        }
        error!("Failed to find browser main thread in trace, some timeline features may be unavailable");
        None
    }
}

/// Build the store-side event from a raw record. The flag is false for a
/// snapshot event that lacks its mandatory `snapshot` payload.
fn build_event(raw: RawEvent, phase: Phase, thread: ThreadId, id: Option<String>) -> (Event, bool) {
    let mut event = Event::new(raw.cat, raw.name, phase, raw.ts / 1000.0, thread);
    let mut has_payload = true;
    if phase == Phase::SnapshotObject {
        match raw.args {
            Some(args) if args.contains_key("snapshot") => event.args = args,
            _ => has_payload = false,
        }
    } else if let Some(args) = raw.args {
        event.add_args(args);
    }
    if let Some(dur) = raw.dur {
        event.set_end_time((raw.ts + dur) / 1000.0);
    }
    event.id = id;
    event.bind_id = raw.bind_id;
    (event, has_payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lenient_store(events: Vec<RawEvent>) -> EventStore {
        EventStore::from_raw(events, &ModelOptions::lenient()).unwrap()
    }

    fn names(store: &EventStore, thread: ThreadId) -> Vec<(String, f64, Option<f64>)> {
        store
            .thread(thread)
            .events()
            .iter()
            .map(|&id| {
                let e = store.event(id);
                (e.name.clone(), e.start_time, e.end_time)
            })
            .collect()
    }

    #[test]
    fn test_nested_begin_end_pairing() {
        let store = lenient_store(vec![
            RawEvent::new("B", "A", "x", 0.0),
            RawEvent::new("B", "B", "x", 2000.0),
            RawEvent::new("E", "B", "x", 7000.0),
            RawEvent::new("E", "A", "x", 10000.0),
        ]);
        let thread = ThreadId(0);
        assert_eq!(
            names(&store, thread),
            vec![
                ("A".to_string(), 0.0, Some(10.0)),
                ("B".to_string(), 2.0, Some(7.0)),
            ]
        );
        assert_eq!(store.diagnostics().total(), 0);
    }

    #[test]
    fn test_unbalanced_end_dropped() {
        let store = lenient_store(vec![
            RawEvent::new("E", "Stray", "x", 1000.0),
            RawEvent::new("X", "Task", "x", 2000.0).with_dur(1000.0),
        ]);
        assert_eq!(store.thread(ThreadId(0)).events().len(), 1);
        assert_eq!(store.diagnostics().count(Anomaly::UnbalancedEnd), 1);
    }

    #[test]
    fn test_unclosed_begin_ends_at_maximum() {
        let store = lenient_store(vec![
            RawEvent::new("B", "Open", "x", 1000.0),
            RawEvent::new("X", "Late", "x", 3000.0).with_dur(2000.0),
        ]);
        let open = store.event(store.thread(ThreadId(0)).events()[0]);
        assert_eq!(open.end_time, Some(5.0));
        assert_eq!(store.diagnostics().count(Anomaly::UnclosedBegin), 1);
    }

    #[test]
    fn test_overlapping_top_level_dropped() {
        let cat = DEVTOOLS_TIMELINE_CATEGORY;
        let store = lenient_store(vec![
            RawEvent::new("X", "RunTask", cat, 0.0).with_dur(10000.0),
            RawEvent::new("X", "RunTask", cat, 4000.0).with_dur(1000.0),
            RawEvent::new("X", "RunTask", cat, 12000.0).with_dur(1000.0),
        ]);
        let starts: Vec<f64> = names(&store, ThreadId(0)).iter().map(|e| e.1).collect();
        assert_eq!(starts, vec![0.0, 12.0]);
        assert_eq!(store.diagnostics().count(Anomaly::DroppedTopLevel), 1);
    }

    #[test]
    fn test_record_time_bounds() {
        let store = lenient_store(vec![
            RawEvent::new("M", "thread_name", "__metadata", 0.0),
            RawEvent::new("X", "Task", "x", 5000.0).with_dur(2000.0),
            RawEvent::new("I", "Mark", "x", 3000.0),
        ]);
        assert_eq!(store.minimum_record_time(), 3.0);
        assert_eq!(store.maximum_record_time(), 7.0);
    }

    #[test]
    fn test_metadata_names_processes_and_threads() {
        let store = lenient_store(vec![
            RawEvent::new("M", "process_name", "__metadata", 0.0)
                .on_thread(7, 1)
                .with_args(json!({ "name": "Browser" })),
            RawEvent::new("M", "thread_name", "__metadata", 0.0)
                .on_thread(7, 1)
                .with_args(json!({ "name": BROWSER_MAIN_THREAD_NAME })),
            RawEvent::new("M", "thread_sort_index", "__metadata", 0.0)
                .on_thread(7, 1)
                .with_args(json!({ "sort_index": -1 })),
        ]);
        let thread = store.thread_by_name("Browser", BROWSER_MAIN_THREAD_NAME);
        assert_eq!(thread, Some(ThreadId(0)));
        assert_eq!(store.thread(ThreadId(0)).sort_index, -1);
        assert_eq!(store.browser_main_thread(), Some(ThreadId(0)));
    }

    #[test]
    fn test_browser_main_thread_missing() {
        let store = lenient_store(vec![RawEvent::new("I", "Mark", "x", 1000.0)]);
        assert_eq!(store.browser_main_thread(), None);
    }

    #[test]
    fn test_scoped_and_structured_ids() {
        let mut scoped = RawEvent::new("I", "Mark", "x", 1000.0).with_id("0x1");
        scoped.scope = Some("frames".to_string());
        let mut local = RawEvent::new("I", "Mark", "x", 2000.0).on_thread(3, 1);
        local.id2 = Some(crate::trace_data::RawId2 {
            global: None,
            local: Some("0x2".to_string()),
        });
        let mut broken = RawEvent::new("I", "Mark", "x", 3000.0);
        broken.id2 = Some(crate::trace_data::RawId2 {
            global: Some("a".to_string()),
            local: Some("b".to_string()),
        });
        let store = lenient_store(vec![scoped, local, broken]);
        let ids: Vec<Option<&str>> = store.events().iter().map(|e| e.id.as_deref()).collect();
        assert_eq!(ids, vec![Some("frames@0x1"), Some("::3:0x2"), None]);
        assert_eq!(store.diagnostics().count(Anomaly::MalformedId), 1);
    }

    #[test]
    fn test_missing_snapshot_strict_and_lenient() {
        let raw = || vec![RawEvent::new("O", "Layer", "x", 1000.0).with_args(json!({}))];
        let strict = EventStore::from_raw(raw(), &ModelOptions::default());
        assert!(matches!(strict, Err(TraceError::MissingSnapshot { .. })));

        let store = lenient_store(raw());
        assert_eq!(store.diagnostics().count(Anomaly::MissingSnapshot), 1);
    }

    #[test]
    fn test_nestable_async_lifo() {
        let cat = "blink";
        let store = lenient_store(vec![
            RawEvent::new("b", "Outer", cat, 1000.0).with_id("1"),
            RawEvent::new("b", "Inner", cat, 2000.0).with_id("1"),
            RawEvent::new("e", "Inner", cat, 3000.0).with_id("1"),
            RawEvent::new("e", "Outer", cat, 6000.0).with_id("1"),
        ]);
        let thread = store.thread(ThreadId(0));
        let spans: Vec<(String, Option<f64>)> = thread
            .async_events()
            .iter()
            .map(|&id| {
                let a = store.async_event(id);
                (a.name.clone(), a.end_time)
            })
            .collect();
        assert_eq!(
            spans,
            vec![
                ("Outer".to_string(), Some(6.0)),
                ("Inner".to_string(), Some(3.0)),
            ]
        );
        let outer = store.async_event(thread.async_events()[0]);
        assert_eq!(store.event(outer.steps[0]).end_time, Some(6.0));
    }

    #[test]
    fn test_legacy_async_steps_and_unclosed() {
        let store = lenient_store(vec![
            RawEvent::new("S", "Load", "net", 1000.0).with_id("7"),
            RawEvent::new("T", "Load", "net", 2000.0).with_id("7"),
            RawEvent::new("F", "Load", "net", 4000.0).with_id("7"),
            RawEvent::new("S", "Open", "net", 5000.0).with_id("8"),
            RawEvent::new("X", "Task", "x", 8000.0).with_dur(1000.0),
        ]);
        let thread = store.thread(ThreadId(0));
        let load = store.async_event(thread.async_events()[0]);
        assert_eq!(load.steps.len(), 3);
        assert_eq!(load.end_time, Some(4.0));
        let open = store.async_event(thread.async_events()[1]);
        assert_eq!(open.end_time, Some(9.0));
        assert_eq!(store.diagnostics().count(Anomaly::UnclosedAsync), 1);
    }

    #[test]
    fn test_legacy_async_phase_mismatch() {
        let raw = || {
            vec![
                RawEvent::new("S", "Load", "net", 1000.0).with_id("7"),
                RawEvent::new("T", "Load", "net", 2000.0).with_id("7"),
                RawEvent::new("p", "Load", "net", 3000.0).with_id("7"),
                RawEvent::new("F", "Load", "net", 4000.0).with_id("7"),
            ]
        };
        let strict = EventStore::from_raw(raw(), &ModelOptions::default());
        assert!(matches!(strict, Err(TraceError::AsyncPhaseMismatch { .. })));

        let store = lenient_store(raw());
        assert_eq!(store.diagnostics().count(Anomaly::AsyncPhaseMismatch), 1);
        let load = store.async_event(store.thread(ThreadId(0)).async_events()[0]);
        assert_eq!(load.steps.len(), 3);
    }

    #[test]
    fn test_samples_grouped_by_process_and_id() {
        let store = lenient_store(vec![
            RawEvent::new("P", "Profile", "v8", 1000.0).with_id("0x1"),
            RawEvent::new("P", "ProfileChunk", "v8", 2000.0).with_id("0x1"),
            RawEvent::new("P", "Profile", "v8", 1000.0).with_id("0x2"),
        ]);
        let group = store.profile_group(EventId(0)).unwrap();
        assert_eq!(group, &[EventId(0), EventId(1)]);
    }
}
