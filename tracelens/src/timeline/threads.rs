//! Thread-level driving of the classifier.
//!
//! Picks which threads to process over which time ranges (browser frame
//! tracking, legacy page metadata, or a generic trace), then walks each
//! thread's merged event stream, keeping the nesting stack and self times.

use super::arena::{event_frame_id, EventArena, EventSource};
use super::classifier::Classifier;
use super::js_frames::inject_js_frame_events;
use super::record_type::{
    RecordType, CONSOLE_CATEGORY, LATENCY_INFO_CATEGORY, RENDERER_MAIN_THREAD_NAME,
    TRACING_SESSION_ID_FOR_WORKER, TRACING_STARTED_IN_BROWSER, TRACING_STARTED_IN_PAGE,
    USER_TIMING_CATEGORY, WORKER_THREAD_NAMES,
};
use super::track::{Track, TrackType};
use crate::diagnostics::Anomaly;
use crate::domain::{AsyncEventId, EventId, Pid, ProfileError, ThreadId};
use crate::profile::{extract_cpu_profile, CpuProfileModel};
use crate::store::{Event, EventStore, Phase};
use log::{debug, error, warn};
use serde_json::Value;
use std::collections::HashMap;

/// Thread prefix of compositor raster workers
const RASTER_THREAD_PREFIX: &str = "CompositorTileWorker";
/// Self time below this much under zero is reported, smaller skew is noise
const NEGATIVE_SELF_TIME_EPSILON: f64 = 1e-3;

/// Half-open time range `[from, to)` in ms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub from: f64,
    pub to: f64,
}

impl TimeRange {
    pub const ALL: TimeRange = TimeRange {
        from: 0.0,
        to: f64::INFINITY,
    };
}

/// What a processed thread is to the inspected page
#[derive(Debug, Clone, PartialEq)]
pub enum ThreadRole {
    Main {
        for_main_frame: bool,
        url: Option<String>,
    },
    Worker {
        url: String,
    },
    Other,
}

fn is_worker_thread(name: &str) -> bool {
    WORKER_THREAD_NAMES.contains(&name)
}

impl Classifier {
    /// Classify one thread's events inside `ranges` into a new track.
    pub(super) fn process_thread_events(
        &mut self,
        arena: &mut EventArena<'_>,
        ranges: &[TimeRange],
        thread: ThreadId,
        role: ThreadRole,
    ) -> Result<(), ProfileError> {
        let store = arena.store();
        let info = store.thread(thread);
        let mut track = Track::new(TrackType::Other);
        track.name = if info.name.is_empty() {
            format!("Thread {}", info.tid.0)
        } else {
            info.name.clone()
        };
        track.thread = Some(thread);
        match role {
            ThreadRole::Main { for_main_frame, url } => {
                track.kind = TrackType::MainThread;
                track.url = url.filter(|url| !url.is_empty());
                track.for_main_frame = for_main_frame;
            }
            ThreadRole::Worker { url } => {
                track.kind = TrackType::Worker;
                track.url = Some(url);
            }
            ThreadRole::Other if info.name.starts_with(RASTER_THREAD_PREFIX) => {
                track.kind = TrackType::Raster;
            }
            ThreadRole::Other => {}
        }
        let track_index = self.tracks.len();
        self.tracks.push(track);

        let profile = self.thread_cpu_profile(store, thread)?;
        let events = inject_js_frame_events(
            arena,
            thread,
            profile.as_ref(),
            self.options.show_native_functions,
            &mut self.diagnostics,
        );
        if let Some(profile) = profile {
            self.cpu_profiles.push(profile);
        }

        let arena: &EventArena<'_> = arena;
        self.start_thread(arena);
        for range in ranges {
            let first = events.partition_point(|&id| arena.event(id).start_time < range.from);
            for &id in &events[first..] {
                let event = arena.event(id);
                if event.start_time >= range.to {
                    break;
                }
                while self
                    .event_stack
                    .last()
                    .is_some_and(|&top| arena.event(top).end_or_start() <= event.start_time)
                {
                    self.event_stack.pop();
                }
                if !self.process_event(arena, id) {
                    continue;
                }
                if !event.phase.is_async() && event.duration() > 0.0 {
                    self.enter_duration_event(arena, id, event, track_index);
                }
                if self.is_marker_event(event, RecordType::from_name(&event.name)) {
                    self.time_markers.push(id);
                }
                self.tracks[track_index].events.push(id);
                self.inspected_events.push(id);
            }
        }
        self.flush_forced_layouts(arena);
        self.process_async_events(store, thread, ranges);
        Ok(())
    }

    /// Charge a new child against its parent's self time and open it.
    fn enter_duration_event(&mut self, arena: &EventArena<'_>, id: EventId, event: &Event, track_index: usize) {
        let duration = event.duration();
        if let Some(&parent) = self.event_stack.last() {
            let annotation = self.annotations.get_mut(parent);
            annotation.self_time -= duration;
            if annotation.self_time < 0.0 {
                let raw = annotation.self_time;
                annotation.raw_self_time = Some(annotation.raw_self_time.unwrap_or(0.0) + raw);
                annotation.self_time = 0.0;
                self.diagnostics.record_clamped_self_time(raw);
                if raw < -NEGATIVE_SELF_TIME_EPSILON {
                    let parent_start = arena.event(parent).start_time;
                    self.diagnostics.record(
                        Anomaly::NegativeSelfTime,
                        format_args!(
                            "children are longer than parent at {parent_start:.3}ms ({:.3} by {:.3})",
                            event.start_time - self.minimum_record_time,
                            -raw
                        ),
                    );
                }
            }
        } else {
            self.tracks[track_index].tasks.push(id);
        }
        self.annotations.get_mut(id).self_time = duration;
        self.event_stack.push(id);
    }

    /// Reconstruct the thread's CPU profile. Outside strict mode a broken
    /// profile is skipped; a sample/delta mismatch always fails the load.
    fn thread_cpu_profile(
        &mut self,
        store: &EventStore,
        thread: ThreadId,
    ) -> Result<Option<CpuProfileModel>, ProfileError> {
        let built = extract_cpu_profile(store, thread).and_then(|raw| {
            raw.map(|raw| CpuProfileModel::new(raw, &mut self.diagnostics))
                .transpose()
        });
        match built {
            Ok(profile) => Ok(profile),
            Err(err @ ProfileError::SampleDeltaMismatch { .. }) => Err(err),
            Err(err) if self.options.strict => Err(err),
            Err(err) => {
                let name = &store.thread(thread).name;
                self.diagnostics.record(Anomaly::InvalidProfile, format_args!("{name}: {err}"));
                Ok(None)
            }
        }
    }

    /// Sort the thread's async operations inside `ranges` into the named
    /// Console/Timings/Animation/Input tracks.
    pub(super) fn process_async_events(&mut self, store: &EventStore, thread: ThreadId, ranges: &[TimeRange]) {
        let async_events = store.thread(thread).async_events();
        let mut groups: Vec<(TrackType, Vec<AsyncEventId>)> = Vec::new();
        let mut group = |kind: TrackType, id: AsyncEventId| match groups.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, ids)) => ids.push(id),
            None => groups.push((kind, vec![id])),
        };
        for range in ranges {
            let first = async_events.partition_point(|&id| store.async_event(id).start_time < range.from);
            for &id in &async_events[first..] {
                let span = store.async_event(id);
                if span.start_time >= range.to {
                    break;
                }
                if span.has_category(CONSOLE_CATEGORY) {
                    group(TrackType::Console, id);
                    continue;
                }
                if span.has_category(USER_TIMING_CATEGORY) {
                    group(TrackType::Timings, id);
                    continue;
                }
                let kind = RecordType::from_name(&span.name);
                if kind == RecordType::Animation {
                    group(TrackType::Animation, id);
                    continue;
                }
                let is_latency = span.has_category(LATENCY_INFO_CATEGORY);
                if !is_latency && kind != RecordType::ImplSideFling {
                    continue;
                }
                // Latency events the backend left unterminated are dropped
                let last = store.event(span.last_step());
                if last.phase != Phase::AsyncEnd {
                    continue;
                }
                let data = last.data();
                if is_latency {
                    let caused_frame =
                        is_truthy_field(data, "INPUT_EVENT_LATENCY_RENDERER_SWAP_COMPONENT");
                    let known = last.id.as_ref().is_some_and(|id| self.known_input_events.contains(id));
                    if !known || (kind == RecordType::InputLatencyMouseMove && !caused_frame) {
                        continue;
                    }
                    let renderer_main = data
                        .and_then(|data| data.get("INPUT_EVENT_LATENCY_RENDERER_MAIN_COMPONENT"))
                        .and_then(|component| component.get("time"))
                        .and_then(Value::as_f64);
                    if let Some(time) = renderer_main {
                        let begin = span.steps[0];
                        let waited = time / 1000.0 - store.event(begin).start_time;
                        self.annotations.get_mut(begin).time_waiting_for_main_thread = Some(waited);
                    }
                }
                group(TrackType::Input, id);
            }
        }
        for (kind, ids) in groups {
            let index = self.ensure_named_track(kind);
            let track = &mut self.tracks[index];
            track.thread = Some(thread);
            track.async_events = merge_async(store, &track.async_events, &ids);
        }
    }

    // === FRAME TRACKING STRATEGIES ===

    /// Renderer processes hosting the tracked frames, processed over the
    /// periods they hosted them.
    pub(super) fn process_threads_for_browser_frames(
        &mut self,
        arena: &mut EventArena<'_>,
    ) -> Result<(), ProfileError> {
        struct Hosting {
            from: f64,
            to: f64,
            main: bool,
            url: String,
        }
        let mut by_pid: HashMap<i64, Vec<Hosting>> = HashMap::new();
        for frame in self.frames.iter() {
            for (i, process) in frame.processes.iter().enumerate() {
                let to = match frame.processes.get(i + 1) {
                    Some(next) => next.time,
                    None => frame.deleted_time.unwrap_or(self.maximum_record_time),
                };
                by_pid.entry(process.process_id).or_default().push(Hosting {
                    from: process.time,
                    to,
                    main: frame.is_root(),
                    url: process.url.clone(),
                });
            }
        }

        let store = arena.store();
        let mut plans: Vec<(Vec<TimeRange>, ThreadId, ThreadRole)> = Vec::new();
        for process in store.sorted_processes() {
            let Some(hostings) = by_pid.get_mut(&process.pid.0) else {
                continue;
            };
            hostings.sort_by(|a, b| a.from.total_cmp(&b.from).then(a.to.total_cmp(&b.to)));
            let mut ranges: Vec<TimeRange> = Vec::new();
            let mut last_url: Option<&str> = None;
            let mut last_main_url: Option<&str> = None;
            let mut has_main = false;
            for hosting in hostings.iter() {
                match ranges.last_mut() {
                    Some(last) if hosting.from <= last.to => last.to = hosting.to,
                    _ => ranges.push(TimeRange {
                        from: hosting.from,
                        to: hosting.to,
                    }),
                }
                has_main |= hosting.main;
                if !hosting.url.is_empty() {
                    if hosting.main {
                        last_main_url = Some(hosting.url.as_str());
                    }
                    last_url = Some(hosting.url.as_str());
                }
            }
            for thread in store.sorted_threads(process) {
                let name = store.thread(thread).name.as_str();
                let role = if name == RENDERER_MAIN_THREAD_NAME {
                    let url = if has_main { last_main_url } else { last_url };
                    ThreadRole::Main {
                        for_main_frame: has_main,
                        url: url.map(str::to_string),
                    }
                } else if is_worker_thread(name) {
                    let Some(session) = self.worker_session(store, thread, Some(process.pid), |_| false) else {
                        continue;
                    };
                    ThreadRole::Worker { url: session }
                } else {
                    ThreadRole::Other
                };
                plans.push((ranges.clone(), thread, role));
            }
        }
        for (ranges, thread, role) in plans {
            self.process_thread_events(arena, &ranges, thread, role)?;
        }
        Ok(())
    }

    /// Find the `TracingSessionIdForWorker` event naming `thread`, remember
    /// the worker id and return the worker's url.
    fn worker_session(
        &mut self,
        store: &EventStore,
        thread: ThreadId,
        pid: Option<Pid>,
        same_session: impl Fn(&Event) -> bool,
    ) -> Option<String> {
        let tid = store.thread(thread).tid.0;
        let found = store.devtools_metadata_events().iter().map(|&id| store.event(id)).find(|event| {
            if event.name != TRACING_SESSION_ID_FOR_WORKER {
                return false;
            }
            if pid.is_some_and(|pid| store.thread(event.thread).pid != pid) {
                return false;
            }
            let worker_tid = event.data().and_then(|data| data.get("workerThreadId")).and_then(Value::as_i64);
            if worker_tid != Some(tid) {
                return false;
            }
            same_session(event) || self.frames.contains(event_frame_id(event))
        })?;
        let worker_id = found.data_str("workerId").unwrap_or_default();
        self.worker_ids.insert(thread, worker_id.to_string());
        Some(found.data_str("url").unwrap_or_default().to_string())
    }

    /// Legacy traces: `TracingStartedInPage` events of the recording
    /// session split the trace into page ranges. Returns false when the
    /// trace has no such event.
    pub(super) fn process_legacy_metadata(&mut self, arena: &mut EventArena<'_>) -> Result<bool, ProfileError> {
        let store = arena.store();
        let mut pages: Vec<EventId> = Vec::new();
        for &id in store.devtools_metadata_events() {
            let event = store.event(id);
            match event.name.as_str() {
                TRACING_STARTED_IN_PAGE => {
                    pages.push(id);
                    let data = event.data();
                    if is_truthy_field(data, "persistentIds") {
                        self.persistent_ids = true;
                    }
                    let frames = data.and_then(|data| data.get("frames")).and_then(Value::as_array);
                    for payload in frames.into_iter().flatten().filter_map(Value::as_object) {
                        if self.frames.add_page_frame(event.start_time, payload).is_none() {
                            self.diagnostics
                                .record(Anomaly::OrphanFrame, payload.get("frame").unwrap_or(&Value::Null));
                        }
                    }
                    self.main_frame = self.frames.root_frames().next().and_then(|f| self.frames.index_of(&f.frame_id));
                }
                TRACING_STARTED_IN_BROWSER => {
                    if self.main_frame_node_id.is_some() {
                        warn!("Multiple sessions in trace");
                    }
                    self.main_frame_node_id = event.arg("frameTreeNodeId").and_then(Value::as_i64);
                }
                _ => {}
            }
        }
        let Some(&first_page) = pages.first() else {
            return Ok(false);
        };
        self.session_id = session_id(store.event(first_page));
        let mut page_events: Vec<EventId> = Vec::new();
        for id in pages {
            let session = session_id(store.event(id));
            if session == self.session_id {
                page_events.push(id);
            } else {
                self.diagnostics.record(
                    Anomaly::ForeignSession,
                    format_args!(
                        "recording started in more than one page: {} and {}",
                        self.session_id.as_deref().unwrap_or_default(),
                        session.as_deref().unwrap_or_default()
                    ),
                );
            }
        }
        page_events.sort_by(|&a, &b| Event::compare_start_time(store.event(a), store.event(b)));

        let mut start = 0.0;
        for (i, &page) in page_events.iter().enumerate() {
            let end = page_events
                .get(i + 1)
                .map_or(f64::INFINITY, |&next| store.event(next).start_time);
            if start == end {
                continue;
            }
            let page_event = store.event(page);
            self.legacy_current_page = page_event.data().and_then(|data| data.get("page")).cloned();
            let page_thread = page_event.thread;
            let session = self.session_id.clone();
            let process = store.thread(page_thread).pid;
            let Some(process) = store.process_by_pid(process) else {
                continue;
            };
            for thread in store.sorted_threads(process) {
                let name = store.thread(thread).name.as_str();
                let role = if is_worker_thread(name) {
                    let same_session = |event: &Event| {
                        session.is_some() && event.data_str("sessionId") == session.as_deref()
                    };
                    let Some(url) = self.worker_session(store, thread, None, same_session) else {
                        continue;
                    };
                    if url.is_empty() {
                        ThreadRole::Other
                    } else {
                        ThreadRole::Worker { url }
                    }
                } else if thread == page_thread {
                    ThreadRole::Main {
                        for_main_frame: true,
                        url: None,
                    }
                } else {
                    ThreadRole::Other
                };
                let range = [TimeRange { from: start, to: end }];
                self.process_thread_events(arena, &range, thread, role)?;
            }
            start = end;
        }
        Ok(true)
    }

    /// No page metadata: every thread over the whole trace, the browser
    /// main thread (or the first thread) standing in for the main thread.
    pub(super) fn process_generic_trace(&mut self, arena: &mut EventArena<'_>) -> Result<(), ProfileError> {
        let store = arena.store();
        let processes = store.sorted_processes();
        let main = store.browser_main_thread().or_else(|| {
            processes
                .first()
                .and_then(|process| store.sorted_threads(process).first().copied())
        });
        let threads: Vec<ThreadId> = processes
            .iter()
            .flat_map(|process| store.sorted_threads(process))
            .collect();
        debug!("Generic trace: classifying {} threads", threads.len());
        for thread in threads {
            let role = if Some(thread) == main {
                ThreadRole::Main {
                    for_main_frame: true,
                    url: None,
                }
            } else {
                ThreadRole::Other
            };
            self.process_thread_events(arena, &[TimeRange::ALL], thread, role)?;
        }
        Ok(())
    }

    /// `GPUTask` events of the GPU process main thread.
    pub(super) fn build_gpu_track(&mut self, store: &EventStore) {
        let Some(thread) = store.thread_by_name("GPU Process", "CrGpuMain") else {
            debug!("No GPU process main thread");
            return;
        };
        let gpu_task = RecordType::GpuTask.event_name().unwrap_or_default();
        let events: Vec<EventId> = store
            .thread(thread)
            .events()
            .iter()
            .copied()
            .filter(|&id| store.event(id).name == gpu_task)
            .collect();
        let index = self.ensure_named_track(TrackType::Gpu);
        let track = &mut self.tracks[index];
        track.thread = Some(thread);
        track.events = events;
    }

    /// Browser main thread events are read before any renderer thread.
    pub(super) fn process_sync_browser_events(&mut self, store: &EventStore) {
        let Some(browser_main) = store.browser_main_thread() else {
            return;
        };
        for &id in store.thread(browser_main).events() {
            self.process_browser_event(store.event(id));
        }
    }

    pub(super) fn process_async_browser_events(&mut self, store: &EventStore) {
        if let Some(browser_main) = store.browser_main_thread() {
            self.process_async_events(store, browser_main, &[TimeRange::ALL]);
        }
    }
}

/// `args.sessionId`, or `args.data.sessionId` in older page metadata.
fn session_id(event: &Event) -> Option<String> {
    let id = event
        .arg("sessionId")
        .or_else(|| event.data().and_then(|data| data.get("sessionId")));
    match id {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Null) | None => None,
        Some(other) => {
            error!("Unexpected session id {other}");
            Some(other.to_string())
        }
    }
}

fn is_truthy_field(data: Option<&serde_json::Map<String, Value>>, key: &str) -> bool {
    crate::store::is_truthy(data.and_then(|data| data.get(key)))
}

/// Stable union of two start-sorted async lists; ids already present are
/// kept once.
fn merge_async(store: &EventStore, left: &[AsyncEventId], right: &[AsyncEventId]) -> Vec<AsyncEventId> {
    let start = |id: AsyncEventId| store.async_event(id).start_time;
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        let (a, b) = (left[i], right[j]);
        if a == b {
            merged.push(a);
            i += 1;
            j += 1;
        } else if start(b) < start(a) {
            merged.push(b);
            j += 1;
        } else {
            merged.push(a);
            i += 1;
        }
    }
    merged.extend_from_slice(&left[i..]);
    merged.extend_from_slice(&right[j..]);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelOptions;
    use crate::diagnostics::ModelDiagnostics;
    use crate::trace_data::RawEvent;
    use serde_json::json;

    const CAT: &str = "devtools.timeline";

    fn store(raw: Vec<RawEvent>) -> EventStore {
        EventStore::from_raw(raw, &ModelOptions::lenient()).unwrap()
    }

    fn classifier(store: &EventStore, options: &ModelOptions) -> Classifier {
        Classifier::new(
            options,
            ModelDiagnostics::new(),
            store.minimum_record_time(),
            store.maximum_record_time(),
        )
    }

    #[test]
    fn test_self_time_and_tasks() {
        let store = store(vec![
            RawEvent::new("B", "Outer", CAT, 0.0),
            RawEvent::new("B", "Inner", CAT, 2000.0),
            RawEvent::new("E", "Inner", CAT, 7000.0),
            RawEvent::new("E", "Outer", CAT, 10_000.0),
        ]);
        let mut arena = EventArena::new(&store);
        let mut classifier = classifier(&store, &ModelOptions::lenient());
        let role = ThreadRole::Main {
            for_main_frame: true,
            url: None,
        };
        classifier
            .process_thread_events(&mut arena, &[TimeRange::ALL], ThreadId(0), role)
            .unwrap();
        let track = &classifier.tracks[0];
        assert_eq!(track.kind, TrackType::MainThread);
        assert_eq!(track.tasks.len(), 1);
        let outer = track.tasks[0];
        let inner = track.events[1];
        assert_eq!(classifier.annotations.get(outer).unwrap().self_time, 5.0);
        assert_eq!(classifier.annotations.get(inner).unwrap().self_time, 5.0);
    }

    #[test]
    fn test_negative_self_time_clamped_and_kept() {
        // A child overrunning its parent, as clock skew produces
        let store = store(vec![
            RawEvent::new("X", "Parent", CAT, 0.0).with_dur(5000.0),
            RawEvent::new("X", "Child", CAT, 1000.0).with_dur(3000.0),
            RawEvent::new("X", "Child", CAT, 4000.0).with_dur(3000.0),
        ]);
        let mut arena = EventArena::new(&store);
        let mut classifier = classifier(&store, &ModelOptions::lenient());
        classifier
            .process_thread_events(&mut arena, &[TimeRange::ALL], ThreadId(0), ThreadRole::Other)
            .unwrap();
        let parent = classifier.annotations.get(EventId(0)).unwrap();
        assert_eq!(parent.self_time, 0.0);
        assert_eq!(parent.raw_self_time, Some(-1.0));
        assert_eq!(classifier.diagnostics.count(Anomaly::NegativeSelfTime), 1);
    }

    #[test]
    fn test_ranges_limit_processed_events() {
        let store = store(vec![
            RawEvent::new("X", "RunTask", CAT, 0.0).with_dur(1000.0),
            RawEvent::new("X", "RunTask", CAT, 5000.0).with_dur(1000.0),
            RawEvent::new("X", "RunTask", CAT, 9000.0).with_dur(1000.0),
        ]);
        let mut arena = EventArena::new(&store);
        let mut classifier = classifier(&store, &ModelOptions::lenient());
        let range = [TimeRange { from: 4.0, to: 8.0 }];
        classifier
            .process_thread_events(&mut arena, &range, ThreadId(0), ThreadRole::Other)
            .unwrap();
        assert_eq!(classifier.tracks[0].events, vec![EventId(1)]);
    }

    #[test]
    fn test_generic_trace_first_thread_is_main() {
        let store = store(vec![
            RawEvent::new("M", "thread_name", "__metadata", 0.0)
                .with_args(json!({"name": "CompositorTileWorker1"})),
            RawEvent::new("X", "RasterTask", CAT, 0.0).with_dur(1000.0),
        ]);
        let mut arena = EventArena::new(&store);
        let mut classifier = classifier(&store, &ModelOptions::lenient());
        classifier.process_generic_trace(&mut arena).unwrap();
        assert_eq!(classifier.tracks.len(), 1);
        assert_eq!(classifier.tracks[0].kind, TrackType::MainThread);
        assert_eq!(classifier.tracks[0].name, "CompositorTileWorker1");
    }

    #[test]
    fn test_async_groups_go_to_named_tracks() {
        let store = store(vec![
            RawEvent::new("b", "measure", USER_TIMING_CATEGORY, 1000.0).with_id("1"),
            RawEvent::new("e", "measure", USER_TIMING_CATEGORY, 2000.0).with_id("1"),
            RawEvent::new("S", "console.time", CONSOLE_CATEGORY, 1500.0).with_id("2"),
            RawEvent::new("F", "console.time", CONSOLE_CATEGORY, 2500.0).with_id("2"),
            RawEvent::new("b", "Animation", "blink.animations", 3000.0).with_id("3"),
            RawEvent::new("e", "Animation", "blink.animations", 4000.0).with_id("3"),
        ]);
        let mut classifier = classifier(&store, &ModelOptions::lenient());
        classifier.process_async_events(&store, ThreadId(0), &[TimeRange::ALL]);
        let kinds: Vec<TrackType> = classifier.tracks.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TrackType::Timings, TrackType::Console, TrackType::Animation]);
        assert!(classifier.tracks.iter().all(|t| t.async_events.len() == 1));
    }

    #[test]
    fn test_latency_kept_only_when_flow_known() {
        let latency = |id: &str, ts: f64| {
            vec![
                RawEvent::new("S", "InputLatency::MouseDown", LATENCY_INFO_CATEGORY, ts).with_id(id),
                RawEvent::new("F", "InputLatency::MouseDown", LATENCY_INFO_CATEGORY, ts + 1000.0)
                    .with_id(id)
                    .with_args(json!({"data": {"INPUT_EVENT_LATENCY_RENDERER_MAIN_COMPONENT": {"time": ts + 400.0}}})),
            ]
        };
        let mut raw = latency("0x1", 1000.0);
        raw.extend(latency("0x2", 5000.0));
        let store = store(raw);
        let mut classifier = classifier(&store, &ModelOptions::lenient());
        classifier.known_input_events.insert("0x1".to_string());
        classifier.process_async_events(&store, ThreadId(0), &[TimeRange::ALL]);
        let input = &classifier.tracks[0];
        assert_eq!(input.kind, TrackType::Input);
        assert_eq!(input.async_events.len(), 1);
        let begin = store.async_event(input.async_events[0]).steps[0];
        let waited = classifier.annotations.get(begin).unwrap().time_waiting_for_main_thread;
        assert!((waited.unwrap() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_broken_profile_skipped_when_lenient() {
        let raw = vec![
            RawEvent::new("X", "RunTask", CAT, 0.0).with_dur(1000.0),
            RawEvent::new("I", "CpuProfile", CAT, 2000.0)
                .with_args(json!({"data": {"cpuProfile": {"nodes": [], "startTime": 0, "endTime": 10}}})),
        ];
        let store = store(raw);

        let mut arena = EventArena::new(&store);
        let mut lenient = classifier(&store, &ModelOptions::lenient());
        lenient
            .process_thread_events(&mut arena, &[TimeRange::ALL], ThreadId(0), ThreadRole::Other)
            .unwrap();
        assert_eq!(lenient.diagnostics.count(Anomaly::InvalidProfile), 1);
        assert!(lenient.cpu_profiles.is_empty());

        let mut arena = EventArena::new(&store);
        let mut strict = classifier(&store, &ModelOptions::default());
        let err = strict
            .process_thread_events(&mut arena, &[TimeRange::ALL], ThreadId(0), ThreadRole::Other)
            .unwrap_err();
        assert!(matches!(err, ProfileError::EmptyProfile));
    }
}
