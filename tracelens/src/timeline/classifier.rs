//! Per-event classification state machine.
//!
//! [`Classifier`] is the reconstruction context of one load: every side
//! table the classification fills (annotations, invalidations, initiators,
//! frames, tracks) lives here and nowhere else. Thread-level driving is in
//! `threads.rs`; this file holds the per-event rules.

use super::annotations::{Annotations, ScriptLocation};
use super::arena::{event_frame_id, json_key, EventArena, EventSource};
use super::async_tracker::AsyncEventTracker;
use super::invalidation::InvalidationTracker;
use super::page_frame::{FrameIndex, FrameTree};
use super::record_type::{
    RecordType, WarningType, FRAME_COMMITTED_IN_BROWSER, FRAME_DELETED_IN_BROWSER,
    PROCESS_READY_IN_BROWSER, TRACING_STARTED_IN_BROWSER,
};
use super::track::{Track, TrackType};
use crate::config::ModelOptions;
use crate::diagnostics::{Anomaly, ModelDiagnostics};
use crate::domain::{EventId, ThreadId};
use crate::profile::{CallFrame, CpuProfileModel};
use crate::store::{is_truthy, Event, DEVTOOLS_TIMELINE_CATEGORY};
use log::debug;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

pub struct Classifier {
    pub(super) options: ModelOptions,
    pub(super) diagnostics: ModelDiagnostics,
    pub(super) annotations: Annotations,
    pub(super) invalidations: InvalidationTracker,
    async_tracker: AsyncEventTracker,
    pub(super) frames: FrameTree,
    pub(super) main_frame: Option<FrameIndex>,
    pub(super) tracks: Vec<Track>,
    named_tracks: HashMap<TrackType, usize>,
    pub(super) time_markers: Vec<EventId>,
    pub(super) inspected_events: Vec<EventId>,
    pub(super) cpu_profiles: Vec<CpuProfileModel>,
    pub(super) worker_ids: HashMap<ThreadId, String>,
    pub(super) minimum_record_time: f64,
    pub(super) maximum_record_time: f64,

    // Trace-wide metadata state
    pub(super) browser_frame_tracking: bool,
    pub(super) persistent_ids: bool,
    pub(super) main_frame_node_id: Option<i64>,
    pub(super) known_input_events: HashSet<String>,
    pub(super) session_id: Option<String>,
    pub(super) legacy_current_page: Option<Value>,
    main_frame_layer_tree_id: Option<Value>,

    // Cross-thread link tables
    last_schedule_style_recalc: HashMap<String, EventId>,
    last_recalculate_styles: Option<EventId>,
    layout_invalidate: HashMap<String, Option<EventId>>,
    last_paint_for_layer: HashMap<String, EventId>,
    paint_image_by_pixel_ref: HashMap<String, EventId>,

    // Per-thread nesting state
    pub(super) event_stack: Vec<EventId>,
    current_script: Option<EventId>,
    task_layout_and_recalc: Vec<EventId>,
}

impl Classifier {
    #[must_use]
    pub fn new(options: &ModelOptions, diagnostics: ModelDiagnostics, minimum: f64, maximum: f64) -> Self {
        Self {
            options: options.clone(),
            diagnostics,
            annotations: Annotations::new(),
            invalidations: InvalidationTracker::new(),
            async_tracker: AsyncEventTracker::new(),
            frames: FrameTree::new(),
            main_frame: None,
            tracks: Vec::new(),
            named_tracks: HashMap::new(),
            time_markers: Vec::new(),
            inspected_events: Vec::new(),
            cpu_profiles: Vec::new(),
            worker_ids: HashMap::new(),
            minimum_record_time: minimum,
            maximum_record_time: maximum,
            browser_frame_tracking: false,
            persistent_ids: false,
            main_frame_node_id: None,
            known_input_events: HashSet::new(),
            session_id: None,
            legacy_current_page: None,
            main_frame_layer_tree_id: None,
            last_schedule_style_recalc: HashMap::new(),
            last_recalculate_styles: None,
            layout_invalidate: HashMap::new(),
            last_paint_for_layer: HashMap::new(),
            paint_image_by_pixel_ref: HashMap::new(),
            event_stack: Vec::new(),
            current_script: None,
            task_layout_and_recalc: Vec::new(),
        }
    }

    pub(super) fn ensure_named_track(&mut self, kind: TrackType) -> usize {
        if let Some(&index) = self.named_tracks.get(&kind) {
            return index;
        }
        let index = self.tracks.len();
        self.tracks.push(Track::new(kind));
        self.named_tracks.insert(kind, index);
        index
    }

    /// Reset the nesting state before a new thread, flushing what the
    /// previous thread left pending.
    pub(super) fn start_thread(&mut self, arena: &EventArena<'_>) {
        self.flush_forced_layouts(arena);
        self.event_stack.clear();
        self.current_script = None;
    }

    /// Tag the layout/style work of the finished task as forced when it adds
    /// up past the threshold.
    pub(super) fn flush_forced_layouts(&mut self, arena: &EventArena<'_>) {
        let pending = std::mem::take(&mut self.task_layout_and_recalc);
        let total: f64 = pending.iter().map(|&id| arena.event(id).duration()).sum();
        if total <= self.options.thresholds.forced_layout {
            return;
        }
        for id in pending {
            let warning = if arena.event(id).name == "Layout" {
                WarningType::ForcedLayout
            } else {
                WarningType::ForcedStyle
            };
            self.annotations.get_mut(id).warning = Some(warning);
        }
    }

    fn find_ancestor(&self, arena: &EventArena<'_>, kind: RecordType) -> Option<EventId> {
        let name = kind.event_name()?;
        self.event_stack
            .iter()
            .rev()
            .copied()
            .find(|&id| arena.event(id).name == name)
    }

    fn main_frame_id(&self) -> Option<&str> {
        self.main_frame.map(|index| self.frames.frame(index).frame_id.as_str())
    }

    /// Navigation timing and `TimeStamp` markers.
    pub(super) fn is_marker_event(&self, event: &Event, kind: RecordType) -> bool {
        match kind {
            RecordType::TimeStamp => true,
            RecordType::MarkFirstPaint | RecordType::MarkFcp | RecordType::MarkFmp => {
                let Some(main_frame) = self.main_frame_id() else {
                    return false;
                };
                event.arg("frame").and_then(Value::as_str) == Some(main_frame)
                    && is_truthy(event.arg("data"))
            }
            RecordType::MarkDomContent | RecordType::MarkLoad => {
                is_truthy(event.data().and_then(|data| data.get("isMainFrame")))
            }
            _ => false,
        }
    }

    /// Classify one event of a thread being processed. Returns false when
    /// the event does not belong to the inspected page and must be skipped.
    #[allow(clippy::too_many_lines)]
    pub(super) fn process_event(&mut self, arena: &EventArena<'_>, id: EventId) -> bool {
        let event = arena.event(id);
        let kind = RecordType::from_name(&event.name);
        if self.event_stack.is_empty() {
            self.flush_forced_layouts(arena);
        }
        if let Some(script) = self.current_script {
            if arena.event(script).end_time.is_some_and(|end| event.start_time > end) {
                self.current_script = None;
            }
        }

        let empty = Map::new();
        let data = event.data_or_begin_data().unwrap_or(&empty);
        if let Some(trace) = data.get("stackTrace") {
            if let Ok(mut frames) = serde_json::from_value::<Vec<CallFrame>>(trace.clone()) {
                // Instrumentation stacks are 1-based
                if kind != RecordType::JsSample {
                    for frame in &mut frames {
                        frame.line_number -= 1;
                        frame.column_number -= 1;
                    }
                }
                self.annotations.get_mut(id).stack_trace = Some(frames);
            }
        }

        let mut frame_id = event_frame_id(event).to_string();
        if frame_id.is_empty() {
            if let Some(&parent) = self.event_stack.last() {
                frame_id = self.annotations.frame_id(parent).to_string();
            }
        }
        if frame_id.is_empty() {
            frame_id = self.main_frame_id().unwrap_or_default().to_string();
        }
        self.annotations.get_mut(id).frame_id = frame_id;

        let pid = arena.pid_of(event);
        self.async_tracker
            .process_event(id, event, kind, pid, &mut self.annotations);
        if self.is_marker_event(event, kind) {
            self.ensure_named_track(TrackType::Timings);
        }

        let thresholds = self.options.thresholds;
        let data_str = |key: &str| data.get(key).and_then(Value::as_str);
        match kind {
            RecordType::ResourceSendRequest | RecordType::WebSocketCreate => {
                self.annotations.set_initiator(id, self.event_stack.last().copied());
                self.annotations.get_mut(id).url = data_str("url").map(str::to_string);
            }
            RecordType::ScheduleStyleRecalculation => {
                let frame = data_str("frame").unwrap_or_default().to_string();
                self.last_schedule_style_recalc.insert(frame, id);
            }
            RecordType::UpdateLayoutTree | RecordType::RecalculateStyles => {
                self.invalidations
                    .did_recalc_style(id, event, &mut self.diagnostics);
                if let Some(begin) = event.begin_data() {
                    let frame = begin.get("frame").and_then(Value::as_str).unwrap_or_default();
                    let initiator = self.last_schedule_style_recalc.get(frame).copied();
                    self.annotations.set_initiator(id, initiator);
                }
                self.last_recalculate_styles = Some(id);
                if self.current_script.is_some() {
                    self.task_layout_and_recalc.push(id);
                }
            }
            RecordType::ScheduleStyleInvalidationTracking
            | RecordType::StyleRecalcInvalidationTracking
            | RecordType::StyleInvalidatorInvalidationTracking
            | RecordType::LayoutInvalidationTracking => {
                self.invalidations
                    .add_invalidation(id, event, &mut self.diagnostics);
            }
            RecordType::InvalidateLayout => {
                // A running style recalc is the cause unless layout was
                // already invalidated for this frame
                let frame = data_str("frame").unwrap_or_default().to_string();
                let mut initiator = Some(id);
                let already_invalid = self.layout_invalidate.get(&frame).is_some_and(Option::is_some);
                if !already_invalid {
                    if let Some(recalc) = self.last_recalculate_styles {
                        if arena.event(recalc).end_time.is_some_and(|end| end > event.start_time) {
                            initiator = self.annotations.initiator(recalc);
                        }
                    }
                }
                self.layout_invalidate.insert(frame, initiator);
            }
            RecordType::Layout => {
                self.invalidations.did_layout(id, event);
                let Some(begin) = event.begin_data() else {
                    return true;
                };
                let frame = begin.get("frame").and_then(Value::as_str).unwrap_or_default().to_string();
                let initiator = self.layout_invalidate.get(&frame).copied().flatten();
                self.annotations.set_initiator(id, initiator);
                // Without a closing Layout there is no endData
                if let Some(root) = event.end_data().and_then(|d| d.get("rootNode")).and_then(Value::as_i64) {
                    self.annotations.get_mut(id).backend_node_id = Some(root);
                }
                self.layout_invalidate.insert(frame, None);
                if self.current_script.is_some() {
                    self.task_layout_and_recalc.push(id);
                }
            }
            RecordType::Task => {
                if event.duration() > thresholds.long_task {
                    self.annotations.get_mut(id).warning = Some(WarningType::LongTask);
                }
            }
            RecordType::EventDispatch => {
                if event.duration() > thresholds.recurring_handler {
                    self.annotations.get_mut(id).warning = Some(WarningType::LongHandler);
                }
            }
            RecordType::TimerFire | RecordType::FireAnimationFrame => {
                if event.duration() > thresholds.recurring_handler {
                    self.annotations.get_mut(id).warning = Some(WarningType::LongRecurringHandler);
                }
            }
            RecordType::FunctionCall | RecordType::EvaluateScript | RecordType::CompileScript => {
                self.annotations.get_mut(id).script_location = Some(script_location(kind, data));
                self.current_script.get_or_insert(id);
            }
            // Microtasks count as script for forced layout detection
            RecordType::RunMicrotasks => {
                self.current_script.get_or_insert(id);
            }
            RecordType::SetLayerTreeId => {
                // Old traces name the session instead of the frame
                let session = data_str("sessionId");
                if self.session_id.is_some() && session.is_some() && self.session_id.as_deref() == session {
                    self.main_frame_layer_tree_id = data.get("layerTreeId").cloned();
                    return true;
                }
                // Only the main frame's layer tree is followed
                let is_root = self.frames.get(event_frame_id(event)).is_some_and(|f| f.is_root());
                if !is_root {
                    return false;
                }
                self.main_frame_layer_tree_id = data.get("layerTreeId").cloned();
            }
            RecordType::Paint => {
                self.invalidations.did_paint();
                self.annotations.get_mut(id).backend_node_id = data.get("nodeId").and_then(Value::as_i64);
                // Subframes painted into their parent's layer carry no layer id
                if let Some(layer) = json_key(data.get("layerId")) {
                    self.last_paint_for_layer.insert(layer, id);
                }
            }
            RecordType::DisplayItemListSnapshot | RecordType::PictureSnapshot => {
                let Some(update) = self.find_ancestor(arena, RecordType::UpdateLayer) else {
                    return true;
                };
                let update = arena.event(update);
                let tree = update.arg("layerTreeId");
                if tree.is_none() || tree != self.main_frame_layer_tree_id.as_ref() {
                    return true;
                }
                let paint = json_key(update.arg("layerId")).and_then(|layer| self.last_paint_for_layer.get(&layer).copied());
                if let Some(paint) = paint {
                    self.annotations.get_mut(paint).picture = Some(id);
                }
            }
            RecordType::ScrollLayer => {
                self.annotations.get_mut(id).backend_node_id = data.get("nodeId").and_then(Value::as_i64);
            }
            RecordType::PaintImage => {
                let annotation = self.annotations.get_mut(id);
                annotation.backend_node_id = data.get("nodeId").and_then(Value::as_i64);
                annotation.url = data_str("url").map(str::to_string);
            }
            RecordType::DecodeImage | RecordType::ResizeImage => {
                let paint_image = self.find_ancestor(arena, RecordType::PaintImage).or_else(|| {
                    let decode = self.find_ancestor(arena, RecordType::DecodeLazyPixelRef)?;
                    let pixel_ref = json_key(arena.event(decode).arg("LazyPixelRef"))?;
                    self.paint_image_by_pixel_ref.get(&pixel_ref).copied()
                });
                if let Some(paint_image) = paint_image {
                    self.copy_image_source(paint_image, id);
                }
            }
            RecordType::DrawLazyPixelRef => {
                let Some(paint_image) = self.find_ancestor(arena, RecordType::PaintImage) else {
                    return true;
                };
                if let Some(pixel_ref) = json_key(event.arg("LazyPixelRef")) {
                    self.paint_image_by_pixel_ref.insert(pixel_ref, paint_image);
                }
                self.copy_image_source(paint_image, id);
            }
            RecordType::FrameStartedLoading => {
                let frame = event.arg("frame").and_then(Value::as_str);
                if frame != Some(self.annotations.frame_id(id)) {
                    return false;
                }
            }
            RecordType::MarkDomContent | RecordType::MarkLoad => {
                if !self.frames.contains(event_frame_id(event)) {
                    return false;
                }
            }
            RecordType::CommitLoad => return self.commit_load(event, data),
            RecordType::FireIdleCallback => {
                let allotted = data.get("allottedMilliseconds").and_then(Value::as_f64);
                if allotted.is_some_and(|allotted| event.duration() > allotted + thresholds.idle_callback_addon) {
                    self.annotations.get_mut(id).warning = Some(WarningType::IdleDeadlineExceeded);
                }
            }
            _ => {}
        }
        true
    }

    fn copy_image_source(&mut self, from: EventId, to: EventId) {
        let (node, url) = self
            .annotations
            .get(from)
            .map(|a| (a.backend_node_id, a.url.clone()))
            .unwrap_or_default();
        let annotation = self.annotations.get_mut(to);
        annotation.backend_node_id = node;
        annotation.url = url;
    }

    /// Frame navigation in traces without browser-side frame tracking.
    fn commit_load(&mut self, event: &Event, data: &Map<String, Value>) -> bool {
        if self.browser_frame_tracking {
            return true;
        }
        let frame_id = event_frame_id(event);
        let is_main_frame = is_truthy(data.get("isMainFrame"));
        if let Some(frame) = self.frames.get_mut(frame_id) {
            frame.update(event.start_time, data);
        } else if !self.persistent_ids {
            let page = data.get("page");
            if is_truthy(page) && page != self.legacy_current_page.as_ref() {
                return false;
            }
        } else if is_main_frame || self.frames.add_page_frame(event.start_time, data).is_none() {
            return false;
        }
        if is_main_frame {
            self.main_frame = self.frames.index_of(frame_id);
        }
        true
    }

    /// Browser main thread events: input flow ids and the frame lifecycle.
    pub(super) fn process_browser_event(&mut self, event: &Event) {
        if RecordType::from_name(&event.name) == RecordType::LatencyInfoFlow {
            let frame_node = event.arg("frameTreeNodeId").and_then(Value::as_i64);
            if frame_node.is_some() && frame_node == self.main_frame_node_id {
                if let Some(bind_id) = &event.bind_id {
                    self.known_input_events.insert(bind_id.clone());
                }
            }
            return;
        }
        if !event.has_category(DEVTOOLS_TIMELINE_CATEGORY) {
            return;
        }
        let Some(data) = event.data() else {
            return;
        };
        match event.name.as_str() {
            TRACING_STARTED_IN_BROWSER => {
                if !is_truthy(data.get("persistentIds")) {
                    return;
                }
                self.browser_frame_tracking = true;
                self.main_frame_node_id = data.get("frameTreeNodeId").and_then(Value::as_i64);
                let frames = data.get("frames").and_then(Value::as_array);
                for payload in frames.into_iter().flatten().filter_map(Value::as_object) {
                    self.add_browser_frame(payload);
                }
            }
            FRAME_COMMITTED_IN_BROWSER if self.browser_frame_tracking => {
                let frame_id = data.get("frame").and_then(Value::as_str).unwrap_or_default();
                let index = match self.frames.index_of(frame_id) {
                    Some(index) => index,
                    None => {
                        let parent = data
                            .get("parent")
                            .and_then(Value::as_str)
                            .and_then(|parent| self.frames.index_of(parent));
                        let Some(parent) = parent else {
                            self.diagnostics.record(Anomaly::OrphanFrame, frame_id);
                            return;
                        };
                        self.frames.insert(data, Some(parent))
                    }
                };
                self.frames.frame_mut(index).update(event.start_time, data);
            }
            PROCESS_READY_IN_BROWSER if self.browser_frame_tracking => {
                let frame_id = data.get("frame").and_then(Value::as_str).unwrap_or_default();
                let pseudo_id = data.get("processPseudoId").and_then(Value::as_str).unwrap_or_default();
                let process_id = data.get("processId").and_then(Value::as_i64).unwrap_or(-1);
                if let Some(frame) = self.frames.get_mut(frame_id) {
                    frame.process_ready(pseudo_id, process_id);
                }
            }
            FRAME_DELETED_IN_BROWSER if self.browser_frame_tracking => {
                let frame_id = data.get("frame").and_then(Value::as_str).unwrap_or_default();
                if let Some(frame) = self.frames.get_mut(frame_id) {
                    frame.deleted_time = Some(event.start_time);
                }
            }
            _ => {}
        }
    }

    /// A frame listed when tracing started. Its hosting period starts at the
    /// trace's first activity since processes start tracing at slightly
    /// different times.
    fn add_browser_frame(&mut self, payload: &Map<String, Value>) {
        let parent_id = payload.get("parent").and_then(Value::as_str).filter(|p| !p.is_empty());
        let parent = parent_id.and_then(|p| self.frames.index_of(p));
        if parent_id.is_some() && parent.is_none() {
            self.diagnostics
                .record(Anomaly::OrphanFrame, payload.get("frame").unwrap_or(&Value::Null));
            return;
        }
        let frame_id = payload.get("frame").and_then(Value::as_str).unwrap_or_default();
        let index = match self.frames.index_of(frame_id) {
            Some(index) => index,
            None => {
                let index = self.frames.insert(payload, parent);
                if parent.is_none() {
                    self.main_frame = Some(index);
                }
                index
            }
        };
        let time = self.minimum_record_time;
        self.frames.frame_mut(index).update(time, payload);
        debug!("Frame {frame_id} tracked from browser metadata");
    }
}

/// Script position with the legacy `scriptName`/`scriptLine` fields folded
/// in, converted to 0-based numbers.
fn script_location(kind: RecordType, data: &Map<String, Value>) -> ScriptLocation {
    let mut url = data.get("url").and_then(Value::as_str).map(str::to_string);
    let mut line_number = data.get("lineNumber").and_then(Value::as_i64);
    if kind == RecordType::FunctionCall {
        if let Some(name) = data.get("scriptName").and_then(Value::as_str) {
            url = Some(name.to_string());
        }
        if let Some(line) = data.get("scriptLine").and_then(Value::as_i64) {
            line_number = Some(line);
        }
    }
    ScriptLocation {
        url,
        line_number: line_number.map(|line| line - 1),
        column_number: data.get("columnNumber").and_then(Value::as_i64).map(|column| column - 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{EventStore, Phase};
    use crate::trace_data::RawEvent;
    use serde_json::json;

    const CAT: &str = "devtools.timeline";

    fn store(raw: Vec<RawEvent>) -> EventStore {
        EventStore::from_raw(raw, &ModelOptions::lenient()).unwrap()
    }

    fn classifier(store: &EventStore) -> Classifier {
        Classifier::new(
            &ModelOptions::default(),
            ModelDiagnostics::new(),
            store.minimum_record_time(),
            store.maximum_record_time(),
        )
    }

    /// Run `process_event` over thread 0 with a plain nesting stack.
    fn run(classifier: &mut Classifier, arena: &EventArena<'_>) -> Vec<EventId> {
        let mut kept = Vec::new();
        for &id in arena.store().thread(ThreadId(0)).events() {
            let start = arena.event(id).start_time;
            while classifier
                .event_stack
                .last()
                .is_some_and(|&top| arena.event(top).end_or_start() <= start)
            {
                classifier.event_stack.pop();
            }
            if !classifier.process_event(arena, id) {
                continue;
            }
            if arena.event(id).duration() > 0.0 {
                classifier.event_stack.push(id);
            }
            kept.push(id);
        }
        kept
    }

    #[test]
    fn test_long_task_and_handler_warnings() {
        let store = store(vec![
            RawEvent::new("X", "RunTask", CAT, 0.0).with_dur(250_000.0),
            RawEvent::new("X", "EventDispatch", CAT, 1000.0).with_dur(60_000.0),
            RawEvent::new("X", "RunTask", CAT, 300_000.0).with_dur(10_000.0),
        ]);
        let arena = EventArena::new(&store);
        let mut classifier = classifier(&store);
        run(&mut classifier, &arena);
        assert_eq!(classifier.annotations.warning(EventId(0)), Some(WarningType::LongTask));
        assert_eq!(classifier.annotations.warning(EventId(1)), Some(WarningType::LongHandler));
        assert_eq!(classifier.annotations.warning(EventId(2)), None);
    }

    #[test]
    fn test_forced_layout_under_script() {
        let store = store(vec![
            RawEvent::new("X", "RunTask", CAT, 0.0).with_dur(100_000.0),
            RawEvent::new("X", "FunctionCall", CAT, 1000.0).with_dur(90_000.0),
            RawEvent::new("X", "Layout", CAT, 2000.0)
                .with_dur(20_000.0)
                .with_args(json!({"beginData": {"frame": "F"}})),
            RawEvent::new("X", "UpdateLayoutTree", CAT, 30_000.0)
                .with_dur(15_000.0)
                .with_args(json!({"beginData": {"frame": "F"}})),
            RawEvent::new("X", "RunTask", CAT, 200_000.0).with_dur(1000.0),
        ]);
        let arena = EventArena::new(&store);
        let mut classifier = classifier(&store);
        run(&mut classifier, &arena);
        assert_eq!(classifier.annotations.warning(EventId(2)), Some(WarningType::ForcedLayout));
        assert_eq!(classifier.annotations.warning(EventId(3)), Some(WarningType::ForcedStyle));
    }

    #[test]
    fn test_send_request_initiates_response() {
        let store = store(vec![
            RawEvent::new("I", "ResourceSendRequest", CAT, 1000.0)
                .with_args(json!({"data": {"requestId": "r1", "url": "https://a/x.js"}})),
            RawEvent::new("I", "ResourceReceiveResponse", CAT, 5000.0)
                .with_args(json!({"data": {"requestId": "r1"}})),
        ]);
        let arena = EventArena::new(&store);
        let mut classifier = classifier(&store);
        run(&mut classifier, &arena);
        assert_eq!(classifier.annotations.initiator(EventId(1)), Some(EventId(0)));
        let response = classifier.annotations.get(EventId(1)).unwrap();
        assert_eq!(response.url.as_deref(), Some("https://a/x.js"));
    }

    #[test]
    fn test_stack_trace_made_zero_based() {
        let store = store(vec![RawEvent::new("I", "TimerInstall", CAT, 1000.0).with_args(json!({
            "data": {"timerId": 1, "stackTrace": [{"functionName": "f", "scriptId": "3", "url": "a.js", "lineNumber": 10, "columnNumber": 4}]}
        }))]);
        let arena = EventArena::new(&store);
        let mut classifier = classifier(&store);
        run(&mut classifier, &arena);
        let trace = classifier.annotations.get(EventId(0)).unwrap().stack_trace.clone().unwrap();
        assert_eq!((trace[0].line_number, trace[0].column_number), (9, 3));
    }

    #[test]
    fn test_decode_image_inherits_from_lazy_pixel_ref() {
        let store = store(vec![
            RawEvent::new("X", "PaintImage", CAT, 0.0)
                .with_dur(5000.0)
                .with_args(json!({"data": {"nodeId": 12, "url": "https://a/img.png"}})),
            RawEvent::new("X", "Draw LazyPixelRef", CAT, 1000.0)
                .with_dur(1000.0)
                .with_args(json!({"LazyPixelRef": 77})),
            RawEvent::new("X", "Decode LazyPixelRef", CAT, 10_000.0)
                .with_dur(5000.0)
                .with_args(json!({"LazyPixelRef": 77})),
            RawEvent::new("X", "Decode Image", CAT, 11_000.0).with_dur(2000.0),
        ]);
        let arena = EventArena::new(&store);
        let mut classifier = classifier(&store);
        run(&mut classifier, &arena);
        let decode = classifier.annotations.get(EventId(3)).unwrap();
        assert_eq!(decode.backend_node_id, Some(12));
        assert_eq!(decode.url.as_deref(), Some("https://a/img.png"));
    }

    #[test]
    fn test_browser_frames_tracked() {
        let browser = DEVTOOLS_TIMELINE_CATEGORY;
        let store = store(vec![
            RawEvent::new("I", "TracingStartedInBrowser", browser, 1000.0).with_args(json!({"data": {
                "persistentIds": true, "frameTreeNodeId": 5,
                "frames": [
                    {"frame": "main", "url": "https://a", "processId": 10},
                    {"frame": "child", "parent": "main", "processId": 11},
                    {"frame": "lost", "parent": "nowhere", "processId": 12}
                ]
            }})),
            RawEvent::new("I", "FrameDeletedInBrowser", browser, 9000.0)
                .with_args(json!({"data": {"frame": "child"}})),
        ]);
        let mut classifier = classifier(&store);
        for event in store.events() {
            classifier.process_browser_event(event);
        }
        assert!(classifier.browser_frame_tracking);
        assert_eq!(classifier.main_frame_node_id, Some(5));
        assert_eq!(classifier.main_frame_id(), Some("main"));
        let child = classifier.frames.get("child").unwrap();
        assert_eq!(child.deleted_time, Some(9.0));
        assert_eq!(child.processes[0].process_id, 11);
        assert!(!classifier.frames.contains("lost"));
        assert_eq!(classifier.diagnostics.count(Anomaly::OrphanFrame), 1);
    }

    #[test]
    fn test_latency_flow_of_main_frame_known() {
        let mut flow = Event::new("latencyInfo", "LatencyInfo.Flow", Phase::Instant, 1.0, ThreadId(0));
        flow.add_args(json!({"frameTreeNodeId": 5}).as_object().unwrap().clone());
        flow.bind_id = Some("0x9".to_string());
        let store = store(Vec::new());
        let mut classifier = classifier(&store);
        classifier.main_frame_node_id = Some(5);
        classifier.process_browser_event(&flow);
        assert!(classifier.known_input_events.contains("0x9"));
    }
}
