//! Rendering frames recovered from compositor and main thread events.
//!
//! The compositor's `BeginFrame`/`DrawFrame` events of the inspected layer
//! tree delimit frames; main thread work that requests a new frame is held
//! as pending until `CompositeLayers` commits it and the layer tree is
//! activated. Frames are contiguous: each one ends where the next starts.

use super::arena::EventSource;
use super::record_type::RecordType;
use crate::domain::{EventId, ThreadId};
use crate::store::{is_truthy, Event};
use log::warn;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineFrame {
    pub start_time: f64,
    /// Start relative to the first event seen
    pub start_time_offset: f64,
    pub end_time: f64,
    pub duration: f64,
    /// Nothing was drawn; the compositor was waiting for a begin frame
    pub idle: bool,
    pub main_frame_id: Option<i64>,
}

impl TimelineFrame {
    fn new(start_time: f64, start_time_offset: f64) -> Self {
        Self {
            start_time,
            start_time_offset,
            end_time: start_time,
            duration: 0.0,
            idle: false,
            main_frame_id: None,
        }
    }

    /// Frames per second this frame's duration corresponds to
    #[must_use]
    pub fn fps(&self) -> f64 {
        1000.0 / self.duration
    }
}

/// Main thread work waiting to be committed to a frame
#[derive(Debug, Clone, Copy)]
struct PendingFrame {
    trigger_time: f64,
    main_frame_id: Option<i64>,
}

#[derive(Debug, Default)]
pub struct FrameModel {
    frames: Vec<TimelineFrame>,
    minimum_record_time: f64,
    last_frame: Option<TimelineFrame>,
    main_frame_committed: bool,
    main_frame_requested: bool,
    frame_pending_commit: Option<PendingFrame>,
    frame_pending_activation: Option<PendingFrame>,
    last_begin_frame: Option<f64>,
    last_needs_begin_frame: Option<f64>,
    last_task_begin_time: Option<f64>,
    layer_tree_id: Option<Value>,
    current_main_thread: Option<ThreadId>,
}

impl FrameModel {
    #[must_use]
    pub fn new() -> Self {
        Self {
            minimum_record_time: f64::INFINITY,
            ..Self::default()
        }
    }

    /// Feed start-sorted events. `main_threads` lists each main thread with
    /// the time its first event starts; events at or after that time are
    /// matched against that thread.
    pub fn add_trace_events<S: EventSource + ?Sized>(
        &mut self,
        source: &S,
        events: &[EventId],
        main_threads: &[(ThreadId, f64)],
    ) {
        let mut next = 0;
        self.current_main_thread = main_threads.first().map(|&(thread, _)| thread);
        for &id in events {
            let event = source.event(id);
            while next + 1 < main_threads.len() && main_threads[next + 1].1 <= event.start_time {
                next += 1;
                self.current_main_thread = Some(main_threads[next].0);
            }
            self.add_trace_event(event);
        }
        self.current_main_thread = None;
    }

    /// Completed frames overlapping `[start, end)`, all of them when no
    /// bound is given.
    #[must_use]
    pub fn frames(&self, start: Option<f64>, end: Option<f64>) -> &[TimelineFrame] {
        if start.is_none() && end.is_none() {
            return &self.frames;
        }
        let start = start.unwrap_or(0.0);
        let end = end.unwrap_or(f64::INFINITY);
        let first = self.frames.partition_point(|frame| frame.end_time < start);
        let last = self.frames.partition_point(|frame| frame.start_time < end);
        &self.frames[first..last.max(first)]
    }

    fn add_trace_event(&mut self, event: &Event) {
        if event.start_time != 0.0 && event.start_time < self.minimum_record_time {
            self.minimum_record_time = event.start_time;
        }
        let kind = RecordType::from_name(&event.name);
        if kind == RecordType::SetLayerTreeId {
            self.layer_tree_id = event
                .arg("layerTreeId")
                .or_else(|| event.data().and_then(|data| data.get("layerTreeId")))
                .filter(|id| is_truthy(Some(*id)))
                .cloned();
            return;
        }
        if kind == RecordType::LayerTreeHostImplSnapshot {
            return;
        }
        self.process_compositor_event(event, kind);
        if self.current_main_thread == Some(event.thread) {
            self.add_main_thread_event(event, kind);
        }
    }

    fn on_layer_tree(&self, event: &Event) -> bool {
        self.layer_tree_id.is_some() && event.arg("layerTreeId") == self.layer_tree_id.as_ref()
    }

    fn process_compositor_event(&mut self, event: &Event, kind: RecordType) {
        if !self.on_layer_tree(event) {
            return;
        }
        let timestamp = event.start_time;
        match kind {
            RecordType::BeginFrame => self.handle_begin_frame(timestamp),
            RecordType::DrawFrame => self.handle_draw_frame(timestamp),
            RecordType::ActivateLayerTree => self.handle_activate_layer_tree(),
            RecordType::RequestMainThreadFrame => {
                if self.last_frame.is_some() {
                    self.main_frame_requested = true;
                }
            }
            RecordType::NeedsBeginFrameChanged => {
                if is_truthy(event.data().and_then(|data| data.get("needsBeginFrame"))) {
                    self.last_needs_begin_frame = Some(timestamp);
                }
            }
            _ => {}
        }
    }

    fn add_main_thread_event(&mut self, event: &Event, kind: RecordType) {
        if event.is_top_level() {
            self.last_task_begin_time = Some(event.start_time);
        }
        let is_marker = matches!(
            kind,
            RecordType::ScheduleStyleRecalculation
                | RecordType::InvalidateLayout
                | RecordType::BeginMainThreadFrame
                | RecordType::ScrollLayer
        );
        if self.frame_pending_commit.is_none() && is_marker {
            self.frame_pending_commit = Some(PendingFrame {
                trigger_time: self.last_task_begin_time.unwrap_or(event.start_time),
                main_frame_id: None,
            });
        }
        let Some(pending) = self.frame_pending_commit.as_mut() else {
            return;
        };
        if kind == RecordType::BeginMainThreadFrame {
            if let Some(frame_id) = event.data().and_then(|data| data.get("frameId")).and_then(Value::as_i64) {
                pending.main_frame_id = Some(frame_id);
            }
        }
        if kind == RecordType::CompositeLayers && self.on_layer_tree(event) {
            self.handle_composite_layers();
        }
    }

    fn handle_begin_frame(&mut self, start_time: f64) {
        if self.last_frame.is_none() {
            self.start_frame(start_time);
        }
        self.last_begin_frame = Some(start_time);
    }

    fn handle_draw_frame(&mut self, start_time: f64) {
        let Some(last_start) = self.last_frame.as_ref().map(|frame| frame.start_time) else {
            self.start_frame(start_time);
            return;
        };
        // Only frames that did not wait for the main thread, or got its
        // commit, were drawn
        if self.main_frame_committed || !self.main_frame_requested {
            if let Some(needs_begin_frame) = self.last_needs_begin_frame.take() {
                let idle_end = match self.frame_pending_activation {
                    Some(pending) => pending.trigger_time,
                    None => self.last_begin_frame.unwrap_or(needs_begin_frame),
                };
                if idle_end > last_start {
                    if let Some(frame) = self.last_frame.as_mut() {
                        frame.idle = true;
                    }
                    self.start_frame(idle_end);
                    if self.frame_pending_activation.is_some() {
                        self.commit_pending_frame();
                    }
                    self.last_begin_frame = None;
                }
            }
            self.start_frame(start_time);
        }
        self.main_frame_committed = false;
    }

    fn handle_activate_layer_tree(&mut self) {
        if self.last_frame.is_none() {
            return;
        }
        if self.frame_pending_activation.is_some() && self.last_needs_begin_frame.is_none() {
            self.commit_pending_frame();
        }
    }

    fn handle_composite_layers(&mut self) {
        let Some(pending) = self.frame_pending_commit.take() else {
            return;
        };
        self.frame_pending_activation = Some(pending);
        self.main_frame_requested = false;
        self.main_frame_committed = true;
    }

    fn start_frame(&mut self, start_time: f64) {
        if let Some(frame) = self.last_frame.take() {
            self.flush_frame(frame, start_time);
        }
        self.last_frame = Some(TimelineFrame::new(start_time, start_time - self.minimum_record_time));
    }

    fn flush_frame(&mut self, mut frame: TimelineFrame, end_time: f64) {
        frame.end_time = end_time;
        frame.duration = end_time - frame.start_time;
        let contiguous = self.frames.last().map_or(true, |last| last.end_time == frame.start_time);
        if !contiguous || frame.start_time > frame.end_time {
            warn!(
                "Inconsistent frame time for frame {} ({} - {})",
                self.frames.len(),
                frame.start_time,
                frame.end_time
            );
        }
        self.frames.push(frame);
    }

    fn commit_pending_frame(&mut self) {
        if let (Some(frame), Some(pending)) = (self.last_frame.as_mut(), self.frame_pending_activation.take()) {
            frame.main_frame_id = pending.main_frame_id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Phase;
    use serde_json::json;

    struct Events(Vec<Event>);

    impl EventSource for Events {
        fn event(&self, id: EventId) -> &Event {
            &self.0[id.index()]
        }
    }

    fn compositor(name: &str, time: f64) -> Event {
        let mut event = Event::new("disabled-by-default-devtools.timeline.frame", name, Phase::Instant, time, ThreadId(1));
        event.add_args(json!({"layerTreeId": 7}).as_object().unwrap().clone());
        event
    }

    fn run(events: Vec<Event>) -> FrameModel {
        let mut set_tree = Event::new("devtools.timeline", "SetLayerTreeId", Phase::Instant, 0.5, ThreadId(0));
        set_tree.add_args(json!({"data": {"layerTreeId": 7}}).as_object().unwrap().clone());
        let mut all = vec![set_tree];
        all.extend(events);
        let ids: Vec<EventId> = (0..all.len()).map(EventId).collect();
        let mut model = FrameModel::new();
        model.add_trace_events(&Events(all), &ids, &[(ThreadId(0), 0.5)]);
        model
    }

    #[test]
    fn test_draw_frames_make_contiguous_frames() {
        let model = run(vec![
            compositor("BeginFrame", 1.0),
            compositor("DrawFrame", 2.0),
            compositor("BeginFrame", 17.0),
            compositor("DrawFrame", 18.0),
            compositor("DrawFrame", 34.0),
        ]);
        let frames = model.frames(None, None);
        let spans: Vec<(f64, f64)> = frames.iter().map(|f| (f.start_time, f.duration)).collect();
        assert_eq!(spans, vec![(1.0, 1.0), (2.0, 16.0), (18.0, 16.0)]);
        assert!((frames[2].fps() - 62.5).abs() < 1e-9);
    }

    #[test]
    fn test_other_layer_tree_ignored() {
        let mut other = compositor("DrawFrame", 2.0);
        other.args.insert("layerTreeId".to_string(), json!(8));
        let model = run(vec![compositor("BeginFrame", 1.0), other, compositor("DrawFrame", 5.0)]);
        assert_eq!(model.frames(None, None).len(), 1);
        assert_eq!(model.frames(None, None)[0].duration, 4.0);
    }

    #[test]
    fn test_frames_window() {
        let model = run(vec![
            compositor("DrawFrame", 1.0),
            compositor("DrawFrame", 10.0),
            compositor("DrawFrame", 20.0),
            compositor("DrawFrame", 30.0),
        ]);
        let window = model.frames(Some(12.0), Some(25.0));
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].start_time, 10.0);
    }
}
