//! JS profile processor.
//!
//! Turns a thread's CPU profile into `JSSample` instants and derives nested
//! `JSFrame` complete events from the sample stacks, so script time shows up
//! in the thread's event stream like any other instrumentation.

use super::arena::{EventArena, EventSource};
use super::record_type::RecordType;
use super::walker::{for_each_event, EventVisitor};
use crate::diagnostics::{Anomaly, ModelDiagnostics};
use crate::domain::{EventId, NodeId, ThreadId};
use crate::profile::{CallFrame, CpuProfileModel};
use crate::store::{Event, Phase, DEVTOOLS_TIMELINE_CATEGORY};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

const JS_SAMPLE: &str = "JSSample";
const JS_FRAME: &str = "JSFrame";
const NATIVE_URL_PREFIX: &str = "native ";
const NATIVE_RUNTIME_URL: &str = "native V8Runtime";

/// `{data: frame}` arguments of a JS frame event
fn frame_args(frame: &CallFrame) -> Map<String, Value> {
    let mut args = Map::new();
    args.insert("data".to_string(), frame_json(frame));
    args
}

fn frame_json(frame: &CallFrame) -> Value {
    json!({
        "functionName": frame.function_name,
        "scriptId": frame.script_id,
        "url": frame.url,
        "lineNumber": frame.line_number,
        "columnNumber": frame.column_number,
    })
}

/// One `JSSample` instant per profile sample, carrying its leaf-first stack.
/// GC and idle samples are skipped; `(program)` samples have an empty stack.
#[must_use]
pub fn generate_js_samples(profile: &CpuProfileModel, thread: ThreadId) -> Vec<Event> {
    let mut stacks: HashMap<NodeId, Value> = HashMap::new();
    if let Some(program) = profile.program_node() {
        stacks.insert(program, Value::Array(Vec::new()));
    }
    let mut samples = Vec::with_capacity(profile.samples().len());
    for (index, &time) in profile.timestamps().iter().enumerate().take(profile.samples().len()) {
        let Some(node) = profile.node_by_index(index) else {
            continue;
        };
        if Some(node.id) == profile.gc_node() || Some(node.id) == profile.idle_node() {
            continue;
        }
        let stack = stacks.entry(node.id).or_insert_with(|| {
            let mut frames = Vec::with_capacity(usize::try_from(node.depth + 1).unwrap_or(0));
            let mut current = node;
            while let Some(parent) = current.parent {
                frames.push(frame_json(&current.call_frame));
                current = profile.node(parent);
            }
            Value::Array(frames)
        });
        let mut event = Event::new(DEVTOOLS_TIMELINE_CATEGORY, JS_SAMPLE, Phase::Instant, time, thread);
        let mut data = Map::new();
        data.insert("stackTrace".to_string(), stack.clone());
        event.args.insert("data".to_string(), Value::Object(data));
        samples.push(event);
    }
    samples
}

/// Stable merge of two start-sorted id lists; `left` wins ties.
pub fn merge_by_start<S: EventSource + ?Sized>(source: &S, left: &[EventId], right: &[EventId]) -> Vec<EventId> {
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        if source.event(left[i]).start_time <= source.event(right[j]).start_time {
            merged.push(left[i]);
            i += 1;
        } else {
            merged.push(right[j]);
            j += 1;
        }
    }
    merged.extend_from_slice(&left[i..]);
    merged.extend_from_slice(&right[j..]);
    merged
}

/// Replay state of [`generate_js_frames`]
struct FrameBuilder<'d> {
    frames: Vec<Event>,
    calls: Vec<CallFrame>,
    /// Open frames, indices into `frames`
    stack: Vec<usize>,
    /// Stack depth each open event must not truncate below
    locked_depth: Vec<usize>,
    show_native_functions: bool,
    diagnostics: &'d mut ModelDiagnostics,
}

impl FrameBuilder<'_> {
    fn keep_frame(&self, frame: &CallFrame) -> bool {
        if frame.url == NATIVE_RUNTIME_URL {
            return false;
        }
        self.show_native_functions || !frame.url.starts_with(NATIVE_URL_PREFIX)
    }

    fn call_frames(&self, event: &Event) -> Vec<CallFrame> {
        let mut frames: Vec<CallFrame> = if event.name == JS_SAMPLE {
            let mut stack: Vec<CallFrame> = event
                .data()
                .and_then(|data| data.get("stackTrace"))
                .and_then(|trace| serde_json::from_value(trace.clone()).ok())
                .unwrap_or_default();
            stack.reverse();
            stack
        } else {
            self.stack.iter().map(|&f| self.calls[f].clone()).collect()
        };
        frames.retain(|frame| self.keep_frame(frame));
        frames
    }

    /// Extend the frames shared with `event`'s stack, then open the rest.
    fn extract_stack_trace(&mut self, event: &Event) {
        let frames = self.call_frames(event);
        let end_time = event.end_or_start();
        let shared = frames.len().min(self.stack.len());
        let mut depth = self.locked_depth.last().copied().unwrap_or(0);
        while depth < shared {
            let open = self.stack[depth];
            if !frames[depth].same_function(&self.calls[open]) {
                break;
            }
            let extended = self.frames[open].end_or_start().max(end_time);
            self.frames[open].set_end_time(extended);
            depth += 1;
        }
        self.truncate(depth, event.start_time);
        for frame in frames.into_iter().skip(depth) {
            let mut frame_event = Event::new(DEVTOOLS_TIMELINE_CATEGORY, JS_FRAME, Phase::Complete, event.start_time, event.thread);
            frame_event.add_args(frame_args(&frame));
            frame_event.set_end_time(end_time);
            self.stack.push(self.frames.len());
            self.frames.push(frame_event);
            self.calls.push(frame);
        }
    }

    fn truncate(&mut self, mut depth: usize, time: f64) {
        if let Some(&locked) = self.locked_depth.last() {
            if depth < locked {
                self.diagnostics.record(
                    Anomaly::JsStackTruncation,
                    format_args!("child stack shallower ({depth}) than parent ({locked}) at {time}ms"),
                );
                depth = locked;
            }
        }
        if self.stack.len() < depth {
            self.diagnostics.record(
                Anomaly::JsStackTruncation,
                format_args!("truncating above the stack size at {time}ms"),
            );
            depth = self.stack.len();
        }
        for &open in &self.stack {
            self.frames[open].set_end_time(time);
        }
        self.stack.truncate(depth);
    }
}

impl EventVisitor for FrameBuilder<'_> {
    fn on_start(&mut self, _id: EventId, event: &Event) {
        self.extract_stack_trace(event);
        self.locked_depth.push(self.stack.len());
    }

    fn on_end(&mut self, _id: EventId, event: &Event) {
        let depth = self.locked_depth.pop().unwrap_or(0);
        self.truncate(depth, event.end_or_start());
    }

    fn on_instant(&mut self, _id: EventId, event: &Event, parent: Option<(EventId, &Event)>) {
        let invoked_js = parent.is_some_and(|(_, p)| RecordType::from_name(&p.name).is_js_invocation());
        if invoked_js {
            self.extract_stack_trace(event);
        }
    }
}

/// Derive `JSFrame` events from the `JSSample` instants and the JS
/// invocations of a start-sorted event list.
pub fn generate_js_frames<S: EventSource + ?Sized>(
    source: &S,
    events: &[EventId],
    show_native_functions: bool,
    diagnostics: &mut ModelDiagnostics,
) -> Vec<Event> {
    let mut builder = FrameBuilder {
        frames: Vec::new(),
        calls: Vec::new(),
        stack: Vec::new(),
        locked_depth: Vec::new(),
        show_native_functions,
        diagnostics,
    };
    let start = events
        .iter()
        .map(|&id| source.event(id))
        .find(|event| event.is_top_level())
        .map_or(0.0, |event| event.start_time);
    for_each_event(source, events, &mut builder, start, f64::INFINITY, None);
    builder.frames
}

/// A thread's events with profile samples and JS frames merged in.
///
/// Samples follow real events on equal start times; frames precede them.
pub fn inject_js_frame_events(
    arena: &mut EventArena<'_>,
    thread: ThreadId,
    profile: Option<&CpuProfileModel>,
    show_native_functions: bool,
    diagnostics: &mut ModelDiagnostics,
) -> Vec<EventId> {
    let mut events = arena.store().thread(thread).events().to_vec();
    if let Some(profile) = profile {
        let samples = generate_js_samples(profile, thread);
        if !samples.is_empty() {
            let sample_ids = arena.extend(samples);
            events = merge_by_start(arena, &events, &sample_ids);
        }
    }
    let has_samples = profile.is_some() || events.iter().any(|&id| arena.event(id).name == JS_SAMPLE);
    if has_samples {
        let frames = generate_js_frames(arena, &events, show_native_functions, diagnostics);
        if !frames.is_empty() {
            let frame_ids = arena.extend(frames);
            events = merge_by_start(arena, &frame_ids, &events);
        }
    }
    events
}
