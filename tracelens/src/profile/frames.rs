//! Replay of the sample stream as nested frame intervals.

use super::call_tree::{CallTreeNode, CpuProfileModel};
use crate::domain::NodeId;

/// Receiver of the open/close callbacks of [`CpuProfileModel::for_each_frame`].
pub trait FrameSink {
    fn open_frame(&mut self, depth: i32, node: &CallTreeNode, time: f64);

    /// `self_time` is `duration` minus the time spent in child frames.
    fn close_frame(
        &mut self,
        depth: i32,
        node: &CallTreeNode,
        start: f64,
        duration: f64,
        self_time: f64,
    );
}

/// Per-depth open times and accumulated child durations, indexed by stack top.
/// Sized once from the profile's max depth and reused by every replay.
#[derive(Debug, Clone)]
pub(super) struct FrameStack {
    start_times: Vec<f64>,
    children_duration: Vec<f64>,
    top: usize,
}

impl FrameStack {
    pub(super) fn new(max_depth: usize) -> Self {
        // Room for a GC frame on top and a slot below the root for `top - 1`
        let size = max_depth + 3;
        Self {
            start_times: vec![0.0; size],
            children_duration: vec![0.0; size],
            top: 0,
        }
    }

    fn push(&mut self, time: f64) {
        self.top += 1;
        self.start_times[self.top] = time;
        self.children_duration[self.top] = 0.0;
    }

    /// Pop the top frame at `time`; returns (start, duration, self time).
    fn pop(&mut self, time: f64) -> (f64, f64, f64) {
        let start = self.start_times[self.top];
        let duration = time - start;
        self.children_duration[self.top - 1] += duration;
        let self_time = duration - self.children_duration[self.top];
        self.top -= 1;
        (start, duration, self_time)
    }
}

impl CpuProfileModel {
    /// Replay samples in `[start_time, stop_time)` as nested open/close
    /// intervals.
    ///
    /// Consecutive samples on the same node extend the open frame. On a
    /// change, frames are closed up to the common ancestor of the previous
    /// and the new leaf and the new leaf's remaining ancestors are opened.
    /// GC samples carry no stack: the GC node is stacked on top of the
    /// previous leaf until the next non-GC sample. Frames still open at the
    /// end are closed at the next sample time or the profile end.
    pub fn for_each_frame(&self, sink: &mut impl FrameSink, start_time: f64, stop_time: Option<f64>) {
        if self.samples.is_empty() {
            return;
        }
        let stop_time = stop_time.unwrap_or(f64::INFINITY);
        let samples = &self.samples;
        let timestamps = &self.timestamps;
        let gc_node = self.gc_node;
        let root = NodeId(0);

        // A sink replaying the same profile from its callbacks gets its own buffer
        let mut shared = self.frame_stack.try_borrow_mut();
        let mut own;
        let stack: &mut FrameStack = if let Ok(buffer) = shared.as_deref_mut() {
            buffer
        } else {
            own = FrameStack::new(self.max_depth);
            &mut own
        };
        stack.top = 0;
        let mut stack_nodes: Vec<NodeId> = Vec::new();
        let mut prev_id = root;
        let mut gc_parent: Option<NodeId> = None;
        let mut sample_index = timestamps.partition_point(|&t| t < start_time);

        while sample_index < samples.len() {
            let sample_time = timestamps[sample_index];
            if sample_time >= stop_time {
                break;
            }
            let id = samples[sample_index];
            sample_index += 1;
            if id == prev_id {
                continue;
            }
            let mut node = id;
            let mut prev_node = prev_id;

            if Some(node) == gc_node {
                let parent = self.node(prev_node);
                gc_parent = Some(prev_node);
                sink.open_frame(parent.depth + 1, self.node(node), sample_time);
                stack.push(sample_time);
                prev_id = id;
                continue;
            }
            if Some(prev_node) == gc_node {
                if let Some(parent) = gc_parent.take() {
                    let (start, duration, self_time) = stack.pop(sample_time);
                    let depth = self.node(parent).depth + 1;
                    sink.close_frame(depth, self.node(prev_node), start, duration, self_time);
                    prev_node = parent;
                }
            }

            while self.node(node).depth > self.node(prev_node).depth {
                stack_nodes.push(node);
                node = self.parent_of(node);
            }
            // Close frames down to the common ancestor
            while prev_node != node {
                let closing = self.node(prev_node);
                let (start, duration, self_time) = stack.pop(sample_time);
                sink.close_frame(closing.depth, closing, start, duration, self_time);
                if self.node(node).depth == closing.depth {
                    stack_nodes.push(node);
                    node = self.parent_of(node);
                }
                prev_node = self.parent_of(prev_node);
            }
            // Open the new leaf's uncommon ancestors, outermost first
            while let Some(opening) = stack_nodes.pop() {
                let opening = self.node(opening);
                sink.open_frame(opening.depth, opening, sample_time);
                stack.push(sample_time);
            }
            prev_id = id;
        }

        let end_time = timestamps.get(sample_index).copied().unwrap_or(self.end_time);
        if Some(prev_id) == gc_node {
            if let Some(parent) = gc_parent {
                let (start, duration, self_time) = stack.pop(end_time);
                let depth = self.node(parent).depth + 1;
                sink.close_frame(depth, self.node(prev_id), start, duration, self_time);
                prev_id = parent;
            }
        }
        let mut node = prev_id;
        while let Some(parent) = self.node(node).parent {
            let closing = self.node(node);
            let (start, duration, self_time) = stack.pop(end_time);
            sink.close_frame(closing.depth, closing, start, duration, self_time);
            node = parent;
        }
    }

    fn parent_of(&self, node: NodeId) -> NodeId {
        self.node(node).parent.unwrap_or(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ModelDiagnostics;
    use crate::profile::RawCpuProfile;
    use serde_json::json;

    /// Records every callback as a flat event list.
    #[derive(Default)]
    struct RecordingSink {
        opens: Vec<(i32, String, f64)>,
        closes: Vec<(i32, String, f64, f64, f64)>,
    }

    impl FrameSink for RecordingSink {
        fn open_frame(&mut self, depth: i32, node: &CallTreeNode, time: f64) {
            self.opens.push((depth, node.function_name().to_string(), time));
        }

        fn close_frame(
            &mut self,
            depth: i32,
            node: &CallTreeNode,
            start: f64,
            duration: f64,
            self_time: f64,
        ) {
            self.closes
                .push((depth, node.function_name().to_string(), start, duration, self_time));
        }
    }

    fn model(value: serde_json::Value) -> CpuProfileModel {
        let raw: RawCpuProfile = serde_json::from_value(value).unwrap();
        CpuProfileModel::new(raw, &mut ModelDiagnostics::new()).unwrap()
    }

    fn node(id: i64, name: &str, children: &[i64]) -> serde_json::Value {
        json!({ "id": id, "callFrame": { "functionName": name }, "children": children })
    }

    #[test]
    fn test_alternating_samples_split_frames() {
        // A, B, A at 0, 100, 200 ms; the trailing boundary extends to 300 ms
        let profile = model(json!({
            "nodes": [node(1, "(root)", &[2, 3]), node(2, "A", &[]), node(3, "B", &[])],
            "startTime": 0, "endTime": 300000,
            "samples": [2, 3, 2],
            "timeDeltas": [0, 100000, 100000]
        }));
        let mut sink = RecordingSink::default();
        profile.for_each_frame(&mut sink, 0.0, None);
        let names: Vec<&str> = sink.opens.iter().map(|o| o.1.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "A"]);
        assert_eq!(
            sink.closes,
            vec![
                (0, "A".to_string(), 0.0, 100.0, 100.0),
                (0, "B".to_string(), 100.0, 100.0, 100.0),
                (0, "A".to_string(), 200.0, 100.0, 100.0),
            ]
        );
        let a_self = profile.node(NodeId(1)).self_time;
        let b_self = profile.node(NodeId(2)).self_time;
        assert_eq!((a_self, b_self), (200.0, 100.0));
    }

    #[test]
    fn test_contiguous_samples_merge_into_one_frame() {
        let profile = model(json!({
            "nodes": [node(1, "(root)", &[2, 3]), node(2, "A", &[]), node(3, "B", &[])],
            "startTime": 0, "endTime": 300000,
            "samples": [2, 2, 3],
            "timeDeltas": [0, 100000, 100000]
        }));
        let mut sink = RecordingSink::default();
        profile.for_each_frame(&mut sink, 0.0, None);
        assert_eq!(sink.closes[0], (0, "A".to_string(), 0.0, 200.0, 200.0));
        assert_eq!(sink.closes.len(), 2);
    }

    #[test]
    fn test_nested_frames_report_self_time() {
        // main > work for two samples, then main alone
        let profile = model(json!({
            "nodes": [node(1, "(root)", &[2]), node(2, "main", &[3]), node(3, "work", &[])],
            "startTime": 0, "endTime": 30000,
            "samples": [3, 3, 2],
            "timeDeltas": [0, 10000, 10000]
        }));
        let mut sink = RecordingSink::default();
        profile.for_each_frame(&mut sink, 0.0, None);
        assert_eq!(
            sink.opens,
            vec![(0, "main".to_string(), 0.0), (1, "work".to_string(), 0.0)]
        );
        assert_eq!(
            sink.closes,
            vec![
                (1, "work".to_string(), 0.0, 20.0, 20.0),
                (0, "main".to_string(), 0.0, 30.0, 10.0),
            ]
        );
    }

    #[test]
    fn test_gc_stacked_on_previous_leaf() {
        let profile = model(json!({
            "nodes": [
                node(1, "(root)", &[2, 4]),
                node(2, "main", &[]),
                node(4, "(garbage collector)", &[])
            ],
            "startTime": 0, "endTime": 30000,
            "samples": [2, 4, 2],
            "timeDeltas": [0, 10000, 10000]
        }));
        let mut sink = RecordingSink::default();
        profile.for_each_frame(&mut sink, 0.0, None);
        assert_eq!(sink.opens[1], (1, "(garbage collector)".to_string(), 10.0));
        assert_eq!(
            sink.closes,
            vec![
                (1, "(garbage collector)".to_string(), 10.0, 10.0, 10.0),
                (0, "main".to_string(), 0.0, 30.0, 20.0),
            ]
        );
    }

    #[test]
    fn test_window_stops_before_stop_time() {
        let profile = model(json!({
            "nodes": [node(1, "(root)", &[2, 3]), node(2, "A", &[]), node(3, "B", &[])],
            "startTime": 0, "endTime": 300000,
            "samples": [2, 3, 2],
            "timeDeltas": [0, 100000, 100000]
        }));
        let mut sink = RecordingSink::default();
        profile.for_each_frame(&mut sink, 0.0, Some(150.0));
        assert_eq!(
            sink.closes,
            vec![
                (0, "A".to_string(), 0.0, 100.0, 100.0),
                (0, "B".to_string(), 100.0, 100.0, 100.0),
            ]
        );
    }

    #[test]
    fn test_replays_reuse_one_buffer() {
        let profile = model(json!({
            "nodes": [node(1, "(root)", &[2]), node(2, "main", &[3]), node(3, "leaf", &[])],
            "startTime": 0, "endTime": 30000,
            "samples": [3, 2, 3],
            "timeDeltas": [0, 10000, 10000]
        }));
        assert_eq!(profile.frame_stack.borrow().start_times.len(), profile.max_depth() + 3);

        let mut first = RecordingSink::default();
        profile.for_each_frame(&mut first, 0.0, None);
        let mut second = RecordingSink::default();
        profile.for_each_frame(&mut second, 0.0, None);
        assert_eq!(first.opens, second.opens);
        assert_eq!(first.closes, second.closes);
        assert_eq!(profile.frame_stack.borrow().start_times.len(), profile.max_depth() + 3);
    }
}
