//! Call tree reconstruction from a sampled CPU profile.
//!
//! Node ids are reassigned in depth-first pre-order so that the root is 0,
//! every subtree occupies a contiguous id range and children keep their
//! recorded order. `samples` is remapped into the new id space.

// Hit and sample counts stay far below 2^52
#![allow(clippy::cast_precision_loss)]

use super::cpu_profile::{CallFrame, ProfileNodePayload, RawCpuProfile};
use super::frames::FrameStack;
use crate::diagnostics::{Anomaly, ModelDiagnostics};
use crate::domain::{NodeId, ProfileError};
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;

const GC_FUNCTION_NAME: &str = "(garbage collector)";
const PROGRAM_FUNCTION_NAME: &str = "(program)";
const IDLE_FUNCTION_NAME: &str = "(idle)";

/// One call-stack frame position
#[derive(Debug, Clone)]
pub struct CallTreeNode {
    pub id: NodeId,
    pub call_frame: CallFrame,
    /// Hit count times the mean sample interval (ms)
    pub self_time: f64,
    /// `self_time` plus every child's total (ms)
    pub total_time: f64,
    /// -1 for the synthetic root
    pub depth: i32,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub hit_count: u64,
    pub deopt_reason: Option<String>,
}

impl CallTreeNode {
    #[must_use]
    pub fn function_name(&self) -> &str {
        &self.call_frame.function_name
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.call_frame.url
    }

    /// Identity shared by every node calling the same function location
    #[must_use]
    pub fn call_uid(&self) -> String {
        let frame = &self.call_frame;
        format!(
            "{}@{}:{}:{}",
            frame.function_name, frame.script_id, frame.line_number, frame.column_number
        )
    }
}

/// A reconstructed CPU profile: call tree plus the time-sorted sample stream.
#[derive(Debug, Clone)]
pub struct CpuProfileModel {
    pub(super) nodes: Vec<CallTreeNode>,
    pub(super) samples: Vec<NodeId>,
    /// Sample times in ms; one longer than `samples` once normalized
    pub(super) timestamps: Vec<f64>,
    lines: Vec<i64>,
    pub(super) start_time: f64,
    pub(super) end_time: f64,
    total_hit_count: u64,
    pub(super) max_depth: usize,
    pub(super) gc_node: Option<NodeId>,
    program_node: Option<NodeId>,
    idle_node: Option<NodeId>,
    repaired_samples: usize,
    pub(super) frame_stack: RefCell<FrameStack>,
}

impl CpuProfileModel {
    /// Reconstruct a profile. Tolerated artifacts are repaired and recorded
    /// in `diagnostics`; structural problems are errors.
    pub fn new(
        mut profile: RawCpuProfile,
        diagnostics: &mut ModelDiagnostics,
    ) -> Result<Self, ProfileError> {
        let legacy = profile.is_legacy();
        let (start_time, end_time, timestamps) = if legacy {
            // Legacy start/end are seconds and timestamps are absolute
            (
                profile.start_time * 1000.0,
                profile.end_time * 1000.0,
                profile.timestamps.take(),
            )
        } else {
            (
                profile.start_time / 1000.0,
                profile.end_time / 1000.0,
                convert_time_deltas(profile.start_time, profile.time_deltas.as_deref()),
            )
        };
        profile.flatten_head();
        let payloads = profile.nodes.take().unwrap_or_default();
        let raw_samples = profile.samples.take().unwrap_or_default();

        let mut model = Self {
            nodes: Vec::with_capacity(payloads.len()),
            samples: Vec::new(),
            timestamps: Vec::new(),
            lines: profile.lines.take().unwrap_or_default(),
            start_time,
            end_time,
            total_hit_count: 0,
            max_depth: 0,
            gc_node: None,
            program_node: None,
            idle_node: None,
            repaired_samples: 0,
            frame_stack: RefCell::new(FrameStack::new(0)),
        };
        let id_map = model.translate_tree(payloads, &raw_samples)?;
        *model.frame_stack.get_mut() = FrameStack::new(model.max_depth);
        model.samples = raw_samples
            .iter()
            .map(|id| id_map.get(id).copied().ok_or(ProfileError::UnknownNode(*id)))
            .collect::<Result<_, _>>()?;
        model.calculate_totals();
        model.extract_meta_nodes();

        if !model.samples.is_empty() {
            let mut timestamps = timestamps;
            if let Some(timestamps) = timestamps.as_mut() {
                let count = model.samples.len();
                // Legacy absolute series may already carry the trailing boundary
                let with_boundary = legacy && timestamps.len() == count + 1;
                if timestamps.len() != count && !with_boundary {
                    return Err(ProfileError::SampleDeltaMismatch {
                        samples: count,
                        deltas: timestamps.len(),
                    });
                }
                sort_samples(timestamps, &mut model.samples);
            }
            model.normalize_timestamps(timestamps);
            model.fix_missing_samples(diagnostics);
        }
        debug!(
            "CPU profile: {} nodes, {} samples, max depth {}, {:.3}ms..{:.3}ms",
            model.nodes.len(),
            model.samples.len(),
            model.max_depth,
            model.start_time,
            model.end_time
        );
        Ok(model)
    }

    /// Build the contiguous-id tree. Returns the payload-id to node-id map.
    fn translate_tree(
        &mut self,
        mut payloads: Vec<ProfileNodePayload>,
        samples: &[i64],
    ) -> Result<HashMap<i64, NodeId>, ProfileError> {
        if payloads.is_empty() {
            return Err(ProfileError::EmptyProfile);
        }
        let index_by_id: HashMap<i64, usize> =
            payloads.iter().enumerate().map(|(i, node)| (node.id, i)).collect();

        let hit_counts = hit_counts(&payloads, &index_by_id, samples)?;
        build_children_from_parents(&mut payloads, &index_by_id)?;
        self.total_hit_count = hit_counts.iter().sum();
        let sample_time = if self.total_hit_count == 0 {
            0.0
        } else {
            (self.end_time - self.start_time) / self.total_hit_count as f64
        };

        let mut id_map = HashMap::with_capacity(payloads.len());
        let mut visited = vec![false; payloads.len()];
        // (payload index, parent node id)
        let mut stack: Vec<(usize, Option<NodeId>)> = vec![(0, None)];
        while let Some((index, parent)) = stack.pop() {
            if std::mem::replace(&mut visited[index], true) {
                return Err(ProfileError::CyclicTree(payloads[index].id));
            }
            let id = NodeId(self.nodes.len());
            let depth = parent.map_or(-1, |p| self.nodes[p.index()].depth + 1);
            let payload = &payloads[index];
            self.nodes.push(CallTreeNode {
                id,
                call_frame: call_frame_of(payload),
                self_time: hit_counts[index] as f64 * sample_time,
                total_time: 0.0,
                depth,
                parent,
                children: Vec::new(),
                hit_count: hit_counts[index],
                deopt_reason: payload
                    .deopt_reason
                    .clone()
                    .filter(|reason| !reason.is_empty() && reason != "no reason"),
            });
            if let Some(parent) = parent {
                self.nodes[parent.index()].children.push(id);
            }
            if let Ok(depth) = usize::try_from(depth) {
                self.max_depth = self.max_depth.max(depth);
            }
            id_map.insert(payload.id, id);

            let children = payload.children.as_deref().unwrap_or(&[]);
            for child in children.iter().rev() {
                let &child_index = index_by_id
                    .get(child)
                    .ok_or(ProfileError::UnknownNode(*child))?;
                stack.push((child_index, Some(id)));
            }
        }
        Ok(id_map)
    }

    /// Pre-order ids put every child after its parent, so one reverse pass
    /// accumulates totals bottom-up.
    fn calculate_totals(&mut self) {
        for node in &mut self.nodes {
            node.total_time = node.self_time;
        }
        for index in (1..self.nodes.len()).rev() {
            let total = self.nodes[index].total_time;
            if let Some(parent) = self.nodes[index].parent {
                self.nodes[parent.index()].total_time += total;
            }
        }
    }

    fn extract_meta_nodes(&mut self) {
        for &child in &self.nodes[0].children {
            if self.gc_node.is_some() && self.program_node.is_some() && self.idle_node.is_some() {
                break;
            }
            match self.nodes[child.index()].function_name() {
                GC_FUNCTION_NAME => self.gc_node = Some(child),
                PROGRAM_FUNCTION_NAME => self.program_node = Some(child),
                IDLE_FUNCTION_NAME => self.idle_node = Some(child),
                _ => {}
            }
        }
    }

    /// Convert to ms and make sure there is one boundary per sample plus a
    /// trailing one.
    fn normalize_timestamps(&mut self, timestamps: Option<Vec<f64>>) {
        let count = self.samples.len();
        let Some(mut timestamps) = timestamps else {
            // Profiles without timestamps get an evenly spaced series
            let interval = (self.end_time - self.start_time) / count as f64;
            let series = (0..=count).map(|i| self.start_time + i as f64 * interval);
            self.timestamps = series.collect();
            return;
        };
        for timestamp in &mut timestamps {
            *timestamp /= 1000.0;
        }
        if timestamps.len() == count {
            let first = timestamps[0];
            let last = timestamps[count - 1];
            let average = if count > 1 { (last - first) / (count - 1) as f64 } else { 0.0 };
            timestamps.push(last + average);
        }
        self.start_time = timestamps[0];
        self.end_time = timestamps[timestamps.len() - 1];
        self.timestamps = timestamps;
    }

    /// The sampler sometimes fails to walk the JS stack and reports
    /// `(program)` instead, splitting one invocation in two. A single such
    /// sample between two stacks with the same bottom node is replaced by the
    /// preceding sample.
    fn fix_missing_samples(&mut self, diagnostics: &mut ModelDiagnostics) {
        let Some(program) = self.program_node else {
            return;
        };
        let count = self.samples.len();
        if count < 3 {
            return;
        }
        let is_system = |id: NodeId| {
            id == program || Some(id) == self.gc_node || Some(id) == self.idle_node
        };
        let mut prev = self.samples[0];
        let mut current = self.samples[1];
        let mut repairs = Vec::new();
        for index in 1..count - 1 {
            let next = self.samples[index + 1];
            if current == program
                && !is_system(prev)
                && !is_system(next)
                && self.bottom_node(prev) == self.bottom_node(next)
            {
                repairs.push((index, prev));
            }
            prev = current;
            current = next;
        }
        for &(index, replacement) in &repairs {
            self.samples[index] = replacement;
        }
        self.repaired_samples = repairs.len();
        if !repairs.is_empty() {
            diagnostics.record_many(
                Anomaly::RepairedSample,
                repairs.len(),
                format_args!("CPU profile parser is fixing {} missing samples", repairs.len()),
            );
        }
    }

    /// The ancestor just below the synthetic root
    #[must_use]
    pub fn bottom_node(&self, mut node: NodeId) -> NodeId {
        while let Some(parent) = self.nodes[node.index()].parent {
            if self.nodes[parent.index()].parent.is_none() {
                break;
            }
            node = parent;
        }
        node
    }

    // === ACCESSORS ===

    #[must_use]
    pub fn root(&self) -> &CallTreeNode {
        &self.nodes[0]
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &CallTreeNode {
        &self.nodes[id.index()]
    }

    #[must_use]
    pub fn nodes(&self) -> &[CallTreeNode] {
        &self.nodes
    }

    #[must_use]
    pub fn samples(&self) -> &[NodeId] {
        &self.samples
    }

    #[must_use]
    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    #[must_use]
    pub fn lines(&self) -> &[i64] {
        &self.lines
    }

    /// Node of the `index`-th sample
    #[must_use]
    pub fn node_by_index(&self, index: usize) -> Option<&CallTreeNode> {
        self.samples.get(index).map(|&id| self.node(id))
    }

    #[must_use]
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    #[must_use]
    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    #[must_use]
    pub fn total_hit_count(&self) -> u64 {
        self.total_hit_count
    }

    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    #[must_use]
    pub fn gc_node(&self) -> Option<NodeId> {
        self.gc_node
    }

    #[must_use]
    pub fn program_node(&self) -> Option<NodeId> {
        self.program_node
    }

    #[must_use]
    pub fn idle_node(&self) -> Option<NodeId> {
        self.idle_node
    }

    #[must_use]
    pub fn repaired_samples(&self) -> usize {
        self.repaired_samples
    }
}

/// Absolute µs timestamps from current-format deltas
fn convert_time_deltas(start: f64, deltas: Option<&[f64]>) -> Option<Vec<f64>> {
    let mut last = start;
    deltas.map(|deltas| {
        deltas
            .iter()
            .map(|delta| {
                last += delta;
                last
            })
            .collect()
    })
}

fn hit_counts(
    payloads: &[ProfileNodePayload],
    index_by_id: &HashMap<i64, usize>,
    samples: &[i64],
) -> Result<Vec<u64>, ProfileError> {
    if payloads[0].hit_count.is_some() {
        return Ok(payloads.iter().map(|node| node.hit_count.unwrap_or(0)).collect());
    }
    if samples.is_empty() {
        return Err(ProfileError::MissingHitCounts);
    }
    let mut counts = vec![0; payloads.len()];
    for sample in samples {
        let &index = index_by_id.get(sample).ok_or(ProfileError::UnknownNode(*sample))?;
        counts[index] += 1;
    }
    Ok(counts)
}

/// Derive child lists from parent links when the root carries none.
fn build_children_from_parents(
    payloads: &mut [ProfileNodePayload],
    index_by_id: &HashMap<i64, usize>,
) -> Result<(), ProfileError> {
    if payloads[0].children.is_some() {
        return Ok(());
    }
    let mut children: Vec<Vec<i64>> = vec![Vec::new(); payloads.len()];
    for node in &payloads[1..] {
        let parent = node.parent.ok_or(ProfileError::UnknownNode(node.id))?;
        let &parent_index = index_by_id.get(&parent).ok_or(ProfileError::UnknownNode(parent))?;
        children[parent_index].push(node.id);
    }
    for (node, children) in payloads.iter_mut().zip(children) {
        node.children = Some(children);
    }
    Ok(())
}

/// The explicit `callFrame`, or one built from legacy node fields
fn call_frame_of(payload: &ProfileNodePayload) -> CallFrame {
    if let Some(frame) = &payload.call_frame {
        return frame.clone();
    }
    CallFrame {
        function_name: payload.function_name.clone().unwrap_or_default(),
        script_id: payload.script_id.clone().unwrap_or_default(),
        url: payload.url.clone().unwrap_or_default(),
        line_number: payload.line_number.unwrap_or(0) - 1,
        column_number: payload.column_number.unwrap_or(0) - 1,
    }
}

/// Stable co-sort of samples by timestamp.
///
/// Computes the sorting permutation once, then applies it in place by
/// following its cycles, so no second pair of arrays is allocated. Already
/// sorted input is left untouched.
pub fn sort_samples<T: Copy>(timestamps: &mut [f64], samples: &mut [T]) {
    let count = timestamps.len().min(samples.len());
    if timestamps[..count].windows(2).all(|w| w[0] <= w[1]) {
        return;
    }
    let mut indices: Vec<usize> = (0..count).collect();
    indices.sort_by(|&a, &b| timestamps[a].total_cmp(&timestamps[b]));
    for i in 0..count {
        let mut index = indices[i];
        if index == i {
            continue;
        }
        let saved_timestamp = timestamps[i];
        let saved_sample = samples[i];
        let mut current = i;
        while index != i {
            samples[current] = samples[index];
            timestamps[current] = timestamps[index];
            current = index;
            index = indices[index];
            indices[current] = current;
        }
        samples[current] = saved_sample;
        timestamps[current] = saved_timestamp;
    }
}
