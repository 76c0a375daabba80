//! Invalidation Tracker
//!
//! Links style and layout invalidations to the `RecalculateStyles`/`Layout`
//! work they caused.
//!
//! ```text
//! *InvalidationTracking event ──► add_invalidation()
//!                                   │  per-frame tables by type and node id
//!                                   ▼
//! RecalculateStyles ──► did_recalc_style()   style invalidations ──► recalc event
//!                                   │  StyleInvalidator ──► synthetic StyleRecalc
//!                                   │  (matched to the earlier Schedule record)
//! Layout ──────────────► did_layout()        layout invalidations ──► layout event
//! Paint ───────────────► did_paint()         next invalidation starts a new frame
//! ```
//!
//! Records live in one arena for the whole trace; the per-frame tables only
//! hold indices into it.

use super::record_type::RecordType;
use crate::diagnostics::{Anomaly, ModelDiagnostics};
use crate::domain::EventId;
use crate::store::{is_truthy, Event};
use serde_json::Value;
use std::collections::HashMap;

const STYLE_INVALIDATOR_REASON: &str = "StyleInvalidator";
const LAYOUT_FORCED_REASON: &str = "Layout forced";

/// One invalidation, as recorded or synthesized.
#[derive(Debug, Clone)]
pub struct InvalidationRecord {
    /// One of the four `*InvalidationTracking` kinds
    pub kind: RecordType,
    /// Event the record was built from
    pub event: EventId,
    pub start_time: f64,
    pub frame: Option<String>,
    pub node_id: Option<i64>,
    pub node_name: Option<String>,
    pub invalidation_set: Option<Value>,
    pub invalidated_selector_id: Option<String>,
    pub changed_id: Option<String>,
    pub changed_class: Option<String>,
    pub changed_attribute: Option<String>,
    pub changed_pseudo: Option<String>,
    pub selector_part: Option<String>,
    pub invalidation_list: Option<Vec<Value>>,
    pub reason: Option<String>,
    pub stack_trace: Option<Value>,
    linked_recalc_style: bool,
    linked_layout: bool,
}

impl InvalidationRecord {
    #[must_use]
    pub fn from_event(id: EventId, event: &Event) -> Self {
        let data = event.data();
        let field = |key: &str| data.and_then(|d| d.get(key)).filter(|v| !v.is_null());
        let text = |key: &str| field(key).and_then(Value::as_str).map(str::to_string);
        let kind = RecordType::from_name(&event.name);
        let stack_trace = field("stackTrace").cloned();
        let mut reason = text("reason");
        if reason.is_none() && stack_trace.is_some() && kind == RecordType::LayoutInvalidationTracking {
            reason = Some(LAYOUT_FORCED_REASON.to_string());
        }
        Self {
            kind,
            event: id,
            start_time: event.start_time,
            frame: text("frame"),
            node_id: field("nodeId")
                .filter(|v| is_truthy(Some(*v)))
                .and_then(Value::as_i64),
            node_name: text("nodeName"),
            invalidation_set: field("invalidationSet").cloned(),
            invalidated_selector_id: text("invalidatedSelectorId"),
            changed_id: text("changedId"),
            changed_class: text("changedClass"),
            changed_attribute: text("changedAttribute"),
            changed_pseudo: text("changedPseudo"),
            selector_part: text("selectorPart"),
            invalidation_list: field("invalidationList").and_then(Value::as_array).cloned(),
            reason,
            stack_trace,
            linked_recalc_style: false,
            linked_layout: false,
        }
    }

    fn is_style(&self) -> bool {
        matches!(
            self.kind,
            RecordType::ScheduleStyleInvalidationTracking
                | RecordType::StyleInvalidatorInvalidationTracking
                | RecordType::StyleRecalcInvalidationTracking
        )
    }
}

/// Slot of a kind in the per-frame `by_type` table
fn type_slot(kind: RecordType) -> Option<usize> {
    match kind {
        RecordType::ScheduleStyleInvalidationTracking => Some(0),
        RecordType::StyleInvalidatorInvalidationTracking => Some(1),
        RecordType::StyleRecalcInvalidationTracking => Some(2),
        RecordType::LayoutInvalidationTracking => Some(3),
        _ => None,
    }
}

const STYLE_SLOTS: [usize; 3] = [0, 1, 2];
const LAYOUT_SLOT: usize = 3;

#[derive(Debug, Clone)]
struct RecalcSpan {
    event: EventId,
    start: f64,
    end: Option<f64>,
    frame: Option<String>,
}

#[derive(Debug, Default)]
pub struct InvalidationTracker {
    records: Vec<InvalidationRecord>,
    by_event: HashMap<EventId, Vec<usize>>,
    // Per-frame state, reset by the first invalidation after a paint
    by_type: [Vec<usize>; 4],
    by_node: HashMap<i64, Vec<usize>>,
    last_recalc: Option<RecalcSpan>,
    did_paint: bool,
}

impl InvalidationTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidations linked to a `RecalculateStyles`/`UpdateLayoutTree` or
    /// `Layout` event
    pub fn invalidations_for(&self, event: EventId) -> impl Iterator<Item = &InvalidationRecord> {
        self.by_event
            .get(&event)
            .into_iter()
            .flatten()
            .map(|&index| &self.records[index])
    }

    #[must_use]
    pub fn records(&self) -> &[InvalidationRecord] {
        &self.records
    }

    pub fn add_invalidation(&mut self, id: EventId, event: &Event, diagnostics: &mut ModelDiagnostics) {
        self.add_record(InvalidationRecord::from_event(id, event), diagnostics);
    }

    pub fn did_recalc_style(&mut self, id: EventId, event: &Event, diagnostics: &mut ModelDiagnostics) {
        self.last_recalc = Some(RecalcSpan {
            event: id,
            start: event.start_time,
            end: event.end_time,
            frame: begin_data_frame(event),
        });
        for slot in STYLE_SLOTS {
            // Synthesized records may be appended while iterating
            let mut i = 0;
            while i < self.by_type[slot].len() {
                let index = self.by_type[slot][i];
                self.associate_with_last_recalc(index, diagnostics);
                i += 1;
            }
        }
    }

    pub fn did_layout(&mut self, id: EventId, event: &Event) {
        if event.begin_data().is_none() {
            return;
        }
        let frame = begin_data_frame(event);
        for i in 0..self.by_type[LAYOUT_SLOT].len() {
            let index = self.by_type[LAYOUT_SLOT][i];
            if self.records[index].linked_layout {
                continue;
            }
            self.add_to_event(id, frame.as_deref(), index);
            self.records[index].linked_layout = true;
        }
    }

    pub fn did_paint(&mut self) {
        self.did_paint = true;
    }

    fn add_record(&mut self, record: InvalidationRecord, diagnostics: &mut ModelDiagnostics) -> Option<usize> {
        if self.did_paint {
            self.start_new_frame();
        }
        let Some(node_id) = record.node_id else {
            diagnostics.record(
                Anomaly::InvalidationWithoutNode,
                format_args!("{:?} at {}ms", record.kind, record.start_time),
            );
            return None;
        };
        // Handled through the matching StyleInvalidator record instead
        if record.kind == RecordType::StyleRecalcInvalidationTracking
            && record.reason.as_deref() == Some(STYLE_INVALIDATOR_REASON)
        {
            return None;
        }
        let slot = type_slot(record.kind)?;
        let during_recalc = record.is_style()
            && record.start_time != 0.0
            && self.last_recalc.as_ref().is_some_and(|recalc| {
                record.start_time >= recalc.start
                    && recalc.end.is_some_and(|end| record.start_time <= end)
            });
        let index = self.records.len();
        self.records.push(record);
        if during_recalc {
            self.associate_with_last_recalc(index, diagnostics);
        }
        self.by_type[slot].push(index);
        self.by_node.entry(node_id).or_default().push(index);
        Some(index)
    }

    fn associate_with_last_recalc(&mut self, index: usize, diagnostics: &mut ModelDiagnostics) {
        if self.records[index].linked_recalc_style {
            return;
        }
        let Some(recalc) = self.last_recalc.clone() else {
            return;
        };
        match self.records[index].kind {
            RecordType::StyleInvalidatorInvalidationTracking => {
                self.add_synthetic_recalc_invalidations(recalc.frame.as_deref(), index, diagnostics);
            }
            RecordType::ScheduleStyleInvalidationTracking => {}
            _ => self.add_to_event(recalc.event, recalc.frame.as_deref(), index),
        }
        self.records[index].linked_recalc_style = true;
    }

    /// Turn a StyleInvalidator record into StyleRecalc records, one per
    /// invalidation set it names, each based on the Schedule record that
    /// created the set.
    fn add_synthetic_recalc_invalidations(
        &mut self,
        frame: Option<&str>,
        invalidator: usize,
        diagnostics: &mut ModelDiagnostics,
    ) {
        let Some(list) = self.records[invalidator].invalidation_list.clone() else {
            self.add_synthetic_recalc_invalidation(invalidator, invalidator, diagnostics);
            return;
        };
        let Some(node_id) = self.records[invalidator].node_id else {
            diagnostics.record(Anomaly::InvalidationWithoutNode, "style invalidator");
            return;
        };
        for entry in &list {
            let set_id = entry.get("id");
            let scheduled = self.by_node.get(&node_id).and_then(|records| {
                records.iter().rev().copied().find(|&candidate| {
                    let record = &self.records[candidate];
                    record.kind == RecordType::ScheduleStyleInvalidationTracking
                        && record.frame.as_deref() == frame
                        && record.invalidation_set.as_ref() == set_id
                })
            });
            let Some(scheduled) = scheduled else {
                diagnostics.record(
                    Anomaly::UnmatchedStyleInvalidation,
                    format_args!("node {node_id} set {}", set_id.unwrap_or(&Value::Null)),
                );
                continue;
            };
            self.add_synthetic_recalc_invalidation(scheduled, invalidator, diagnostics);
        }
    }

    fn add_synthetic_recalc_invalidation(
        &mut self,
        base: usize,
        invalidator: usize,
        diagnostics: &mut ModelDiagnostics,
    ) {
        let source = &self.records[invalidator];
        let reason = source.reason.clone();
        let selector_part = source.selector_part.clone();
        let mut record = self.records[base].clone();
        record.kind = RecordType::StyleRecalcInvalidationTracking;
        record.linked_recalc_style = false;
        record.linked_layout = false;
        if reason.is_some() {
            record.reason = reason;
        }
        if selector_part.is_some() {
            record.selector_part = selector_part;
        }
        if let Some(index) = self.add_record(record, diagnostics) {
            if !self.records[index].linked_recalc_style {
                self.associate_with_last_recalc(index, diagnostics);
            }
        }
    }

    fn add_to_event(&mut self, event: EventId, frame: Option<&str>, index: usize) {
        let Some(frame) = frame else {
            return;
        };
        if self.records[index].frame.as_deref() != Some(frame) {
            return;
        }
        self.by_event.entry(event).or_default().push(index);
    }

    fn start_new_frame(&mut self) {
        self.by_type = Default::default();
        self.by_node.clear();
        self.last_recalc = None;
        self.did_paint = false;
    }
}

fn begin_data_frame(event: &Event) -> Option<String> {
    event
        .begin_data()
        .and_then(|data| data.get("frame"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
