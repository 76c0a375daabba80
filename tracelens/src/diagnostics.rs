//! Per-load anomaly diagnostics.
//!
//! Tolerated anomalies never abort a load. Each one is corrected on the spot,
//! counted here and logged: the first occurrence of a kind at `warn`, repeats
//! at `debug` so large traces do not flood the log. A fresh instance is
//! created for every load and travels with the model.

use log::{debug, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Kinds of tolerated anomalies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Anomaly {
    /// Phase code outside the supported set; event skipped
    UnknownPhase,
    /// `id2` with both or neither half; event left without join key
    MalformedId,
    /// Top-level event starting inside the previous one; dropped
    DroppedTopLevel,
    /// End event with nothing open on its thread; dropped
    UnbalancedEnd,
    /// End event whose name or category differs from the open Begin
    MismatchedEnd,
    /// Begin never closed; closed at the maximum record time
    UnclosedBegin,
    /// End time earlier than start time; ignored
    OutOfOrderEnd,
    /// Legacy async begin with a key that is already open
    DuplicateAsyncBegin,
    /// Async step or end with no open operation
    StrayAsyncEvent,
    /// Legacy async step whose phase contradicts the previous step (lenient mode)
    AsyncPhaseMismatch,
    /// Nestable async end whose name differs from the popped begin
    NestableNameMismatch,
    /// Async operation never ended; closed at the maximum record time
    UnclosedAsync,
    /// Snapshot event without its payload (lenient mode)
    MissingSnapshot,
    /// Parent self time driven below zero by clock skew; clamped
    NegativeSelfTime,
    /// `(program)` sample replaced by its predecessor
    RepairedSample,
    /// JS frame stack truncation outside the locked range
    JsStackTruncation,
    /// Invalidation tracking event without a node id
    InvalidationWithoutNode,
    /// `StyleInvalidator` invalidation with no earlier schedule event
    UnmatchedStyleInvalidation,
    /// Browser frame payload referencing an unknown parent frame
    OrphanFrame,
    /// Legacy page metadata with a different session id
    ForeignSession,
    /// Structurally broken CPU profile skipped (lenient mode)
    InvalidProfile,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Anomaly::UnknownPhase => "unknown phase",
            Anomaly::MalformedId => "malformed structured id",
            Anomaly::DroppedTopLevel => "overlapping top-level event",
            Anomaly::UnbalancedEnd => "unbalanced end event",
            Anomaly::MismatchedEnd => "begin/end mismatch",
            Anomaly::UnclosedBegin => "unclosed begin event",
            Anomaly::OutOfOrderEnd => "end before start",
            Anomaly::DuplicateAsyncBegin => "async event already started",
            Anomaly::StrayAsyncEvent => "stray async continuation",
            Anomaly::AsyncPhaseMismatch => "async step phase mismatch",
            Anomaly::NestableNameMismatch => "nestable async name mismatch",
            Anomaly::UnclosedAsync => "unclosed async event",
            Anomaly::MissingSnapshot => "missing snapshot payload",
            Anomaly::NegativeSelfTime => "negative self time",
            Anomaly::RepairedSample => "repaired (program) sample",
            Anomaly::JsStackTruncation => "JS stack truncation out of range",
            Anomaly::InvalidationWithoutNode => "invalidation without node id",
            Anomaly::UnmatchedStyleInvalidation => "style invalidation without schedule",
            Anomaly::OrphanFrame => "frame with unknown parent",
            Anomaly::ForeignSession => "page metadata from another session",
            Anomaly::InvalidProfile => "invalid CPU profile skipped",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Default, Clone)]
pub struct ModelDiagnostics {
    counts: BTreeMap<Anomaly, usize>,
    /// Kinds that have already been warned about (to avoid log spam)
    warned: HashSet<Anomaly>,
    /// Sum of the negative parts discarded by self-time clamping, in ms
    clamped_self_time: f64,
}

impl ModelDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence and log it.
    pub fn record(&mut self, anomaly: Anomaly, detail: impl fmt::Display) {
        *self.counts.entry(anomaly).or_insert(0) += 1;
        if self.warned.insert(anomaly) {
            warn!("{anomaly}: {detail}");
        } else {
            debug!("{anomaly}: {detail}");
        }
    }

    /// Count `n` occurrences at once (batch repairs).
    pub fn record_many(&mut self, anomaly: Anomaly, n: usize, detail: impl fmt::Display) {
        if n == 0 {
            return;
        }
        *self.counts.entry(anomaly).or_insert(0) += n;
        self.warned.insert(anomaly);
        warn!("{anomaly} x{n}: {detail}");
    }

    pub(crate) fn record_clamped_self_time(&mut self, raw: f64) {
        self.clamped_self_time += raw;
    }

    #[must_use]
    pub fn count(&self, anomaly: Anomaly) -> usize {
        self.counts.get(&anomaly).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Negative self time discarded by clamping, summed over all events (≤ 0).
    #[must_use]
    pub fn clamped_self_time(&self) -> f64 {
        self.clamped_self_time
    }

    /// Non-zero counters in a stable order.
    #[must_use]
    pub fn counts(&self) -> &BTreeMap<Anomaly, usize> {
        &self.counts
    }
}
