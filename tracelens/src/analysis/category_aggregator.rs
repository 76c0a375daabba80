//! Category Aggregator
//!
//! Breaks the time covered by a nested event list down by legend category.
//!
//! # Architecture
//!
//! - **`CategoryBreakdown::build()`** walks the events once, keeping a stack
//!   of categories. Whenever the innermost category changes, the category
//!   being left and the one being entered each get a breakpoint holding
//!   their cumulative time so far.
//! - **`CategoryBreakdown::stats_for_range()`** evaluates every series at
//!   both ends of the range (binary search plus linear interpolation) and
//!   subtracts. Whatever the categories leave uncovered is `idle`.
//!
//! ```text
//! time ─────►   0    2       7    10
//! events        [RunTask .........]
//!                    [Layout ]
//! other series  0@0  2@2     2@7  5@10
//! rendering          0@2     5@7
//! ```
//!
//! Building is O(n); a range query is O(categories × log n). Callers asking
//! many ranges of the same event list keep the breakdown around.

use super::categories::{counts_for_stats, event_category, Category};
use crate::domain::EventId;
use crate::store::Event;
use crate::timeline::{for_each_event, EventSource, EventVisitor};
use serde::Serialize;
use std::collections::BTreeMap;

/// Time per category in milliseconds
pub type CategoryStats = BTreeMap<Category, f64>;

/// Parallel time/value arrays, the shape every charted series is reported in.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

impl Series {
    fn push(&mut self, time: f64, value: f64) {
        self.times.push(time);
        self.values.push(value);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

// =============================================================================
// CATEGORY WALK
// =============================================================================

/// How a category change is recorded into a series
#[derive(Clone, Copy)]
enum Accumulation {
    /// Time spent in the category so far
    Cumulative,
    /// Length of the segment that ends at the breakpoint
    Segment,
}

struct CategoryWalk {
    mode: Accumulation,
    series: BTreeMap<Category, Series>,
    stack: Vec<Category>,
    last_time: f64,
}

impl CategoryWalk {
    fn new(mode: Accumulation) -> Self {
        Self {
            mode,
            series: BTreeMap::new(),
            stack: Vec::new(),
            last_time: 0.0,
        }
    }

    fn update(&mut self, category: Category, time: f64) {
        let series = self.series.entry(category).or_default();
        if series.times.last() == Some(&time) {
            return;
        }
        let value = match self.mode {
            Accumulation::Cumulative => series.values.last().copied().unwrap_or(0.0) + time - self.last_time,
            Accumulation::Segment => time - self.last_time,
        };
        series.push(time, value);
    }

    fn change(&mut self, from: Option<Category>, to: Option<Category>, time: f64) {
        if let Some(from) = from {
            self.update(from, time);
        }
        self.last_time = time;
        if let Some(to) = to {
            self.update(to, time);
        }
    }
}

impl EventVisitor for CategoryWalk {
    fn on_start(&mut self, _id: EventId, event: &Event) {
        let category = event_category(event);
        let parent = self.stack.last().copied();
        if parent != Some(category) {
            self.change(parent, Some(category), event.start_time);
        }
        self.stack.push(category);
    }

    fn on_end(&mut self, _id: EventId, event: &Event) {
        let category = self.stack.pop();
        let parent = self.stack.last().copied();
        if category != parent {
            self.change(category, parent, event.end_or_start());
        }
    }
}

fn walk<S: EventSource + ?Sized>(source: &S, events: &[EventId], mode: Accumulation) -> BTreeMap<Category, Series> {
    let mut walk = CategoryWalk::new(mode);
    let filter: &dyn Fn(&Event) -> bool = &counts_for_stats;
    for_each_event(source, events, &mut walk, f64::NEG_INFINITY, f64::INFINITY, Some(filter));
    walk.series
}

// =============================================================================
// RANGE STATISTICS
// =============================================================================

/// Cumulative per-category time series of one event list.
#[derive(Debug, Clone, Default)]
pub struct CategoryBreakdown {
    series: BTreeMap<Category, Series>,
    empty: bool,
}

impl CategoryBreakdown {
    /// Walk `events` (sorted by start) once.
    pub fn build<S: EventSource + ?Sized>(source: &S, events: &[EventId]) -> Self {
        Self {
            series: walk(source, events, Accumulation::Cumulative),
            empty: events.is_empty(),
        }
    }

    /// Categories that have any breakpoint
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.series.keys().copied()
    }

    /// Time per category within `[start, end]`; the uncovered rest is `idle`.
    #[must_use]
    pub fn stats_for_range(&self, start: f64, end: f64) -> CategoryStats {
        let mut stats = CategoryStats::new();
        if self.empty {
            stats.insert(Category::Idle, end - start);
            return stats;
        }
        for (&category, series) in &self.series {
            stats.insert(category, value_at(series, end) - value_at(series, start));
        }
        let busy: f64 = stats.values().sum();
        stats.insert(Category::Idle, (end - start - busy).max(0.0));
        stats
    }
}

/// Cumulative value at `time`, interpolated between the bracketing breakpoints
fn value_at(series: &Series, time: f64) -> f64 {
    let index = series.times.partition_point(|&t| t <= time);
    if index == 0 {
        return 0.0;
    }
    if index == series.len() {
        return series.values[index - 1];
    }
    let (t0, t1) = (series.times[index - 1], series.times[index]);
    let (v0, v1) = (series.values[index - 1], series.values[index]);
    v0 + (v1 - v0) * (time - t0) / (t1 - t0)
}

/// One-off range query; build a [`CategoryBreakdown`] for repeated ones.
pub fn stats_for_range<S: EventSource + ?Sized>(source: &S, events: &[EventId], start: f64, end: f64) -> CategoryStats {
    CategoryBreakdown::build(source, events).stats_for_range(start, end)
}

// =============================================================================
// DETAIL SEGMENTS
// =============================================================================

/// Per-category segment series: each value is the length of the stretch
/// spent in that category which ends at the matching time.
pub fn detail_stats<S: EventSource + ?Sized>(
    source: &S,
    events: &[EventId],
    start: f64,
    end: f64,
) -> BTreeMap<Category, Series> {
    if events.is_empty() {
        let mut idle = Series::default();
        idle.push(end - start, end - start);
        return BTreeMap::from([(Category::Idle, idle)]);
    }
    walk(source, events, Accumulation::Segment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ThreadId;
    use crate::store::{Phase, DEVTOOLS_TIMELINE_CATEGORY};

    struct Events(Vec<Event>);

    impl EventSource for Events {
        fn event(&self, id: EventId) -> &Event {
            &self.0[id.index()]
        }
    }

    fn span(name: &str, start: f64, end: f64) -> Event {
        let mut event = Event::new(DEVTOOLS_TIMELINE_CATEGORY, name, Phase::Complete, start, ThreadId(0));
        event.set_end_time(end);
        event
    }

    fn ids(n: usize) -> Vec<EventId> {
        (0..n).map(EventId).collect()
    }

    fn task_with_layout() -> Events {
        Events(vec![
            span("RunTask", 0.0, 10.0),
            span("Layout", 2.0, 7.0),
            span("RunTask", 20.0, 30.0),
            span("FunctionCall", 20.0, 25.0),
        ])
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_full_range_breakdown() {
        let events = task_with_layout();
        let stats = stats_for_range(&events, &ids(4), 0.0, 40.0);
        assert!(close(stats[&Category::Rendering], 5.0));
        assert!(close(stats[&Category::Scripting], 5.0));
        assert!(close(stats[&Category::Other], 10.0));
        assert!(close(stats[&Category::Idle], 20.0));
    }

    #[test]
    fn test_partial_range_interpolates() {
        let events = task_with_layout();
        let breakdown = CategoryBreakdown::build(&events, &ids(4));
        let stats = breakdown.stats_for_range(4.0, 22.0);
        // Layout 4..7, RunTask 7..10, FunctionCall 20..22
        assert!(close(stats[&Category::Rendering], 3.0));
        assert!(close(stats[&Category::Other], 3.0));
        assert!(close(stats[&Category::Scripting], 2.0));
        assert!(close(stats[&Category::Idle], 10.0));
    }

    #[test]
    fn test_hidden_events_do_not_count() {
        let events = Events(vec![span("RunTask", 0.0, 10.0), span("DrawFrame", 1.0, 9.0)]);
        let stats = stats_for_range(&events, &ids(2), 0.0, 10.0);
        assert!(close(stats[&Category::Other], 10.0));
        assert!(!stats.contains_key(&Category::Rendering));
    }

    #[test]
    fn test_empty_events_are_idle() {
        let events = Events(Vec::new());
        let stats = stats_for_range(&events, &[], 5.0, 15.0);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[&Category::Idle], 10.0);

        let detail = detail_stats(&events, &[], 5.0, 15.0);
        assert_eq!(detail[&Category::Idle].values, vec![10.0]);
    }

    #[test]
    fn test_detail_segments() {
        let events = task_with_layout();
        let detail = detail_stats(&events, &ids(4), 0.0, 40.0);
        let rendering = &detail[&Category::Rendering];
        assert_eq!(rendering.times, vec![2.0, 7.0]);
        assert_eq!(rendering.values, vec![0.0, 5.0]);
        let other = &detail[&Category::Other];
        assert_eq!(other.times, vec![0.0, 2.0, 7.0, 10.0, 20.0, 25.0, 30.0]);
        assert_eq!(other.values, vec![0.0, 2.0, 0.0, 3.0, 0.0, 0.0, 5.0]);
    }
}
