//! Generic nesting driver over a time-sorted event list.
//!
//! Opens and closes duration events in start order using an explicit stack,
//! the same discipline the store applies to Begin/End pairs. Async and flow
//! phases are skipped; zero-length events are reported as instants with their
//! enclosing event.

use super::arena::EventSource;
use crate::domain::EventId;
use crate::store::Event;

/// Callbacks of [`for_each_event`]. Every method defaults to a no-op.
pub trait EventVisitor {
    fn on_start(&mut self, _id: EventId, _event: &Event) {}

    fn on_end(&mut self, _id: EventId, _event: &Event) {}

    fn on_instant(&mut self, _id: EventId, _event: &Event, _parent: Option<(EventId, &Event)>) {}
}

/// Index of the last top-level event starting at or before `time`, so a walk
/// from there sees every event still open at `time`.
#[must_use]
pub fn top_level_event_ending_after<S: EventSource + ?Sized>(
    source: &S,
    events: &[EventId],
    time: f64,
) -> usize {
    let upper = events.partition_point(|&id| source.event(id).start_time <= time);
    let mut index = upper.saturating_sub(1);
    while index > 0 && !source.event(events[index]).is_top_level() {
        index -= 1;
    }
    index
}

/// Walk `events` (sorted by start) over `[start, end)`, calling the visitor
/// as intervals open and close. `filter` hides events from the visitor
/// without affecting how the ones already open are closed.
pub fn for_each_event<S, V>(
    source: &S,
    events: &[EventId],
    visitor: &mut V,
    start: f64,
    end: f64,
    filter: Option<&dyn Fn(&Event) -> bool>,
) where
    S: EventSource + ?Sized,
    V: EventVisitor + ?Sized,
{
    let mut stack: Vec<EventId> = Vec::new();
    let first = top_level_event_ending_after(source, events, start);
    for &id in events.iter().skip(first) {
        let event = source.event(id);
        if event.end_or_start() < start {
            continue;
        }
        if event.start_time >= end {
            break;
        }
        if event.phase.is_async() || event.phase.is_flow() {
            continue;
        }
        while let Some(&top) = stack.last() {
            let open = source.event(top);
            if open.end_or_start() > event.start_time {
                break;
            }
            stack.pop();
            visitor.on_end(top, open);
        }
        if filter.is_some_and(|keep| !keep(event)) {
            continue;
        }
        if event.duration() > 0.0 {
            visitor.on_start(id, event);
            stack.push(id);
        } else {
            let parent = stack.last().map(|&p| (p, source.event(p)));
            visitor.on_instant(id, event, parent);
        }
    }
    while let Some(top) = stack.pop() {
        visitor.on_end(top, source.event(top));
    }
}
