//! Memory counters sampled by `UpdateCounters` events.

use super::category_aggregator::Series;
use crate::domain::EventId;
use crate::timeline::record_type::RecordType;
use crate::timeline::EventSource;
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Counter names reported, in `UpdateCounters` data
pub const MEMORY_COUNTERS: [&str; 5] = ["jsHeapSizeUsed", "documents", "nodes", "jsEventListeners", "gpuMemoryUsedKB"];

const GPU_MEMORY_USED: &str = "gpuMemoryUsedKB";
const GPU_MEMORY_LIMIT: &str = "gpuMemoryLimitKB";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Counter {
    #[serde(flatten)]
    pub samples: Series,
    /// Upper bound reported alongside the samples, GPU memory only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
}

impl Counter {
    /// Repeats of the previous value add nothing to the graph
    fn append_sample(&mut self, time: f64, value: f64) {
        if self.samples.values.last() == Some(&value) {
            return;
        }
        self.samples.times.push(time);
        self.samples.values.push(value);
    }
}

/// Every known counter over `events`; counters never sampled stay empty.
pub fn memory_counters<S: EventSource + ?Sized>(source: &S, events: &[EventId]) -> BTreeMap<&'static str, Counter> {
    let mut counters: BTreeMap<&'static str, Counter> =
        MEMORY_COUNTERS.iter().map(|&name| (name, Counter::default())).collect();
    for &id in events {
        let event = source.event(id);
        if RecordType::from_name(&event.name) != RecordType::UpdateCounters {
            continue;
        }
        let Some(data) = event.data() else {
            debug!("UpdateCounters at {} without data, counters stop here", event.start_time);
            break;
        };
        for (name, counter) in &mut counters {
            if let Some(value) = data.get(*name).and_then(Value::as_f64) {
                counter.append_sample(event.start_time, value);
            }
        }
        if let Some(limit) = data.get(GPU_MEMORY_LIMIT).and_then(Value::as_f64) {
            if let Some(gpu) = counters.get_mut(GPU_MEMORY_USED) {
                gpu.limit = Some(limit);
            }
        }
    }
    counters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ThreadId;
    use crate::store::{Event, Phase};
    use serde_json::json;

    struct Events(Vec<Event>);

    impl EventSource for Events {
        fn event(&self, id: EventId) -> &Event {
            &self.0[id.index()]
        }
    }

    fn update(time: f64, data: Value) -> Event {
        let mut event = Event::new("disabled-by-default-devtools.timeline", "UpdateCounters", Phase::Instant, time, ThreadId(0));
        event.add_args(json!({ "data": data }).as_object().unwrap().clone());
        event
    }

    #[test]
    fn test_equal_samples_collapse() {
        let events = Events(vec![
            update(1.0, json!({"nodes": 10, "documents": 1})),
            update(2.0, json!({"nodes": 10, "documents": 2})),
            update(3.0, json!({"nodes": 12, "gpuMemoryUsedKB": 300, "gpuMemoryLimitKB": 1024})),
        ]);
        let ids: Vec<EventId> = (0..3).map(EventId).collect();
        let counters = memory_counters(&events, &ids);
        assert_eq!(counters["nodes"].samples.times, vec![1.0, 3.0]);
        assert_eq!(counters["nodes"].samples.values, vec![10.0, 12.0]);
        assert_eq!(counters["documents"].samples.values, vec![1.0, 2.0]);
        assert_eq!(counters["gpuMemoryUsedKB"].limit, Some(1024.0));
        assert!(counters["jsHeapSizeUsed"].samples.is_empty());
    }
}
