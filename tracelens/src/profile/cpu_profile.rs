//! CPU profile payloads as they appear in a trace.
//!
//! Two shapes exist. The legacy one nests every node under a single `head`
//! and records raw timestamps with start/end in seconds. The current one is a
//! flat `nodes` array with `timeDeltas` in microseconds, which a trace may
//! split across a `Profile` event and any number of `ProfileChunk` events.

use crate::domain::{ProfileError, ThreadId};
use crate::store::EventStore;
use crate::trace_data::{deserialize_optional_string_or_number, deserialize_string_or_number};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Function identity of one stack frame. Line and column are 0-based.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    #[serde(default)]
    pub function_name: String,
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    pub script_id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub line_number: i64,
    #[serde(default)]
    pub column_number: i64,
}

impl CallFrame {
    /// Frames that extend each other in a JS frame stack
    #[must_use]
    pub fn same_function(&self, other: &CallFrame) -> bool {
        self.script_id == other.script_id
            && self.function_name == other.function_name
            && self.line_number == other.line_number
    }
}

/// One node of a flat `nodes` array
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileNodePayload {
    pub id: i64,
    pub call_frame: Option<CallFrame>,
    // Pre-`callFrame` backends put the frame fields on the node itself,
    // with 1-based line and column numbers.
    pub function_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string_or_number")]
    pub script_id: Option<String>,
    pub url: Option<String>,
    pub line_number: Option<i64>,
    pub column_number: Option<i64>,
    pub hit_count: Option<u64>,
    pub children: Option<Vec<i64>>,
    pub parent: Option<i64>,
    pub deopt_reason: Option<String>,
}

/// One node of a legacy `head` tree
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyProfileNode {
    pub id: i64,
    pub call_frame: Option<CallFrame>,
    pub function_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string_or_number")]
    pub script_id: Option<String>,
    pub url: Option<String>,
    pub line_number: Option<i64>,
    pub column_number: Option<i64>,
    pub hit_count: Option<u64>,
    #[serde(default)]
    pub children: Vec<LegacyProfileNode>,
    pub deopt_reason: Option<String>,
}

/// A CPU profile before reconstruction, in either shape.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCpuProfile {
    pub head: Option<LegacyProfileNode>,
    pub nodes: Option<Vec<ProfileNodePayload>>,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub end_time: f64,
    pub samples: Option<Vec<i64>>,
    /// Legacy absolute timestamps (µs)
    pub timestamps: Option<Vec<f64>>,
    /// Current-format inter-sample deltas (µs)
    pub time_deltas: Option<Vec<f64>>,
    pub lines: Option<Vec<i64>>,
}

impl RawCpuProfile {
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.head.is_some()
    }

    /// Flatten the legacy `head` tree into a pre-order node array with
    /// explicit child id lists. No-op when `nodes` is already present.
    pub fn flatten_head(&mut self) {
        if self.nodes.is_some() {
            return;
        }
        let Some(head) = self.head.take() else {
            return;
        };
        let mut nodes = Vec::new();
        let mut stack = vec![head];
        while let Some(node) = stack.pop() {
            let child_ids = node.children.iter().map(|child| child.id).collect();
            nodes.push(ProfileNodePayload {
                id: node.id,
                call_frame: node.call_frame,
                function_name: node.function_name,
                script_id: node.script_id,
                url: node.url,
                line_number: node.line_number,
                column_number: node.column_number,
                hit_count: node.hit_count,
                children: Some(child_ids),
                parent: None,
                deopt_reason: node.deopt_reason,
            });
            stack.extend(node.children.into_iter().rev());
        }
        self.nodes = Some(nodes);
    }
}

/// Locate and assemble the CPU profile recorded for one thread.
///
/// A trailing legacy `CpuProfile` event wins. Otherwise the first `Profile`
/// event's chunk group is concatenated in arrival order.
pub fn extract_cpu_profile(
    store: &EventStore,
    thread: ThreadId,
) -> Result<Option<RawCpuProfile>, ProfileError> {
    let events = store.thread(thread).events();
    if let Some(&last) = events.last() {
        let event = store.event(last);
        if event.name == "CpuProfile" {
            if let Some(profile) = event.data().and_then(|data| data.get("cpuProfile")) {
                return Ok(Some(serde_json::from_value(profile.clone())?));
            }
        }
    }

    let Some(&profile_event) = events.iter().find(|&&e| store.event(e).name == "Profile") else {
        return Ok(None);
    };
    let Some(group) = store.profile_group(profile_event) else {
        return Err(ProfileError::MissingProfileGroup {
            thread: store.thread(thread).name.clone(),
        });
    };

    let mut profile = RawCpuProfile {
        start_time: store
            .event(profile_event)
            .data()
            .and_then(|data| data.get("startTime"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
        ..RawCpuProfile::default()
    };
    let mut nodes = Vec::new();
    let mut samples = Vec::new();
    let mut deltas = Vec::new();
    let mut lines = Vec::new();
    for &chunk in group {
        let empty = Map::new();
        let data = store.event(chunk).data().unwrap_or(&empty);
        if let Some(start) = data.get("startTime").and_then(Value::as_f64) {
            profile.start_time = start;
        }
        if let Some(end) = data.get("endTime").and_then(Value::as_f64) {
            profile.end_time = end;
        }
        let payload = data.get("cpuProfile");
        let chunk_samples: Vec<i64> = decode_array(payload.and_then(|p| p.get("samples")))?;
        let chunk_lines: Vec<i64> = match data.get("lines") {
            Some(value) => serde_json::from_value(value.clone())?,
            None => vec![0; chunk_samples.len()],
        };
        nodes.extend(decode_array::<ProfileNodePayload>(
            payload.and_then(|p| p.get("nodes")),
        )?);
        lines.extend(chunk_lines);
        samples.extend(chunk_samples);
        deltas.extend(decode_array::<f64>(data.get("timeDeltas"))?);
        if samples.len() != deltas.len() {
            return Err(ProfileError::SampleDeltaMismatch {
                samples: samples.len(),
                deltas: deltas.len(),
            });
        }
    }
    debug!(
        "Assembled CPU profile for {} from {} chunks: {} nodes, {} samples",
        store.thread(thread).name,
        group.len(),
        nodes.len(),
        samples.len()
    );
    if profile.end_time == 0.0 {
        profile.end_time = profile.start_time + deltas.iter().sum::<f64>();
    }
    profile.nodes = Some(nodes);
    profile.samples = Some(samples);
    profile.time_deltas = Some(deltas);
    profile.lines = Some(lines);
    Ok(Some(profile))
}

/// Decode an optional JSON array, treating an absent field as empty.
fn decode_array<T: serde::de::DeserializeOwned>(
    value: Option<&Value>,
) -> Result<Vec<T>, serde_json::Error> {
    match value {
        Some(value) => serde_json::from_value(value.clone()),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelOptions;
    use crate::trace_data::RawEvent;
    use serde_json::json;

    #[test]
    fn test_legacy_head_flattened_in_pre_order() {
        let mut profile: RawCpuProfile = serde_json::from_value(json!({
            "head": {
                "id": 1, "functionName": "(root)", "hitCount": 0,
                "children": [
                    { "id": 2, "functionName": "a", "hitCount": 1,
                      "children": [{ "id": 4, "functionName": "c", "hitCount": 2 }] },
                    { "id": 3, "functionName": "b", "hitCount": 1 }
                ]
            },
            "startTime": 1.0,
            "endTime": 2.0
        }))
        .unwrap();
        assert!(profile.is_legacy());
        profile.flatten_head();
        let nodes = profile.nodes.unwrap();
        let ids: Vec<i64> = nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 4, 3]);
        assert_eq!(nodes[0].children, Some(vec![2, 3]));
    }

    #[test]
    fn test_numeric_script_id_accepted() {
        let frame: CallFrame = serde_json::from_value(json!({
            "functionName": "f", "scriptId": 42, "url": "", "lineNumber": 3, "columnNumber": 1
        }))
        .unwrap();
        assert_eq!(frame.script_id, "42");
    }

    fn chunked_trace(second_deltas: Value) -> EventStore {
        let events = vec![
            RawEvent::new("P", "Profile", "v8", 1000.0)
                .with_id("0x1")
                .with_args(json!({ "data": { "startTime": 1000 } })),
            RawEvent::new("P", "ProfileChunk", "v8", 2000.0)
                .with_id("0x1")
                .with_args(json!({ "data": {
                    "cpuProfile": {
                        "nodes": [
                            { "id": 1, "callFrame": { "functionName": "(root)" } },
                            { "id": 2, "parent": 1, "callFrame": { "functionName": "a" } }
                        ],
                        "samples": [2, 2]
                    },
                    "timeDeltas": [10, 20]
                }})),
            RawEvent::new("P", "ProfileChunk", "v8", 3000.0)
                .with_id("0x1")
                .with_args(json!({ "data": {
                    "cpuProfile": { "samples": [1] },
                    "timeDeltas": second_deltas
                }})),
        ];
        EventStore::from_raw(events, &ModelOptions::default()).unwrap()
    }

    #[test]
    fn test_chunks_concatenated_in_arrival_order() {
        let store = chunked_trace(json!([30]));
        let profile = extract_cpu_profile(&store, ThreadId(0)).unwrap().unwrap();
        assert_eq!(profile.samples, Some(vec![2, 2, 1]));
        assert_eq!(profile.lines, Some(vec![0, 0, 0]));
        assert_eq!(profile.nodes.as_ref().map(Vec::len), Some(2));
        assert_eq!(profile.start_time, 1000.0);
        assert_eq!(profile.end_time, 1060.0);
    }

    #[test]
    fn test_chunk_delta_mismatch_is_an_error() {
        let store = chunked_trace(json!([30, 40]));
        let err = extract_cpu_profile(&store, ThreadId(0)).unwrap_err();
        assert!(matches!(
            err,
            ProfileError::SampleDeltaMismatch { samples: 3, deltas: 4 }
        ));
    }

    #[test]
    fn test_trailing_cpu_profile_event_wins() {
        let events = vec![
            RawEvent::new("X", "RunTask", "toplevel", 0.0).with_dur(10.0),
            RawEvent::new("I", "CpuProfile", "v8", 5000.0).with_args(json!({ "data": {
                "cpuProfile": {
                    "nodes": [{ "id": 1, "callFrame": { "functionName": "(root)" } }],
                    "startTime": 0, "endTime": 100, "samples": [], "timeDeltas": []
                }
            }})),
        ];
        let store = EventStore::from_raw(events, &ModelOptions::default()).unwrap();
        let profile = extract_cpu_profile(&store, ThreadId(0)).unwrap().unwrap();
        assert_eq!(profile.end_time, 100.0);
        assert!(!profile.is_legacy());
    }

    #[test]
    fn test_thread_without_profile() {
        let store = EventStore::from_raw(
            vec![RawEvent::new("X", "RunTask", "toplevel", 0.0).with_dur(10.0)],
            &ModelOptions::default(),
        )
        .unwrap();
        assert!(extract_cpu_profile(&store, ThreadId(0)).unwrap().is_none());
    }
}
