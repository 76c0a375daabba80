//! Network requests assembled from the resource events of the inspected
//! threads.

use super::arena::{global_event_id, EventSource};
use super::record_type::RecordType;
use crate::domain::{EventId, Pid};
use crate::store::{is_truthy, Event};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequest {
    /// `"{pid}.{requestId}"`
    pub key: String,
    pub url: Option<String>,
    pub request_method: Option<String>,
    pub mime_type: Option<String>,
    pub priority: Option<Value>,
    /// Zero when the request was already in flight at recording start
    pub start_time: f64,
    /// Infinite until a finish event is seen
    #[serde(serialize_with = "serialize_end_time")]
    pub end_time: f64,
    pub response_time: Option<f64>,
    pub transfer_size: f64,
    pub from_cache: bool,
    pub from_memory_cache: bool,
    pub from_service_worker: bool,
    #[serde(skip)]
    pub events: Vec<EventId>,
}

fn serialize_end_time<S: serde::Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_some(value)
    } else {
        serializer.serialize_none()
    }
}

impl NetworkRequest {
    fn new(key: String, id: EventId, event: &Event) -> Self {
        let mut request = Self {
            key,
            url: None,
            request_method: None,
            mime_type: None,
            priority: None,
            start_time: if RecordType::from_name(&event.name) == RecordType::ResourceSendRequest {
                event.start_time
            } else {
                0.0
            },
            end_time: f64::INFINITY,
            response_time: None,
            transfer_size: 0.0,
            from_cache: false,
            from_memory_cache: false,
            from_service_worker: false,
            events: Vec::new(),
        };
        request.add_event(id, event);
        request
    }

    fn add_event(&mut self, id: EventId, event: &Event) {
        self.events.push(id);
        self.start_time = self.start_time.min(event.start_time);
        let Some(data) = event.data() else {
            return;
        };
        let kind = RecordType::from_name(&event.name);
        let text = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);
        if let Some(mime_type) = text("mimeType") {
            self.mime_type = Some(mime_type);
        }
        if let Some(priority) = data.get("priority") {
            self.priority = Some(priority.clone());
        }
        if kind == RecordType::ResourceFinish {
            self.end_time = event.start_time;
        }
        // Seconds, unlike every other timestamp
        if let Some(finish) = data.get("finishTime").and_then(Value::as_f64).filter(|&t| t != 0.0) {
            self.end_time = finish * 1000.0;
        }
        if self.response_time.is_none()
            && matches!(kind, RecordType::ResourceReceiveResponse | RecordType::ResourceReceivedData)
        {
            self.response_time = Some(event.start_time);
        }
        let encoded = data.get("encodedDataLength").and_then(Value::as_f64).unwrap_or(0.0);
        match kind {
            RecordType::ResourceReceiveResponse => {
                self.from_cache |= is_truthy(data.get("fromCache"));
                self.from_memory_cache |= is_truthy(data.get("fromMemoryCache"));
                self.from_service_worker |= is_truthy(data.get("fromServiceWorker"));
                self.transfer_size += encoded;
            }
            RecordType::ResourceReceivedData => self.transfer_size += encoded,
            RecordType::ResourceFinish if self.transfer_size == 0.0 => self.transfer_size = encoded,
            _ => {}
        }
        if self.url.is_none() {
            self.url = text("url");
        }
        if self.request_method.is_none() {
            self.request_method = text("requestMethod");
        }
    }
}

/// Group resource events by request. Requests first seen without their
/// send event (zero start) come first.
pub fn collect_network_requests<S: EventSource + ?Sized>(
    source: &S,
    events: &[EventId],
    pid_of: impl Fn(&Event) -> Pid,
) -> Vec<NetworkRequest> {
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut requests: Vec<NetworkRequest> = Vec::new();
    for &id in events {
        let event = source.event(id);
        let kind = RecordType::from_name(&event.name);
        if !matches!(
            kind,
            RecordType::ResourceSendRequest
                | RecordType::ResourceReceiveResponse
                | RecordType::ResourceReceivedData
                | RecordType::ResourceFinish
        ) {
            continue;
        }
        let Some(key) = global_event_id(event, pid_of(event), "requestId") else {
            continue;
        };
        match by_key.get(&key) {
            Some(&index) => requests[index].add_event(id, event),
            None => {
                by_key.insert(key.clone(), requests.len());
                requests.push(NetworkRequest::new(key, id, event));
            }
        }
    }
    let (zero_start, started): (Vec<_>, Vec<_>) =
        requests.into_iter().partition(|request| request.start_time == 0.0);
    zero_start.into_iter().chain(started).collect()
}
