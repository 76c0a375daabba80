//! Async cause tracking.
//!
//! Initiators (`TimerInstall`, `ResourceSendRequest`, ...) are remembered by
//! their process-scoped join key; a caused event with the same key gets the
//! initiator attached as its cause.

use super::annotations::Annotations;
use super::arena::{event_frame_id, global_event_id};
use super::record_type::RecordType;
use crate::domain::{EventId, Pid};
use crate::store::Event;
use std::collections::HashMap;

struct CauseRule {
    initiator: RecordType,
    caused: &'static [RecordType],
    join_by: &'static str,
}

const CAUSE_RULES: &[CauseRule] = &[
    CauseRule {
        initiator: RecordType::TimerInstall,
        caused: &[RecordType::TimerFire],
        join_by: "timerId",
    },
    CauseRule {
        initiator: RecordType::ResourceSendRequest,
        caused: &[
            RecordType::ResourceReceiveResponse,
            RecordType::ResourceReceivedData,
            RecordType::ResourceFinish,
        ],
        join_by: "requestId",
    },
    CauseRule {
        initiator: RecordType::RequestAnimationFrame,
        caused: &[RecordType::FireAnimationFrame],
        join_by: "id",
    },
    CauseRule {
        initiator: RecordType::RequestIdleCallback,
        caused: &[RecordType::FireIdleCallback],
        join_by: "id",
    },
    CauseRule {
        initiator: RecordType::WebSocketCreate,
        caused: &[
            RecordType::WebSocketSendHandshakeRequest,
            RecordType::WebSocketReceiveHandshakeResponse,
            RecordType::WebSocketDestroy,
        ],
        join_by: "identifier",
    },
];

/// Rule an event takes part in, and whether it is the initiator side
fn rule_for(kind: RecordType) -> Option<(&'static CauseRule, bool)> {
    CAUSE_RULES.iter().find_map(|rule| {
        if rule.initiator == kind {
            Some((rule, true))
        } else if rule.caused.contains(&kind) {
            Some((rule, false))
        } else {
            None
        }
    })
}

struct Initiator {
    event: EventId,
    frame_id: String,
}

/// Remembered initiators, one table per initiator kind.
#[derive(Default)]
pub struct AsyncEventTracker {
    initiators: HashMap<RecordType, HashMap<String, Initiator>>,
}

impl AsyncEventTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember an initiator, or link a caused event to its initiator. A
    /// caused event whose frame is still unknown takes the initiator's.
    pub fn process_event(
        &mut self,
        id: EventId,
        event: &Event,
        kind: RecordType,
        pid: Pid,
        annotations: &mut Annotations,
    ) {
        let Some((rule, is_initiator)) = rule_for(kind) else {
            return;
        };
        let Some(key) = global_event_id(event, pid, rule.join_by) else {
            return;
        };
        let table = self.initiators.entry(rule.initiator).or_default();
        if is_initiator {
            table.insert(
                key,
                Initiator {
                    event: id,
                    frame_id: event_frame_id(event).to_string(),
                },
            );
            return;
        }
        let initiator = table.get(&key);
        annotations.set_initiator(id, initiator.map(|i| i.event));
        if let Some(initiator) = initiator {
            let annotation = annotations.get_mut(id);
            if annotation.frame_id.is_empty() {
                annotation.frame_id.clone_from(&initiator.frame_id);
            }
        }
    }
}
