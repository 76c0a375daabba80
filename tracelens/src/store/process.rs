//! Process and thread ownership.

use crate::domain::{AsyncEventId, EventId, Pid, ThreadId, Tid};
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Process {
    pub pid: Pid,
    pub name: String,
    pub sort_index: i64,
    /// Threads in creation order
    pub(crate) threads: Vec<ThreadId>,
    pub(crate) thread_by_tid: HashMap<Tid, ThreadId>,
    pub(crate) thread_by_name: HashMap<String, ThreadId>,
}

impl Process {
    pub(crate) fn new(pid: Pid) -> Self {
        Self {
            pid,
            name: String::new(),
            sort_index: 0,
            threads: Vec::new(),
            thread_by_tid: HashMap::new(),
            thread_by_name: HashMap::new(),
        }
    }

    #[must_use]
    pub fn thread_by_tid(&self, tid: Tid) -> Option<ThreadId> {
        self.thread_by_tid.get(&tid).copied()
    }

    #[must_use]
    pub fn thread_by_name(&self, name: &str) -> Option<ThreadId> {
        self.thread_by_name.get(name).copied()
    }

    /// Threads in creation order; see [`super::EventStore::sorted_threads`]
    /// for display order.
    #[must_use]
    pub fn threads(&self) -> &[ThreadId] {
        &self.threads
    }
}

#[derive(Debug, Clone)]
pub struct Thread {
    pub id: ThreadId,
    pub pid: Pid,
    pub tid: Tid,
    pub name: String,
    pub sort_index: i64,
    /// Time-sorted and Begin/End balanced once the store is finalized
    pub(crate) events: Vec<EventId>,
    pub(crate) async_events: Vec<AsyncEventId>,
    pub(crate) last_top_level: Option<EventId>,
}

impl Thread {
    pub(crate) fn new(id: ThreadId, pid: Pid, tid: Tid) -> Self {
        Self {
            id,
            pid,
            tid,
            name: String::new(),
            sort_index: 0,
            events: Vec::new(),
            async_events: Vec::new(),
            last_top_level: None,
        }
    }

    #[must_use]
    pub fn events(&self) -> &[EventId] {
        &self.events
    }

    #[must_use]
    pub fn async_events(&self) -> &[AsyncEventId] {
        &self.async_events
    }
}

/// Display order shared by processes and threads: sort index, then name.
pub(crate) fn compare_named(
    a_index: i64,
    a_name: &str,
    b_index: i64,
    b_name: &str,
) -> Ordering {
    a_index.cmp(&b_index).then_with(|| a_name.cmp(b_name))
}
