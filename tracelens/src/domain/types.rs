//! Newtype wrappers for process identities and arena indices.
//!
//! Raw trace ids (`Pid`, `Tid`) come straight from the file. Everything else is
//! an index into an arena owned by the model, so lookups are plain slice
//! indexing and never dynamic property access.

use serde::Serialize;
use std::fmt;

/// Process id as recorded in the trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct Pid(pub i64);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{}", self.0)
    }
}

impl From<i64> for Pid {
    fn from(pid: i64) -> Self {
        Pid(pid)
    }
}

/// Thread id as recorded in the trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct Tid(pub i64);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

impl From<i64> for Tid {
    fn from(tid: i64) -> Self {
        Tid(tid)
    }
}

macro_rules! arena_index {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);

        impl $name {
            #[must_use]
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

arena_index!(
    /// Index of an event in the model's event arena (raw and synthetic events share one id space)
    EventId,
    "event"
);
arena_index!(
    /// Index of a stitched async operation in the store
    AsyncEventId,
    "async"
);
arena_index!(
    /// Index of a thread in the store, distinct from the OS-level [`Tid`]
    ThreadId,
    "thread"
);
arena_index!(
    /// Index of a call-tree node; ids are depth-first contiguous with the root at 0
    NodeId,
    "node"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_display() {
        assert_eq!(Pid(1234).to_string(), "PID:1234");
        assert_eq!(Tid::from(7).to_string(), "TID:7");
    }

    #[test]
    fn test_arena_index_display() {
        assert_eq!(EventId(3).to_string(), "event#3");
        assert_eq!(NodeId(0).index(), 0);
    }
}
