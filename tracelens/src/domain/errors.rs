//! Structured error types for tracelens
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Only malformed input is an error; tolerated anomalies are logged and
//! counted in the model diagnostics instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Trace file has no event array (expected a JSON array or a `traceEvents` field)")]
    MissingEventArray,

    #[error("Snapshot event {name} at {time}ms lacks the mandatory `snapshot` argument")]
    MissingSnapshot { name: String, time: f64 },

    #[error(
        "Async step phase mismatch for {name}: {previous} at {previous_time}ms vs. {phase} at {time}ms"
    )]
    AsyncPhaseMismatch {
        name: String,
        previous: char,
        previous_time: f64,
        phase: char,
        time: f64,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("CPU profile has {samples} samples but {deltas} time deltas")]
    SampleDeltaMismatch { samples: usize, deltas: usize },

    #[error("CPU profile has no nodes")]
    EmptyProfile,

    #[error("CPU profile node {0} is referenced but never defined")]
    UnknownNode(i64),

    #[error("CPU profile node {0} is reachable twice; the node graph is not a tree")]
    CyclicTree(i64),

    #[error("CPU profile has neither hit counts nor samples")]
    MissingHitCounts,

    #[error("Profile event on {thread} has no chunk group")]
    MissingProfileGroup { thread: String },

    #[error("Malformed CPU profile payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Failure of a whole trace load. Partial models are never returned.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// Rejected arguments to a query on a finished model.
#[derive(Error, Debug, PartialEq)]
pub enum QueryError {
    #[error("Usage step must be a positive number of milliseconds, got {0}")]
    InvalidStep(f64),

    #[error("Empty time range: {from}ms to {to}ms")]
    EmptyRange { from: f64, to: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_delta_mismatch_display() {
        let err = ProfileError::SampleDeltaMismatch {
            samples: 3,
            deltas: 2,
        };
        assert_eq!(err.to_string(), "CPU profile has 3 samples but 2 time deltas");
    }

    #[test]
    fn test_async_phase_mismatch_display() {
        let err = TraceError::AsyncPhaseMismatch {
            name: "Fetch".to_string(),
            previous: 'T',
            previous_time: 1.0,
            phase: 'p',
            time: 2.5,
        };
        let text = err.to_string();
        assert!(text.contains("Fetch"));
        assert!(text.contains("T at 1ms"));
        assert!(text.contains("p at 2.5ms"));
    }

    #[test]
    fn test_model_error_wraps_profile_error() {
        let err: ModelError = ProfileError::EmptyProfile.into();
        assert!(matches!(err, ModelError::Profile(ProfileError::EmptyProfile)));
    }
}
