//! Reconstruction options.
//!
//! The CLI maps its flags onto [`ModelOptions`]; library callers build one
//! directly or take the defaults.

/// Warning thresholds, all in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// `RunTask` longer than this gets a LongTask warning
    pub long_task: f64,
    /// `EventDispatch`, `TimerFire` and `FireAnimationFrame` handlers longer than this are flagged
    pub recurring_handler: f64,
    /// Combined layout/style time under one script above this marks each of them as forced
    pub forced_layout: f64,
    /// Slack granted to an idle callback beyond its allotted time
    pub idle_callback_addon: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            long_task: 200.0,
            recurring_handler: 50.0,
            forced_layout: 30.0,
            idle_callback_addon: 5.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelOptions {
    /// Abort the load on structural problems (missing snapshot payloads,
    /// async step-phase mismatches). When false these are logged and skipped.
    /// A CPU profile whose samples and time deltas disagree always aborts.
    pub strict: bool,
    /// Keep `native ...` frames when deriving JS frame events
    pub show_native_functions: bool,
    pub thresholds: Thresholds,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            strict: true,
            show_native_functions: false,
            thresholds: Thresholds::default(),
        }
    }
}

impl ModelOptions {
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            strict: false,
            ..Self::default()
        }
    }
}
