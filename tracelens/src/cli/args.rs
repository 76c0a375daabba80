//! CLI argument definitions

use crate::config::ModelOptions;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Which report to print
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Report {
    /// Main thread time per category
    Summary,
    /// GPU track time per category
    Gpu,
    /// Frame rate of every rendering frame
    Fps,
    /// Warning counts on the main thread
    Warnings,
    /// Memory counter graphs
    Memory,
    /// Network and image decode spans
    Network,
    /// Scripting and GPU busy fractions per --step window
    Usage,
    /// Per-category segment series of the main thread
    Detail,
    /// Everything above
    All,
}

#[derive(Parser, Debug)]
#[command(
    name = "tracelens",
    version,
    about = "Rebuild a timeline model from a browser performance trace and report on it",
    after_help = "\
EXAMPLES:
    tracelens trace.json                          Category summary of the main thread
    tracelens trace.json --from 1200 --to 4800    Summary of a window (ms)
    tracelens trace.json --report usage --step 5  Busy fractions in 5ms windows
    tracelens trace.json --report all --json      Every report as JSON"
)]
pub struct Args {
    /// Trace file: a JSON event array or an object with `traceEvents`
    #[arg(value_name = "TRACE")]
    pub trace: PathBuf,

    /// Window start in ms (defaults to the first recorded event)
    #[arg(long, value_name = "MS")]
    pub from: Option<f64>,

    /// Window end in ms (defaults to the last recorded event)
    #[arg(long, value_name = "MS")]
    pub to: Option<f64>,

    #[arg(short, long, value_enum, default_value = "summary")]
    pub report: Report,

    /// Window length of the usage series in ms
    #[arg(long, default_value = "10", value_name = "MS")]
    pub step: f64,

    /// Print machine-readable JSON
    #[arg(long)]
    pub json: bool,

    /// Skip malformed trace structures instead of aborting
    #[arg(long)]
    pub lenient: bool,

    /// Keep native V8 frames in JS frame events
    #[arg(long)]
    pub show_native: bool,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    #[must_use]
    pub fn model_options(&self) -> ModelOptions {
        ModelOptions {
            strict: !self.lenient,
            show_native_functions: self.show_native,
            ..ModelOptions::default()
        }
    }

    /// Whether `report` is part of the requested output
    #[must_use]
    pub fn wants(&self, report: Report) -> bool {
        self.report == Report::All || self.report == report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["tracelens", "trace.json"]);
        assert_eq!(args.report, Report::Summary);
        assert_eq!(args.step, 10.0);
        assert!(args.model_options().strict);
        assert!(args.wants(Report::Summary));
        assert!(!args.wants(Report::Fps));
    }

    #[test]
    fn test_flags_map_to_options() {
        let args = Args::parse_from([
            "tracelens", "t.json", "--lenient", "--show-native", "--report", "all", "--from", "1.5",
        ]);
        let options = args.model_options();
        assert!(!options.strict);
        assert!(options.show_native_functions);
        assert_eq!(args.from, Some(1.5));
        assert!(args.wants(Report::Memory));
    }
}
