//! Command-line surface: arguments and report rendering.

pub mod args;
pub mod report;

pub use args::{Args, Report};
pub use report::{json_report, write_text_report};
