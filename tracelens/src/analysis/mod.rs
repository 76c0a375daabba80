//! Analysis over a reconstructed timeline
//!
//! Pure computations on finished tracks: legend categories, per-category
//! time breakdowns and counter graphs. Nothing here mutates the model.

pub mod categories;
pub mod category_aggregator;
pub mod counters;

pub use categories::{event_category, event_style, is_visible, Category, EventStyle, RecordStyle};
pub use category_aggregator::{detail_stats, stats_for_range, CategoryBreakdown, CategoryStats, Series};
pub use counters::{memory_counters, Counter, MEMORY_COUNTERS};
