//! Query façade over a reconstructed timeline.
//!
//! Answers the questions the CLI reports on: category breakdowns of the
//! main and GPU tracks, frame rate, warning counts, memory counters and a
//! few overall spans. Every time window defaults to the recorded range.
//!
//! Lookups that find nothing degrade instead of failing: without a main
//! frame track the track with the most events stands in, and a missing GPU
//! track reports the whole window as idle.

use crate::analysis::{detail_stats, memory_counters, Category, CategoryBreakdown, CategoryStats, Counter, Series};
use crate::config::ModelOptions;
use crate::domain::{EventId, ModelError, QueryError};
use crate::timeline::{EventSource, RecordType, TimelineModel, Track, TrackType, WarningType};
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

/// Thread name of the pool that decodes images off the main thread
pub const IMAGE_DECODE_THREAD_NAME: &str = "ThreadPoolForegroundWorker";

// =============================================================================
// RESULT TYPES
// =============================================================================

/// Category breakdown of one window
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeStats {
    #[serde(flatten)]
    pub categories: CategoryStats,
    pub start_time: f64,
    pub end_time: f64,
}

impl RangeStats {
    /// Time spent in `category`, zero when it never occurred
    #[must_use]
    pub fn time(&self, category: Category) -> f64 {
        self.categories.get(&category).copied().unwrap_or(0.0)
    }

    /// Share of the window spent in `category`
    #[must_use]
    pub fn fraction(&self, category: Category) -> f64 {
        let range = self.end_time - self.start_time;
        if range > 0.0 {
            self.time(category) / range
        } else {
            0.0
        }
    }
}

/// Busy fractions per fixed-size window
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageSeries {
    /// Window start times
    pub times: Vec<f64>,
    pub scripting: Vec<f64>,
    pub gpu: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeSpan {
    pub start: f64,
    pub end: f64,
}

impl TimeSpan {
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    fn extend(span: Option<TimeSpan>, start: f64, end: f64) -> Option<TimeSpan> {
        Some(match span {
            Some(span) => TimeSpan {
                start: span.start.min(start),
                end: span.end.max(end),
            },
            None => TimeSpan { start, end },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailStats {
    #[serde(flatten)]
    pub categories: BTreeMap<Category, Series>,
    /// The queried window, as `[from, to]` in both arrays
    pub range: Series,
}

// =============================================================================
// TRACE ANALYSIS
// =============================================================================

/// A loaded trace plus the lazily built caches its queries share.
#[derive(Debug)]
pub struct TraceAnalysis {
    model: TimelineModel,
    main_track: Option<usize>,
    gpu_track: Option<usize>,
    main_breakdown: OnceLock<CategoryBreakdown>,
    gpu_breakdown: OnceLock<CategoryBreakdown>,
}

impl TraceAnalysis {
    pub fn load(path: impl AsRef<Path>, options: &ModelOptions) -> Result<Self, ModelError> {
        Ok(Self::new(TimelineModel::load(path, options)?))
    }

    #[must_use]
    pub fn new(model: TimelineModel) -> Self {
        let main_track = find_main_track(model.tracks());
        let gpu_track = find_gpu_track(model.tracks());
        Self {
            model,
            main_track,
            gpu_track,
            main_breakdown: OnceLock::new(),
            gpu_breakdown: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn model(&self) -> &TimelineModel {
        &self.model
    }

    #[must_use]
    pub fn main_track(&self) -> Option<&Track> {
        self.main_track.map(|index| &self.model.tracks()[index])
    }

    #[must_use]
    pub fn gpu_track(&self) -> Option<&Track> {
        self.gpu_track.map(|index| &self.model.tracks()[index])
    }

    /// Events of the main track, empty when the trace has no tracks
    #[must_use]
    pub fn main_track_events(&self) -> &[EventId] {
        self.main_track().map_or(&[][..], |track| track.events.as_slice())
    }

    fn main_sync_events(&self) -> &[EventId] {
        self.main_track().map_or(&[][..], Track::sync_events)
    }

    /// `[from, to]` with the recorded range filling in missing bounds
    #[must_use]
    pub fn window(&self, from: Option<f64>, to: Option<f64>) -> (f64, f64) {
        (
            from.unwrap_or_else(|| self.model.minimum_record_time()),
            to.unwrap_or_else(|| self.model.maximum_record_time()),
        )
    }

    /// Main track time per category
    #[must_use]
    pub fn summary(&self, from: Option<f64>, to: Option<f64>) -> RangeStats {
        let (start_time, end_time) = self.window(from, to);
        let breakdown = self
            .main_breakdown
            .get_or_init(|| CategoryBreakdown::build(&self.model, self.main_sync_events()));
        RangeStats {
            categories: breakdown.stats_for_range(start_time, end_time),
            start_time,
            end_time,
        }
    }

    /// GPU track time per category
    #[must_use]
    pub fn gpu_usage(&self, from: Option<f64>, to: Option<f64>) -> RangeStats {
        let (start_time, end_time) = self.window(from, to);
        let breakdown = self.gpu_breakdown.get_or_init(|| {
            let events = self.gpu_track().map_or(&[][..], Track::sync_events);
            CategoryBreakdown::build(&self.model, events)
        });
        RangeStats {
            categories: breakdown.stats_for_range(start_time, end_time),
            start_time,
            end_time,
        }
    }

    /// Scripting share of the main track and GPU share of the GPU track in
    /// consecutive `step`-long windows.
    pub fn usage_series(&self, from: Option<f64>, to: Option<f64>, step: f64) -> Result<UsageSeries, QueryError> {
        if !step.is_finite() || step <= 0.0 {
            return Err(QueryError::InvalidStep(step));
        }
        let (from, to) = self.window(from, to);
        if to <= from {
            return Err(QueryError::EmptyRange { from, to });
        }
        let mut series = UsageSeries::default();
        let mut time = from;
        while time < to {
            let end = time + step;
            series.times.push(time);
            series.scripting.push(self.summary(Some(time), Some(end)).fraction(Category::Scripting));
            series.gpu.push(self.gpu_usage(Some(time), Some(end)).fraction(Category::Gpu));
            time = end;
        }
        Ok(series)
    }

    /// From the first image decode start to the last decode end on the
    /// decoder thread pool
    #[must_use]
    pub fn image_decode_times(&self) -> Option<TimeSpan> {
        self.model
            .tracks()
            .iter()
            .filter(|track| track.name == IMAGE_DECODE_THREAD_NAME)
            .flat_map(|track| track.events.iter())
            .map(|&id| self.model.event(id))
            .filter(|event| RecordType::from_name(&event.name) == RecordType::DecodeImage)
            .fold(None, |span, event| TimeSpan::extend(span, event.start_time, event.end_or_start()))
    }

    /// From the first request start to the last finish. Requests that never
    /// finished only extend the start.
    #[must_use]
    pub fn network_times(&self) -> Option<TimeSpan> {
        self.model.network_requests().iter().fold(None, |span, request| {
            let end = if request.end_time.is_finite() {
                request.end_time
            } else {
                request.start_time
            };
            TimeSpan::extend(span, request.start_time, end)
        })
    }

    /// Frame rate of every rendering frame, keyed by frame start
    #[must_use]
    pub fn fps(&self) -> Series {
        let frames = self.model.frames(None, None);
        Series {
            times: frames.iter().map(|frame| frame.start_time).collect(),
            values: frames.iter().map(|frame| frame.fps()).collect(),
        }
    }

    /// Warnings on main track events
    #[must_use]
    pub fn warning_counts(&self) -> BTreeMap<WarningType, usize> {
        let mut counts = BTreeMap::new();
        for &id in self.main_track_events() {
            if let Some(warning) = self.model.annotations().warning(id) {
                *counts.entry(warning).or_insert(0) += 1;
            }
        }
        counts
    }

    #[must_use]
    pub fn memory_counters(&self) -> BTreeMap<&'static str, Counter> {
        memory_counters(&self.model, self.main_sync_events())
    }

    /// Segment series of the main track per category, with the window
    #[must_use]
    pub fn detail_stats(&self, from: Option<f64>, to: Option<f64>) -> DetailStats {
        let (start, end) = self.window(from, to);
        DetailStats {
            categories: detail_stats(&self.model, self.main_sync_events(), start, end),
            range: Series {
                times: vec![start, end],
                values: vec![start, end],
            },
        }
    }

    /// Span of the main track's click handling
    #[must_use]
    pub fn click_time(&self) -> Option<TimeSpan> {
        self.main_track_events()
            .iter()
            .map(|&id| self.model.event(id))
            .filter(|event| {
                event.data().is_some_and(|data| {
                    data.get("type").and_then(Value::as_str) == Some("click")
                        || data.get("interactionType").and_then(Value::as_str) == Some("tapOrClick")
                })
            })
            .fold(None, |span, event| TimeSpan::extend(span, event.start_time, event.end_or_start()))
    }
}

/// Main thread of the main frame, or the busiest track when there is none
fn find_main_track(tracks: &[Track]) -> Option<usize> {
    let main = tracks
        .iter()
        .position(|track| track.kind == TrackType::MainThread && track.for_main_frame && !track.events.is_empty());
    if main.is_some() {
        return main;
    }
    // Ties go to the later track
    let busiest = tracks
        .iter()
        .enumerate()
        .max_by_key(|(_, track)| track.events.len())
        .map(|(index, _)| index);
    if let Some(index) = busiest {
        debug!("No main frame track, using busiest track {}", tracks[index].name);
    }
    busiest
}

fn find_gpu_track(tracks: &[Track]) -> Option<usize> {
    let gpu: Vec<usize> = tracks
        .iter()
        .enumerate()
        .filter(|(_, track)| track.kind == TrackType::Gpu)
        .map(|(index, _)| index)
        .collect();
    if gpu.len() != 1 {
        warn!("Expected one GPU track, found {}", gpu.len());
    }
    gpu.first().copied()
}
