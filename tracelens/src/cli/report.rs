//! Report rendering for the CLI, as text tables or one JSON object.

// Counts are shown as f64 ratios
#![allow(clippy::cast_precision_loss)]

use super::args::{Args, Report};
use crate::analysis::Category;
use crate::query::{RangeStats, TimeSpan, TraceAnalysis};
use anyhow::Result;
use serde_json::{Map, Value};
use std::io::Write;

/// Every requested report keyed by name
pub fn json_report(analysis: &TraceAnalysis, args: &Args) -> Result<Value> {
    let mut out = Map::new();
    if args.wants(Report::Summary) {
        out.insert("summary".into(), serde_json::to_value(analysis.summary(args.from, args.to))?);
    }
    if args.wants(Report::Gpu) {
        out.insert("gpu".into(), serde_json::to_value(analysis.gpu_usage(args.from, args.to))?);
    }
    if args.wants(Report::Fps) {
        out.insert("fps".into(), serde_json::to_value(analysis.fps())?);
    }
    if args.wants(Report::Warnings) {
        out.insert("warnings".into(), serde_json::to_value(analysis.warning_counts())?);
    }
    if args.wants(Report::Memory) {
        out.insert("memory".into(), serde_json::to_value(analysis.memory_counters())?);
    }
    if args.wants(Report::Network) {
        out.insert("networkTimes".into(), serde_json::to_value(analysis.network_times())?);
        out.insert("imageDecodeTimes".into(), serde_json::to_value(analysis.image_decode_times())?);
        out.insert("clickTime".into(), serde_json::to_value(analysis.click_time())?);
    }
    if args.wants(Report::Usage) {
        out.insert("usage".into(), serde_json::to_value(analysis.usage_series(args.from, args.to, args.step)?)?);
    }
    if args.wants(Report::Detail) {
        out.insert("detail".into(), serde_json::to_value(analysis.detail_stats(args.from, args.to))?);
    }
    Ok(Value::Object(out))
}

pub fn write_text_report(out: &mut impl Write, analysis: &TraceAnalysis, args: &Args) -> Result<()> {
    if args.wants(Report::Summary) {
        write_range_stats(out, "MAIN THREAD", &analysis.summary(args.from, args.to))?;
    }
    if args.wants(Report::Gpu) {
        if analysis.gpu_track().is_none() {
            writeln!(out, "GPU: no GPU track in this trace")?;
        }
        write_range_stats(out, "GPU", &analysis.gpu_usage(args.from, args.to))?;
    }
    if args.wants(Report::Fps) {
        write_fps(out, analysis)?;
    }
    if args.wants(Report::Warnings) {
        writeln!(out, "WARNINGS")?;
        let counts = analysis.warning_counts();
        if counts.is_empty() {
            writeln!(out, "  none")?;
        }
        for (warning, count) in counts {
            writeln!(out, "  {:<22} {count:>6}", warning.to_string())?;
        }
        writeln!(out)?;
    }
    if args.wants(Report::Memory) {
        writeln!(out, "MEMORY COUNTERS")?;
        for (name, counter) in analysis.memory_counters() {
            let values = &counter.samples.values;
            let Some(&last) = values.last() else {
                writeln!(out, "  {name:<18} no samples")?;
                continue;
            };
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            write!(out, "  {name:<18} {:>5} samples  min {min:<12} max {max:<12} last {last}", values.len())?;
            if let Some(limit) = counter.limit {
                write!(out, "  limit {limit}")?;
            }
            writeln!(out)?;
        }
        writeln!(out)?;
    }
    if args.wants(Report::Network) {
        writeln!(out, "SPANS")?;
        write_span(out, "network", analysis.network_times())?;
        write_span(out, "image decode", analysis.image_decode_times())?;
        write_span(out, "click", analysis.click_time())?;
        writeln!(out)?;
    }
    if args.wants(Report::Usage) {
        let usage = analysis.usage_series(args.from, args.to, args.step)?;
        writeln!(out, "USAGE ({}ms windows)", args.step)?;
        writeln!(out, "  {:>12}  {:>9}  {:>6}", "start (ms)", "scripting", "gpu")?;
        for ((time, scripting), gpu) in usage.times.iter().zip(&usage.scripting).zip(&usage.gpu) {
            writeln!(out, "  {time:>12.3}  {:>8.1}%  {:>5.1}%", scripting * 100.0, gpu * 100.0)?;
        }
        writeln!(out)?;
    }
    if args.wants(Report::Detail) {
        let detail = analysis.detail_stats(args.from, args.to);
        writeln!(out, "DETAIL ({:.3} - {:.3} ms)", detail.range.times[0], detail.range.times[1])?;
        for (category, series) in &detail.categories {
            let total: f64 = series.values.iter().sum();
            writeln!(out, "  {:<10} {:>6} segments  {total:>12.3} ms", category.title(), series.len())?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_range_stats(out: &mut impl Write, title: &str, stats: &RangeStats) -> Result<()> {
    let range = stats.end_time - stats.start_time;
    writeln!(out, "{title} ({:.3} - {:.3} ms)", stats.start_time, stats.end_time)?;
    for category in Category::ALL {
        let Some(&time) = stats.categories.get(&category) else {
            continue;
        };
        let share = if range > 0.0 { time / range * 100.0 } else { 0.0 };
        writeln!(out, "  {:<10} {time:>12.3} ms  {share:>5.1}%", category.title())?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_fps(out: &mut impl Write, analysis: &TraceAnalysis) -> Result<()> {
    let fps = analysis.fps();
    writeln!(out, "FRAMES")?;
    if fps.is_empty() {
        writeln!(out, "  no rendering frames")?;
    } else {
        let finite: Vec<f64> = fps.values.iter().copied().filter(|v| v.is_finite()).collect();
        let mean = finite.iter().sum::<f64>() / finite.len().max(1) as f64;
        let lowest = finite.iter().copied().fold(f64::INFINITY, f64::min);
        writeln!(out, "  {} frames  mean {mean:.1} fps  lowest {lowest:.1} fps", fps.len())?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_span(out: &mut impl Write, label: &str, span: Option<TimeSpan>) -> Result<()> {
    match span {
        Some(span) => writeln!(
            out,
            "  {label:<13} {:.3} - {:.3} ms ({:.3} ms)",
            span.start,
            span.end,
            span.duration()
        )?,
        None => writeln!(out, "  {label:<13} none")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelOptions;
    use crate::timeline::TimelineModel;
    use crate::trace_data::{RawEvent, TraceFile};
    use clap::Parser;

    fn analysis() -> TraceAnalysis {
        let raw = vec![
            RawEvent::new("X", "RunTask", "disabled-by-default-devtools.timeline", 0.0).with_dur(8000.0),
            RawEvent::new("X", "Layout", "devtools.timeline", 1000.0).with_dur(2000.0),
        ];
        let model = TimelineModel::from_trace(TraceFile { events: raw }, &ModelOptions::lenient()).unwrap();
        TraceAnalysis::new(model)
    }

    #[test]
    fn test_json_holds_requested_reports_only() {
        let args = Args::parse_from(["tracelens", "t.json", "--report", "warnings"]);
        let value = json_report(&analysis(), &args).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["warnings"]);
    }

    #[test]
    fn test_json_summary_fields() {
        let args = Args::parse_from(["tracelens", "t.json"]);
        let value = json_report(&analysis(), &args).unwrap();
        let summary = &value["summary"];
        assert_eq!(summary["rendering"], 2.0);
        assert_eq!(summary["startTime"], 1.0);
        assert_eq!(summary["endTime"], 8.0);
    }

    #[test]
    fn test_text_report_lists_categories() {
        let args = Args::parse_from(["tracelens", "t.json", "--report", "all"]);
        let mut out = Vec::new();
        write_text_report(&mut out, &analysis(), &args).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("MAIN THREAD (1.000 - 8.000 ms)"));
        assert!(text.contains("Rendering"));
        assert!(text.contains("GPU: no GPU track"));
        assert!(text.contains("USAGE (10ms windows)"));
    }
}
