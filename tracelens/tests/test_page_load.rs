//! Query façade over a small recorded page load: one renderer main thread,
//! an image decoder pool thread and the GPU process.

use std::path::PathBuf;

use tracelens::analysis::Category;
use tracelens::config::ModelOptions;
use tracelens::domain::QueryError;
use tracelens::query::TraceAnalysis;
use tracelens::timeline::{TrackType, WarningType};

fn page_load() -> TraceAnalysis {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/page_load.json");
    TraceAnalysis::load(path, &ModelOptions::default()).expect("page load fixture")
}

fn assert_close(actual: f64, expected: f64) {
    assert!((actual - expected).abs() < 1e-6, "expected {expected}, got {actual}");
}

#[test]
fn test_main_and_gpu_tracks_found() {
    let analysis = page_load();
    assert!(!analysis.model().is_generic_trace());
    assert_eq!(analysis.model().page_url(), "https://app.example/");

    let main = analysis.main_track().expect("main track");
    assert_eq!(main.name, "CrRendererMain");
    assert_eq!(main.kind, TrackType::MainThread);
    assert!(main.for_main_frame);

    let gpu = analysis.gpu_track().expect("gpu track");
    assert_eq!(gpu.kind, TrackType::Gpu);
    assert_eq!(gpu.events.len(), 2);
}

#[test]
fn test_summary_over_recorded_range() {
    let analysis = page_load();
    let summary = analysis.summary(None, None);
    assert_close(summary.start_time, 1.0);
    assert_close(summary.end_time, 302.0);

    assert_close(summary.time(Category::Scripting), 60.0);
    assert_close(summary.time(Category::Rendering), 40.0);
    assert_close(summary.time(Category::Painting), 10.0);
    assert_close(summary.time(Category::Other), 190.0);
    assert_close(summary.time(Category::Idle), 1.0);
}

#[test]
fn test_summary_window_is_additive() {
    let analysis = page_load();
    let whole = analysis.summary(Some(0.0), Some(200.0));
    let left = analysis.summary(Some(0.0), Some(80.0));
    let right = analysis.summary(Some(80.0), Some(200.0));
    for category in Category::ALL {
        assert_close(whole.time(category), left.time(category) + right.time(category));
    }
}

#[test]
fn test_gpu_usage() {
    let analysis = page_load();
    let gpu = analysis.gpu_usage(None, None);
    assert_close(gpu.time(Category::Gpu), 30.0);
    assert_close(gpu.time(Category::Idle), 301.0 - 30.0);
}

#[test]
fn test_usage_series_windows() {
    let analysis = page_load();
    let usage = analysis.usage_series(Some(0.0), Some(200.0), 100.0).unwrap();
    assert_eq!(usage.times, vec![0.0, 100.0]);
    // EventDispatch 3..63 ms
    assert_close(usage.scripting[0], 0.6);
    assert_close(usage.scripting[1], 0.0);
    // GPUTask 130..150 and 160..170 ms
    assert_close(usage.gpu[0], 0.0);
    assert_close(usage.gpu[1], 0.3);

    assert_eq!(
        analysis.usage_series(None, None, 0.0).unwrap_err(),
        QueryError::InvalidStep(0.0)
    );
    assert!(matches!(
        analysis.usage_series(Some(50.0), Some(50.0), 10.0),
        Err(QueryError::EmptyRange { .. })
    ));
}

#[test]
fn test_long_task_and_handler_warnings() {
    let counts = page_load().warning_counts();
    assert_eq!(counts.get(&WarningType::LongTask), Some(&1));
    assert_eq!(counts.get(&WarningType::LongHandler), Some(&1));
}

#[test]
fn test_memory_counters_collapse_repeats() {
    let counters = page_load().memory_counters();
    let nodes = &counters["nodes"];
    assert_eq!(nodes.samples.times, vec![5.0, 150.0]);
    assert_eq!(nodes.samples.values, vec![40.0, 55.0]);
    assert_eq!(counters["jsHeapSizeUsed"].samples.values, vec![1_000_000.0, 1_500_000.0]);
    // Unchanged between the two updates
    assert_eq!(counters["documents"].samples.values, vec![1.0]);
    assert_eq!(counters["gpuMemoryUsedKB"].samples.len(), 0);
    assert_eq!(nodes.limit, None);
}

#[test]
fn test_activity_spans() {
    let analysis = page_load();

    let network = analysis.network_times().expect("network span");
    assert_close(network.start, 6.0);
    assert_close(network.end, 250.0);

    let decode = analysis.image_decode_times().expect("decode span");
    assert_close(decode.start, 125.0);
    assert_close(decode.end, 148.0);

    let click = analysis.click_time().expect("click span");
    assert_close(click.start, 3.0);
    assert_close(click.end, 63.0);
    assert_close(click.duration(), 60.0);
}

#[test]
fn test_network_request_fields() {
    let requests = page_load().model().network_requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.url.as_deref(), Some("https://app.example/data.json"));
    assert_eq!(request.request_method.as_deref(), Some("GET"));
    assert_eq!(request.transfer_size, 2048.0);
    assert_eq!(request.events.len(), 2);
}

#[test]
fn test_detail_stats_window() {
    let detail = page_load().detail_stats(Some(0.0), Some(100.0));
    assert_eq!(detail.range.times, vec![0.0, 100.0]);
    let scripting = &detail.categories[&Category::Scripting];
    let total: f64 = scripting.values.iter().sum();
    assert_close(total, 60.0);
}
