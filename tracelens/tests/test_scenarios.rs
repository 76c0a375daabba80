use std::path::PathBuf;

use tracelens::config::ModelOptions;
use tracelens::diagnostics::Anomaly;
use tracelens::domain::{EventId, NodeId};
use tracelens::profile::{CallTreeNode, FrameSink};
use tracelens::timeline::{EventSource, TimelineModel, TrackType};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn load(name: &str) -> TimelineModel {
    TimelineModel::load(fixture(name), &ModelOptions::default()).expect("fixture should load")
}

fn find(model: &TimelineModel, name: &str) -> EventId {
    (0..model.store().events().len())
        .map(EventId)
        .find(|&id| model.event(id).name == name)
        .unwrap_or_else(|| panic!("no {name} event"))
}

#[derive(Default)]
struct RootFrames(Vec<(String, f64, f64)>);

impl FrameSink for RootFrames {
    fn open_frame(&mut self, _depth: i32, _node: &CallTreeNode, _time: f64) {}

    fn close_frame(&mut self, depth: i32, node: &CallTreeNode, start: f64, duration: f64, _self_time: f64) {
        if depth == 0 {
            self.0.push((node.function_name().to_string(), start, duration));
        }
    }
}

#[test]
fn test_nested_begin_end_self_time() {
    let model = load("scenario_a_nested.json");
    let outer = find(&model, "Outer");
    let inner = find(&model, "Inner");

    assert_eq!(model.event(outer).duration(), 10.0);
    assert_eq!(model.event(inner).duration(), 5.0);
    assert_eq!(model.annotation(outer).map(|a| a.self_time), Some(5.0));
    assert_eq!(model.annotation(inner).map(|a| a.self_time), Some(5.0));

    let main = &model.tracks()[0];
    assert_eq!(main.kind, TrackType::MainThread);
    assert_eq!(main.name, "CrRendererMain");
    assert_eq!(main.tasks, vec![outer]);
}

#[test]
fn test_cpu_profile_alternating_samples() {
    let model = load("scenario_b_profile.json");
    assert_eq!(model.cpu_profiles().len(), 1);
    let profile = &model.cpu_profiles()[0];

    let a = profile.node(NodeId(1));
    let b = profile.node(NodeId(2));
    assert_eq!(a.function_name(), "A");
    assert_eq!(b.function_name(), "B");
    assert_eq!(a.hit_count, 2);
    assert_eq!((a.self_time, b.self_time), (200.0, 100.0));
    assert_eq!(b.call_frame.line_number, 4);

    let mut frames = RootFrames::default();
    profile.for_each_frame(&mut frames, 0.0, None);
    assert_eq!(
        frames.0,
        vec![
            ("A".to_string(), 0.0, 100.0),
            ("B".to_string(), 100.0, 100.0),
            ("A".to_string(), 200.0, 100.0),
        ]
    );
}

#[test]
fn test_program_sample_repaired() {
    let model = load("scenario_c_program.json");
    let profile = &model.cpu_profiles()[0];
    assert_eq!(profile.repaired_samples(), 1);
    assert_eq!(profile.samples()[5], profile.samples()[4]);
    // The trailing (program) sample has no matching neighbour
    assert_eq!(Some(profile.samples()[7]), profile.program_node());
    assert_eq!(model.diagnostics().count(Anomaly::RepairedSample), 1);
}

#[test]
fn test_response_initiated_by_send_request() {
    let model = load("scenario_d_request.json");
    let send = find(&model, "ResourceSendRequest");
    let response = find(&model, "ResourceReceiveResponse");
    let first_task = find(&model, "RunTask");

    assert_eq!(model.annotations().initiator(response), Some(send));
    // The send itself is attributed to the task it ran in
    assert_eq!(model.annotations().initiator(send), Some(first_task));
    // Inherited from the initiator
    assert_eq!(model.annotations().frame_id(response), "F1");
}
