//! The reconstructed timeline of one trace load.

use super::annotations::{Annotation, Annotations};
use super::arena::{EventArena, EventSource};
use super::classifier::Classifier;
use super::frame_model::{FrameModel, TimelineFrame};
use super::invalidation::{InvalidationRecord, InvalidationTracker};
use super::network::{collect_network_requests, NetworkRequest};
use super::page_frame::{FrameIndex, FrameTree, PageFrame};
use super::track::{Track, TrackType};
use crate::config::ModelOptions;
use crate::diagnostics::ModelDiagnostics;
use crate::domain::{EventId, ModelError, ThreadId};
use crate::profile::CpuProfileModel;
use crate::store::{Event, EventStore};
use crate::trace_data::TraceFile;
use log::{debug, info};
use std::collections::HashMap;
use std::path::Path;

/// Read-only after [`TimelineModel::build`]; owns the event store together
/// with the synthetic events and every side table derived from it.
#[derive(Debug)]
pub struct TimelineModel {
    store: EventStore,
    synthetic: Vec<Event>,
    annotations: Annotations,
    invalidations: InvalidationTracker,
    frames: FrameTree,
    main_frame: Option<FrameIndex>,
    tracks: Vec<Track>,
    time_markers: Vec<EventId>,
    inspected_events: Vec<EventId>,
    cpu_profiles: Vec<CpuProfileModel>,
    worker_ids: HashMap<ThreadId, String>,
    frame_model: FrameModel,
    is_generic_trace: bool,
    diagnostics: ModelDiagnostics,
}

impl EventSource for TimelineModel {
    fn event(&self, id: EventId) -> &Event {
        let raw = self.store.events().len();
        if id.index() < raw {
            self.store.event(id)
        } else {
            &self.synthetic[id.index() - raw]
        }
    }
}

impl TimelineModel {
    /// Parse, stitch and classify a trace file.
    pub fn load(path: impl AsRef<Path>, options: &ModelOptions) -> Result<Self, ModelError> {
        let trace = TraceFile::from_file(path)?;
        Self::from_trace(trace, options)
    }

    pub fn from_trace(trace: TraceFile, options: &ModelOptions) -> Result<Self, ModelError> {
        let store = EventStore::from_raw(trace.events, options)?;
        Self::build(store, options)
    }

    /// Classify a finalized store.
    pub fn build(mut store: EventStore, options: &ModelOptions) -> Result<Self, ModelError> {
        let diagnostics = store.take_diagnostics();
        let (classifier, synthetic, is_generic_trace) = {
            let mut arena = EventArena::new(&store);
            let mut classifier = Classifier::new(
                options,
                diagnostics,
                store.minimum_record_time(),
                store.maximum_record_time(),
            );
            classifier.process_sync_browser_events(&store);
            let mut is_generic_trace = false;
            if classifier.browser_frame_tracking {
                classifier.process_threads_for_browser_frames(&mut arena)?;
            } else if !classifier.process_legacy_metadata(&mut arena)? {
                is_generic_trace = true;
                classifier.process_generic_trace(&mut arena)?;
            }
            classifier
                .inspected_events
                .sort_by(|&a, &b| Event::compare_start_time(arena.event(a), arena.event(b)));
            classifier.process_async_browser_events(&store);
            classifier.build_gpu_track(&store);
            for track in &mut classifier.tracks {
                track.synthesize_sync_events(&mut arena);
            }
            (classifier, arena.into_synthetic(), is_generic_trace)
        };

        let mut model = Self {
            store,
            synthetic,
            annotations: classifier.annotations,
            invalidations: classifier.invalidations,
            frames: classifier.frames,
            main_frame: classifier.main_frame,
            tracks: classifier.tracks,
            time_markers: classifier.time_markers,
            inspected_events: classifier.inspected_events,
            cpu_profiles: classifier.cpu_profiles,
            worker_ids: classifier.worker_ids,
            frame_model: FrameModel::new(),
            is_generic_trace,
            diagnostics: classifier.diagnostics,
        };
        model.build_frame_model();
        info!(
            "Timeline built: {} tracks, {} inspected events, {} CPU profiles{}",
            model.tracks.len(),
            model.inspected_events.len(),
            model.cpu_profiles.len(),
            if is_generic_trace { " (generic trace)" } else { "" }
        );
        Ok(model)
    }

    fn build_frame_model(&mut self) {
        let model: &Self = self;
        let main_threads: Vec<(ThreadId, f64)> = model
            .tracks
            .iter()
            .filter(|track| track.kind == TrackType::MainThread && track.for_main_frame)
            .filter_map(|track| {
                let first = model.event(*track.events.first()?);
                Some((first.thread, first.start_time))
            })
            .collect();
        let mut frame_model = FrameModel::new();
        frame_model.add_trace_events(model, &model.inspected_events, &main_threads);
        debug!("{} rendering frames", frame_model.frames(None, None).len());
        self.frame_model = frame_model;
    }

    // === ACCESSORS ===

    #[must_use]
    pub fn store(&self) -> &EventStore {
        &self.store
    }

    #[must_use]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    #[must_use]
    pub fn annotation(&self, id: EventId) -> Option<&Annotation> {
        self.annotations.get(id)
    }

    #[must_use]
    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    /// Invalidations linked to a style recalc or layout event
    pub fn invalidations_for(&self, id: EventId) -> impl Iterator<Item = &InvalidationRecord> {
        self.invalidations.invalidations_for(id)
    }

    /// Events of every processed thread, sorted by start time
    #[must_use]
    pub fn inspected_events(&self) -> &[EventId] {
        &self.inspected_events
    }

    #[must_use]
    pub fn time_marker_events(&self) -> &[EventId] {
        &self.time_markers
    }

    #[must_use]
    pub fn cpu_profiles(&self) -> &[CpuProfileModel] {
        &self.cpu_profiles
    }

    #[must_use]
    pub fn worker_id(&self, thread: ThreadId) -> Option<&str> {
        self.worker_ids.get(&thread).map(String::as_str)
    }

    #[must_use]
    pub fn page_frames(&self) -> &FrameTree {
        &self.frames
    }

    pub fn root_frames(&self) -> impl Iterator<Item = &PageFrame> {
        self.frames.root_frames()
    }

    #[must_use]
    pub fn page_frame_by_id(&self, frame_id: &str) -> Option<&PageFrame> {
        self.frames.get(frame_id)
    }

    /// URL of the main frame, empty when unknown
    #[must_use]
    pub fn page_url(&self) -> &str {
        self.main_frame.map_or("", |index| self.frames.frame(index).url.as_str())
    }

    /// Rendering frames overlapping the window
    #[must_use]
    pub fn frames(&self, start: Option<f64>, end: Option<f64>) -> &[TimelineFrame] {
        self.frame_model.frames(start, end)
    }

    /// Neither page metadata nor browser frame tracking was found
    #[must_use]
    pub fn is_generic_trace(&self) -> bool {
        self.is_generic_trace
    }

    #[must_use]
    pub fn minimum_record_time(&self) -> f64 {
        self.store.minimum_record_time()
    }

    #[must_use]
    pub fn maximum_record_time(&self) -> f64 {
        self.store.maximum_record_time()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.minimum_record_time() == 0.0 && self.maximum_record_time() == 0.0
    }

    #[must_use]
    pub fn diagnostics(&self) -> &ModelDiagnostics {
        &self.diagnostics
    }

    /// Requests of the inspected threads. Generic traces have none.
    #[must_use]
    pub fn network_requests(&self) -> Vec<NetworkRequest> {
        if self.is_generic_trace {
            return Vec::new();
        }
        collect_network_requests(self, &self.inspected_events, |event| {
            self.store.thread(event.thread).pid
        })
    }
}
