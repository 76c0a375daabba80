//! Timeline Classifier
//!
//! Turns a finalized [`EventStore`](crate::store::EventStore) into tracks of
//! classified events with causal links between them.
//!
//! ```text
//! EventStore ──► browser main thread ──► frames, input flow ids
//!     │
//!     ├──► strategy: browser frames │ legacy page metadata │ generic trace
//!     │        │
//!     │        ▼ per thread, per time range
//!     │    CPU profile ──► JSSample + JSFrame ──merge──► event stream
//!     │                                                      │
//!     │                          Classifier::process_event() │ nesting stack,
//!     │                              ├─ InvalidationTracker  │ self time,
//!     │                              └─ AsyncEventTracker    │ warnings
//!     │                                                      ▼
//!     └──► async groups ──► Console/Timings/Animation/Input tracks
//!                                                            │
//!                                                            ▼
//!                                   TimelineModel (tracks, annotations,
//!                                   frames, network requests)
//! ```
//!
//! All state of one reconstruction lives in a [`classifier::Classifier`]
//! created per load; nothing is kept between loads.

pub mod annotations;
pub mod arena;
pub mod async_tracker;
pub mod classifier;
pub mod frame_model;
pub mod invalidation;
pub mod js_frames;
pub mod model;
pub mod network;
pub mod page_frame;
pub mod record_type;
pub mod threads;
pub mod track;
pub mod walker;

pub use annotations::{Annotation, Annotations, ScriptLocation};
pub use arena::EventSource;
pub use frame_model::TimelineFrame;
pub use invalidation::InvalidationRecord;
pub use model::TimelineModel;
pub use network::NetworkRequest;
pub use page_frame::{FrameTree, PageFrame};
pub use record_type::{RecordType, WarningType};
pub use threads::TimeRange;
pub use track::{Track, TrackType};
pub use walker::{for_each_event, EventVisitor};
