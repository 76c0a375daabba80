//! # tracelens - Browser Performance Trace Model Reconstruction
//!
//! tracelens reads a browser performance trace (the Trace Event Format that
//! DevTools records) and rebuilds the causal model behind it: which thread
//! ran what, how long each task spent in itself versus its children, which
//! request a response belongs to, where forced layouts happened, and how the
//! page's time splits across loading, scripting, rendering and painting.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      trace.json (raw events)                    │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ serde
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Event Store                                                    │
//! │  • processes / threads from metadata                            │
//! │  • B/E stitching, X events, async begin/step/end, flows         │
//! │  • CpuProfile / Profile+ProfileChunk fragments                  │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ finalized, read-only
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Timeline Classifier                                            │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │ CPU Profile  │──▶│  JS frames   │──▶│  per-event   │         │
//! │  │ Reconstructor│   │  (samples)   │   │  classifier  │         │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘         │
//! │                                 ┌─────────────┴──────┐          │
//! │                          Invalidation        Async Cause        │
//! │                            Tracker             Tracker          │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ tracks, annotations, frames
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Category Aggregator  ──▶  Query façade  ──▶  CLI reports       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`trace_data`]: Raw event deserialization (`RawEvent`, `TraceFile`)
//! - [`store`]: Event Store; processes, threads, stitched events and
//!   async spans
//! - [`profile`]: CPU Profile Reconstructor; call tree, sample timeline,
//!   `(program)` sample repair and the frame walk
//! - [`timeline`]: Timeline Classifier; tracks, per-event annotations,
//!   invalidations, network requests and rendering frames
//! - [`analysis`]: Legend categories and the per-category time breakdown
//! - [`query`]: Query façade the CLI reports from
//! - [`cli`]: Command-line arguments and report rendering
//! - [`config`]: Reconstruction options and warning thresholds
//! - [`diagnostics`]: Per-load counters of tolerated anomalies
//! - [`domain`]: Newtype ids and the error taxonomy
//!
//! ## Typical Usage
//!
//! ```bash
//! # Main thread category summary
//! tracelens trace.json
//!
//! # Every report for a window, as JSON
//! tracelens trace.json --from 1200 --to 4800 --report all --json
//! ```
//!
//! ## Key Concepts
//!
//! - **Top-level event**: one macro task on a thread (`RunTask`)
//! - **Self time**: duration minus the time of nested children
//! - **Join key**: the field (`requestId`, `timerId`, ...) that pairs an
//!   initiator with the events it causes
//! - **Generic trace**: no page metadata was found; the first thread is
//!   taken as the main thread

// Expose modules for testing
pub mod analysis;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod domain;
pub mod profile;
pub mod query;
pub mod store;
pub mod timeline;
pub mod trace_data;
