//! CPU Profile Reconstructor
//!
//! ```text
//! Profile / ProfileChunk events ──► extract_cpu_profile() ──► RawCpuProfile
//!                                                                  │
//!                                            CpuProfileModel::new()│ tree, sample sort,
//!                                                                  ▼ timestamp repair
//!                                                          CpuProfileModel
//!                                                                  │
//!                                                  for_each_frame()│
//!                                                                  ▼
//!                                                   FrameSink open/close intervals
//! ```

pub mod call_tree;
pub mod cpu_profile;
pub mod frames;

pub use call_tree::{sort_samples, CallTreeNode, CpuProfileModel};
pub use cpu_profile::{extract_cpu_profile, CallFrame, RawCpuProfile};
pub use frames::FrameSink;
