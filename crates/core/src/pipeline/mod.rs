//! Post-recording pipeline.
//!
//! One run takes a recording through a fixed, strictly forward sequence of
//! stages:
//!
//! ```text
//! Locating -> Configuring -> Processing(i of N) -> Merging -> Relocating
//!          -> Postprocessing -> Done
//! ```
//!
//! Any stage before postprocessing may fail the run; the failure is reported
//! together with the stage it happened in. Segments are processed one at a
//! time and nothing is retried.

mod runner;
mod types;

pub use runner::Pipeline;
pub use types::{Completed, PipelineRequest, PipelineStage};
