//! Recording locator.
//!
//! Turns a [`RecordingReference`] into one existing file. Every input the
//! caller provided is resolved, in priority order full path, directory plus
//! file, file, job id. Inputs that resolve must agree on the file; the
//! highest-priority one wins.

mod resolver;
mod types;

pub use resolver::Locator;
pub use types::{LocatedRecording, RecordingReference, Strategy};
