//! Timeout-bounded process runner.
//!
//! Every external tool the pipeline uses goes through [`ProcessRunner`]. The
//! runner starts the tool in its own process group, forwards its output to the
//! log, and enforces a wall-clock deadline:
//!
//! 1. deadline elapses: SIGTERM to the group
//! 2. grace period elapses: SIGKILL to the group
//! 3. child reaped, remaining group members killed
//!
//! # Example
//!
//! ```ignore
//! use rectovid_core::runner::{ProcessRunner, ToolCommand};
//!
//! let runner = ProcessRunner::new(Duration::from_secs(5));
//! let cmd = ToolCommand::new("ffmpeg").args(["-version"]);
//! let outcome = runner.execute(&cmd, Some(Duration::from_secs(10))).await?;
//! assert!(outcome.is_success());
//! ```

mod process;
mod types;

pub use process::{ProcessRunner, DEFAULT_GRACE_PERIOD};
pub use types::{ProcessOutcome, RunnerError, ToolCommand};
