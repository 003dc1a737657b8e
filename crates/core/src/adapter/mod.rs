//! Tool adapters.
//!
//! One adapter per processing mode, all behind [`ToolAdapter`]:
//!
//! - [`MkvmergeAdapter`] (copy): one muxer pass that cuts and joins the
//!   segments itself.
//! - [`FfmpegExtractAdapter`] (extract): one stream-copy pass per segment.
//! - [`HandbrakeAdapter`] (transcode): one transcoder pass per segment with
//!   the resolved preset.
//!
//! An adapter only plans commands; running them goes through the
//! [`ProcessRunner`], one at a time, stopping at the first failure.

mod copy;
mod extract;
mod transcode;

pub use copy::MkvmergeAdapter;
pub use extract::FfmpegExtractAdapter;
pub use transcode::HandbrakeAdapter;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{EffectiveConfig, Mode, PresetSource, DEFAULT_PRESET};
use crate::job::ProcessingJob;
use crate::runner::{ProcessOutcome, ProcessRunner, RunnerError, ToolCommand};

/// A planned tool invocation and the file it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: ToolCommand,
    pub output: PathBuf,
}

/// Wraps the external tool of one processing mode.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    /// Returns the name of this adapter.
    fn name(&self) -> &str;

    /// The mode this adapter implements.
    fn mode(&self) -> Mode;

    /// Whether the outputs are per-segment parts that still need merging.
    fn produces_parts(&self) -> bool;

    /// Builds the invocations for `job`, in segment order.
    fn plan(&self, job: &ProcessingJob) -> Vec<Invocation>;

    /// Whether `outcome` counts as a finished pass, given that its output
    /// file exists and is not empty.
    fn accepts(&self, outcome: ProcessOutcome) -> bool {
        outcome.is_success()
    }

    /// Runs the planned invocations one after another.
    ///
    /// `progress` is called with the one-based index and the total before
    /// each invocation. The first outcome the adapter does not accept is
    /// returned and nothing further runs. On success the outputs are recorded in
    /// `job.parts`, and for a single-pass adapter in `job.output` too.
    async fn run(
        &self,
        job: &mut ProcessingJob,
        runner: &ProcessRunner,
        limit: Duration,
        progress: &mut (dyn FnMut(usize, usize) + Send),
    ) -> Result<ProcessOutcome, RunnerError> {
        let invocations = self.plan(job);
        let total = invocations.len();

        for (idx, invocation) in invocations.into_iter().enumerate() {
            progress(idx + 1, total);
            info!(
                job_id = %job.job_id,
                tool = %invocation.command.label(),
                segment = idx + 1,
                total,
                output = %invocation.output.display(),
                "Running {} pass",
                self.name()
            );

            let outcome = runner.execute(&invocation.command, Some(limit)).await?;
            if !outcome.is_success() {
                if !self.accepts(outcome) || !has_output(&invocation.output).await {
                    return Ok(outcome);
                }
                warn!(
                    job_id = %job.job_id,
                    outcome = %outcome,
                    output = %invocation.output.display(),
                    "{} finished with warnings, keeping output",
                    self.name()
                );
            }
            job.parts.push(invocation.output);
        }

        if !self.produces_parts() {
            job.output = job.parts.last().cloned();
        }
        Ok(ProcessOutcome::Succeeded)
    }
}

async fn has_output(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Picks the adapter for the configured mode.
pub fn adapter_for(config: &EffectiveConfig) -> Box<dyn ToolAdapter> {
    match config.mode {
        Mode::Copy => Box::new(MkvmergeAdapter::new(config.tools.muxer.clone())),
        Mode::Extract => Box::new(FfmpegExtractAdapter::new(config.tools.extractor.clone())),
        Mode::Transcode => Box::new(HandbrakeAdapter::new(
            config.tools.transcoder.clone(),
            config
                .preset
                .clone()
                .unwrap_or_else(|| PresetSource::Named(DEFAULT_PRESET.to_string())),
        )),
    }
}


#[cfg(all(test, unix))]
mod tests {
    use super::test_support::{job, secs};
    use super::*;
    use crate::job::Segment;
    use crate::testing::{fixtures, FakeTools, MUXER, TRANSCODER};
    use tempfile::TempDir;

    #[test]
    fn test_adapter_for_mode() {
        let temp = TempDir::new().unwrap();
        let tools = FakeTools::install(temp.path()).unwrap();

        for (mode, name) in [
            ("copy", "mkvmerge"),
            ("extract", "ffmpeg"),
            ("transcode", "handbrake"),
        ] {
            let config = fixtures::config(
                &tools,
                temp.path(),
                temp.path(),
                &format!("mode = \"{}\"", mode),
            );
            let adapter = adapter_for(&config);
            assert_eq!(adapter.name(), name);
            assert_eq!(adapter.mode().as_str(), mode);
        }
    }

    #[tokio::test]
    async fn test_run_stops_at_first_failure() {
        let temp = TempDir::new().unwrap();
        let tools = FakeTools::install(temp.path()).unwrap();
        tools.fail_with(TRANSCODER, 2).unwrap();

        let adapter = HandbrakeAdapter::new(
            tools.path(TRANSCODER),
            PresetSource::Named(DEFAULT_PRESET.to_string()),
        );
        let mut job = job(
            Mode::Transcode,
            vec![
                Segment::new(secs(0), Some(secs(60))),
                Segment::new(secs(120), None),
            ],
        );
        job.staging_dir = temp.path().to_path_buf();

        let mut seen = Vec::new();
        let outcome = adapter
            .run(
                &mut job,
                &ProcessRunner::default(),
                Duration::from_secs(10),
                &mut |i, n| seen.push((i, n)),
            )
            .await
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::FailedWithCode(2));
        assert_eq!(seen, vec![(1, 2)]);
        assert!(job.parts.is_empty());
        assert_eq!(tools.calls_to(TRANSCODER).len(), 1);
    }

    #[tokio::test]
    async fn test_copy_run_sets_output() {
        let temp = TempDir::new().unwrap();
        let tools = FakeTools::install(temp.path()).unwrap();

        let adapter = MkvmergeAdapter::new(tools.path(MUXER));
        let mut job = job(Mode::Copy, vec![]);
        job.staging_dir = temp.path().to_path_buf();

        let outcome = adapter
            .run(
                &mut job,
                &ProcessRunner::default(),
                Duration::from_secs(10),
                &mut |_, _| {},
            )
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(job.output, Some(temp.path().join("Tatort.mkv")));
        assert!(temp.path().join("Tatort.mkv").exists());
    }

    async fn run_copy(tools: &FakeTools, staging: &Path) -> (ProcessOutcome, ProcessingJob) {
        let adapter = MkvmergeAdapter::new(tools.path(MUXER));
        let mut job = job(Mode::Copy, vec![]);
        job.staging_dir = staging.to_path_buf();
        let outcome = adapter
            .run(
                &mut job,
                &ProcessRunner::default(),
                Duration::from_secs(10),
                &mut |_, _| {},
            )
            .await
            .unwrap();
        (outcome, job)
    }

    #[tokio::test]
    async fn test_copy_accepts_muxer_warnings() {
        let temp = TempDir::new().unwrap();
        let tools = FakeTools::install(temp.path()).unwrap();
        tools.produce_and_exit_with(MUXER, 1).unwrap();

        let (outcome, job) = run_copy(&tools, temp.path()).await;

        assert!(outcome.is_success());
        assert_eq!(job.output, Some(temp.path().join("Tatort.mkv")));
    }

    #[tokio::test]
    async fn test_copy_warning_without_output_fails() {
        let temp = TempDir::new().unwrap();
        let tools = FakeTools::install(temp.path()).unwrap();
        tools.fail_with(MUXER, 1).unwrap();

        let (outcome, job) = run_copy(&tools, temp.path()).await;

        assert_eq!(outcome, ProcessOutcome::FailedWithCode(1));
        assert_eq!(job.output, None);
    }

    #[tokio::test]
    async fn test_muxer_errors_still_fail() {
        let temp = TempDir::new().unwrap();
        let tools = FakeTools::install(temp.path()).unwrap();
        tools.produce_and_exit_with(MUXER, 2).unwrap();

        let (outcome, _) = run_copy(&tools, temp.path()).await;

        assert_eq!(outcome, ProcessOutcome::FailedWithCode(2));
    }

    #[tokio::test]
    async fn test_other_adapters_reject_nonzero_exit() {
        let temp = TempDir::new().unwrap();
        let tools = FakeTools::install(temp.path()).unwrap();
        tools.produce_and_exit_with(TRANSCODER, 1).unwrap();

        let adapter = HandbrakeAdapter::new(
            tools.path(TRANSCODER),
            PresetSource::Named(DEFAULT_PRESET.to_string()),
        );
        let mut job = job(Mode::Transcode, vec![]);
        job.staging_dir = temp.path().to_path_buf();
        let outcome = adapter
            .run(
                &mut job,
                &ProcessRunner::default(),
                Duration::from_secs(10),
                &mut |_, _| {},
            )
            .await
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::FailedWithCode(1));
    }
}
