//! Pipeline driver.

use std::path::Path;
use tracing::{debug, error, info, warn};

use super::types::{Completed, PipelineRequest, PipelineStage};
use crate::adapter::adapter_for;
use crate::context::AppContext;
use crate::error::PipelineError;
use crate::job::{load_cutlist, underscore, video_file_name, ProcessingJob, StagingArea};
use crate::locator::Locator;
use crate::merger::ResultMerger;
use crate::postprocess::PostprocessInvoker;
use crate::relocator::{delete_recording, FsRelocator, RelocationRequest, StorageResolver};
use crate::reporter::{JobReport, JobStatusReporter};

/// Tracks the current stage and refuses to move backwards.
#[derive(Debug)]
struct StageTracker {
    stage: PipelineStage,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            stage: PipelineStage::Locating,
        }
    }

    fn advance(&mut self, next: PipelineStage) {
        debug_assert!(
            self.stage.can_advance_to(&next),
            "stage {} cannot follow {}",
            next,
            self.stage
        );
        info!(stage = %next, "Entering stage");
        self.stage = next;
    }

    fn stage(&self) -> PipelineStage {
        self.stage
    }
}

/// Runs one recording through locate, process, merge, relocate and
/// postprocess, then reports the outcome.
pub struct Pipeline<'a> {
    ctx: &'a AppContext,
    reporter: JobStatusReporter,
}

impl<'a> Pipeline<'a> {
    /// Creates a pipeline reporting through the sinks configured in `ctx`.
    pub fn new(ctx: &'a AppContext) -> Self {
        Self {
            ctx,
            reporter: JobStatusReporter::from_context(ctx),
        }
    }

    pub fn with_reporter(mut self, reporter: JobStatusReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Runs the request to completion.
    ///
    /// Never fails: the outcome, including the exit code, is in the returned
    /// report, which has already been handed to every status sink.
    pub async fn run(&self, request: PipelineRequest) -> JobReport {
        let job_id = request.reference.job_id.clone();
        let mut tracker = StageTracker::new();
        let mut title = request
            .metadata
            .title
            .clone()
            .unwrap_or_else(|| request.reference.to_string());

        let report = match self.execute(&request, &mut tracker, &mut title).await {
            Ok(completed) => {
                info!(
                    output = %completed.output.display(),
                    "Finished processing \"{}\"", completed.title
                );
                JobReport::success(job_id, &completed)
            }
            Err(e) => {
                error!(
                    stage = %tracker.stage(),
                    kind = e.kind(),
                    "Failed processing \"{}\": {}", title, e
                );
                JobReport::failure(job_id, title, tracker.stage(), &e)
            }
        };

        self.reporter.report(&report).await;
        report
    }

    async fn execute(
        &self,
        request: &PipelineRequest,
        tracker: &mut StageTracker,
        title: &mut String,
    ) -> Result<Completed, PipelineError> {
        let config = self.ctx.config();
        let runner = self.ctx.runner();
        let backend = self.ctx.backend().cloned();

        // Locating
        let located = Locator::new(backend.clone())
            .locate(&request.reference)
            .await?;
        let metadata = request.metadata.clone().or(located.metadata.clone());
        if let Some(ref t) = metadata.title {
            *title = t.clone();
        } else {
            *title = file_stem(&located.path);
        }

        tracker.advance(PipelineStage::Configuring);
        let segments = match config.cutlist {
            Some(ref path) => load_cutlist(path)?,
            None => Vec::new(),
        };
        let adapter = adapter_for(config);
        let output_name = video_file_name(&metadata, &located.path, config.mode.output_extension());

        let target_dir = StorageResolver::new(config.storage.clone(), backend)
            .target_dir(metadata.title.as_deref())
            .await?;
        let target = target_dir.join(&output_name);
        let exists = tokio::fs::try_exists(&target).await.map_err(|e| {
            PipelineError::relocation(format!("cannot check {}: {}", target.display(), e))
        })?;
        if exists {
            return Err(PipelineError::Collision { path: target });
        }

        let job_key = request
            .reference
            .job_id
            .clone()
            .unwrap_or_else(|| underscore(&file_stem(&located.path)));
        let staging = StagingArea::create(&config.staging_dir, &job_key)
            .await
            .map_err(|e| {
                PipelineError::relocation(format!(
                    "cannot create staging directory in {}: {}",
                    config.staging_dir.display(),
                    e
                ))
            })?;
        let mut job = ProcessingJob::new(
            job_key,
            located.path.clone(),
            segments,
            config.mode,
            staging.path().to_path_buf(),
            output_name,
        )?;
        info!(
            job_id = %job.job_id,
            mode = %config.mode,
            adapter = adapter.name(),
            segments = job.segments.len(),
            target = %target.display(),
            "Configured job"
        );

        // Processing
        let mut progress = |segment: usize, total: usize| {
            tracker.advance(PipelineStage::Processing { segment, total });
        };
        let outcome = adapter
            .run(&mut job, runner, config.timeout, &mut progress)
            .await?;
        outcome.into_result(adapter.name(), Some(config.timeout))?;

        if adapter.produces_parts() {
            tracker.advance(PipelineStage::Merging);
            let merged = ResultMerger::new(config.tools.concatenator.clone())
                .merge(&job.parts, &job.staged_output_path(), runner, config.timeout)
                .await?;
            job.output = Some(merged);
        }
        let staged = job
            .output
            .clone()
            .ok_or_else(|| PipelineError::merge("no output was produced"))?;

        tracker.advance(PipelineStage::Relocating);
        let relocation = FsRelocator::new()
            .relocate(&RelocationRequest {
                source: staged,
                destination: target,
                verify_checksum: config.storage.checksum,
            })
            .await?;
        drop(staging);

        if config.delete_source {
            if let Err(e) = delete_recording(&located.path).await {
                warn!(
                    path = %located.path.display(),
                    error = %e,
                    "Failed to delete source recording"
                );
            }
        }

        tracker.advance(PipelineStage::Postprocessing);
        let mut postprocess_error = None;
        if let Some(ref settings) = config.postprocessing {
            let invoker = PostprocessInvoker::new(settings.clone(), runner.clone());
            if let Err(e) = invoker.run(&relocation.destination, &located.path).await {
                warn!(error = %e, "Postprocessing failed, keeping result");
                postprocess_error = Some(e.to_string());
            }
        } else {
            debug!("No postprocessing command configured");
        }

        tracker.advance(PipelineStage::Done);
        Ok(Completed {
            recording: located.path,
            output: relocation.destination,
            title: title.clone(),
            postprocess_error,
        })
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
