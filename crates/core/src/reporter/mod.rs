//! Job status reporting.
//!
//! A finished run, successful or not, becomes one [`JobReport`]. The
//! [`JobStatusReporter`] hands it to every configured [`StatusSink`]: the log,
//! the frontend notifier and the backend's job status endpoint. Sinks never
//! retry and never fail the run.

mod sinks;

pub use sinks::{BackendStatusSink, LogSink, NotifierSink};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::context::AppContext;
use crate::error::PipelineError;
use crate::pipeline::{Completed, PipelineStage};

/// Status as seen by the host scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Done,
    RetryableFailure,
    FatalFailure,
}

impl JobStatus {
    pub fn for_error(err: &PipelineError) -> Self {
        if err.is_retryable() {
            Self::RetryableFailure
        } else {
            Self::FatalFailure
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::RetryableFailure => write!(f, "retryable failure"),
            Self::FatalFailure => write!(f, "fatal failure"),
        }
    }
}

/// End-to-end outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    /// Platform job id, if the run was started for one.
    pub job_id: Option<String>,
    /// Human readable label, usually the recording title.
    pub title: String,
    pub status: JobStatus,
    pub exit_code: i32,
    /// Last stage reached.
    pub stage: PipelineStage,
    /// Failure kind, see [`PipelineError::kind`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    /// Non-fatal problems, e.g. a failed postprocessing command.
    pub warnings: Vec<String>,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    pub fn success(job_id: Option<String>, completed: &Completed) -> Self {
        Self {
            job_id,
            title: completed.title.clone(),
            status: JobStatus::Done,
            exit_code: 0,
            stage: PipelineStage::Done,
            error_kind: None,
            message: format!("Finished processing \"{}\"", completed.title),
            output: Some(completed.output.clone()),
            warnings: completed.postprocess_error.iter().cloned().collect(),
            finished_at: Utc::now(),
        }
    }

    pub fn failure(
        job_id: Option<String>,
        title: impl Into<String>,
        stage: PipelineStage,
        err: &PipelineError,
    ) -> Self {
        let title = title.into();
        Self {
            message: format!("Failed processing \"{}\" ({})", title, err),
            job_id,
            title,
            status: JobStatus::for_error(err),
            exit_code: err.exit_code(),
            stage,
            error_kind: Some(err.kind()),
            output: None,
            warnings: Vec::new(),
            finished_at: Utc::now(),
        }
    }
}

/// A destination for job reports.
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Returns the name of this sink.
    fn name(&self) -> &str;

    /// Delivers the report. Errors are logged by the caller and otherwise ignored.
    async fn report(&self, report: &JobReport) -> anyhow::Result<()>;
}

/// Fans a report out to every sink.
#[derive(Default)]
pub struct JobStatusReporter {
    sinks: Vec<Arc<dyn StatusSink>>,
}

impl JobStatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log sink always; notifier and backend sinks as configured.
    pub fn from_context(ctx: &AppContext) -> Self {
        let config = ctx.config();
        let mut reporter = Self::new().with_sink(LogSink);

        if config.notifications.enabled {
            reporter = reporter.with_sink(NotifierSink::new(
                ctx.runner().clone(),
                config.tools.notifier.clone(),
                config.notifications.scan_videos,
            ));
        }
        if let Some(backend) = ctx.backend() {
            reporter = reporter.with_sink(BackendStatusSink::new(Arc::clone(backend)));
        }
        reporter
    }

    pub fn with_sink(mut self, sink: impl StatusSink + 'static) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub async fn report(&self, report: &JobReport) {
        for sink in &self.sinks {
            if let Err(e) = sink.report(report).await {
                tracing::warn!(sink = sink.name(), error = %e, "Status sink failed");
            } else {
                debug!(sink = sink.name(), status = %report.status, "Status delivered");
            }
        }
    }
}
