//! Status sinks.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::{JobReport, JobStatus, StatusSink};
use crate::backend::Backend;
use crate::runner::{ProcessRunner, ToolCommand};

/// Upper bound for a single notifier invocation.
const NOTIFIER_TIMEOUT: Duration = Duration::from_secs(30);

/// Writes the report to the log.
pub struct LogSink;

#[async_trait]
impl StatusSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn report(&self, report: &JobReport) -> anyhow::Result<()> {
        let job_id = report.job_id.as_deref().unwrap_or("-");
        match report.status {
            JobStatus::Done => info!(
                job_id,
                output = ?report.output,
                exit_code = report.exit_code,
                "{}",
                report.message
            ),
            _ => error!(
                job_id,
                stage = %report.stage,
                kind = report.error_kind.unwrap_or("unknown"),
                status = %report.status,
                exit_code = report.exit_code,
                "{}",
                report.message
            ),
        }
        for warning in &report.warnings {
            warn!(job_id, "{}", warning);
        }
        Ok(())
    }
}

/// Shows a frontend notification and, after success, triggers a video rescan.
pub struct NotifierSink {
    runner: ProcessRunner,
    program: PathBuf,
    scan_videos: bool,
}

impl NotifierSink {
    pub fn new(runner: ProcessRunner, program: PathBuf, scan_videos: bool) -> Self {
        Self {
            runner,
            program,
            scan_videos,
        }
    }

    /// `--notification` invocation for a report.
    pub fn notification_command(&self, report: &JobReport) -> ToolCommand {
        let kind = if report.status.is_success() {
            "normal"
        } else {
            "error"
        };
        ToolCommand::new(&self.program)
            .args(["--notification", "--origin", "rectovid", "--timeout", "60"])
            .arg("--message_text")
            .arg(&report.message)
            .args(["--type", kind])
    }

    pub fn scan_command(&self) -> ToolCommand {
        ToolCommand::new(&self.program).arg("--scanvideos")
    }

    async fn invoke(&self, command: &ToolCommand) -> anyhow::Result<()> {
        let outcome = self
            .runner
            .execute(command, Some(NOTIFIER_TIMEOUT))
            .await?;
        outcome.into_result(&command.label(), Some(NOTIFIER_TIMEOUT))?;
        Ok(())
    }
}

#[async_trait]
impl StatusSink for NotifierSink {
    fn name(&self) -> &str {
        "notifier"
    }

    async fn report(&self, report: &JobReport) -> anyhow::Result<()> {
        self.invoke(&self.notification_command(report)).await?;
        if report.status.is_success() && self.scan_videos {
            self.invoke(&self.scan_command()).await?;
        }
        Ok(())
    }
}

/// Records the final status with the backend for runs started from a job.
pub struct BackendStatusSink {
    backend: Arc<dyn Backend>,
}

impl BackendStatusSink {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl StatusSink for BackendStatusSink {
    fn name(&self) -> &str {
        "backend"
    }

    async fn report(&self, report: &JobReport) -> anyhow::Result<()> {
        let Some(ref job_id) = report.job_id else {
            return Ok(());
        };
        self.backend
            .update_job_status(job_id, report.status, &report.message)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::pipeline::{Completed, PipelineStage};
    use crate::testing::MockBackend;
    use std::ffi::{OsStr, OsString};

    fn failed_report(job_id: Option<&str>) -> JobReport {
        JobReport::failure(
            job_id.map(String::from),
            "Tatort",
            PipelineStage::Merging,
            &PipelineError::merge("part_02.m4v is empty"),
        )
    }

    #[test]
    fn test_notification_command() {
        let sink = NotifierSink::new(ProcessRunner::default(), PathBuf::from("mythutil"), true);
        let cmd = sink.notification_command(&failed_report(None));

        assert!(cmd.has_arg("--notification"));
        assert_eq!(cmd.value_of("--origin"), Some(OsStr::new("rectovid")));
        assert_eq!(cmd.value_of("--type"), Some(OsStr::new("error")));
        let text = cmd.value_of("--message_text").unwrap().to_string_lossy();
        assert!(text.contains("\"Tatort\""));
        assert!(text.contains("empty"));

        assert_eq!(sink.scan_command().args, vec![OsString::from("--scanvideos")]);
    }

    #[tokio::test]
    async fn test_backend_sink_updates_job() {
        let backend = Arc::new(MockBackend::new());
        let sink = BackendStatusSink::new(backend.clone());

        sink.report(&failed_report(Some("42"))).await.unwrap();
        sink.report(&failed_report(None)).await.unwrap();

        let updates = backend.status_updates().await;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].job_id, "42");
        assert_eq!(updates[0].status, JobStatus::FatalFailure);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_notifier_runs_scan_after_success() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::TempDir::new().unwrap();
        let log = temp.path().join("calls.log");
        let script = temp.path().join("mythutil");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho \"$1\" >> '{}'\n", log.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let sink = NotifierSink::new(ProcessRunner::default(), script, true);
        let completed = Completed {
            recording: PathBuf::from("/rec/1001.ts"),
            output: PathBuf::from("/srv/video/News.m4v"),
            title: "News".to_string(),
            postprocess_error: None,
        };
        sink.report(&JobReport::success(None, &completed))
            .await
            .unwrap();

        let calls = std::fs::read_to_string(&log).unwrap();
        assert_eq!(calls, "--notification\n--scanvideos\n");
    }
}
