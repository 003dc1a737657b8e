//! Concatenation through the ffmpeg concat demuxer.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::runner::{ProcessOutcome, ProcessRunner, ToolCommand};

/// Joins per-segment parts into one file.
#[derive(Debug, Clone)]
pub struct ResultMerger {
    program: PathBuf,
}

impl ResultMerger {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    /// Merges `parts`, in order, into `output`.
    ///
    /// Every part must exist and be non-empty. A single part is returned
    /// unchanged without running anything; otherwise the merged file is
    /// written to `output` and that path is returned.
    pub async fn merge(
        &self,
        parts: &[PathBuf],
        output: &Path,
        runner: &ProcessRunner,
        limit: Duration,
    ) -> Result<PathBuf, PipelineError> {
        if parts.is_empty() {
            return Err(PipelineError::merge("no parts to merge"));
        }
        for part in parts {
            check_part(part).await?;
        }

        if let [single] = parts {
            debug!(part = %single.display(), "Single part, nothing to merge");
            return Ok(single.clone());
        }

        let list = output.with_extension("concat.txt");
        tokio::fs::write(&list, concat_list(parts))
            .await
            .map_err(|e| PipelineError::merge(format!("cannot write {}: {}", list.display(), e)))?;

        let command = self.command(&list, output);
        info!(parts = parts.len(), output = %output.display(), "Merging parts");
        let outcome = runner.execute(&command, Some(limit)).await;
        let _ = tokio::fs::remove_file(&list).await;

        match outcome? {
            ProcessOutcome::Succeeded => {}
            ProcessOutcome::TimedOut => {
                return Err(PipelineError::Timeout {
                    tool: command.label(),
                    timeout_secs: limit.as_secs(),
                })
            }
            failed => {
                return Err(PipelineError::merge(format!(
                    "{} {}",
                    command.label(),
                    failed
                )))
            }
        }

        check_part(output).await?;
        Ok(output.to_path_buf())
    }

    fn command(&self, list: &Path, output: &Path) -> ToolCommand {
        ToolCommand::new(&self.program)
            .args(["-hide_banner", "-nostdin", "-y", "-loglevel", "warning"])
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(list)
            .args(["-map", "0", "-c", "copy"])
            .arg(output)
    }
}

async fn check_part(part: &Path) -> Result<(), PipelineError> {
    match tokio::fs::metadata(part).await {
        Ok(meta) if meta.len() == 0 => Err(PipelineError::merge(format!(
            "{} is empty",
            part.display()
        ))),
        Ok(_) => Ok(()),
        Err(e) => Err(PipelineError::merge(format!(
            "{} is missing: {}",
            part.display(),
            e
        ))),
    }
}

/// Concat demuxer list: one `file '<path>'` line per part, with single
/// quotes closed, escaped and reopened.
fn concat_list(parts: &[PathBuf]) -> String {
    parts
        .iter()
        .map(|p| {
            format!(
                "file '{}'\n",
                p.to_string_lossy().replace('\'', r"'\''")
            )
        })
        .collect()
}
