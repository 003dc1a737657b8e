//! Postprocessing command invocation.
//!
//! The configured command template may refer to the result and the source
//! recording through placeholders:
//!
//! | Placeholder | Value |
//! |---|---|
//! | `%VIDFILE%` | file name of the final video |
//! | `%VIDPATH%` | directory of the final video |
//! | `%RECFILE%` | file name of the source recording |
//! | `%RECPATH%` | directory of the source recording |
//!
//! The template runs through `sh -c`. Placeholder values never become part of
//! the script text: each placeholder is rewritten to a reference to an
//! environment variable holding the value, so a title with quotes, `$` or
//! backticks is passed through as data. Quote placeholders as you would quote
//! a shell variable, e.g. `touch "%VIDPATH%"`.

use std::path::Path;
use tracing::{info, warn};

use crate::config::PostprocessSettings;
use crate::error::PipelineError;
use crate::runner::{ProcessRunner, ToolCommand};

/// Runs the postprocessing command after a successful relocation.
#[derive(Debug, Clone)]
pub struct PostprocessInvoker {
    settings: PostprocessSettings,
    runner: ProcessRunner,
}

impl PostprocessInvoker {
    pub fn new(settings: PostprocessSettings, runner: ProcessRunner) -> Self {
        Self { settings, runner }
    }

    /// Expands the template for `video` and `recording`, for display.
    pub fn expand(&self, video: &Path, recording: &Path) -> String {
        placeholders(video, recording)
            .iter()
            .fold(self.settings.command.clone(), |acc, (name, value)| {
                acc.replace(&format!("%{}%", name), value)
            })
    }

    /// Builds the shell invocation, with placeholder values in the environment.
    pub fn command(&self, video: &Path, recording: &Path) -> ToolCommand {
        let values = placeholders(video, recording);
        let script = values
            .iter()
            .fold(self.settings.command.clone(), |acc, (name, _)| {
                acc.replace(&format!("%{}%", name), &format!("${{{}{}}}", ENV_PREFIX, name))
            });

        values.iter().fold(
            ToolCommand::new("sh").arg("-c").arg(script),
            |cmd, (name, value)| cmd.env(format!("{}{}", ENV_PREFIX, name), value),
        )
    }

    /// Runs the expanded command.
    ///
    /// Any failure is returned as [`PipelineError::Postprocessing`]; the
    /// caller logs it and keeps the run successful.
    pub async fn run(&self, video: &Path, recording: &Path) -> Result<(), PipelineError> {
        let command_line = self.expand(video, recording);
        info!(command = %command_line, "Running postprocessing command");

        let command = self.command(video, recording);
        let outcome = self
            .runner
            .execute(&command, self.settings.timeout)
            .await
            .map_err(|e| PipelineError::Postprocessing {
                reason: e.to_string(),
            })?;

        if outcome.is_success() {
            Ok(())
        } else {
            warn!(command = %command_line, outcome = %outcome, "Postprocessing command failed");
            Err(PipelineError::Postprocessing {
                reason: format!("'{}' {}", command_line, outcome),
            })
        }
    }
}

const ENV_PREFIX: &str = "RECTOVID_";

fn placeholders(video: &Path, recording: &Path) -> [(&'static str, String); 4] {
    let file_name = |p: &Path| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    };
    let dir_name = |p: &Path| {
        p.parent()
            .map(|d| d.to_string_lossy().to_string())
            .unwrap_or_default()
    };

    [
        ("VIDFILE", file_name(video)),
        ("VIDPATH", dir_name(video)),
        ("RECFILE", file_name(recording)),
        ("RECPATH", dir_name(recording)),
    ]
}
