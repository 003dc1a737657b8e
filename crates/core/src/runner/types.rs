//! Types for the process runner.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

use crate::error::PipelineError;

/// An external tool invocation: program plus argv.
///
/// Arguments are handed to the OS as-is, never through a shell, so paths with
/// spaces or shell metacharacters need no quoting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub current_dir: Option<PathBuf>,
    /// Extra environment variables for the child.
    pub envs: Vec<(OsString, OsString)>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Short name used in logs and errors.
    pub fn label(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Whether `arg` appears verbatim in the argument list.
    pub fn has_arg(&self, arg: impl AsRef<OsStr>) -> bool {
        self.args.iter().any(|a| a == arg.as_ref())
    }

    /// The argument following `flag`, if any.
    pub fn value_of(&self, flag: impl AsRef<OsStr>) -> Option<&OsStr> {
        let flag = flag.as_ref();
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(|a| a.as_os_str())
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {:?}", arg)?;
        }
        Ok(())
    }
}

/// Terminal result of a bounded external invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Succeeded,
    TimedOut,
    FailedWithCode(i32),
    FailedWithSignal(i32),
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Maps a non-success outcome onto the pipeline error taxonomy.
    pub fn into_result(self, tool: &str, timeout: Option<Duration>) -> Result<(), PipelineError> {
        match self {
            Self::Succeeded => Ok(()),
            Self::TimedOut => Err(PipelineError::Timeout {
                tool: tool.to_string(),
                timeout_secs: timeout.map(|t| t.as_secs()).unwrap_or_default(),
            }),
            Self::FailedWithCode(code) => Err(PipelineError::tool(
                tool,
                format!("exited with code {}", code),
            )),
            Self::FailedWithSignal(signal) => Err(PipelineError::tool(
                tool,
                format!("terminated by signal {}", signal),
            )),
        }
    }
}

impl From<ExitStatus> for ProcessOutcome {
    fn from(status: ExitStatus) -> Self {
        if status.success() {
            return Self::Succeeded;
        }
        if let Some(code) = status.code() {
            return Self::FailedWithCode(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::FailedWithSignal(signal);
            }
        }
        Self::FailedWithCode(-1)
    }
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::TimedOut => write!(f, "timed out"),
            Self::FailedWithCode(code) => write!(f, "failed with code {}", code),
            Self::FailedWithSignal(signal) => write!(f, "failed with signal {}", signal),
        }
    }
}

/// Errors starting or supervising a child process.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The program does not exist or is not on PATH.
    #[error("Program not found: {program}")]
    ProgramNotFound { program: PathBuf },

    /// The program could not be started.
    #[error("Failed to start {program}: {source}")]
    SpawnFailed {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the child failed.
    #[error("I/O error while supervising child: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RunnerError> for PipelineError {
    fn from(err: RunnerError) -> Self {
        let tool = match &err {
            RunnerError::ProgramNotFound { program } | RunnerError::SpawnFailed { program, .. } => {
                program.to_string_lossy().to_string()
            }
            RunnerError::Io(_) => "child process".to_string(),
        };
        PipelineError::tool(tool, err.to_string())
    }
}
