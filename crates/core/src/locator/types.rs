//! Types for the recording locator.

use std::fmt;
use std::path::PathBuf;

use crate::job::RecordingMetadata;

/// The ways a caller can point at a recording. Any combination may be given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingReference {
    /// Full path of the recording.
    pub path: Option<PathBuf>,
    /// Directory holding the recording; pairs with `file` or `job_id`.
    pub dir: Option<PathBuf>,
    /// File name, relative to `dir` when given.
    pub file: Option<PathBuf>,
    /// Platform job id, resolved through the backend.
    pub job_id: Option<String>,
}

impl RecordingReference {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn from_job(job_id: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_none() && self.dir.is_none() && self.file.is_none() && self.job_id.is_none()
    }
}

impl fmt::Display for RecordingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref path) = self.path {
            parts.push(format!("path={}", path.display()));
        }
        if let Some(ref dir) = self.dir {
            parts.push(format!("dir={}", dir.display()));
        }
        if let Some(ref file) = self.file {
            parts.push(format!("file={}", file.display()));
        }
        if let Some(ref job_id) = self.job_id {
            parts.push(format!("job={}", job_id));
        }
        if parts.is_empty() {
            write!(f, "<empty>")
        } else {
            write!(f, "{}", parts.join(" "))
        }
    }
}

/// Which input resolved the recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    FullPath,
    DirAndFile,
    File,
    JobId,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullPath => write!(f, "path"),
            Self::DirAndFile => write!(f, "dir+file"),
            Self::File => write!(f, "file"),
            Self::JobId => write!(f, "job id"),
        }
    }
}

/// A resolved recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedRecording {
    /// Absolute, canonical path of an existing file.
    pub path: PathBuf,
    /// Highest-priority strategy that resolved to `path`.
    pub strategy: Strategy,
    /// Metadata known to the backend, empty without a job id.
    pub metadata: RecordingMetadata,
}
