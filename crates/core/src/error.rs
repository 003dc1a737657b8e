//! Pipeline error taxonomy.
//!
//! Every stage failure is mapped onto one of these kinds. Each kind carries a
//! stable process exit code and a retryable/fatal classification that the host
//! scheduler uses to decide whether to resubmit the job.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that abort (or, for postprocessing, annotate) a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No recording file matched the given reference.
    #[error("Recording not found: {reason}")]
    NotFound { reason: String },

    /// The given references point at different recordings.
    #[error("Ambiguous recording reference: {reason}")]
    AmbiguousInput { reason: String },

    /// Configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An external tool could not be started or exited unsuccessfully.
    #[error("{tool} failed: {reason}")]
    ToolInvocation { tool: String, reason: String },

    /// An external tool exceeded its deadline.
    #[error("{tool} timed out after {timeout_secs} seconds")]
    Timeout { tool: String, timeout_secs: u64 },

    /// Segment outputs could not be merged.
    #[error("Merge failed: {reason}")]
    Merge { reason: String },

    /// The target file already exists.
    #[error("Target already exists: {path}")]
    Collision { path: PathBuf },

    /// I/O failure while moving the result into storage.
    #[error("Relocation failed: {reason}")]
    Relocation { reason: String },

    /// The postprocessing command failed. Never aborts a run.
    #[error("Postprocessing failed: {reason}")]
    Postprocessing { reason: String },
}

impl PipelineError {
    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound {
            reason: reason.into(),
        }
    }

    pub fn ambiguous(reason: impl Into<String>) -> Self {
        Self::AmbiguousInput {
            reason: reason.into(),
        }
    }

    pub fn tool(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ToolInvocation {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn merge(reason: impl Into<String>) -> Self {
        Self::Merge {
            reason: reason.into(),
        }
    }

    pub fn relocation(reason: impl Into<String>) -> Self {
        Self::Relocation {
            reason: reason.into(),
        }
    }

    /// Short machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AmbiguousInput { .. } => "ambiguous_input",
            Self::Config(_) => "config",
            Self::ToolInvocation { .. } => "tool_invocation",
            Self::Timeout { .. } => "timeout",
            Self::Merge { .. } => "merge",
            Self::Collision { .. } => "collision",
            Self::Relocation { .. } => "relocation",
            Self::Postprocessing { .. } => "postprocessing",
        }
    }

    /// Process exit code for this failure kind. Stable across releases.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => 2,
            Self::Collision { .. } => 3,
            Self::AmbiguousInput { .. } => 4,
            Self::Config(_) => 5,
            Self::ToolInvocation { .. } => 6,
            Self::Timeout { .. } => 7,
            Self::Merge { .. } => 8,
            Self::Relocation { .. } => 9,
            // Postprocessing never determines the exit code.
            Self::Postprocessing { .. } => 0,
        }
    }

    /// Whether resubmitting the same job may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ToolInvocation { .. } | Self::Timeout { .. } | Self::Relocation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            PipelineError::not_found("x"),
            PipelineError::ambiguous("x"),
            PipelineError::Config(ConfigError::ValidationError("x".to_string())),
            PipelineError::tool("ffmpeg", "x"),
            PipelineError::Timeout {
                tool: "ffmpeg".to_string(),
                timeout_secs: 1,
            },
            PipelineError::merge("x"),
            PipelineError::Collision {
                path: PathBuf::from("/x"),
            },
            PipelineError::relocation("x"),
        ];

        let mut codes: Vec<i32> = errors.iter().map(|e| e.exit_code()).collect();
        assert!(codes.iter().all(|c| *c > 1));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(PipelineError::Timeout {
            tool: "HandBrakeCLI".to_string(),
            timeout_secs: 60
        }
        .is_retryable());
        assert!(PipelineError::relocation("disk full").is_retryable());
        assert!(!PipelineError::not_found("gone").is_retryable());
        assert!(!PipelineError::Collision {
            path: PathBuf::from("/srv/video.m4v")
        }
        .is_retryable());
    }

    #[test]
    fn test_postprocessing_keeps_success_code() {
        let err = PipelineError::Postprocessing {
            reason: "exit 1".to_string(),
        };
        assert_eq!(err.exit_code(), 0);
    }
}
