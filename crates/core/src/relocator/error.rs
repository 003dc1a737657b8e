//! Error types for the relocator module.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::PipelineError;

/// Errors that can occur while moving a file into storage.
#[derive(Debug, Error)]
pub enum RelocatorError {
    /// Source file not found.
    #[error("Source file not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// Destination already exists.
    #[error("Destination already exists: {path}")]
    DestinationExists { path: PathBuf },

    /// Failed to create destination directory.
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to copy file.
    #[error("Failed to copy {source} to {destination}: {error}")]
    CopyFailed {
        source: PathBuf,
        destination: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Failed to move/rename file.
    #[error("Failed to move {source} to {destination}: {error}")]
    MoveFailed {
        source: PathBuf,
        destination: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// The copy does not match the source.
    #[error("Verification failed for {path}: expected {expected}, got {actual}")]
    VerificationFailed {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Failed to calculate checksum.
    #[error("Failed to calculate checksum for {path}: {source}")]
    ChecksumCalculationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No target directory could be determined.
    #[error("No storage directory available: {reason}")]
    NoStorageDirectory { reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelocatorError {
    /// Creates a copy failed error.
    pub fn copy_failed(source: PathBuf, destination: PathBuf, error: std::io::Error) -> Self {
        Self::CopyFailed {
            source,
            destination,
            error,
        }
    }

    /// Creates a move failed error.
    pub fn move_failed(source: PathBuf, destination: PathBuf, error: std::io::Error) -> Self {
        Self::MoveFailed {
            source,
            destination,
            error,
        }
    }
}

impl From<RelocatorError> for PipelineError {
    fn from(err: RelocatorError) -> Self {
        match err {
            RelocatorError::DestinationExists { path } => PipelineError::Collision { path },
            other => PipelineError::relocation(other.to_string()),
        }
    }
}
