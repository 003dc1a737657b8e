//! Recording platform backend.
//!
//! The pipeline needs three things from the platform: the recording behind a
//! job id, the directories of a storage group, and a place to report job
//! status. [`ServicesBackend`] talks to the platform's HTTP services API;
//! tests use [`crate::testing::MockBackend`].

mod services;

pub use services::ServicesBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::job::RecordingMetadata;
use crate::reporter::JobStatus;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

/// What the backend knows about a recording.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingInfo {
    /// Base name of the recording file.
    pub file_name: String,
    /// Storage group the recording lives in.
    pub storage_group: Option<String>,
    pub metadata: RecordingMetadata,
}

/// Access to the recording platform.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Returns the name of this backend implementation.
    fn name(&self) -> &str;

    /// Looks up the recording behind a job id.
    async fn recording_for_job(&self, job_id: &str) -> Result<RecordingInfo, BackendError>;

    /// Lists the directories of a storage group.
    async fn storage_group_dirs(&self, group: &str) -> Result<Vec<PathBuf>, BackendError>;

    /// Records the final status of a job.
    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        comment: &str,
    ) -> Result<(), BackendError>;
}
