//! Mock backend for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::backend::{Backend, BackendError, RecordingInfo};
use crate::reporter::JobStatus;

/// A recorded job status update for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedStatusUpdate {
    pub job_id: String,
    pub status: JobStatus,
    pub comment: String,
}

/// Mock implementation of the Backend trait.
///
/// Recordings and storage groups are registered up front; lookups and status
/// updates are recorded for assertions.
///
/// # Example
///
/// ```rust,ignore
/// use rectovid_core::testing::MockBackend;
///
/// let backend = MockBackend::new();
/// backend.add_recording("42", recording_info).await;
/// backend.add_storage_group("Videos", vec![video_dir]).await;
///
/// // ... run the pipeline ...
///
/// let updates = backend.status_updates().await;
/// assert_eq!(updates[0].status, JobStatus::Done);
/// ```
#[derive(Debug, Default)]
pub struct MockBackend {
    recordings: Arc<RwLock<HashMap<String, RecordingInfo>>>,
    storage_groups: Arc<RwLock<HashMap<String, Vec<PathBuf>>>>,
    lookups: Arc<RwLock<Vec<String>>>,
    updates: Arc<RwLock<Vec<RecordedStatusUpdate>>>,
    unavailable: Arc<RwLock<bool>>,
}

impl MockBackend {
    /// Create a new, empty mock backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the recording returned for `job_id`.
    pub async fn add_recording(&self, job_id: &str, info: RecordingInfo) {
        self.recordings
            .write()
            .await
            .insert(job_id.to_string(), info);
    }

    /// Register the directories of a storage group.
    pub async fn add_storage_group(&self, group: &str, dirs: Vec<PathBuf>) {
        self.storage_groups
            .write()
            .await
            .insert(group.to_string(), dirs);
    }

    /// Make every call fail as if the backend were down.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    /// Job ids looked up so far.
    pub async fn lookups(&self) -> Vec<String> {
        self.lookups.read().await.clone()
    }

    /// Status updates received so far.
    pub async fn status_updates(&self) -> Vec<RecordedStatusUpdate> {
        self.updates.read().await.clone()
    }

    async fn check_available(&self) -> Result<(), BackendError> {
        if *self.unavailable.read().await {
            return Err(BackendError::ApiError {
                status: 503,
                message: "backend unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn recording_for_job(&self, job_id: &str) -> Result<RecordingInfo, BackendError> {
        self.lookups.write().await.push(job_id.to_string());
        self.check_available().await?;
        self.recordings
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("recording {}", job_id)))
    }

    async fn storage_group_dirs(&self, group: &str) -> Result<Vec<PathBuf>, BackendError> {
        self.check_available().await?;
        self.storage_groups
            .read()
            .await
            .get(group)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("storage group {}", group)))
    }

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        comment: &str,
    ) -> Result<(), BackendError> {
        self.check_available().await?;
        self.updates.write().await.push(RecordedStatusUpdate {
            job_id: job_id.to_string(),
            status,
            comment: comment.to_string(),
        });
        Ok(())
    }
}
