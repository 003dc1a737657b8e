//! Client for the platform's HTTP services API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use super::{Backend, BackendError, RecordingInfo};
use crate::config::BackendSettings;
use crate::job::RecordingMetadata;
use crate::reporter::JobStatus;

/// Services API client.
pub struct ServicesBackend {
    client: Client,
    base_url: String,
    job_status_endpoint: Option<String>,
}

impl ServicesBackend {
    /// Create a new client.
    pub fn new(settings: &BackendSettings) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(settings.timeout).build()?;

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            job_status_endpoint: settings.job_status_endpoint.clone(),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        what: &str,
    ) -> Result<T, BackendError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == 404 {
            return Err(BackendError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| BackendError::ParseError(format!("Failed to parse {}: {}", what, e)))
    }
}

#[async_trait]
impl Backend for ServicesBackend {
    fn name(&self) -> &str {
        "services"
    }

    async fn recording_for_job(&self, job_id: &str) -> Result<RecordingInfo, BackendError> {
        let url = format!(
            "{}/Dvr/GetRecorded?RecordedId={}",
            self.base_url,
            urlencoding::encode(job_id)
        );
        debug!(job_id = %job_id, "Looking up recording");

        let response: GetRecordedResponse = self.get_json(&url, "recording").await?;
        response.into_recording_info(job_id)
    }

    async fn storage_group_dirs(&self, group: &str) -> Result<Vec<PathBuf>, BackendError> {
        let url = format!(
            "{}/Myth/GetStorageGroupDirs?GroupName={}",
            self.base_url,
            urlencoding::encode(group)
        );
        debug!(group = %group, "Listing storage group directories");

        let response: StorageGroupDirsResponse =
            self.get_json(&url, "storage group directories").await?;
        Ok(response.into_dirs())
    }

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        comment: &str,
    ) -> Result<(), BackendError> {
        let Some(ref endpoint) = self.job_status_endpoint else {
            debug!(job_id = %job_id, "No job status endpoint configured, skipping update");
            return Ok(());
        };

        let update = JobStatusUpdate {
            job_id,
            status,
            comment,
        };
        let response = self.client.post(endpoint).json(&update).send().await?;

        let code = response.status();
        if !code.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::ApiError {
                status: code.as_u16(),
                message: body,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct JobStatusUpdate<'a> {
    job_id: &'a str,
    status: JobStatus,
    comment: &'a str,
}

// ============================================================================
// API response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct GetRecordedResponse {
    #[serde(rename = "Program")]
    program: Option<ApiProgram>,
}

#[derive(Debug, Deserialize)]
struct ApiProgram {
    #[serde(rename = "Title", default)]
    title: String,
    #[serde(rename = "SubTitle", default)]
    sub_title: String,
    #[serde(rename = "Season", default)]
    season: NumberOrString,
    #[serde(rename = "Episode", default)]
    episode: NumberOrString,
    #[serde(rename = "FileName", default)]
    file_name: String,
    #[serde(rename = "Recording")]
    recording: Option<ApiRecording>,
}

#[derive(Debug, Deserialize)]
struct ApiRecording {
    #[serde(rename = "StorageGroup", default)]
    storage_group: String,
}

/// The services API renders integers as JSON strings.
#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u32),
    Text(String),
    #[default]
    Missing,
}

impl NumberOrString {
    fn value(&self) -> u32 {
        match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse().unwrap_or(0),
            Self::Missing => 0,
        }
    }
}

impl GetRecordedResponse {
    fn into_recording_info(self, job_id: &str) -> Result<RecordingInfo, BackendError> {
        let program = self
            .program
            .ok_or_else(|| BackendError::NotFound(format!("recording {}", job_id)))?;

        if program.file_name.trim().is_empty() {
            return Err(BackendError::NotFound(format!(
                "recording {} has no file",
                job_id
            )));
        }

        let non_empty = |s: String| {
            let s = s.trim().to_string();
            (!s.is_empty()).then_some(s)
        };

        // FileName may be a full path on some versions.
        let file_name = std::path::Path::new(program.file_name.trim())
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(RecordingInfo {
            file_name,
            storage_group: program.recording.and_then(|r| non_empty(r.storage_group)),
            metadata: RecordingMetadata {
                title: non_empty(program.title),
                subtitle: non_empty(program.sub_title),
                season: program.season.value(),
                episode: program.episode.value(),
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct StorageGroupDirsResponse {
    #[serde(rename = "StorageGroupDirList")]
    list: StorageGroupDirList,
}

#[derive(Debug, Deserialize)]
struct StorageGroupDirList {
    #[serde(rename = "StorageGroupDirs", default)]
    dirs: Vec<ApiStorageGroupDir>,
}

#[derive(Debug, Deserialize)]
struct ApiStorageGroupDir {
    #[serde(rename = "DirName", default)]
    dir_name: String,
}

impl StorageGroupDirsResponse {
    fn into_dirs(self) -> Vec<PathBuf> {
        self.list
            .dirs
            .into_iter()
            .map(|d| d.dir_name.trim().to_string())
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .collect()
    }
}
