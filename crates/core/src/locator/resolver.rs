//! Recording resolution.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::types::{LocatedRecording, RecordingReference, Strategy};
use crate::backend::{Backend, RecordingInfo};
use crate::error::PipelineError;

/// Storage group searched when the backend does not name one.
const DEFAULT_RECORDING_GROUP: &str = "Default";

/// Resolves recording references. Read-only.
#[derive(Clone, Default)]
pub struct Locator {
    backend: Option<Arc<dyn Backend>>,
}

impl Locator {
    /// Without a backend, job ids cannot be resolved.
    pub fn new(backend: Option<Arc<dyn Backend>>) -> Self {
        Self { backend }
    }

    /// Resolves `reference` to one existing file.
    ///
    /// Fails with `NotFound` when no input resolves and with `AmbiguousInput`
    /// when two inputs resolve to different files.
    pub async fn locate(
        &self,
        reference: &RecordingReference,
    ) -> Result<LocatedRecording, PipelineError> {
        if reference.is_empty() {
            return Err(PipelineError::not_found(
                "no recording path, file or job id given",
            ));
        }

        let mut candidates: Vec<(Strategy, PathBuf)> = Vec::new();
        let mut failures: Vec<String> = Vec::new();
        let mut job_info: Option<RecordingInfo> = None;

        if let Some(ref path) = reference.path {
            match existing_file(path).await {
                Ok(p) => candidates.push((Strategy::FullPath, p)),
                Err(reason) => failures.push(format!("path {}: {}", path.display(), reason)),
            }
        }

        match (&reference.dir, &reference.file) {
            (Some(dir), Some(file)) => {
                let joined = dir.join(file);
                match existing_file(&joined).await {
                    Ok(p) => candidates.push((Strategy::DirAndFile, p)),
                    Err(reason) => {
                        failures.push(format!("file {}: {}", joined.display(), reason))
                    }
                }
            }
            (None, Some(file)) => match existing_file(file).await {
                Ok(p) => candidates.push((Strategy::File, p)),
                Err(reason) => failures.push(format!("file {}: {}", file.display(), reason)),
            },
            (Some(dir), None) if reference.job_id.is_none() => failures.push(format!(
                "directory {} given without a file name or job id",
                dir.display()
            )),
            _ => {}
        }

        if let Some(ref job_id) = reference.job_id {
            match self.resolve_job(job_id, reference.dir.as_deref()).await {
                Ok((p, info)) => {
                    candidates.push((Strategy::JobId, p));
                    job_info = Some(info);
                }
                Err(reason) => failures.push(format!("job {}: {}", job_id, reason)),
            }
        }

        let Some((strategy, path)) = candidates.first().cloned() else {
            return Err(PipelineError::not_found(failures.join("; ")));
        };

        for (other, other_path) in candidates.iter().skip(1) {
            if *other_path != path {
                return Err(PipelineError::ambiguous(format!(
                    "{} resolves to {} but {} resolves to {}",
                    strategy,
                    path.display(),
                    other,
                    other_path.display()
                )));
            }
        }

        for failure in &failures {
            warn!(reference = %reference, "Ignoring unresolved input: {}", failure);
        }
        info!(path = %path.display(), strategy = %strategy, "Located recording");

        Ok(LocatedRecording {
            path,
            strategy,
            metadata: job_info.map(|info| info.metadata).unwrap_or_default(),
        })
    }

    async fn resolve_job(
        &self,
        job_id: &str,
        dir: Option<&Path>,
    ) -> Result<(PathBuf, RecordingInfo), String> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| "no backend configured to resolve job ids".to_string())?;

        let info = backend
            .recording_for_job(job_id)
            .await
            .map_err(|e| e.to_string())?;
        debug!(job_id, file = %info.file_name, "Backend returned recording");

        if let Some(dir) = dir {
            let path = existing_file(&dir.join(&info.file_name)).await?;
            return Ok((path, info));
        }

        let group = info
            .storage_group
            .clone()
            .unwrap_or_else(|| DEFAULT_RECORDING_GROUP.to_string());
        let dirs = backend
            .storage_group_dirs(&group)
            .await
            .map_err(|e| e.to_string())?;

        for dir in &dirs {
            if let Ok(path) = existing_file(&dir.join(&info.file_name)).await {
                return Ok((path, info));
            }
        }
        Err(format!(
            "{} not found in storage group {}",
            info.file_name, group
        ))
    }
}

/// Canonical path of `path` if it names a regular file.
async fn existing_file(path: &Path) -> Result<PathBuf, String> {
    let canonical = tokio::fs::canonicalize(path)
        .await
        .map_err(|e| e.to_string())?;
    let meta = tokio::fs::metadata(&canonical)
        .await
        .map_err(|e| e.to_string())?;
    if !meta.is_file() {
        return Err("not a regular file".to_string());
    }
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockBackend};
    use tempfile::TempDir;

    async fn backend_with_recording(dir: &Path, job_id: &str, file: &str) -> Arc<MockBackend> {
        let backend = Arc::new(MockBackend::new());
        backend
            .add_recording(job_id, fixtures::recording_info(file, "Tatort"))
            .await;
        backend
            .add_storage_group("Default", vec![PathBuf::from("/nonexistent"), dir.to_path_buf()])
            .await;
        backend
    }

    #[tokio::test]
    async fn test_locate_by_path() {
        let temp = TempDir::new().unwrap();
        let rec = fixtures::recording(temp.path(), "1001 20240101.ts");

        let located = Locator::new(None)
            .locate(&RecordingReference::from_path(&rec))
            .await
            .unwrap();

        assert_eq!(located.path, rec.canonicalize().unwrap());
        assert_eq!(located.strategy, Strategy::FullPath);
        assert_eq!(located.metadata.title, None);
    }

    #[tokio::test]
    async fn test_path_and_job_id_agree() {
        let temp = TempDir::new().unwrap();
        let rec = fixtures::recording(temp.path(), "1001.ts");
        let backend = backend_with_recording(temp.path(), "42", "1001.ts").await;
        let locator = Locator::new(Some(backend.clone()));

        let by_path = locator
            .locate(&RecordingReference::from_path(&rec))
            .await
            .unwrap();
        let by_job = locator
            .locate(&RecordingReference::from_job("42"))
            .await
            .unwrap();
        let both = locator
            .locate(&RecordingReference {
                path: Some(rec.clone()),
                job_id: Some("42".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(by_path.path, by_job.path);
        assert_eq!(by_job.strategy, Strategy::JobId);
        assert_eq!(both.path, by_path.path);
        assert_eq!(both.strategy, Strategy::FullPath);
        assert_eq!(both.metadata.title.as_deref(), Some("Tatort"));
    }

    #[tokio::test]
    async fn test_dir_plus_job_id() {
        let temp = TempDir::new().unwrap();
        fixtures::recording(temp.path(), "1001.ts");
        let backend = Arc::new(MockBackend::new());
        backend
            .add_recording("42", fixtures::recording_info("1001.ts", "Tatort"))
            .await;

        let located = Locator::new(Some(backend))
            .locate(&RecordingReference {
                dir: Some(temp.path().to_path_buf()),
                job_id: Some("42".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(located.strategy, Strategy::JobId);
        assert!(located.path.ends_with("1001.ts"));
    }

    #[tokio::test]
    async fn test_conflicting_inputs_are_ambiguous() {
        let temp = TempDir::new().unwrap();
        fixtures::recording(temp.path(), "1001.ts");
        fixtures::recording(temp.path(), "1002.ts");
        let backend = backend_with_recording(temp.path(), "42", "1002.ts").await;

        let err = Locator::new(Some(backend))
            .locate(&RecordingReference {
                dir: Some(temp.path().to_path_buf()),
                file: Some(PathBuf::from("1001.ts")),
                job_id: Some("42".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::AmbiguousInput { .. }));
    }

    #[tokio::test]
    async fn test_falls_back_to_lower_priority_input() {
        let temp = TempDir::new().unwrap();
        let rec = fixtures::recording(temp.path(), "1001.ts");

        let located = Locator::new(None)
            .locate(&RecordingReference {
                path: Some(temp.path().join("missing.ts")),
                dir: Some(temp.path().to_path_buf()),
                file: Some(PathBuf::from("1001.ts")),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(located.path, rec.canonicalize().unwrap());
        assert_eq!(located.strategy, Strategy::DirAndFile);
    }

    #[tokio::test]
    async fn test_not_found() {
        let temp = TempDir::new().unwrap();
        let locator = Locator::new(None);

        let err = locator
            .locate(&RecordingReference::from_path(temp.path().join("gone.ts")))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound { .. }));

        // a directory is not a recording
        let err = locator
            .locate(&RecordingReference::from_path(temp.path()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a regular file"));

        let err = locator
            .locate(&RecordingReference::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_job_id_without_backend() {
        let err = Locator::new(None)
            .locate(&RecordingReference::from_job("42"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no backend"));
    }
}
