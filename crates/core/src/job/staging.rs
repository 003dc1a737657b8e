//! Per-job staging directories.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::naming::safe_file_name;

/// A staging directory removed, with everything in it, when dropped.
///
/// Intermediate segment files and the unrelocated result live here, so a
/// failed or timed-out run leaves nothing behind.
#[derive(Debug)]
pub struct StagingArea {
    path: PathBuf,
}

impl StagingArea {
    /// Creates `root/<job_id>-<random>`. Separators in `job_id` are replaced,
    /// so the directory always sits directly below `root`.
    pub async fn create(root: &Path, job_id: &str) -> std::io::Result<Self> {
        let name = format!("{}-{}", safe_file_name(job_id), uuid::Uuid::new_v4().simple());
        let path = root.join(name);
        tokio::fs::create_dir_all(&path).await?;
        debug!(path = %path.display(), "Created staging area");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed staging area"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove staging area"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_staging_removed_on_drop() {
        let root = TempDir::new().unwrap();
        let staging = StagingArea::create(root.path(), "job-7").await.unwrap();
        let path = staging.path().to_path_buf();

        std::fs::write(path.join("part_01.m4v"), b"segment").unwrap();
        assert!(path.exists());

        drop(staging);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_job_id_cannot_escape_root() {
        let root = TempDir::new().unwrap();
        let staging_root = root.path().join("staging");

        for job_id in ["../../etc", "/tmp/x", "..", "a/../../b"] {
            let staging = StagingArea::create(&staging_root, job_id).await.unwrap();
            assert_eq!(staging.path().parent(), Some(staging_root.as_path()));
        }
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);
    }
}
