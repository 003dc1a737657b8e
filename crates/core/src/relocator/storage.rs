//! Storage group directory resolution.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::RelocatorError;
use crate::backend::Backend;
use crate::config::StorageSettings;
use crate::job::safe_file_name;

/// Resolves the directory a finished video is moved into.
#[derive(Clone)]
pub struct StorageResolver {
    settings: StorageSettings,
    backend: Option<Arc<dyn Backend>>,
}

impl StorageResolver {
    pub fn new(settings: StorageSettings, backend: Option<Arc<dyn Backend>>) -> Self {
        Self { settings, backend }
    }

    /// Directories of the configured storage group.
    ///
    /// Configured directories win; otherwise the backend is asked for the
    /// group's directories.
    pub async fn storage_dirs(&self) -> Result<Vec<PathBuf>, RelocatorError> {
        if !self.settings.directories.is_empty() {
            return Ok(self.settings.directories.clone());
        }

        let Some(ref backend) = self.backend else {
            return Err(RelocatorError::NoStorageDirectory {
                reason: format!(
                    "no directories configured for storage group '{}' and no backend",
                    self.settings.group
                ),
            });
        };

        let dirs = backend
            .storage_group_dirs(&self.settings.group)
            .await
            .map_err(|e| RelocatorError::NoStorageDirectory {
                reason: format!("storage group '{}': {}", self.settings.group, e),
            })?;

        if dirs.is_empty() {
            return Err(RelocatorError::NoStorageDirectory {
                reason: format!("storage group '{}' has no directories", self.settings.group),
            });
        }
        debug!(group = %self.settings.group, count = dirs.len(), "Resolved storage group");
        Ok(dirs)
    }

    /// Target directory for a video titled `title`.
    pub async fn target_dir(&self, title: Option<&str>) -> Result<PathBuf, RelocatorError> {
        let dirs = self.storage_dirs().await?;
        let dir = find_series_dir(&dirs, title).await;
        info!(dir = %dir.display(), "Selected target directory");
        Ok(dir)
    }
}

/// Picks the directory of an existing episode of the same series.
///
/// Walks each directory recursively in sorted order and returns the parent of
/// the first file whose name starts with the title as written into video
/// file names. Falls back to the first directory. `dirs` must not be empty.
pub async fn find_series_dir(dirs: &[PathBuf], title: Option<&str>) -> PathBuf {
    let fallback = dirs.first().cloned().unwrap_or_default();
    let Some(prefix) = title.map(safe_file_name).filter(|p| !p.is_empty()) else {
        return fallback;
    };

    for dir in dirs {
        if let Some(found) = find_prefixed_file(dir, &prefix).await {
            if let Some(parent) = found.parent() {
                debug!(file = %found.display(), "Found existing episode");
                return parent.to_path_buf();
            }
        }
    }
    fallback
}

async fn find_prefixed_file(root: &Path, prefix: &str) -> Option<PathBuf> {
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
            continue;
        };
        let mut files = Vec::new();
        let mut subdirs = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            if file_type.is_dir() {
                subdirs.push(entry.path());
            } else {
                files.push(entry.path());
            }
        }
        files.sort();
        if let Some(hit) = files.into_iter().find(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with(prefix))
                .unwrap_or(false)
        }) {
            return Some(hit);
        }
        // Reverse so the smallest name is popped first.
        subdirs.sort();
        pending.extend(subdirs.into_iter().rev());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;
    use tempfile::TempDir;

    fn settings(dirs: Vec<PathBuf>) -> StorageSettings {
        StorageSettings {
            group: "Videos".to_string(),
            directories: dirs,
            checksum: None,
        }
    }

    #[tokio::test]
    async fn test_series_dir_found_recursively() {
        let temp = TempDir::new().unwrap();
        let shows = temp.path().join("shows");
        std::fs::create_dir_all(shows.join("Krimi/Tatort")).unwrap();
        std::fs::create_dir_all(shows.join("Doku")).unwrap();
        std::fs::write(shows.join("Krimi/Tatort/Tatort_-_Borowski.m4v"), b"x").unwrap();
        std::fs::write(shows.join("Doku/Terra_X.m4v"), b"x").unwrap();

        let dirs = [temp.path().join("other"), shows.clone()];
        let dir = find_series_dir(&dirs, Some("Tatort")).await;
        assert_eq!(dir, shows.join("Krimi/Tatort"));

        let dir = find_series_dir(&[shows.clone()], Some("Unknown Show")).await;
        assert_eq!(dir, shows);

        let dir = find_series_dir(&[shows.clone()], None).await;
        assert_eq!(dir, shows);
    }

    #[tokio::test]
    async fn test_title_is_underscored_for_matching() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("a")).unwrap();
        std::fs::write(temp.path().join("a/Terra_X_S01E01.m4v"), b"x").unwrap();

        let dir = find_series_dir(&[temp.path().to_path_buf()], Some("Terra X")).await;
        assert_eq!(dir, temp.path().join("a"));
    }

    #[tokio::test]
    async fn test_title_with_slash_matches_written_name() {
        let temp = TempDir::new().unwrap();
        let meta = crate::job::RecordingMetadata {
            title: Some("AC/DC Live".to_string()),
            subtitle: Some("Donington".to_string()),
            ..Default::default()
        };
        let written = crate::job::video_file_name(&meta, Path::new("/rec/1.ts"), "mkv");
        std::fs::create_dir_all(temp.path().join("music/acdc")).unwrap();
        std::fs::write(temp.path().join("music/acdc").join(&written), b"x").unwrap();
        std::fs::create_dir_all(temp.path().join("other")).unwrap();

        let dirs = [temp.path().join("other"), temp.path().join("music")];
        let dir = find_series_dir(&dirs, Some("AC/DC Live")).await;
        assert_eq!(dir, temp.path().join("music/acdc"));
    }

    #[tokio::test]
    async fn test_configured_dirs_win_over_backend() {
        let backend = Arc::new(MockBackend::new());
        backend
            .add_storage_group("Videos", vec![PathBuf::from("/srv/backend")])
            .await;

        let resolver = StorageResolver::new(
            settings(vec![PathBuf::from("/srv/configured")]),
            Some(backend.clone()),
        );
        assert_eq!(
            resolver.storage_dirs().await.unwrap(),
            vec![PathBuf::from("/srv/configured")]
        );

        let resolver = StorageResolver::new(settings(vec![]), Some(backend));
        assert_eq!(
            resolver.storage_dirs().await.unwrap(),
            vec![PathBuf::from("/srv/backend")]
        );
    }

    #[tokio::test]
    async fn test_no_storage_directory() {
        let resolver = StorageResolver::new(settings(vec![]), None);
        assert!(matches!(
            resolver.storage_dirs().await,
            Err(RelocatorError::NoStorageDirectory { .. })
        ));

        let backend = Arc::new(MockBackend::new());
        let resolver = StorageResolver::new(settings(vec![]), Some(backend));
        assert!(matches!(
            resolver.storage_dirs().await,
            Err(RelocatorError::NoStorageDirectory { .. })
        ));
    }
}
