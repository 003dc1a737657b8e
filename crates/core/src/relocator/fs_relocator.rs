//! File system relocator implementation.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, info, warn};

use super::error::RelocatorError;
use super::types::{ChecksumType, RelocationMethod, RelocationRequest, RelocationResult};

/// Buffer size for file copies in bytes.
const DEFAULT_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// EXDEV on Linux.
const EXDEV: i32 = 18;

/// Moves finished videos into storage without ever overwriting a file or
/// leaving a partial one at the destination.
///
/// On the same filesystem the file is hard-linked into place, which fails
/// atomically if the name is taken. Across filesystems it is copied to a
/// hidden partial file next to the destination, verified, and then linked
/// into place the same way.
#[derive(Debug, Clone)]
pub struct FsRelocator {
    buffer_size: usize,
    prefer_atomic_moves: bool,
}

impl Default for FsRelocator {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            prefer_atomic_moves: true,
        }
    }
}

impl FsRelocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always take the copy path, as for a cross-device move.
    pub fn with_atomic_moves(mut self, enabled: bool) -> Self {
        self.prefer_atomic_moves = enabled;
        self
    }

    /// Moves `request.source` to `request.destination`.
    pub async fn relocate(
        &self,
        request: &RelocationRequest,
    ) -> Result<RelocationResult, RelocatorError> {
        let start = Instant::now();
        let source = &request.source;
        let destination = &request.destination;

        let source_meta = fs::metadata(source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RelocatorError::SourceNotFound {
                    path: source.clone(),
                }
            } else {
                RelocatorError::Io(e)
            }
        })?;

        if fs::try_exists(destination).await? {
            return Err(RelocatorError::DestinationExists {
                path: destination.clone(),
            });
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                RelocatorError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source: e,
                }
            })?;
        }

        let moved = if self.prefer_atomic_moves {
            self.try_atomic_move(source, destination).await?
        } else {
            false
        };

        let (method, checksum) = if moved {
            (RelocationMethod::Moved, None)
        } else {
            debug!(
                source = %source.display(),
                destination = %destination.display(),
                "Falling back to copy"
            );
            let checksum = self
                .copy_into_place(source, destination, source_meta.len(), request.verify_checksum)
                .await?;
            if let Err(e) = fs::remove_file(source).await {
                warn!(path = %source.display(), error = %e, "Failed to remove staged file");
            }
            (RelocationMethod::Copied, checksum)
        };

        let result = RelocationResult {
            destination: destination.clone(),
            size_bytes: source_meta.len(),
            method,
            checksum,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            destination = %result.destination.display(),
            size_bytes = result.size_bytes,
            method = ?result.method,
            "Relocated video"
        );
        Ok(result)
    }

    /// Links `source` to `destination` and unlinks `source`.
    ///
    /// Returns `Ok(false)` when the two are on different filesystems.
    async fn try_atomic_move(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<bool, RelocatorError> {
        match place_without_overwrite(source, destination).await {
            Ok(()) => {
                if let Err(e) = fs::remove_file(source).await {
                    // Both names point at the same data; the staging area
                    // removal takes care of the leftover link.
                    debug!(path = %source.display(), error = %e, "Failed to unlink staged file");
                }
                Ok(true)
            }
            Err(e) if is_cross_device(&e) => Ok(false),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(RelocatorError::DestinationExists {
                    path: destination.to_path_buf(),
                })
            }
            Err(e) => Err(RelocatorError::move_failed(
                source.to_path_buf(),
                destination.to_path_buf(),
                e,
            )),
        }
    }

    /// Copies to a partial file beside `destination`, verifies it, then
    /// places it under the final name.
    async fn copy_into_place(
        &self,
        source: &Path,
        destination: &Path,
        expected_size: u64,
        verify: Option<ChecksumType>,
    ) -> Result<Option<String>, RelocatorError> {
        let partial = PartialFile::new(partial_path(destination));

        let (copied, source_checksum) = self
            .copy_file(source, partial.path(), verify)
            .await?;

        if copied != expected_size {
            return Err(RelocatorError::VerificationFailed {
                path: partial.path().to_path_buf(),
                expected: format!("{} bytes", expected_size),
                actual: format!("{} bytes", copied),
            });
        }

        let checksum = match (verify, source_checksum) {
            (Some(kind), Some(expected)) => {
                let actual = self.calculate_checksum(partial.path(), kind).await?;
                if actual != expected {
                    return Err(RelocatorError::VerificationFailed {
                        path: partial.path().to_path_buf(),
                        expected,
                        actual,
                    });
                }
                debug!(checksum = %actual, kind = %kind, "Copy verified");
                Some(actual)
            }
            _ => None,
        };

        place_without_overwrite(partial.path(), destination)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    RelocatorError::DestinationExists {
                        path: destination.to_path_buf(),
                    }
                } else {
                    RelocatorError::move_failed(
                        partial.path().to_path_buf(),
                        destination.to_path_buf(),
                        e,
                    )
                }
            })?;

        Ok(checksum)
    }

    /// Copies a file, hashing what was read when `checksum` is set.
    async fn copy_file(
        &self,
        source: &Path,
        destination: &Path,
        checksum: Option<ChecksumType>,
    ) -> Result<(u64, Option<String>), RelocatorError> {
        let source_file = File::open(source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RelocatorError::SourceNotFound {
                    path: source.to_path_buf(),
                }
            } else {
                RelocatorError::Io(e)
            }
        })?;

        let dest_file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(destination)
            .await
            .map_err(|e| {
                RelocatorError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
            })?;

        let mut reader = BufReader::with_capacity(self.buffer_size, source_file);
        let mut writer = BufWriter::with_capacity(self.buffer_size, dest_file);
        let mut hasher = Hasher::new(checksum);

        let mut total_bytes = 0u64;
        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            let bytes_read = reader.read(&mut buffer).await.map_err(|e| {
                RelocatorError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
            })?;

            if bytes_read == 0 {
                break;
            }

            hasher.update(&buffer[..bytes_read]);

            writer.write_all(&buffer[..bytes_read]).await.map_err(|e| {
                RelocatorError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
            })?;

            total_bytes += bytes_read as u64;
        }

        writer.flush().await.map_err(|e| {
            RelocatorError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
        })?;
        writer.get_ref().sync_all().await.map_err(|e| {
            RelocatorError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
        })?;

        Ok((total_bytes, hasher.finish()))
    }

    /// Calculates the checksum of a file using the specified algorithm.
    async fn calculate_checksum(
        &self,
        path: &Path,
        checksum_type: ChecksumType,
    ) -> Result<String, RelocatorError> {
        let file = File::open(path)
            .await
            .map_err(|e| RelocatorError::ChecksumCalculationFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        let mut reader = BufReader::with_capacity(self.buffer_size, file);
        let mut buffer = vec![0u8; self.buffer_size];
        let mut hasher = Hasher::new(Some(checksum_type));

        loop {
            let bytes_read = reader.read(&mut buffer).await.map_err(|e| {
                RelocatorError::ChecksumCalculationFailed {
                    path: path.to_path_buf(),
                    source: e,
                }
            })?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hasher.finish().unwrap_or_default())
    }
}

/// Incremental checksum over either algorithm.
enum Hasher {
    None,
    Sha256(Sha256),
    Md5(md5::Context),
}

impl Hasher {
    fn new(kind: Option<ChecksumType>) -> Self {
        match kind {
            None => Self::None,
            Some(ChecksumType::Sha256) => Self::Sha256(Sha256::new()),
            Some(ChecksumType::Md5) => Self::Md5(md5::Context::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::None => {}
            Self::Sha256(h) => h.update(data),
            Self::Md5(c) => c.consume(data),
        }
    }

    fn finish(self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Sha256(h) => Some(format!("{:x}", h.finalize())),
            Self::Md5(c) => Some(format!("{:x}", c.compute())),
        }
    }
}

/// A temporary file removed on drop unless it was linked into place.
struct PartialFile {
    path: PathBuf,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove partial file"
            ),
        }
    }
}

/// Hidden sibling of `destination` used while copying.
fn partial_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    destination.with_file_name(format!(
        ".{}.{}.partial",
        name,
        uuid::Uuid::new_v4().simple()
    ))
}

/// Gives `source` the name `destination`, failing with `AlreadyExists` rather
/// than replacing an existing file.
///
/// Uses a hard link, which is atomic. Filesystems without hard links fall back
/// to an existence check followed by a rename.
async fn place_without_overwrite(source: &Path, destination: &Path) -> std::io::Result<()> {
    match fs::hard_link(source, destination).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists || is_cross_device(&e) => Err(e),
        Err(e) => {
            debug!(error = %e, "Hard link unavailable, renaming");
            if fs::try_exists(destination).await? {
                return Err(std::io::Error::from(std::io::ErrorKind::AlreadyExists));
            }
            fs::rename(source, destination).await
        }
    }
}

fn is_cross_device(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(EXDEV)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(source: PathBuf, destination: PathBuf) -> RelocationRequest {
        RelocationRequest {
            source,
            destination,
            verify_checksum: None,
        }
    }

    #[tokio::test]
    async fn test_relocate_same_filesystem() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("staging/Tatort.m4v");
        let destination = temp.path().join("videos/Tatort/Tatort.m4v");
        fs::create_dir_all(source.parent().unwrap()).await.unwrap();
        fs::write(&source, "video data").await.unwrap();

        let result = FsRelocator::new()
            .relocate(&request(source.clone(), destination.clone()))
            .await
            .unwrap();

        assert_eq!(result.method, RelocationMethod::Moved);
        assert_eq!(result.size_bytes, 10);
        assert!(!source.exists());
        assert_eq!(fs::read_to_string(&destination).await.unwrap(), "video data");
    }

    #[tokio::test]
    async fn test_relocate_by_copy_with_checksum() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("Tatort.m4v");
        let destination = temp.path().join("videos/Tatort.m4v");
        fs::write(&source, "test content for checksum").await.unwrap();

        for kind in [ChecksumType::Sha256, ChecksumType::Md5] {
            let _ = fs::remove_file(&destination).await;
            fs::write(&source, "test content for checksum").await.unwrap();

            let result = FsRelocator::new()
                .with_atomic_moves(false)
                .relocate(&RelocationRequest {
                    source: source.clone(),
                    destination: destination.clone(),
                    verify_checksum: Some(kind),
                })
                .await
                .unwrap();

            assert_eq!(result.method, RelocationMethod::Copied);
            assert!(result.checksum.is_some());
            assert!(!source.exists());
            assert!(destination.exists());
        }

        // no partial files left next to the destination
        let mut entries = fs::read_dir(temp.path().join("videos")).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["Tatort.m4v".to_string()]);
    }

    #[tokio::test]
    async fn test_destination_exists_is_untouched() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source.m4v");
        let destination = temp.path().join("output.m4v");
        fs::write(&source, "new content").await.unwrap();
        fs::write(&destination, "existing content").await.unwrap();

        for atomic in [true, false] {
            let err = FsRelocator::new()
                .with_atomic_moves(atomic)
                .relocate(&request(source.clone(), destination.clone()))
                .await
                .unwrap_err();

            assert!(matches!(err, RelocatorError::DestinationExists { .. }));
            assert_eq!(
                fs::read_to_string(&destination).await.unwrap(),
                "existing content"
            );
            assert!(source.exists());
        }
    }

    #[tokio::test]
    async fn test_missing_source() {
        let temp = TempDir::new().unwrap();
        let err = FsRelocator::new()
            .relocate(&request(
                temp.path().join("missing.m4v"),
                temp.path().join("out.m4v"),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, RelocatorError::SourceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_failed_copy_leaves_no_partial_file() {
        let temp = TempDir::new().unwrap();
        let destination_dir = temp.path().join("videos");
        fs::create_dir_all(&destination_dir).await.unwrap();
        let destination = destination_dir.join("Tatort.m4v");

        // a directory cannot be read as a file, so the copy fails after the
        // partial file was created
        let source = temp.path().join("not-a-file.m4v");
        fs::create_dir_all(&source).await.unwrap();

        let result = FsRelocator::new()
            .with_atomic_moves(false)
            .relocate(&request(source, destination.clone()))
            .await;

        assert!(result.is_err());
        assert!(!destination.exists());
        let mut entries = fs::read_dir(&destination_dir).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[test]
    fn test_partial_path_is_hidden_sibling() {
        let partial = partial_path(Path::new("/srv/video/Tatort.m4v"));
        assert_eq!(partial.parent(), Some(Path::new("/srv/video")));
        let name = partial.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(".Tatort.m4v."));
        assert!(name.ends_with(".partial"));
    }
}
