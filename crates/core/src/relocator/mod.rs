//! Storage relocator: moves finished videos from staging into storage.
//!
//! The target directory comes from the storage group, either configured
//! directly or looked up through the backend. Moving never overwrites an
//! existing file and never leaves a partially written file at the target.

mod error;
mod fs_relocator;
mod storage;
mod types;

pub use error::RelocatorError;
pub use fs_relocator::FsRelocator;
pub use storage::{find_series_dir, StorageResolver};
pub use types::{ChecksumType, RelocationMethod, RelocationRequest, RelocationResult};

use std::path::Path;
use tracing::info;

/// Deletes the source recording after a successful run.
pub async fn delete_recording(path: &Path) -> Result<(), RelocatorError> {
    tokio::fs::remove_file(path).await?;
    info!(path = %path.display(), "Deleted source recording");
    Ok(())
}
