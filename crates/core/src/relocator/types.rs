//! Types for the relocator module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Type of checksum used to verify copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumType {
    /// SHA-256 checksum.
    Sha256,
    /// MD5 checksum (faster but less secure).
    Md5,
}

impl fmt::Display for ChecksumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::Md5 => write!(f, "md5"),
        }
    }
}

impl FromStr for ChecksumType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" => Ok(Self::Sha256),
            "md5" => Ok(Self::Md5),
            other => Err(format!("unknown checksum type '{}'", other)),
        }
    }
}

/// A request to move one file into storage.
#[derive(Debug, Clone)]
pub struct RelocationRequest {
    /// File in staging.
    pub source: PathBuf,
    /// Final path. Must not exist yet.
    pub destination: PathBuf,
    /// Verify cross-device copies with this checksum.
    pub verify_checksum: Option<ChecksumType>,
}

/// How the file got to its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelocationMethod {
    /// Same filesystem: linked or renamed in place.
    Moved,
    /// Different filesystem: copied, verified, then the source removed.
    Copied,
}

/// Result of a successful relocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelocationResult {
    /// Final destination path.
    pub destination: PathBuf,
    /// File size in bytes.
    pub size_bytes: u64,
    pub method: RelocationMethod,
    /// Checksum of the copy, if verified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Duration in milliseconds.
    pub duration_ms: u64,
}
