use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::relocator::ChecksumType;

/// Root configuration as read from the layered sources, before validation.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub transcoding: TranscodingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub postprocessing: PostprocessingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

/// `[general]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Processing mode: copy, extract or transcode.
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Per-invocation tool timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: i64,
    /// Root directory for per-job staging areas.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    /// Seconds between SIGTERM and SIGKILL when a tool overruns.
    #[serde(default = "default_kill_grace")]
    pub kill_grace_secs: u64,
    /// Delete the source recording after a successful move.
    #[serde(default)]
    pub delete_source: bool,
    /// Precomputed cut-list describing the segments to keep.
    #[serde(default)]
    pub cutlist: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            timeout: default_timeout(),
            staging_dir: default_staging_dir(),
            kill_grace_secs: default_kill_grace(),
            delete_source: false,
            cutlist: None,
        }
    }
}

fn default_mode() -> String {
    Mode::Transcode.as_str().to_string()
}

fn default_timeout() -> i64 {
    4 * 3600
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir().join("rectovid")
}

fn default_kill_grace() -> u64 {
    5
}

/// `[transcoding]` section. `preset` and `preset_file` are mutually exclusive.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TranscodingConfig {
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub preset_file: Option<PathBuf>,
}

/// Preset used when transcoding without an explicit preset or preset file.
pub const DEFAULT_PRESET: &str = "General/HQ 1080p30 Surround";

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[postprocessing]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PostprocessingConfig {
    /// Command template, run through `sh -c` after a successful move.
    #[serde(default)]
    pub command: Option<String>,
    /// Optional timeout in seconds; unbounded when unset.
    #[serde(default)]
    pub timeout: Option<i64>,
}

/// `[storage]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Storage group queried from the backend.
    #[serde(default = "default_storage_group")]
    pub group: String,
    /// Explicit target directories. When non-empty the backend is not queried.
    #[serde(default)]
    pub directories: Vec<PathBuf>,
    /// Checksum used to verify cross-device copies (sha256, md5, none).
    #[serde(default = "default_verify_checksum")]
    pub verify_checksum: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            group: default_storage_group(),
            directories: Vec::new(),
            verify_checksum: default_verify_checksum(),
        }
    }
}

fn default_storage_group() -> String {
    "Videos".to_string()
}

fn default_verify_checksum() -> String {
    "sha256".to_string()
}

/// `[backend]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Services API base URL. Empty disables the backend.
    #[serde(default = "default_backend_url")]
    pub url: String,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
    /// Endpoint receiving job status updates. Updates are skipped when unset.
    #[serde(default)]
    pub job_status_endpoint: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            timeout_secs: default_backend_timeout(),
            job_status_endpoint: None,
        }
    }
}

fn default_backend_url() -> String {
    "http://localhost:6544".to_string()
}

fn default_backend_timeout() -> u64 {
    30
}

/// `[tools]` section: executables for each external collaborator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default = "default_muxer")]
    pub muxer: PathBuf,
    #[serde(default = "default_ffmpeg")]
    pub extractor: PathBuf,
    #[serde(default = "default_transcoder")]
    pub transcoder: PathBuf,
    #[serde(default = "default_ffmpeg")]
    pub concatenator: PathBuf,
    #[serde(default = "default_notifier")]
    pub notifier: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            muxer: default_muxer(),
            extractor: default_ffmpeg(),
            transcoder: default_transcoder(),
            concatenator: default_ffmpeg(),
            notifier: default_notifier(),
        }
    }
}

fn default_muxer() -> PathBuf {
    PathBuf::from("mkvmerge")
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_transcoder() -> PathBuf {
    PathBuf::from("HandBrakeCLI")
}

fn default_notifier() -> PathBuf {
    PathBuf::from("mythutil")
}

/// `[notifications]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationsConfig {
    /// Send a frontend notification on success and failure.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Trigger a video library rescan after success.
    #[serde(default = "default_true")]
    pub scan_videos: bool,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_videos: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Processing mode, resolved once from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Stream copy through the muxer, cutting and joining in one pass.
    Copy,
    /// Per-segment stream copy through the extractor, then merged.
    Extract,
    /// Per-segment transcode with a preset, then merged.
    Transcode,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Extract => "extract",
            Self::Transcode => "transcode",
        }
    }

    /// Container extension of the files this mode produces.
    pub fn output_extension(&self) -> &'static str {
        match self {
            Self::Copy | Self::Extract => "mkv",
            Self::Transcode => "m4v",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "copy" => Ok(Self::Copy),
            "extract" => Ok(Self::Extract),
            "transcode" => Ok(Self::Transcode),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

/// Log verbosity accepted in `[logging] log_level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error | Self::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Resolved transcoding preset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresetSource {
    /// A preset built into the transcoder, e.g. "General/HQ 1080p30 Surround".
    Named(String),
    /// A preset file; `name` is the first preset it defines.
    File { path: PathBuf, name: String },
}

impl PresetSource {
    pub fn name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::File { name, .. } => name,
        }
    }
}

/// Validated logging settings.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub log_file: Option<PathBuf>,
    pub level: LogLevel,
}

/// Validated postprocessing settings.
#[derive(Debug, Clone)]
pub struct PostprocessSettings {
    pub command: String,
    pub timeout: Option<Duration>,
}

/// Validated storage settings.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub group: String,
    pub directories: Vec<PathBuf>,
    pub checksum: Option<ChecksumType>,
}

/// Validated backend settings.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub url: String,
    pub timeout: Duration,
    pub job_status_endpoint: Option<String>,
}

/// The effective, validated configuration. Read-only once built.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub mode: Mode,
    /// Set only in transcode mode.
    pub preset: Option<PresetSource>,
    pub timeout: Duration,
    pub kill_grace: Duration,
    pub staging_dir: PathBuf,
    pub delete_source: bool,
    pub cutlist: Option<PathBuf>,
    pub logging: LoggingSettings,
    pub postprocessing: Option<PostprocessSettings>,
    pub storage: StorageSettings,
    pub backend: Option<BackendSettings>,
    pub tools: ToolsConfig,
    pub notifications: NotificationsConfig,
}
