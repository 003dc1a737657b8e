//! Testing utilities: a mock backend, fake external tools and fixtures.
//!
//! # Example
//!
//! ```rust,ignore
//! use rectovid_core::testing::{fixtures, FakeTools, MockBackend};
//!
//! let tools = FakeTools::install(bin_dir)?;
//! let config = fixtures::config(&tools, staging_dir, storage_dir, "mode = \"copy\"");
//! let ctx = AppContext::with_backend(config, Arc::new(MockBackend::new()));
//! ```

mod fake_tools;
mod mock_backend;

pub use fake_tools::{write_script, FakeTools, FFMPEG, MUXER, NOTIFIER, TRANSCODER};
pub use mock_backend::{MockBackend, RecordedStatusUpdate};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use super::FakeTools;
    use crate::backend::RecordingInfo;
    use crate::config::{load_config_from_str, validate_config, EffectiveConfig};
    use crate::job::RecordingMetadata;

    /// Builds a validated configuration that uses the fake tools, a static
    /// storage directory and no notifications or backend.
    ///
    /// `general` is spliced into the `[general]` section, e.g. `mode = "copy"`.
    pub fn config(
        tools: &FakeTools,
        staging_dir: &Path,
        storage_dir: &Path,
        general: &str,
    ) -> EffectiveConfig {
        config_with(tools, staging_dir, storage_dir, general, "")
    }

    /// Like [`config`], with extra TOML sections appended.
    pub fn config_with(
        tools: &FakeTools,
        staging_dir: &Path,
        storage_dir: &Path,
        general: &str,
        extra: &str,
    ) -> EffectiveConfig {
        let tools_config = tools.tools_config();
        let toml = format!(
            r#"
[general]
staging_dir = {staging:?}
kill_grace_secs = 1
{general}

[storage]
directories = [{storage:?}]

[backend]
url = ""

[notifications]
enabled = false

[tools]
muxer = {muxer:?}
extractor = {extractor:?}
transcoder = {transcoder:?}
concatenator = {concatenator:?}
notifier = {notifier:?}

{extra}
"#,
            staging = staging_dir.display().to_string(),
            storage = storage_dir.display().to_string(),
            muxer = tools_config.muxer.display().to_string(),
            extractor = tools_config.extractor.display().to_string(),
            transcoder = tools_config.transcoder.display().to_string(),
            concatenator = tools_config.concatenator.display().to_string(),
            notifier = tools_config.notifier.display().to_string(),
        );
        let raw = load_config_from_str(&toml).unwrap_or_else(|e| panic!("{}\n{}", e, toml));
        validate_config(&raw).unwrap_or_else(|e| panic!("{}\n{}", e, toml))
    }

    /// Recording info as the backend would return it.
    pub fn recording_info(file_name: &str, title: &str) -> RecordingInfo {
        RecordingInfo {
            file_name: file_name.to_string(),
            storage_group: Some("Default".to_string()),
            metadata: RecordingMetadata {
                title: Some(title.to_string()),
                ..Default::default()
            },
        }
    }

    /// Writes a fake recording file.
    pub fn recording(dir: &Path, name: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"fake mpeg-ts data").unwrap_or_else(|e| panic!("{}", e));
        path
    }
}
