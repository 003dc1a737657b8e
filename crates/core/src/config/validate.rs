use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use super::types::{
    BackendSettings, Config, EffectiveConfig, LogLevel, LoggingSettings, Mode,
    PostprocessSettings, PresetSource, StorageSettings, DEFAULT_PRESET,
};
use super::ConfigError;
use crate::relocator::ChecksumType;

/// Validate configuration and resolve it into an [`EffectiveConfig`].
///
/// Fails when:
/// - the mode is unknown
/// - transcode mode has both a preset and a preset file
/// - a timeout is not positive
/// - the log level or checksum type is unknown
/// - the preset file cannot be read or names no preset
pub fn validate_config(config: &Config) -> Result<EffectiveConfig, ConfigError> {
    let mode: Mode = config
        .general
        .mode
        .parse()
        .map_err(ConfigError::ValidationError)?;

    if config.general.timeout <= 0 {
        return Err(ConfigError::ValidationError(format!(
            "general.timeout must be positive, got {}",
            config.general.timeout
        )));
    }

    let level: LogLevel = config
        .logging
        .log_level
        .parse()
        .map_err(ConfigError::ValidationError)?;

    let preset = resolve_preset(config, mode)?;

    let postprocessing = match config.postprocessing.command.as_deref().map(str::trim) {
        Some(command) if !command.is_empty() => {
            let timeout = match config.postprocessing.timeout {
                Some(secs) if secs <= 0 => {
                    return Err(ConfigError::ValidationError(format!(
                        "postprocessing.timeout must be positive, got {}",
                        secs
                    )));
                }
                Some(secs) => Some(Duration::from_secs(secs as u64)),
                None => None,
            };
            Some(PostprocessSettings {
                command: command.to_string(),
                timeout,
            })
        }
        _ => None,
    };

    let checksum = match config.storage.verify_checksum.trim().to_ascii_lowercase().as_str() {
        "sha256" => Some(ChecksumType::Sha256),
        "md5" => Some(ChecksumType::Md5),
        "none" | "" => None,
        other => {
            return Err(ConfigError::ValidationError(format!(
                "unknown storage.verify_checksum '{}'",
                other
            )));
        }
    };

    let backend_url = config.backend.url.trim();
    let backend = if backend_url.is_empty() {
        None
    } else {
        Some(BackendSettings {
            url: backend_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.backend.timeout_secs.max(1)),
            job_status_endpoint: config.backend.job_status_endpoint.clone(),
        })
    };

    Ok(EffectiveConfig {
        mode,
        preset,
        timeout: Duration::from_secs(config.general.timeout as u64),
        kill_grace: Duration::from_secs(config.general.kill_grace_secs),
        staging_dir: config.general.staging_dir.clone(),
        delete_source: config.general.delete_source,
        cutlist: config.general.cutlist.clone(),
        logging: LoggingSettings {
            log_file: config.logging.log_file.clone(),
            level,
        },
        postprocessing,
        storage: StorageSettings {
            group: config.storage.group.clone(),
            directories: config.storage.directories.clone(),
            checksum,
        },
        backend,
        tools: config.tools.clone(),
        notifications: config.notifications.clone(),
    })
}

fn resolve_preset(config: &Config, mode: Mode) -> Result<Option<PresetSource>, ConfigError> {
    let preset = config.transcoding.preset.as_deref().map(str::trim);
    let preset_file = config.transcoding.preset_file.as_deref();

    if mode != Mode::Transcode {
        if preset.is_some() || preset_file.is_some() {
            warn!(mode = %mode, "Ignoring transcoding preset outside transcode mode");
        }
        return Ok(None);
    }

    match (preset, preset_file) {
        (Some(_), Some(_)) => Err(ConfigError::ValidationError(
            "transcoding.preset and transcoding.preset_file are mutually exclusive".to_string(),
        )),
        (Some(name), None) if !name.is_empty() => Ok(Some(PresetSource::Named(name.to_string()))),
        (Some(_), None) => Err(ConfigError::ValidationError(
            "transcoding.preset must not be empty".to_string(),
        )),
        (None, Some(path)) => Ok(Some(PresetSource::File {
            path: path.to_path_buf(),
            name: read_preset_name(path)?,
        })),
        (None, None) => Ok(Some(PresetSource::Named(DEFAULT_PRESET.to_string()))),
    }
}

/// Reads a transcoder preset export and returns the first preset's name.
fn read_preset_name(path: &Path) -> Result<String, ConfigError> {
    #[derive(Deserialize)]
    struct PresetExport {
        #[serde(rename = "PresetList", default)]
        preset_list: Vec<PresetEntry>,
    }

    #[derive(Deserialize)]
    struct PresetEntry {
        #[serde(rename = "PresetName")]
        preset_name: String,
    }

    let contents = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::ValidationError(format!(
            "cannot read preset file {}: {}",
            path.display(),
            e
        ))
    })?;

    let export: PresetExport = serde_json::from_str(&contents).map_err(|e| {
        ConfigError::ValidationError(format!(
            "invalid preset file {}: {}",
            path.display(),
            e
        ))
    })?;

    export
        .preset_list
        .into_iter()
        .map(|p| p.preset_name)
        .find(|name| !name.trim().is_empty())
        .ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "preset file {} defines no preset",
                path.display()
            ))
        })
}
