use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::{types::Config, ConfigError};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "RECTOVID_CONFIG";

/// Config file used when none is given on the command line.
pub fn default_config_path() -> PathBuf {
    std::env::var(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/rectovid/config.toml"))
}

/// Command line overrides. Only fields that are set take part in the merge.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    pub general: GeneralOverrides,
    pub transcoding: TranscodingOverrides,
    pub logging: LoggingOverrides,
    pub postprocessing: PostprocessingOverrides,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GeneralOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_source: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cutlist: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TranscodingOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoggingOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PostprocessingOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// Load configuration from built-in defaults, the config file, `RECTOVID_*`
/// environment variables and command line overrides, in that order.
///
/// Layers merge key by key. An explicit `path` must exist; when `path` is
/// `None` the default location is used and silently skipped if absent.
pub fn load_config(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<Config, ConfigError> {
    let file = match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.display().to_string()));
            }
            // Absolute so figment does not search parent directories.
            std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
        }
        None => default_config_path(),
    };

    let mut figment = Figment::new();
    if file.is_file() {
        figment = figment.merge(Toml::file(&file));
    }

    figment
        .merge(Env::prefixed("RECTOVID_").split("__"))
        .merge(Serialized::defaults(overrides))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
