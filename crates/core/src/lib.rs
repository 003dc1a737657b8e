pub mod adapter;
pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod job;
pub mod locator;
pub mod merger;
pub mod pipeline;
pub mod postprocess;
pub mod relocator;
pub mod reporter;
pub mod runner;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, ConfigOverrides,
    EffectiveConfig, LogLevel, Mode,
};
pub use context::AppContext;
pub use error::PipelineError;
pub use locator::RecordingReference;
pub use pipeline::{Pipeline, PipelineRequest, PipelineStage};
pub use reporter::{JobReport, JobStatus};
