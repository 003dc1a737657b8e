use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rectovid_core::config::{
    GeneralOverrides, LoggingOverrides, PostprocessingOverrides, TranscodingOverrides,
};
use rectovid_core::job::RecordingMetadata;
use rectovid_core::{
    load_config, validate_config, AppContext, ConfigOverrides, EffectiveConfig, LogLevel,
    Pipeline, PipelineError, PipelineRequest, RecordingReference,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit code for command line usage errors.
const USAGE_EXIT: u8 = 1;

/// Processes a finished recording: cut, copy or transcode it, move the result
/// into video storage and run the postprocessing command.
#[derive(Debug, Parser)]
#[command(name = "rectovid", version)]
#[command(group = clap::ArgGroup::new("input")
    .required(true)
    .multiple(true)
    .args(["path", "file", "job"]))]
struct Args {
    /// Recording file name, relative to --dir when given
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Directory of the recording
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Full path of the recording
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Recorder job id
    #[arg(short, long)]
    job: Option<String>,

    /// Title of the recording
    #[arg(short, long)]
    title: Option<String>,

    /// Subtitle of the recording
    #[arg(short, long)]
    subtitle: Option<String>,

    /// Season number
    #[arg(long)]
    season: Option<u32>,

    /// Episode number
    #[arg(long)]
    episode: Option<u32>,

    /// Configuration file [default: $RECTOVID_CONFIG or /etc/rectovid/config.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Processing mode: copy, extract or transcode
    #[arg(short, long)]
    mode: Option<String>,

    /// Transcoder preset name
    #[arg(long)]
    preset: Option<String>,

    /// Transcoder preset file
    #[arg(long)]
    preset_file: Option<PathBuf>,

    /// Per-invocation timeout in seconds
    #[arg(long)]
    timeout: Option<i64>,

    /// Cut-list file with the segments to keep
    #[arg(long)]
    cutlist: Option<PathBuf>,

    /// Delete the recording after a successful run
    #[arg(long)]
    delete_source: bool,

    /// Log file (appended to)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level: debug, info, warning, error or critical
    #[arg(long)]
    log_level: Option<String>,

    /// Postprocessing command; %VIDFILE%, %VIDPATH%, %RECFILE% and %RECPATH% are substituted
    #[arg(long)]
    postprocess: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            general: GeneralOverrides {
                mode: self.mode.clone(),
                timeout: self.timeout,
                staging_dir: None,
                delete_source: self.delete_source.then_some(true),
                cutlist: self.cutlist.clone(),
            },
            transcoding: TranscodingOverrides {
                preset: self.preset.clone(),
                preset_file: self.preset_file.clone(),
            },
            logging: LoggingOverrides {
                log_file: self.log_file.clone(),
                log_level: self.log_level.clone(),
            },
            postprocessing: PostprocessingOverrides {
                command: self.postprocess.clone(),
            },
        }
    }

    fn request(&self) -> PipelineRequest {
        PipelineRequest {
            reference: RecordingReference {
                path: self.path.clone(),
                dir: self.dir.clone(),
                file: self.file.clone(),
                job_id: self.job.clone(),
            },
            metadata: RecordingMetadata {
                title: self.title.clone(),
                subtitle: self.subtitle.clone(),
                season: self.season.unwrap_or_default(),
                episode: self.episode.unwrap_or_default(),
            },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(USAGE_EXIT)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(args).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::from(USAGE_EXIT)
        }
    }
}

async fn run(args: Args) -> Result<u8> {
    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            let err = PipelineError::from(e);
            init_stderr_logging(LogLevel::Info);
            error!("{}", err);
            return Ok(exit_code(&err));
        }
    };

    if let Err(e) = init_logging(config.logging.log_file.as_deref(), config.logging.level) {
        init_stderr_logging(config.logging.level);
        warn!("Logging to stderr: {:#}", e);
    }

    info!(
        version = VERSION,
        mode = %config.mode,
        timeout_secs = config.timeout.as_secs(),
        "Starting rectovid"
    );

    let ctx = AppContext::new(config).context("Failed to create backend client")?;
    let report = Pipeline::new(&ctx).run(args.request()).await;
    info!(status = %report.status, exit_code = report.exit_code, "{}", report.message);

    Ok(u8::try_from(report.exit_code).unwrap_or(USAGE_EXIT))
}

fn resolve_config(args: &Args) -> Result<EffectiveConfig, rectovid_core::ConfigError> {
    let config = load_config(args.config.as_deref(), &args.overrides())?;
    validate_config(&config)
}

fn exit_code(err: &PipelineError) -> u8 {
    u8::try_from(err.exit_code()).unwrap_or(USAGE_EXIT)
}

fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()))
}

/// Logs to `log_file` when given, otherwise to stderr. `RUST_LOG` overrides
/// the configured level.
fn init_logging(log_file: Option<&Path>, level: LogLevel) -> Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(level));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()?;
        }
        None => {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()?;
        }
    }
    Ok(())
}

fn init_stderr_logging(level: LogLevel) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
