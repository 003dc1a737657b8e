//! Types for processing jobs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Mode;
use crate::error::PipelineError;

/// A span of the recording to keep. `end == None` runs to the end of file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Duration,
    pub end: Option<Duration>,
}

impl Segment {
    /// The whole recording.
    pub fn whole() -> Self {
        Self {
            start: Duration::ZERO,
            end: None,
        }
    }

    pub fn new(start: Duration, end: Option<Duration>) -> Self {
        Self { start, end }
    }

    /// Whether this segment covers the entire recording.
    pub fn is_whole(&self) -> bool {
        self.start.is_zero() && self.end.is_none()
    }

    /// Length of the segment, if it has an end.
    pub fn duration(&self) -> Option<Duration> {
        self.end.map(|end| end.saturating_sub(self.start))
    }
}

/// Renders a timestamp as `HH:MM:SS.mmm`.
pub fn format_timestamp(t: Duration) -> String {
    let millis = t.as_millis();
    let hours = millis / 3_600_000;
    let minutes = (millis / 60_000) % 60;
    let seconds = (millis / 1000) % 60;
    let ms = millis % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, ms)
}

/// Renders a timestamp as fractional seconds with millisecond precision.
pub fn format_seconds(t: Duration) -> String {
    format!("{}.{:03}", t.as_secs(), t.subsec_millis())
}

/// Checks that segments are non-empty, ordered and non-overlapping, and that
/// only the last one may be open-ended.
pub fn validate_segments(segments: &[Segment]) -> Result<(), String> {
    if segments.is_empty() {
        return Err("segment list is empty".to_string());
    }

    let mut previous_end = Duration::ZERO;
    for (idx, segment) in segments.iter().enumerate() {
        if segment.start < previous_end {
            return Err(format!(
                "segment {} starts at {} before the previous segment ends",
                idx + 1,
                format_timestamp(segment.start)
            ));
        }
        match segment.end {
            Some(end) if end <= segment.start => {
                return Err(format!(
                    "segment {} ends at {} but starts at {}",
                    idx + 1,
                    format_timestamp(end),
                    format_timestamp(segment.start)
                ));
            }
            Some(end) => previous_end = end,
            None if idx + 1 != segments.len() => {
                return Err(format!("segment {} has no end but is not last", idx + 1));
            }
            None => {}
        }
    }
    Ok(())
}

/// Descriptive metadata used to name the resulting video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub season: u32,
    pub episode: u32,
}

impl RecordingMetadata {
    /// Fills unset fields from `other`.
    pub fn or(self, other: RecordingMetadata) -> Self {
        Self {
            title: self.title.or(other.title),
            subtitle: self.subtitle.or(other.subtitle),
            season: if self.season > 0 { self.season } else { other.season },
            episode: if self.episode > 0 {
                self.episode
            } else {
                other.episode
            },
        }
    }
}

/// The unit of work for one pipeline run.
#[derive(Debug, Clone)]
pub struct ProcessingJob {
    /// Identifier used in logs and staging paths.
    pub job_id: String,
    /// Source recording.
    pub input: PathBuf,
    /// Spans to keep, ordered by recording time. Never empty.
    pub segments: Vec<Segment>,
    /// Processing mode.
    pub mode: Mode,
    /// Staging directory owned by this job.
    pub staging_dir: PathBuf,
    /// File name of the final video.
    pub output_name: String,
    /// Per-invocation outputs, filled by the tool adapter.
    pub parts: Vec<PathBuf>,
    /// The single finished file in staging, filled by the adapter or merger.
    pub output: Option<PathBuf>,
}

impl ProcessingJob {
    /// Creates a job. An empty segment list means the whole recording.
    pub fn new(
        job_id: impl Into<String>,
        input: PathBuf,
        segments: Vec<Segment>,
        mode: Mode,
        staging_dir: PathBuf,
        output_name: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        let segments = if segments.is_empty() {
            vec![Segment::whole()]
        } else {
            segments
        };
        validate_segments(&segments).map_err(|reason| {
            PipelineError::Config(crate::config::ConfigError::ValidationError(reason))
        })?;

        Ok(Self {
            job_id: job_id.into(),
            input,
            segments,
            mode,
            staging_dir,
            output_name: output_name.into(),
            parts: Vec::new(),
            output: None,
        })
    }

    /// True when the job degrades to a single whole-file invocation.
    pub fn is_whole_file(&self) -> bool {
        self.segments.len() == 1 && self.segments[0].is_whole()
    }

    /// Staging path for the output of segment `index` (zero based).
    pub fn part_path(&self, index: usize) -> PathBuf {
        self.staging_dir.join(format!(
            "part_{:02}.{}",
            index + 1,
            self.mode.output_extension()
        ))
    }

    /// Staging path of the final merged file.
    pub fn staged_output_path(&self) -> PathBuf {
        self.staging_dir.join(&self.output_name)
    }

    pub fn input(&self) -> &Path {
        &self.input
    }
}
