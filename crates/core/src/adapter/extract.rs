//! Per-segment stream copy through ffmpeg.

use async_trait::async_trait;
use std::path::PathBuf;

use super::{Invocation, ToolAdapter};
use crate::config::Mode;
use crate::job::{format_timestamp, ProcessingJob};
use crate::runner::ToolCommand;

/// Extracts each segment into its own part file without re-encoding.
pub struct FfmpegExtractAdapter {
    program: PathBuf,
}

impl FfmpegExtractAdapter {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

#[async_trait]
impl ToolAdapter for FfmpegExtractAdapter {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn mode(&self) -> Mode {
        Mode::Extract
    }

    fn produces_parts(&self) -> bool {
        true
    }

    fn plan(&self, job: &ProcessingJob) -> Vec<Invocation> {
        job.segments
            .iter()
            .enumerate()
            .map(|(idx, segment)| {
                let output = job.part_path(idx);

                // -ss before -i seeks on the input side, which is fast and
                // lands on a keyframe for stream copies.
                let mut command = ToolCommand::new(&self.program)
                    .args(["-hide_banner", "-nostdin", "-y", "-loglevel", "warning"])
                    .arg("-ss")
                    .arg(format_timestamp(segment.start));
                if let Some(duration) = segment.duration() {
                    command = command.arg("-t").arg(format_timestamp(duration));
                }
                let command = command
                    .arg("-i")
                    .arg(job.input())
                    .args(["-map", "0", "-c", "copy"])
                    .arg(&output);

                Invocation { command, output }
            })
            .collect()
    }
}
