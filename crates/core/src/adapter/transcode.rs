//! Per-segment transcoding through HandBrakeCLI.

use async_trait::async_trait;
use std::path::PathBuf;

use super::{Invocation, ToolAdapter};
use crate::config::{Mode, PresetSource};
use crate::job::{format_seconds, ProcessingJob};
use crate::runner::ToolCommand;

/// Transcodes each segment with the resolved preset.
pub struct HandbrakeAdapter {
    program: PathBuf,
    preset: PresetSource,
}

impl HandbrakeAdapter {
    pub fn new(program: PathBuf, preset: PresetSource) -> Self {
        Self { program, preset }
    }
}

#[async_trait]
impl ToolAdapter for HandbrakeAdapter {
    fn name(&self) -> &str {
        "handbrake"
    }

    fn mode(&self) -> Mode {
        Mode::Transcode
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

                let mut command = ToolCommand::new(&self.program);
                if let PresetSource::File { ref path, .. } = self.preset {
                    command = command.arg("--preset-import-file").arg(path);
                }
                command = command.arg("--preset").arg(self.preset.name());

                if !segment.start.is_zero() {
                    command = command
                        .arg("--start-at")
                        .arg(format!("duration:{}", format_seconds(segment.start)));
                }
                if let Some(duration) = segment.duration() {
                    command = command
                        .arg("--stop-at")
                        .arg(format!("duration:{}", format_seconds(duration)));
                }

                let command = command
                    .arg("-i")
                    .arg(job.input())
                    .arg("-o")
                    .arg(&output);

                Invocation { command, output }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::test_support::{job, secs};
    use crate::config::DEFAULT_PRESET;
    use crate::job::Segment;
    use std::ffi::OsStr;

    #[test]
    fn test_named_preset() {
        let adapter = HandbrakeAdapter::new(
            PathBuf::from("HandBrakeCLI"),
            PresetSource::Named(DEFAULT_PRESET.to_string()),
        );
        let plan = adapter.plan(&job(Mode::Transcode, vec![]));

        assert_eq!(plan.len(), 1);
        let cmd = &plan[0].command;
        assert!(!cmd.has_arg("--preset-import-file"));
        assert_eq!(
            cmd.value_of("--preset"),
            Some(OsStr::new("General/HQ 1080p30 Surround"))
        );
        assert!(!cmd.has_arg("--start-at"));
        assert!(!cmd.has_arg("--stop-at"));
        assert_eq!(
            cmd.value_of("-o"),
            Some(OsStr::new("/tmp/rectovid/job-1/part_01.m4v"))
        );
    }

    #[test]
    fn test_preset_file_and_segments() {
        let adapter = HandbrakeAdapter::new(
            PathBuf::from("HandBrakeCLI"),
            PresetSource::File {
                path: PathBuf::from("/etc/rectovid/my presets.json"),
                name: "Archive 720p".to_string(),
            },
        );
        let plan = adapter.plan(&job(
            Mode::Transcode,
            vec![
                Segment::new(secs(0), Some(secs(600))),
                Segment::new(secs(720), Some(secs(1500))),
            ],
        ));

        assert_eq!(plan.len(), 2);

        let first = &plan[0].command;
        assert_eq!(
            first.value_of("--preset-import-file"),
            Some(OsStr::new("/etc/rectovid/my presets.json"))
        );
        assert_eq!(first.value_of("--preset"), Some(OsStr::new("Archive 720p")));
        assert!(!first.has_arg("--start-at"));
        assert_eq!(first.value_of("--stop-at"), Some(OsStr::new("duration:600.000")));

        let second = &plan[1].command;
        assert_eq!(second.value_of("--start-at"), Some(OsStr::new("duration:720.000")));
        assert_eq!(second.value_of("--stop-at"), Some(OsStr::new("duration:780.000")));
        assert_eq!(plan[1].output, PathBuf::from("/tmp/rectovid/job-1/part_02.m4v"));
    }
}
