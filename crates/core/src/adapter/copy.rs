//! Stream copy through mkvmerge.

use async_trait::async_trait;
use std::path::PathBuf;

use super::{Invocation, ToolAdapter};
use crate::config::Mode;
use crate::job::{format_timestamp, ProcessingJob, Segment};
use crate::runner::{ProcessOutcome, ToolCommand};

/// Cuts and joins in a single mkvmerge pass using `--split parts:`.
pub struct MkvmergeAdapter {
    program: PathBuf,
}

impl MkvmergeAdapter {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    /// `parts:` directive keeping `segments` and appending them to each other.
    fn split_parts(segments: &[Segment]) -> String {
        let ranges: Vec<String> = segments
            .iter()
            .map(|s| {
                format!(
                    "{}-{}",
                    format_timestamp(s.start),
                    s.end.map(format_timestamp).unwrap_or_default()
                )
            })
            .collect();
        format!("parts:{}", ranges.join(",+"))
    }
}

#[async_trait]
impl ToolAdapter for MkvmergeAdapter {
    fn name(&self) -> &str {
        "mkvmerge"
    }

    fn mode(&self) -> Mode {
        Mode::Copy
    }

    fn produces_parts(&self) -> bool {
        false
    }

    /// mkvmerge exits with 1 when it finished but printed warnings, which is
    /// routine for broadcast streams.
    fn accepts(&self, outcome: ProcessOutcome) -> bool {
        matches!(
            outcome,
            ProcessOutcome::Succeeded | ProcessOutcome::FailedWithCode(1)
        )
    }

    fn plan(&self, job: &ProcessingJob) -> Vec<Invocation> {
        let output = job.staged_output_path();

        let mut command = ToolCommand::new(&self.program).arg("-o").arg(&output);
        if !job.is_whole_file() {
            command = command
                .arg("--split")
                .arg(Self::split_parts(&job.segments));
        }
        command = command.arg(job.input());

        vec![Invocation { command, output }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::test_support::{job, secs};
    use std::ffi::OsStr;
    use std::time::Duration;

    #[test]
    fn test_whole_file_plan() {
        let adapter = MkvmergeAdapter::new(PathBuf::from("mkvmerge"));
        let plan = adapter.plan(&job(Mode::Copy, vec![]));

        assert_eq!(plan.len(), 1);
        let cmd = &plan[0].command;
        assert!(!cmd.has_arg("--split"));
        assert_eq!(plan[0].output, PathBuf::from("/tmp/rectovid/job-1/Tatort.mkv"));
        assert_eq!(
            cmd.value_of("-o"),
            Some(OsStr::new("/tmp/rectovid/job-1/Tatort.mkv"))
        );
        // the input path with spaces and parentheses is one argument
        assert_eq!(
            cmd.args.last().map(|a| a.as_os_str()),
            Some(OsStr::new("/srv/rec/1001 Tatort (HD).ts"))
        );
    }

    #[test]
    fn test_accepts_warning_exit() {
        let adapter = MkvmergeAdapter::new(PathBuf::from("mkvmerge"));
        assert!(adapter.accepts(ProcessOutcome::Succeeded));
        assert!(adapter.accepts(ProcessOutcome::FailedWithCode(1)));
        assert!(!adapter.accepts(ProcessOutcome::FailedWithCode(2)));
        assert!(!adapter.accepts(ProcessOutcome::TimedOut));
    }

    #[test]
    fn test_segments_become_split_parts() {
        let adapter = MkvmergeAdapter::new(PathBuf::from("mkvmerge"));
        let plan = adapter.plan(&job(
            Mode::Copy,
            vec![
                Segment::new(secs(0), Some(secs(870))),
                Segment::new(secs(1025), Some(Duration::from_millis(1_870_500))),
                Segment::new(secs(2240), None),
            ],
        ));

        assert_eq!(plan.len(), 1);
        assert_eq!(
            plan[0].command.value_of("--split"),
            Some(OsStr::new(
                "parts:00:00:00.000-00:14:30.000,+00:17:05.000-00:31:10.500,+00:37:20.000-"
            ))
        );
    }
}
