//! Shell-script stand-ins for the external tools.

use std::path::{Path, PathBuf};

use crate::config::ToolsConfig;

pub const MUXER: &str = "mkvmerge";
pub const FFMPEG: &str = "ffmpeg";
pub const TRANSCODER: &str = "HandBrakeCLI";
pub const NOTIFIER: &str = "mythutil";

/// A directory of fake tools that log their argv to `calls.log` and write a
/// small output file wherever the real tool would.
///
/// The output path is the argument after `-o`, or the last argument when
/// there is no `-o` (ffmpeg style).
#[derive(Debug, Clone)]
pub struct FakeTools {
    dir: PathBuf,
}

impl FakeTools {
    /// Installs the muxer, ffmpeg, transcoder and notifier into `dir`.
    pub fn install(dir: &Path) -> std::io::Result<Self> {
        let tools = Self {
            dir: dir.to_path_buf(),
        };
        for name in [MUXER, FFMPEG, TRANSCODER] {
            tools.write_producer(name, "", "")?;
        }
        tools.write(NOTIFIER, &tools.log_line(NOTIFIER))?;
        Ok(tools)
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// A `[tools]` section pointing at the fakes.
    pub fn tools_config(&self) -> ToolsConfig {
        ToolsConfig {
            muxer: self.path(MUXER),
            extractor: self.path(FFMPEG),
            transcoder: self.path(TRANSCODER),
            concatenator: self.path(FFMPEG),
            notifier: self.path(NOTIFIER),
        }
    }

    /// Makes `name` hang whenever its output path contains `needle`.
    pub fn hang_when_output_contains(&self, name: &str, needle: &str) -> std::io::Result<()> {
        self.write_producer(
            name,
            &format!("case \"$out\" in *'{}'*) sleep 600 ;; esac\n", needle),
            "",
        )
    }

    /// Makes `name` exit with `code` without producing output.
    pub fn fail_with(&self, name: &str, code: i32) -> std::io::Result<()> {
        self.write(
            name,
            &format!("{}echo 'fatal error' >&2\nexit {}\n", self.log_line(name), code),
        )
    }

    /// Makes `name` write its output and then exit with `code`.
    pub fn produce_and_exit_with(&self, name: &str, code: i32) -> std::io::Result<()> {
        self.write_producer(
            name,
            "",
            &format!("echo 'Warning: stream has timestamp gaps' >&2\nexit {}\n", code),
        )
    }

    /// Makes `name` succeed but leave an empty output file.
    pub fn produce_empty(&self, name: &str) -> std::io::Result<()> {
        self.write(
            name,
            &format!(
                "{}{}: > \"$out\"\n",
                self.log_line(name),
                FIND_OUTPUT
            ),
        )
    }

    /// Logged invocations, one `name arg arg ...` line each.
    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.join("calls.log"))
            .map(|s| s.lines().map(String::from).collect())
            .unwrap_or_default()
    }

    /// Logged invocations of one tool.
    pub fn calls_to(&self, name: &str) -> Vec<String> {
        let prefix = format!("{} ", name);
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(&prefix) || c == name)
            .collect()
    }

    fn log_line(&self, name: &str) -> String {
        format!(
            "echo \"{} $*\" >> '{}'\n",
            name,
            self.dir.join("calls.log").display()
        )
    }

    fn write_producer(
        &self,
        name: &str,
        before_write: &str,
        after_write: &str,
    ) -> std::io::Result<()> {
        self.write(
            name,
            &format!(
                "{}{}{}printf 'fake video data\\n' > \"$out\"\n{}",
                self.log_line(name),
                FIND_OUTPUT,
                before_write,
                after_write
            ),
        )
    }

    fn write(&self, name: &str, body: &str) -> std::io::Result<()> {
        write_script(&self.path(name), body)
    }
}

const FIND_OUTPUT: &str = r#"out=""
prev=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
if [ -z "$out" ]; then out="$prev"; fi
"#;

/// Writes an executable `/bin/sh` script.
pub fn write_script(path: &Path, body: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, format!("#!/bin/sh\n{}", body))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o755))?;
    }
    std::fs::rename(&tmp, path)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::runner::{ProcessOutcome, ProcessRunner, ToolCommand};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fake_tool_writes_output_and_logs() {
        let temp = TempDir::new().unwrap();
        let tools = FakeTools::install(temp.path()).unwrap();
        let out = temp.path().join("out file.mkv");

        let outcome = ProcessRunner::default()
            .execute(
                &ToolCommand::new(tools.path(MUXER))
                    .arg("-o")
                    .arg(&out)
                    .arg("/rec/in.ts"),
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Succeeded);
        assert!(std::fs::metadata(&out).unwrap().len() > 0);
        assert_eq!(tools.calls_to(MUXER).len(), 1);
        assert!(tools.calls_to(FFMPEG).is_empty());
    }

    #[tokio::test]
    async fn test_fake_tool_failure() {
        let temp = TempDir::new().unwrap();
        let tools = FakeTools::install(temp.path()).unwrap();
        tools.fail_with(FFMPEG, 4).unwrap();

        let outcome = ProcessRunner::default()
            .execute(&ToolCommand::new(tools.path(FFMPEG)).arg("x.mkv"), None)
            .await
            .unwrap();
        assert_eq!(outcome, ProcessOutcome::FailedWithCode(4));
    }
}
