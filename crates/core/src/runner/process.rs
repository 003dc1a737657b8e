//! Timeout-bounded child process execution.

use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout};
use tracing::{debug, info, warn};

use super::types::{ProcessOutcome, RunnerError, ToolCommand};

/// Number of trailing stderr lines kept for failure diagnostics.
const STDERR_TAIL_LINES: usize = 20;

/// Default delay between SIGTERM and SIGKILL.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Supervision state of a running child.
#[derive(Debug)]
enum RunState {
    Running,
    Exited(ExitStatus),
    DeadlineElapsed,
}

/// Runs external tools as child processes under a wall-clock deadline.
///
/// Each child is placed in its own process group. Whatever the outcome, the
/// whole group is killed and the child reaped before `execute` returns, so no
/// descendant outlives the call.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    grace_period: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

impl ProcessRunner {
    /// Creates a runner that waits `grace_period` between SIGTERM and SIGKILL.
    pub fn new(grace_period: Duration) -> Self {
        Self { grace_period }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Runs `command`, killing it if it is still alive after `limit`.
    ///
    /// `None` waits indefinitely. Output is forwarded to the log line by line.
    pub async fn execute(
        &self,
        command: &ToolCommand,
        limit: Option<Duration>,
    ) -> Result<ProcessOutcome, RunnerError> {
        let label = command.label();
        let started = Instant::now();

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(command.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = command.current_dir {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        debug!(tool = %label, command = %command, "Starting external tool");

        let child = spawn(&mut cmd).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunnerError::ProgramNotFound {
                    program: command.program.clone(),
                }
            } else {
                RunnerError::SpawnFailed {
                    program: command.program.clone(),
                    source: e,
                }
            }
        })?;

        let mut guard = ChildGuard::new(child);
        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));

        let mut readers: Vec<JoinHandle<()>> = Vec::new();
        if let Some(stdout) = guard.child.stdout.take() {
            readers.push(tokio::spawn(forward_output(
                stdout,
                label.clone(),
                "stdout",
                None,
            )));
        }
        if let Some(stderr) = guard.child.stderr.take() {
            readers.push(tokio::spawn(forward_output(
                stderr,
                label.clone(),
                "stderr",
                Some(Arc::clone(&stderr_tail)),
            )));
        }

        let deadline = limit.map(|l| tokio::time::Instant::now() + l);
        let mut state = RunState::Running;
        while let RunState::Running = state {
            state = match deadline {
                Some(deadline) => tokio::select! {
                    status = guard.child.wait() => RunState::Exited(status?),
                    _ = sleep_until(deadline) => RunState::DeadlineElapsed,
                },
                None => RunState::Exited(guard.child.wait().await?),
            };
        }

        let outcome = match state {
            RunState::Exited(status) => ProcessOutcome::from(status),
            RunState::DeadlineElapsed => {
                warn!(
                    tool = %label,
                    timeout_secs = limit.map(|l| l.as_secs()).unwrap_or_default(),
                    "Deadline elapsed, terminating tool"
                );
                guard.terminate(self.grace_period).await?;
                ProcessOutcome::TimedOut
            }
            RunState::Running => unreachable!("supervision loop exits only on a terminal state"),
        };

        // Reclaim anything the tool left behind in its group; this also closes
        // the pipes held by orphaned descendants so the readers can finish.
        drop(guard);
        for mut reader in readers {
            if timeout(self.grace_period, &mut reader).await.is_err() {
                reader.abort();
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            ProcessOutcome::Succeeded => {
                info!(tool = %label, elapsed_ms, "External tool finished")
            }
            _ => {
                let tail = stderr_tail
                    .lock()
                    .map(|t| t.iter().cloned().collect::<Vec<_>>().join("\n"))
                    .unwrap_or_default();
                warn!(
                    tool = %label,
                    elapsed_ms,
                    %outcome,
                    stderr = %tail,
                    "External tool did not succeed"
                );
            }
        }

        Ok(outcome)
    }
}

/// Spawns `cmd`, retrying briefly while the executable is still open for
/// writing elsewhere (ETXTBSY), which happens right after a tool is installed.
async fn spawn(cmd: &mut Command) -> std::io::Result<Child> {
    const ETXTBSY: i32 = 26;
    let mut attempts = 0;
    loop {
        match cmd.spawn() {
            Err(e) if e.raw_os_error() == Some(ETXTBSY) && attempts < 5 => {
                attempts += 1;
                tokio::time::sleep(Duration::from_millis(20 * attempts)).await;
            }
            result => return result,
        }
    }
}

/// Owns a spawned child and its process group.
///
/// Dropping the guard SIGKILLs the whole group, which covers early returns,
/// errors and cancelled futures alike.
struct ChildGuard {
    child: Child,
    #[cfg_attr(not(unix), allow(dead_code))]
    pgid: Option<i32>,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        let pgid = child.id().map(|id| id as i32);
        Self { child, pgid }
    }

    #[cfg(unix)]
    fn signal_group(&self, signal: nix::sys::signal::Signal) {
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        if let Some(pgid) = self.pgid {
            match killpg(Pid::from_raw(pgid), signal) {
                Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
                Err(e) => debug!(pgid, ?signal, error = %e, "Failed to signal process group"),
            }
        }
    }

    /// SIGTERM the group, wait up to `grace`, then SIGKILL and reap.
    async fn terminate(&mut self, grace: Duration) -> Result<(), RunnerError> {
        #[cfg(unix)]
        self.signal_group(nix::sys::signal::Signal::SIGTERM);
        #[cfg(not(unix))]
        let _ = self.child.start_kill();

        match timeout(grace, self.child.wait()).await {
            Ok(status) => {
                status?;
            }
            Err(_) => {
                warn!(grace_ms = grace.as_millis() as u64, "Tool ignored termination, killing");
                #[cfg(unix)]
                self.signal_group(nix::sys::signal::Signal::SIGKILL);
                let _ = self.child.start_kill();
                self.child.wait().await?;
            }
        }
        Ok(())
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        self.signal_group(nix::sys::signal::Signal::SIGKILL);
        let _ = self.child.start_kill();
    }
}

/// Forwards a child's output to the log, splitting on `\n` and `\r` so that
/// progress lines redrawn in place are logged as they come.
async fn forward_output<R>(
    mut reader: R,
    tool: String,
    stream: &'static str,
    tail: Option<Arc<Mutex<VecDeque<String>>>>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4096];
    let mut pending: Vec<u8> = Vec::new();

    let mut emit = |bytes: &[u8]| {
        let line = String::from_utf8_lossy(bytes);
        let line = line.trim_end();
        if line.is_empty() {
            return;
        }
        debug!(tool = %tool, stream, "{}", line);
        if let Some(ref tail) = tail {
            if let Ok(mut tail) = tail.lock() {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line.to_string());
            }
        }
    };

    loop {
        let read = match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        for &byte in &buf[..read] {
            if byte == b'\n' || byte == b'\r' {
                emit(&pending);
                pending.clear();
            } else {
                pending.push(byte);
            }
        }
    }
    emit(&pending);
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_success() {
        let runner = ProcessRunner::default();
        let outcome = runner
            .execute(&sh("echo hello; echo oops >&2"), Some(Duration::from_secs(10)))
            .await
            .unwrap();
        assert_eq!(outcome, ProcessOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_exit_code() {
        let runner = ProcessRunner::default();
        let outcome = runner.execute(&sh("exit 3"), None).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::FailedWithCode(3));
    }

    #[tokio::test]
    async fn test_signal() {
        let runner = ProcessRunner::default();
        let outcome = runner.execute(&sh("kill -9 $$"), None).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::FailedWithSignal(9));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = ProcessRunner::default();
        let err = runner
            .execute(&ToolCommand::new("/nonexistent/rectovid-tool"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::ProgramNotFound { .. }));
    }

    #[tokio::test]
    async fn test_timeout_returns_within_grace() {
        let runner = ProcessRunner::new(Duration::from_millis(500));
        let started = Instant::now();
        let outcome = runner
            .execute(&sh("sleep 30"), Some(Duration::from_secs(1)))
            .await
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout_kills_term_ignoring_tool() {
        let runner = ProcessRunner::new(Duration::from_millis(300));
        let started = Instant::now();
        let outcome = runner
            .execute(
                &sh("trap '' TERM; while true; do sleep 1; done"),
                Some(Duration::from_millis(500)),
            )
            .await
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_forward_output_splits_carriage_returns() {
        let tail = Arc::new(Mutex::new(VecDeque::new()));
        let input: &[u8] = b"Encoding: 10 %\rEncoding: 20 %\r\nDone\n";
        tokio_block_on(forward_output(
            input,
            "HandBrakeCLI".to_string(),
            "stderr",
            Some(Arc::clone(&tail)),
        ));

        let lines: Vec<String> = tail.lock().unwrap().iter().cloned().collect();
        assert_eq!(lines, vec!["Encoding: 10 %", "Encoding: 20 %", "Done"]);
    }

    fn tokio_block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }
}
