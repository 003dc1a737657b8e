//! Process runner cleanup: no descendant of a timed-out tool survives.
#![cfg(target_os = "linux")]

use std::path::Path;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use rectovid_core::runner::{ProcessOutcome, ProcessRunner, ToolCommand};
use rectovid_core::testing::write_script;

/// Whether `pid` is gone or only a zombie.
fn is_dead(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Err(_) => true,
        // state is the first field after the parenthesised command name
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .map(|state| state == "Z" || state == "X")
            .unwrap_or(true),
    }
}

fn read_pids(path: &Path) -> Vec<u32> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter_map(|l| l.trim().parse().ok())
        .collect()
}

async fn wait_for_pids(path: &Path, count: usize) -> Vec<u32> {
    for _ in 0..50 {
        let pids = read_pids(path);
        if pids.len() >= count {
            return pids;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    read_pids(path)
}

#[tokio::test]
async fn test_timeout_kills_background_children() {
    let temp = TempDir::new().unwrap();
    let pid_file = temp.path().join("pids");
    let tool = temp.path().join("tool");
    write_script(
        &tool,
        &format!(
            concat!(
                "sleep 600 &\necho $! >> '{pids}'\n",
                "(trap '' TERM; sleep 600) &\necho $! >> '{pids}'\n",
                "echo $$ >> '{pids}'\nwait\n",
            ),
            pids = pid_file.display()
        ),
    )
    .unwrap();

    let runner = ProcessRunner::new(Duration::from_millis(500));
    let started = Instant::now();
    let outcome = runner
        .execute(&ToolCommand::new(&tool), Some(Duration::from_secs(1)))
        .await
        .unwrap();

    assert_eq!(outcome, ProcessOutcome::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(4));

    let pids = wait_for_pids(&pid_file, 3).await;
    assert_eq!(pids.len(), 3);
    // SIGKILL delivery is asynchronous
    for _ in 0..50 {
        if pids.iter().all(|p| is_dead(*p)) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    for pid in pids {
        assert!(is_dead(pid), "process {} survived", pid);
    }
}

#[tokio::test]
async fn test_successful_run_leaves_no_children() {
    let temp = TempDir::new().unwrap();
    let pid_file = temp.path().join("pids");
    let tool = temp.path().join("tool");
    write_script(
        &tool,
        &format!("sleep 600 &\necho $! >> '{}'\nexit 0\n", pid_file.display()),
    )
    .unwrap();

    let outcome = ProcessRunner::new(Duration::from_millis(500))
        .execute(&ToolCommand::new(&tool), Some(Duration::from_secs(10)))
        .await
        .unwrap();
    assert_eq!(outcome, ProcessOutcome::Succeeded);

    let pids = wait_for_pids(&pid_file, 1).await;
    assert_eq!(pids.len(), 1);
    for _ in 0..50 {
        if is_dead(pids[0]) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(is_dead(pids[0]));
}
