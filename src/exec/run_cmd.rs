use std::fs::File;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

/// How often a worker checks its child and the cancel flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How a child process ended.
pub enum CmdEnd {
    /// exited on its own
    Exited(ExitStatus),
    /// the cancel flag came up, so we killed it
    Cancelled,
}

/// Run one task command through the shell, with stdout and stderr redirected
/// to the given log files. Polls rather than blocking on the child so a
/// raised cancel flag interrupts the task promptly.
pub fn run_cmd(
    command: &str,
    out_file: File,
    err_file: File,
    cancel: &AtomicBool,
) -> Result<CmdEnd> {
    let mut child = shell_cmd(command)
        .stdin(Stdio::null())
        .stdout(Stdio::from(out_file))
        .stderr(Stdio::from(err_file))
        .spawn()
        .with_context(|| format!("spawning shell for command {command:?}"))?;

    loop {
        if let Some(status) = child.try_wait().context("checking child process")? {
            return Ok(CmdEnd::Exited(status));
        }
        if cancel.load(Ordering::SeqCst) {
            log::info!("cancel requested; killing child process");
            // kill is a no-op if the child exited since try_wait:
            let _ = child.kill();
            child.wait().context("reaping killed child process")?;
            return Ok(CmdEnd::Cancelled);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// A `Command` that runs `command` through the platform shell.
pub fn shell_cmd(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn log_files(dir: &std::path::Path) -> (File, File) {
        let out = File::create(dir.join("task.out")).unwrap();
        let err = File::create(dir.join("task.err")).unwrap();
        (out, err)
    }

    #[test]
    fn test_exit_status_is_reported() {
        let dir = tempdir().unwrap();
        let cancel = AtomicBool::new(false);

        let (out, err) = log_files(dir.path());
        match run_cmd("exit 0", out, err, &cancel).unwrap() {
            CmdEnd::Exited(status) => assert!(status.success()),
            CmdEnd::Cancelled => panic!("not cancelled"),
        }

        let (out, err) = log_files(dir.path());
        match run_cmd("exit 3", out, err, &cancel).unwrap() {
            CmdEnd::Exited(status) => assert_eq!(status.code(), Some(3)),
            CmdEnd::Cancelled => panic!("not cancelled"),
        }
    }

    #[test]
    fn test_streams_go_to_log_files() {
        let dir = tempdir().unwrap();
        let cancel = AtomicBool::new(false);
        let (out, err) = log_files(dir.path());

        run_cmd("echo hello; echo oops >&2", out, err, &cancel).unwrap();

        let stdout = std::fs::read_to_string(dir.path().join("task.out")).unwrap();
        let stderr = std::fs::read_to_string(dir.path().join("task.err")).unwrap();
        assert_eq!(stdout.trim(), "hello");
        assert_eq!(stderr.trim(), "oops");
    }

    #[test]
    fn test_raised_cancel_flag_kills_child() {
        let dir = tempdir().unwrap();
        let cancel = AtomicBool::new(true);
        let (out, err) = log_files(dir.path());

        let start = std::time::Instant::now();
        match run_cmd("sleep 30", out, err, &cancel).unwrap() {
            CmdEnd::Cancelled => {}
            CmdEnd::Exited(_) => panic!("should have been cancelled"),
        }
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
