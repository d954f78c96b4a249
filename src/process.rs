// src/process.rs

//! Subprocess execution with a timeout
//!
//! Used for the package manager and the Python interpreter. stdin is
//! nulled; both output pipes are drained on background threads while we
//! wait on the child.
//!
//! Killing the child on timeout does not kill what it spawned (uv runs
//! build backends as subprocesses), and those keep the pipes open. After a
//! timeout the readers get [`PIPE_GRACE`] to finish and are then abandoned.

use crate::error::{Error, Result};
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// How long output readers may run on after the child was killed
pub const PIPE_GRACE: Duration = Duration::from_secs(2);

/// Captured output of a finished (or killed) child process
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// `None` when the child was killed on timeout
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.is_some_and(|s| s.success())
    }

    pub fn timed_out(&self) -> bool {
        self.status.is_none()
    }

    /// Exit code, or -1 when killed or terminated by a signal
    pub fn code(&self) -> i32 {
        self.status.and_then(|s| s.code()).unwrap_or(-1)
    }
}

/// Run a command to completion, killing it after `timeout`
pub fn run_with_timeout(command: &mut Command, timeout: Duration) -> Result<CommandOutput> {
    let program = command.get_program().to_string_lossy().to_string();
    debug!("Running {:?}", command);

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::CommandFailed(format!("failed to spawn {program}: {e}")))?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let status = match child.wait_timeout(timeout)? {
        Some(status) => Some(status),
        None => {
            warn!("{} timed out after {:?}, killing it", program, timeout);
            let _ = child.kill();
            let _ = child.wait();
            None
        }
    };

    let grace = status.is_none().then_some(PIPE_GRACE);
    Ok(CommandOutput {
        status,
        stdout: collect(stdout, grace),
        stderr: collect(stderr, grace),
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// Wait for a reader's output, or at most `grace` when given
fn collect(reader: Option<mpsc::Receiver<String>>, grace: Option<Duration>) -> String {
    let Some(reader) = reader else {
        return String::new();
    };
    match grace {
        Some(grace) => reader.recv_timeout(grace).unwrap_or_else(|_| {
            debug!("Output pipe still held open by a descendant, abandoning it");
            String::new()
        }),
        None => reader.recv().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captures_output() {
        let output = run_with_timeout(
            Command::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]),
            Duration::from_secs(10),
        )
        .unwrap();
        assert!(!output.success());
        assert_eq!(output.code(), 3);
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[test]
    fn test_timeout_kills_child() {
        let output = run_with_timeout(
            Command::new("sh").args(["-c", "exec sleep 5"]),
            Duration::from_millis(100),
        )
        .unwrap();
        assert!(output.timed_out());
        assert_eq!(output.code(), -1);
    }

    #[test]
    fn test_timeout_not_held_up_by_grandchild() {
        // Without exec the shell forks `sleep`, which keeps the pipes open
        // after the shell itself is killed
        let started = std::time::Instant::now();
        let output = run_with_timeout(
            Command::new("sh").args(["-c", "echo started; sleep 10; true"]),
            Duration::from_millis(200),
        )
        .unwrap();
        assert!(output.timed_out());
        assert!(started.elapsed() < Duration::from_secs(8));
    }

    #[test]
    fn test_missing_program() {
        let err = run_with_timeout(
            &mut Command::new("/nonexistent/definitely-not-here"),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, Error::CommandFailed(_)));
    }
}
