//! External tool process supervision.
//!
//! [`spawn_tool`] launches `executable input_artifact` with stdout discarded
//! and stderr collected line by line. The returned [`ToolProcess`] exposes
//! the pid (for the process registry) and resolves to a [`ToolOutcome`] once
//! the process exits. The supervisor never touches computation state itself;
//! the caller applies the outcome.

use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;

use crate::error::CoreError;

/// Attempts made when the executable is momentarily busy (`ETXTBSY`).
const SPAWN_ATTEMPTS: u32 = 5;

/// Pause between busy-executable retries.
const SPAWN_RETRY_DELAY: Duration = Duration::from_millis(20);

/// Classified result of a finished tool process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// Normal exit with an empty error stream.
    Succeeded,
    /// The tool wrote to its error stream; the text is the diagnostic.
    Failed(String),
    /// Terminated by a signal, e.g. an explicit kill.
    Killed,
}

/// A running tool invocation.
#[derive(Debug)]
pub struct ToolProcess {
    pid: u32,
    child: Child,
    stderr_task: JoinHandle<Vec<String>>,
}

impl ToolProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Wait for the process to exit and classify the result.
    pub async fn wait(mut self) -> Result<ToolOutcome, CoreError> {
        let status = self.child.wait().await?;

        // A signal-terminated tool may have left children holding the pipe.
        if status.code().is_none() {
            self.stderr_task.abort();
            return Ok(ToolOutcome::Killed);
        }

        // Any output on the error stream counts as failure, blank lines included.
        let lines = self.stderr_task.await.unwrap_or_default();
        if lines.is_empty() {
            Ok(ToolOutcome::Succeeded)
        } else {
            Ok(ToolOutcome::Failed(lines.join("\n")))
        }
    }
}

/// Launch `executable input` and start collecting its error stream.
pub async fn spawn_tool(executable: &Path, input: &Path) -> Result<ToolProcess, CoreError> {
    ensure_executable(executable).await?;

    let mut attempt = 1;
    let mut child = loop {
        let mut cmd = Command::new(executable);
        cmd.arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        match cmd.spawn() {
            Ok(child) => break child,
            Err(e) if e.raw_os_error() == Some(libc::ETXTBSY) && attempt < SPAWN_ATTEMPTS => {
                attempt += 1;
                tokio::time::sleep(SPAWN_RETRY_DELAY).await;
            }
            Err(e) => {
                return Err(CoreError::ToolExecution(format!(
                    "failed to launch {}: {e}",
                    executable.display()
                )))
            }
        }
    };

    let pid = child
        .id()
        .ok_or_else(|| CoreError::ToolExecution("tool exited before reporting a pid".into()))?;
    let stderr = child.stderr.take();
    let stderr_task = tokio::spawn(collect_lines(stderr));

    tracing::debug!(pid, executable = %executable.display(), input = %input.display(), "Tool launched");

    Ok(ToolProcess {
        pid,
        child,
        stderr_task,
    })
}

/// Verify the executable exists and has an execute bit.
async fn ensure_executable(executable: &Path) -> Result<(), CoreError> {
    let metadata = tokio::fs::metadata(executable).await.map_err(|_| {
        CoreError::ToolExecution(format!("executable not found: {}", executable.display()))
    })?;

    let mode = metadata.permissions().mode();
    if !metadata.is_file() || mode & 0o111 == 0 {
        return Err(CoreError::ToolExecution(format!(
            "{} is not executable (mode {mode:#o})",
            executable.display()
        )));
    }
    Ok(())
}

async fn collect_lines(stderr: Option<ChildStderr>) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(stderr) = stderr {
        let mut reader = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            lines.push(line);
        }
    }
    lines
}

/// Result of a termination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The signal was delivered.
    Killed,
    /// No such process; it already exited (or the pid is stale).
    AlreadyGone,
}

/// Send `SIGKILL` to `pid`.
///
/// A missing process is not an error: registry entries can outlive their
/// process across restarts.
pub fn terminate(pid: u32) -> Result<Termination, CoreError> {
    let raw = signal_target(pid)?;
    // SAFETY: kill(2) has no memory-safety preconditions; `raw` is positive,
    // so the signal targets exactly one process.
    let ret = unsafe { libc::kill(raw, libc::SIGKILL) };
    if ret == 0 {
        return Ok(Termination::Killed);
    }

    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(Termination::AlreadyGone)
    } else {
        Err(CoreError::TerminationFailed(format!("kill({pid}): {err}")))
    }
}

/// Whether a process with this pid currently exists.
pub fn is_alive(pid: u32) -> bool {
    let Ok(raw) = signal_target(pid) else {
        return false;
    };
    // SAFETY: signal 0 only performs the existence and permission check.
    let ret = unsafe { libc::kill(raw, 0) };
    ret == 0 || std::io::Error::last_os_error().kind() == ErrorKind::PermissionDenied
}

fn signal_target(pid: u32) -> Result<libc::pid_t, CoreError> {
    match libc::pid_t::try_from(pid) {
        Ok(raw) if raw > 0 => Ok(raw),
        _ => Err(CoreError::TerminationFailed(format!("invalid pid {pid}"))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use assert_matches::assert_matches;

    use super::*;

    /// Write an executable bash script into `dir`.
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/bash\n{body}")).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
        path
    }

    fn input_file(dir: &Path) -> PathBuf {
        let path = dir.join("input.xml");
        std::fs::write(&path, "<Tunnels />").expect("write input");
        path
    }

    #[tokio::test]
    async fn clean_exit_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = write_script(dir.path(), "ok.sh", "echo to-stdout\nexit 0\n");
        let process = spawn_tool(&tool, &input_file(dir.path()))
            .await
            .expect("spawn");
        assert!(process.pid() > 0);
        assert_eq!(process.wait().await.expect("wait"), ToolOutcome::Succeeded);
    }

    #[tokio::test]
    async fn stderr_text_is_the_failure_message() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = write_script(dir.path(), "bad.sh", "echo 'bad input' >&2\n");
        let process = spawn_tool(&tool, &input_file(dir.path()))
            .await
            .expect("spawn");
        assert_eq!(
            process.wait().await.expect("wait"),
            ToolOutcome::Failed("bad input".to_string())
        );
    }

    #[tokio::test]
    async fn blank_error_lines_still_fail() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = write_script(dir.path(), "blank.sh", "echo '   ' >&2\necho >&2\n");
        let process = spawn_tool(&tool, &input_file(dir.path()))
            .await
            .expect("spawn");
        assert_matches!(process.wait().await.expect("wait"), ToolOutcome::Failed(_));
    }

    #[tokio::test]
    async fn multi_line_diagnostics_are_joined() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = write_script(dir.path(), "bad.sh", "echo one >&2\necho two >&2\n");
        let process = spawn_tool(&tool, &input_file(dir.path()))
            .await
            .expect("spawn");
        assert_eq!(
            process.wait().await.expect("wait"),
            ToolOutcome::Failed("one\ntwo".to_string())
        );
    }

    #[tokio::test]
    async fn tool_receives_input_path_as_argument() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = write_script(
            dir.path(),
            "copy.sh",
            "cp \"$1\" \"$(dirname \"$1\")/seen.xml\"\n",
        );
        let input = input_file(dir.path());
        let process = spawn_tool(&tool, &input).await.expect("spawn");
        assert_eq!(process.wait().await.expect("wait"), ToolOutcome::Succeeded);
        assert!(dir.path().join("seen.xml").exists());
    }

    #[tokio::test]
    async fn terminated_process_reports_killed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = write_script(dir.path(), "slow.sh", "exec sleep 30\n");
        let process = spawn_tool(&tool, &input_file(dir.path()))
            .await
            .expect("spawn");

        assert_eq!(terminate(process.pid()).expect("kill"), Termination::Killed);
        assert_eq!(process.wait().await.expect("wait"), ToolOutcome::Killed);
    }

    #[tokio::test]
    async fn missing_executable_is_a_tool_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = spawn_tool(Path::new("/nonexistent/mole"), &input_file(dir.path())).await;
        assert_matches!(result, Err(CoreError::ToolExecution(msg)) if msg.contains("not found"));
    }

    #[tokio::test]
    async fn non_executable_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let plain = dir.path().join("plain");
        std::fs::write(&plain, "data").expect("write");
        let result = spawn_tool(&plain, &input_file(dir.path())).await;
        assert_matches!(result, Err(CoreError::ToolExecution(msg)) if msg.contains("not executable"));
    }

    #[test]
    fn zero_pid_is_never_signalled() {
        assert_matches!(terminate(0), Err(CoreError::TerminationFailed(_)));
        assert!(!is_alive(0));
    }

    #[tokio::test]
    async fn exited_process_is_not_alive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = write_script(dir.path(), "ok.sh", "exit 0\n");
        let process = spawn_tool(&tool, &input_file(dir.path()))
            .await
            .expect("spawn");
        let pid = process.pid();
        process.wait().await.expect("wait");
        assert!(!is_alive(pid));
        assert_eq!(terminate(pid).expect("kill"), Termination::AlreadyGone);
    }
}
