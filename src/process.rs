#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Subprocess execution with a wall-clock deadline.

use std::{
    ffi::{OsStr, OsString},
    path::Path,
    process::{ExitStatus, Stdio},
    time::Duration,
};

use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, BufReader},
    process::{Child, Command},
    task::JoinHandle,
    time::timeout,
};

/// Ways a subprocess run can fail before producing an exit status.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The program could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that was launched.
        program: String,
        /// Underlying OS error.
        source:  std::io::Error,
    },
    /// The program did not finish in time and was killed.
    #[error("process did not finish within {} seconds", .0.as_secs())]
    Timeout(Duration),
    /// Waiting on the process or reading its pipes failed.
    #[error("failed to collect process output: {0}")]
    Io(String),
}

/// Kills the child on drop unless disarmed, so a timed-out script does not
/// outlive the grader.
struct ChildDropGuard(Option<Child>);

impl ChildDropGuard {
    /// Wraps a spawned child.
    fn new(child: Child) -> Self {
        Self(Some(child))
    }

    /// The guarded child.
    fn child_mut(&mut self) -> Result<&mut Child, ProcessError> {
        self.0
            .as_mut()
            .ok_or_else(|| ProcessError::Io("child process already taken from guard".into()))
    }

    /// Leaves the (finished) child alone on drop.
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for ChildDropGuard {
    fn drop(&mut self) {
        if let Some(child) = self.0.as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// Captured result of a finished subprocess.
#[derive(Debug)]
pub struct Collected {
    /// Exit status returned by the process.
    pub status: ExitStatus,
    /// Contents written to stdout.
    pub stdout: Vec<u8>,
    /// Contents written to stderr.
    pub stderr: Vec<u8>,
}

impl Collected {
    /// Stdout and stderr, lossily decoded and joined.
    pub fn combined_output(&self) -> String {
        let stdout = String::from_utf8_lossy(&self.stdout);
        let stderr = String::from_utf8_lossy(&self.stderr);
        match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
            (_, true) => stdout.into_owned(),
            (true, false) => stderr.into_owned(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }
}

/// Drains one pipe on its own task.
fn drain<R>(pipe: R, name: &'static str) -> JoinHandle<Result<Vec<u8>, ProcessError>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| ProcessError::Io(format!("failed to read {name}: {e}")))?;
        Ok(buf)
    })
}

/// Runs `program` with no stdin and collects its output.
///
/// With a `deadline`, a process still running when it passes is killed and
/// [`ProcessError::Timeout`] is returned.
pub async fn run_collect(
    program: impl AsRef<OsStr>,
    args: &[OsString],
    cwd: Option<&Path>,
    env: &[(OsString, OsString)],
    deadline: Option<Duration>,
) -> Result<Collected, ProcessError> {
    let program = program.as_ref();
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    for (key, value) in env {
        cmd.env(key, value);
    }

    let child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: program.to_string_lossy().into_owned(),
        source,
    })?;
    let mut guard = ChildDropGuard::new(child);

    let stdout = guard
        .child_mut()?
        .stdout
        .take()
        .ok_or_else(|| ProcessError::Io("missing stdout pipe".into()))?;
    let stderr = guard
        .child_mut()?
        .stderr
        .take()
        .ok_or_else(|| ProcessError::Io("missing stderr pipe".into()))?;
    let out_task = drain(stdout, "stdout");
    let err_task = drain(stderr, "stderr");

    let wait_future = async move {
        let mut guard = guard;
        let status = guard
            .child_mut()?
            .wait()
            .await
            .map_err(|e| ProcessError::Io(format!("failed to wait on process: {e}")))?;
        let join = |e: tokio::task::JoinError| ProcessError::Io(format!("reader task failed: {e}"));
        let stdout = out_task.await.map_err(join)??;
        let stderr = err_task.await.map_err(join)??;
        guard.disarm();
        Ok(Collected {
            status,
            stdout,
            stderr,
        })
    };

    match deadline {
        Some(limit) => timeout(limit, wait_future)
            .await
            .map_err(|_| ProcessError::Timeout(limit))?,
        None => wait_future.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let err = run_collect("gspack-no-such-program", &[], None, &[], None)
            .await
            .expect_err("program does not exist");
        assert!(matches!(err, ProcessError::Spawn { ref program, .. } if program == "gspack-no-such-program"));
    }

    #[cfg(unix)]
    #[test]
    fn combined_output_skips_empty_streams() {
        use std::os::unix::process::ExitStatusExt;

        let collected = |stdout: &str, stderr: &str| Collected {
            status: ExitStatus::from_raw(0),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        };
        assert_eq!(collected("out", "").combined_output(), "out");
        assert_eq!(collected(" ", "err").combined_output(), "err");
        assert_eq!(collected("out", "err").combined_output(), "out\nerr");
    }
}
