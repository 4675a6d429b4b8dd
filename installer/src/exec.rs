//! External command execution with a timeout.
//!
//! Remote installs (`ssh`, `scp`) and publish-side git integration run
//! external programs. They go through [`CommandExecutor`] so tests can
//! substitute canned output, and every real invocation is bounded by a
//! timeout so a hung network peer cannot stall the flow forever.

use std::io::{self, Read};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Default timeout for external commands (5 minutes).
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors raised while running an external command.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The program could not be started.
    #[error("failed to run {program}: {source}; check that it is installed and on PATH")]
    Spawn {
        /// The program name.
        program: String,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The program did not finish within the timeout and was killed.
    #[error("{program} timed out after {seconds} seconds")]
    TimedOut {
        /// The program name.
        program: String,
        /// The timeout that elapsed.
        seconds: u64,
    },

    /// The program's output could not be collected.
    #[error("failed to collect output of {program}: {source}")]
    Output {
        /// The program name.
        program: String,
        /// The underlying I/O error.
        source: io::Error,
    },
}

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// A non-zero exit status is not an error at this level; callers
    /// inspect [`Output::status`].
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] if the command cannot be started, times out,
    /// or its output cannot be read.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use keel_installer::exec::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor::default();
    /// let output = executor.run("ssh", &["-V"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), keel_installer::exec::ExecError>(())
    /// ```
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output, ExecError>;
}

/// Executes commands on the local system with a timeout.
#[derive(Debug, Clone, Copy)]
pub struct SystemCommandExecutor {
    timeout: Duration,
}

impl SystemCommandExecutor {
    /// Create an executor that kills commands running longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemCommandExecutor {
    fn default() -> Self {
        Self::with_timeout(COMMAND_TIMEOUT)
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output, ExecError> {
        log::debug!("running {cmd} {}", args.join(" "));
        let mut child = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: cmd.to_owned(),
                source,
            })?;

        // Both pipes are drained while the child runs; a child that fills
        // the pipe buffer would otherwise block until the timeout.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let output_error = |source| ExecError::Output {
            program: cmd.to_owned(),
            source,
        };
        match child.wait_timeout(self.timeout).map_err(output_error)? {
            Some(status) => Ok(Output {
                status,
                stdout: collect(stdout).map_err(output_error)?,
                stderr: collect(stderr).map_err(output_error)?,
            }),
            None => {
                if let Err(err) = child.kill() {
                    log::warn!("failed to kill timed-out {cmd}: {err}");
                }
                if let Err(err) = child.wait() {
                    log::warn!("failed to reap timed-out {cmd}: {err}");
                }
                Err(ExecError::TimedOut {
                    program: cmd.to_owned(),
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }
}

fn drain(mut pipe: impl Read + Send + 'static) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn collect(reader: Option<JoinHandle<io::Result<Vec<u8>>>>) -> io::Result<Vec<u8>> {
    match reader {
        Some(handle) => handle
            .join()
            .map_err(|_| io::Error::other("output reader thread panicked"))?,
        None => Ok(Vec::new()),
    }
}

/// Return the trimmed standard error of a failed command, falling back to
/// its exit status when stderr is empty.
#[must_use]
pub fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        format!("exited with {}", output.status)
    } else {
        trimmed.to_owned()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_of_successful_command() {
        let output = SystemCommandExecutor::default()
            .run("sh", &["-c", "printf keel"])
            .expect("run sh");
        assert!(output.status.success());
        assert_eq!(output.stdout, b"keel");
    }

    #[test]
    fn non_zero_exit_is_not_an_error() {
        let output = SystemCommandExecutor::default()
            .run("sh", &["-c", "echo broken >&2; exit 3"])
            .expect("run sh");
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(failure_message(&output), "broken");
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = SystemCommandExecutor::default()
            .run("keel-definitely-not-installed", &[])
            .expect_err("missing program");
        assert!(matches!(err, ExecError::Spawn { .. }));
    }

    #[test]
    fn large_output_completes_within_timeout() {
        let executor = SystemCommandExecutor::with_timeout(Duration::from_secs(10));
        let started = std::time::Instant::now();
        let output = executor
            .run("sh", &["-c", "head -c 200000 /dev/zero; head -c 100000 /dev/zero >&2"])
            .expect("run sh");
        assert!(output.status.success());
        assert_eq!(output.stdout.len(), 200_000);
        assert_eq!(output.stderr.len(), 100_000);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn slow_command_times_out() {
        let executor = SystemCommandExecutor::with_timeout(Duration::from_millis(100));
        let err = executor.run("sleep", &["5"]).expect_err("timeout");
        assert!(matches!(err, ExecError::TimedOut { .. }));
    }
}
