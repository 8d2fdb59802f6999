//! Process-spawning seam for the external task runner.

use std::borrow::Cow;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Default upper bound for a single runner invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result alias for runner invocations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Captured output of a runner invocation that exited successfully.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunOutput {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl RunOutput {
    /// Creates an output record from raw streams.
    #[must_use]
    pub fn new(stdout: impl Into<Vec<u8>>, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Raw standard output.
    #[must_use]
    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    /// Raw standard error.
    #[must_use]
    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    /// Standard output decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn stdout_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }
}

/// Errors produced while invoking the runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// No program was supplied.
    #[error("runner invocation requires at least one argument")]
    EmptyCommand,

    /// The process could not be started.
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Reading the process output failed.
    #[error("failed to collect output from `{program}`: {source}")]
    Io {
        /// Program whose output could not be read.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The process exited with a non-zero status.
    #[error("`{program}` exited with {}", exit_detail(*.code, .stderr))]
    Exit {
        /// Program that failed.
        program: String,
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
        /// Captured standard output.
        stdout: Vec<u8>,
        /// Captured standard error.
        stderr: Vec<u8>,
    },

    /// The process did not finish in time and was killed.
    #[error("`{program}` timed out after {timeout:?}")]
    TimedOut {
        /// Program that was killed.
        program: String,
        /// Configured limit.
        timeout: Duration,
    },
}

impl RunnerError {
    /// Standard error captured before the failure, empty when none exists.
    #[must_use]
    pub fn stderr(&self) -> &[u8] {
        match self {
            Self::Exit { stderr, .. } => stderr,
            _ => &[],
        }
    }

    /// Standard error decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn stderr_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.stderr())
    }
}

fn exit_detail(code: Option<i32>, stderr: &[u8]) -> String {
    let status = code.map_or_else(|| "signal".to_owned(), |code| format!("status {code}"));
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        status
    } else {
        format!("{status}: {stderr}")
    }
}

/// Invokes the external task runner.
///
/// `argv[0]` is the executable; the remaining entries are passed verbatim
/// without any shell interpretation.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Runs the command to completion and returns its captured output.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] when `argv` is empty, the process cannot be
    /// started, exits non-zero, or exceeds its time limit.
    async fn invoke(&self, argv: &[String]) -> RunnerResult<RunOutput>;
}

/// [`TaskRunner`] that spawns a real child process per invocation.
#[derive(Clone, Debug)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    /// Creates a runner that kills processes exceeding `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Returns the configured per-invocation limit.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl TaskRunner for ProcessRunner {
    async fn invoke(&self, argv: &[String]) -> RunnerResult<RunOutput> {
        let (program, args) = argv.split_first().ok_or(RunnerError::EmptyCommand)?;
        debug!(program = %program, args = ?args, "invoking task runner");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: program.clone(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                warn!(program = %program, timeout = ?self.timeout, "task runner timed out");
                RunnerError::TimedOut {
                    program: program.clone(),
                    timeout: self.timeout,
                }
            })?
            .map_err(|source| RunnerError::Io {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            debug!(
                program = %program,
                code = ?output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "task runner exited unsuccessfully"
            );
            return Err(RunnerError::Exit {
                program: program.clone(),
                code: output.status.code(),
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        Ok(RunOutput::new(output.stdout, output.stderr))
    }
}
