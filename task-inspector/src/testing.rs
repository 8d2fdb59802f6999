//! Scripted [`TaskRunner`] for exercising the pipeline without a real
//! binary.

use std::collections::HashMap;
use std::io;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::runner::{RunOutput, RunnerError, RunnerResult, TaskRunner};

#[derive(Clone, Debug)]
struct Scripted {
    code: i32,
    stdout: String,
    stderr: String,
}

/// Runner that answers from a table keyed by the exact argv.
///
/// Unscripted commands fail as if the executable did not exist. Every
/// invocation is recorded and can be read back with [`ScriptedRunner::calls`].
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: HashMap<Vec<String>, Scripted>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    /// Creates a runner with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `argv` with a successful exit and the given stdout.
    #[must_use]
    pub fn on_success(self, argv: Vec<String>, stdout: impl Into<String>) -> Self {
        self.on_output(argv, 0, stdout, "")
    }

    /// Answers `argv` with a non-zero exit and the given stderr.
    #[must_use]
    pub fn on_failure(self, argv: Vec<String>, code: i32, stderr: impl Into<String>) -> Self {
        self.on_output(argv, code, "", stderr)
    }

    /// Answers `argv` with exit `code` and both output streams. Code zero
    /// is a success.
    #[must_use]
    pub fn on_output(
        mut self,
        argv: Vec<String>,
        code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        self.responses.insert(
            argv,
            Scripted {
                code,
                stdout: stdout.into(),
                stderr: stderr.into(),
            },
        );
        self
    }

    /// Every argv this runner was invoked with, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TaskRunner for ScriptedRunner {
    async fn invoke(&self, argv: &[String]) -> RunnerResult<RunOutput> {
        let program = argv.first().ok_or(RunnerError::EmptyCommand)?.clone();
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(argv.to_vec());

        match self.responses.get(argv) {
            Some(Scripted { code: 0, stdout, stderr }) => {
                Ok(RunOutput::new(stdout.as_bytes(), stderr.as_bytes()))
            }
            Some(Scripted { code, stdout, stderr }) => Err(RunnerError::Exit {
                program,
                code: Some(*code),
                stdout: stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
            }),
            None => Err(RunnerError::Spawn {
                program,
                source: io::Error::new(io::ErrorKind::NotFound, "no scripted response"),
            }),
        }
    }
}
