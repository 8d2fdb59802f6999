//! Command lines understood by the task runner.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Executable used when none is configured.
pub const DEFAULT_RUNNER_BINARY: &str = "task";

/// Output format requested from the runner's task listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListFormat {
    /// `--list --json`, a `{"tasks": [...]}` document.
    #[default]
    Json,
    /// `--list`, one `* name: description` line per task.
    Text,
}

impl fmt::Display for ListFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Text => "text",
        })
    }
}

impl FromStr for ListFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            other => Err(format!("unknown list format `{other}` (expected json or text)")),
        }
    }
}

/// A runner executable paired with the Taskfile it operates on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskfileTarget {
    binary: String,
    taskfile: PathBuf,
}

impl TaskfileTarget {
    /// Creates a target for the supplied binary and Taskfile.
    #[must_use]
    pub fn new(binary: impl Into<String>, taskfile: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            taskfile: taskfile.into(),
        }
    }

    /// Returns the runner executable.
    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Returns the Taskfile path.
    #[must_use]
    pub fn taskfile(&self) -> &Path {
        &self.taskfile
    }

    fn taskfile_arg(&self) -> String {
        self.taskfile.to_string_lossy().into_owned()
    }

    /// `<runner> --list [--json] --taskfile <path>`
    #[must_use]
    pub fn list_command(&self, format: ListFormat) -> Vec<String> {
        let mut argv = vec![self.binary.clone(), "--list".to_owned()];
        if format == ListFormat::Json {
            argv.push("--json".to_owned());
        }
        argv.push("--taskfile".to_owned());
        argv.push(self.taskfile_arg());
        argv
    }

    /// `<runner> <task> --summary --taskfile <path>`
    #[must_use]
    pub fn summary_command(&self, task: &str) -> Vec<String> {
        vec![
            self.binary.clone(),
            task.to_owned(),
            "--summary".to_owned(),
            "--taskfile".to_owned(),
            self.taskfile_arg(),
        ]
    }

    /// `<runner> --taskfile <path> <task> [key=value ...]`
    ///
    /// Arguments are emitted in iteration order.
    #[must_use]
    pub fn execute_command<'a, I>(&self, task: &str, arguments: I) -> Vec<String>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut argv = vec![
            self.binary.clone(),
            "--taskfile".to_owned(),
            self.taskfile_arg(),
            task.to_owned(),
        ];
        argv.extend(
            arguments
                .into_iter()
                .map(|(key, value)| format!("{key}={value}")),
        );
        argv
    }
}
