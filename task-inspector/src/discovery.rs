//! Discovery of task names from the runner's listing.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, error};

use crate::command::{ListFormat, TaskfileTarget};
use crate::error::{InspectError, InspectResult};
use crate::runner::TaskRunner;

/// `--list --json` document. Entries also carry `task`, `desc`, `usage`
/// and `summary`, none of which discovery relies on. A missing or `null`
/// `tasks` field is an empty listing.
#[derive(Debug, Deserialize)]
struct TaskListing {
    #[serde(default)]
    tasks: Option<Vec<ListedTask>>,
}

#[derive(Debug, Deserialize)]
struct ListedTask {
    name: String,
}

/// Lists the tasks a Taskfile defines.
#[derive(Clone)]
pub struct TaskDiscovery {
    runner: Arc<dyn TaskRunner>,
    target: TaskfileTarget,
    format: ListFormat,
}

impl std::fmt::Debug for TaskDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDiscovery")
            .field("target", &self.target)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl TaskDiscovery {
    /// Creates a discovery step backed by the supplied runner.
    #[must_use]
    pub fn new(runner: Arc<dyn TaskRunner>, target: TaskfileTarget, format: ListFormat) -> Self {
        Self {
            runner,
            target,
            format,
        }
    }

    /// Returns task names in the order the runner reported them.
    ///
    /// # Errors
    ///
    /// Returns [`InspectError::Discovery`] if the runner fails and
    /// [`InspectError::MalformedListing`] if JSON output cannot be decoded.
    pub async fn discover(&self) -> InspectResult<Vec<String>> {
        debug!(taskfile = %self.target.taskfile().display(), format = %self.format, "discovering tasks");
        let argv = self.target.list_command(self.format);
        let output = self.runner.invoke(&argv).await.map_err(|source| {
            error!(error = %source, "error running task list command");
            InspectError::Discovery { source }
        })?;

        let names = match self.format {
            ListFormat::Json => parse_json_listing(output.stdout())?,
            ListFormat::Text => parse_text_listing(&output.stdout_lossy()),
        };
        debug!(task_count = names.len(), "discovered tasks");
        Ok(names)
    }
}

/// Extracts task names from a `--list --json` document.
///
/// # Errors
///
/// Returns [`InspectError::MalformedListing`] if the bytes are not a task
/// listing document.
pub fn parse_json_listing(bytes: &[u8]) -> InspectResult<Vec<String>> {
    let listing: TaskListing = serde_json::from_slice(bytes).map_err(|source| {
        error!(error = %source, "error decoding task listing");
        InspectError::MalformedListing { source }
    })?;
    Ok(listing
        .tasks
        .unwrap_or_default()
        .into_iter()
        .map(|task| task.name)
        .collect())
}

/// Extracts task names from plain `--list` output.
///
/// Only lines shaped like `* name: description` contribute. Names may
/// contain `:` (namespaced tasks); the name ends at the first colon that is
/// followed by whitespace or the end of the line.
#[must_use]
pub fn parse_text_listing(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.trim_start().strip_prefix("* "))
        .filter_map(|entry| {
            let entry = entry.trim_start();
            let end = name_end(entry)?;
            let name = entry[..end].trim();
            (!name.is_empty()).then(|| name.to_owned())
        })
        .collect()
}

fn name_end(entry: &str) -> Option<usize> {
    let mut chars = entry.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if ch == ':' && chars.peek().is_none_or(|(_, next)| next.is_whitespace()) {
            return Some(idx);
        }
    }
    None
}
