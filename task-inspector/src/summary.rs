//! Parsing of `task <name> --summary` output.
//!
//! The summary is free text meant for humans. It is read as a small state
//! machine:
//!
//! ```text
//! task: weather                         <- header, discarded
//! Retrieve a weather forecast.          <- description (until a marker)
//! Usage: task weather ZIPCODE=<zip>     <- usage, remainder of the line
//! Required:                             <- required-parameter notes
//!   ZIPCODE: The zipcode to look up.
//! ```
//!
//! Parameters come from the usage line: every whitespace-separated token
//! containing `=` names one parameter.

use std::sync::Arc;

use task_primitives::{TaskDefinition, TaskParameter};
use tracing::{debug, trace};

use crate::command::TaskfileTarget;
use crate::error::{InspectError, InspectResult};
use crate::runner::TaskRunner;

const HEADER_PREFIX: &str = "task: ";
const USAGE_MARKER: &str = "Usage:";
const REQUIRED_MARKER: &str = "Required:";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SummaryState {
    Description,
    Usage,
    Required,
}

/// Fetches and parses the summary of individual tasks.
#[derive(Clone)]
pub struct TaskDetails {
    runner: Arc<dyn TaskRunner>,
    target: TaskfileTarget,
}

impl std::fmt::Debug for TaskDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDetails")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl TaskDetails {
    /// Creates a detail fetcher backed by the supplied runner.
    #[must_use]
    pub fn new(runner: Arc<dyn TaskRunner>, target: TaskfileTarget) -> Self {
        Self { runner, target }
    }

    /// Fetches the summary of `task_name` and parses it.
    ///
    /// # Errors
    ///
    /// Returns [`InspectError::Detail`] if the runner fails. Missing or
    /// malformed sections never produce an error.
    pub async fn details(&self, task_name: &str) -> InspectResult<TaskDefinition> {
        debug!(task = task_name, "fetching task summary");
        let argv = self.target.summary_command(task_name);
        let output = self
            .runner
            .invoke(&argv)
            .await
            .map_err(|source| InspectError::Detail {
                task: task_name.to_owned(),
                source,
            })?;

        parse_summary(task_name, &output.stdout_lossy())
    }
}

/// Parses summary text into a [`TaskDefinition`] named `task_name`.
///
/// # Errors
///
/// Returns [`InspectError::Model`] only when `task_name` itself is not a
/// valid task name.
pub fn parse_summary(task_name: &str, text: &str) -> InspectResult<TaskDefinition> {
    let mut state = SummaryState::Description;
    let mut description = String::new();
    let mut usage = String::new();
    let mut required_section = false;
    let mut required_notes: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        trace!(line, "processing summary line");
        if line.starts_with(HEADER_PREFIX) {
            continue;
        }

        if let Some(rest) = line.strip_prefix(USAGE_MARKER) {
            state = SummaryState::Usage;
            usage = rest.trim().to_owned();
        } else if line.starts_with(REQUIRED_MARKER) {
            state = SummaryState::Required;
            required_section = true;
        } else {
            match state {
                SummaryState::Description => {
                    description.push_str(line);
                    description.push('\n');
                }
                SummaryState::Usage => {}
                SummaryState::Required => {
                    if let Some(note) = parse_required_note(line) {
                        required_notes.push(note);
                    }
                }
            }
        }
    }

    let parameters = usage_parameters(&usage)
        .map(|name| -> task_primitives::Result<TaskParameter> {
            let note = required_notes
                .iter()
                .find(|(noted, _)| noted == name)
                .map(|(_, text)| text.as_str());
            let mut parameter =
                TaskParameter::new(name)?.with_required(!required_section || note.is_some());
            if let Some(text) = note.filter(|text| !text.is_empty()) {
                parameter = parameter.with_description(text);
            }
            Ok(parameter)
        })
        .collect::<task_primitives::Result<Vec<_>>>()?;

    let definition = TaskDefinition::builder(task_name)?
        .description(&description)
        .usage(&usage)
        .parameters(parameters)
        .build();

    debug!(
        task = task_name,
        description = definition.description(),
        usage = definition.usage(),
        parameter_count = definition.parameters().len(),
        "parsed task summary"
    );
    Ok(definition)
}

/// Names of `NAME=value` tokens in first-occurrence order, duplicates kept.
fn usage_parameters(usage: &str) -> impl Iterator<Item = &str> {
    usage
        .split_whitespace()
        .filter_map(|token| token.split_once('=').map(|(name, _)| name))
        .filter(|name| !name.is_empty())
}

/// `  NAME: explanation` inside the `Required:` section.
fn parse_required_note(line: &str) -> Option<(String, String)> {
    let (name, text) = line.trim().split_once(':')?;
    let name = name.trim();
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return None;
    }
    Some((name.to_owned(), text.trim().to_owned()))
}
