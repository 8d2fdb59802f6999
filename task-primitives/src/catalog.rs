//! Ordered catalog of task definitions.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::TaskDefinition;

/// Every task derived from one Taskfile, in discovery order.
///
/// Deserialization applies the same unique-name rule as [`TaskCatalog::push`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CatalogDocument")]
pub struct TaskCatalog {
    tasks: Vec<TaskDefinition>,
}

#[derive(Deserialize)]
struct CatalogDocument {
    tasks: Vec<TaskDefinition>,
}

impl TryFrom<CatalogDocument> for TaskCatalog {
    type Error = Error;

    fn try_from(document: CatalogDocument) -> Result<Self> {
        Self::from_tasks(document.tasks)
    }
}

impl TaskCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from definitions, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTask`] if two definitions share a name.
    pub fn from_tasks(tasks: impl IntoIterator<Item = TaskDefinition>) -> Result<Self> {
        let mut catalog = Self::new();
        for task in tasks {
            catalog.push(task)?;
        }
        Ok(catalog)
    }

    /// Appends a definition at the end of the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTask`] if the name is already present.
    pub fn push(&mut self, task: TaskDefinition) -> Result<()> {
        if self.get(task.name()).is_some() {
            return Err(Error::DuplicateTask {
                name: task.name().to_owned(),
            });
        }
        self.tasks.push(task);
        Ok(())
    }

    /// Looks up a task by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TaskDefinition> {
        self.tasks.iter().find(|task| task.name() == name)
    }

    /// Returns the definitions in discovery order.
    #[must_use]
    pub fn tasks(&self) -> &[TaskDefinition] {
        &self.tasks
    }

    /// Iterates over the definitions in discovery order.
    pub fn iter(&self) -> std::slice::Iter<'_, TaskDefinition> {
        self.tasks.iter()
    }

    /// Number of tasks in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the catalog holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Returns the task names in discovery order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tasks.iter().map(TaskDefinition::name).collect()
    }
}

impl<'a> IntoIterator for &'a TaskCatalog {
    type Item = &'a TaskDefinition;
    type IntoIter = std::slice::Iter<'a, TaskDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.iter()
    }
}
