//! Task definitions discovered from the external runner.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single `NAME=value` style parameter accepted by a task.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TaskParameter {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    required: bool,
}

impl TaskParameter {
    /// Creates a required parameter after validating its name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameterName`] if the name is empty or
    /// contains whitespace or `=`.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_token(&name).map_err(|reason| Error::InvalidParameterName {
            name: name.clone(),
            reason,
        })?;
        if name.contains('=') {
            return Err(Error::InvalidParameterName {
                name,
                reason: "parameter name cannot contain `=`".into(),
            });
        }

        Ok(Self {
            name,
            description: None,
            required: true,
        })
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the parameter as required or optional.
    #[must_use]
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Whether the runner reports this parameter as mandatory.
    #[must_use]
    pub const fn required(&self) -> bool {
        self.required
    }
}

/// Structured view of one task, parsed from the runner's summary output.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    name: String,
    description: String,
    usage: String,
    #[serde(default)]
    parameters: Vec<TaskParameter>,
}

impl TaskDefinition {
    /// Starts building a task definition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTaskName`] if the name is empty or contains
    /// whitespace.
    pub fn builder(name: impl Into<String>) -> Result<TaskDefinitionBuilder> {
        let name = name.into();
        validate_token(&name).map_err(|reason| Error::InvalidTaskName {
            name: name.clone(),
            reason,
        })?;

        Ok(TaskDefinitionBuilder {
            name,
            description: String::new(),
            usage: String::new(),
            parameters: Vec::new(),
        })
    }

    /// Returns the task name, which doubles as the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the trimmed task description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the usage example, empty when the summary had none.
    #[must_use]
    pub fn usage(&self) -> &str {
        &self.usage
    }

    /// Returns the parameters in first-occurrence order.
    #[must_use]
    pub fn parameters(&self) -> &[TaskParameter] {
        &self.parameters
    }
}

/// Builder for [`TaskDefinition`].
#[derive(Debug)]
pub struct TaskDefinitionBuilder {
    name: String,
    description: String,
    usage: String,
    parameters: Vec<TaskParameter>,
}

impl TaskDefinitionBuilder {
    /// Sets the description. Leading and trailing whitespace is trimmed.
    #[must_use]
    pub fn description(mut self, description: impl AsRef<str>) -> Self {
        self.description = description.as_ref().trim().to_owned();
        self
    }

    /// Sets the usage example. Leading and trailing whitespace is trimmed.
    #[must_use]
    pub fn usage(mut self, usage: impl AsRef<str>) -> Self {
        self.usage = usage.as_ref().trim().to_owned();
        self
    }

    /// Appends a parameter.
    #[must_use]
    pub fn parameter(mut self, parameter: TaskParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Replaces the parameter list.
    #[must_use]
    pub fn parameters(mut self, parameters: Vec<TaskParameter>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Finalizes the definition.
    #[must_use]
    pub fn build(self) -> TaskDefinition {
        TaskDefinition {
            name: self.name,
            description: self.description,
            usage: self.usage,
            parameters: self.parameters,
        }
    }
}

fn validate_token(token: &str) -> std::result::Result<(), String> {
    if token.is_empty() {
        return Err("name cannot be empty".into());
    }
    if token.chars().any(char::is_whitespace) {
        return Err("name cannot contain whitespace".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_defaults_to_required() {
        let param = TaskParameter::new("ZIPCODE").unwrap();
        assert_eq!(param.name(), "ZIPCODE");
        assert!(param.required());
        assert!(param.description().is_none());
    }

    #[test]
    fn parameter_rejects_bad_names() {
        for bad in ["", "TWO WORDS", "A=B"] {
            let err = TaskParameter::new(bad).expect_err("invalid name should error");
            assert!(matches!(err, Error::InvalidParameterName { .. }));
        }
    }

    #[test]
    fn builder_trims_text() {
        let task = TaskDefinition::builder("weather")
            .unwrap()
            .description("\n  Get the weather.\n\n")
            .usage("  task weather ZIPCODE=<zip> ")
            .parameter(TaskParameter::new("ZIPCODE").unwrap())
            .build();

        assert_eq!(task.description(), "Get the weather.");
        assert_eq!(task.usage(), "task weather ZIPCODE=<zip>");
        assert_eq!(task.parameters().len(), 1);
    }

    #[test]
    fn task_name_is_validated() {
        let err = TaskDefinition::builder(" ").expect_err("blank task name should error");
        assert!(matches!(err, Error::InvalidTaskName { .. }));
    }

    #[test]
    fn serializes_optional_description_only_when_present() {
        let param = TaskParameter::new("ZIPCODE").unwrap();
        let json = serde_json::to_value(&param).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "ZIPCODE", "required": true }));
    }
}
