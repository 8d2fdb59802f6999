//! Translation of task definitions into tool descriptors.
//!
//! Two consumers need two shapes: the protocol server wants a structured
//! parameter schema, the agent wants a single prose description.

use serde::Serialize;
use serde_json::{Map, Value, json};
use task_primitives::{TaskCatalog, TaskDefinition};

/// How parameter `required` flags map into protocol descriptors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RequiredPolicy {
    /// Every parameter is mandatory.
    #[default]
    AllRequired,
    /// Parameters keep the flag parsed from the task summary.
    HonorTaskFlags,
}

impl RequiredPolicy {
    /// Picks [`RequiredPolicy::HonorTaskFlags`] when `honor` is set.
    #[must_use]
    pub const fn from_honor_flags(honor: bool) -> Self {
        if honor {
            Self::HonorTaskFlags
        } else {
            Self::AllRequired
        }
    }
}

/// One string-typed option of a protocol tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct McpParameter {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    required: bool,
}

impl McpParameter {
    /// Parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description, when the summary supplied one.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Whether callers must supply a value.
    #[must_use]
    pub fn required(&self) -> bool {
        self.required
    }
}

/// Tool descriptor published by the protocol server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct McpToolDescriptor {
    name: String,
    description: String,
    parameters: Vec<McpParameter>,
}

impl McpToolDescriptor {
    /// Builds the descriptor for one task.
    ///
    /// Repeated parameter names collapse into the first occurrence.
    #[must_use]
    pub fn from_task(task: &TaskDefinition, policy: RequiredPolicy) -> Self {
        let mut parameters: Vec<McpParameter> = Vec::with_capacity(task.parameters().len());
        for parameter in task.parameters() {
            if parameters.iter().any(|seen| seen.name == parameter.name()) {
                continue;
            }
            parameters.push(McpParameter {
                name: parameter.name().to_owned(),
                description: parameter.description().map(str::to_owned),
                required: match policy {
                    RequiredPolicy::AllRequired => true,
                    RequiredPolicy::HonorTaskFlags => parameter.required(),
                },
            });
        }

        Self {
            name: task.name().to_owned(),
            description: task.description().to_owned(),
            parameters,
        }
    }

    /// Tool name, identical to the task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tool description, identical to the task description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Parameters in usage order.
    #[must_use]
    pub fn parameters(&self) -> &[McpParameter] {
        &self.parameters
    }

    /// JSON Schema object describing the tool input.
    ///
    /// ```json
    /// {"type": "object", "properties": {"ZIPCODE": {"type": "string"}}, "required": ["ZIPCODE"]}
    /// ```
    #[must_use]
    pub fn input_schema(&self) -> Map<String, Value> {
        let mut properties = Map::new();
        for parameter in &self.parameters {
            let mut property = Map::new();
            property.insert("type".into(), json!("string"));
            if let Some(description) = &parameter.description {
                property.insert("description".into(), json!(description));
            }
            properties.insert(parameter.name.clone(), Value::Object(property));
        }

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|parameter| parameter.required)
            .map(|parameter| parameter.name.as_str())
            .collect();

        let mut schema = Map::new();
        schema.insert("type".into(), json!("object"));
        schema.insert("properties".into(), Value::Object(properties));
        schema.insert("required".into(), json!(required));
        schema
    }
}

/// Tool descriptor handed to an agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentToolDescriptor {
    name: String,
    description: String,
}

impl AgentToolDescriptor {
    /// Builds the descriptor for one task, folding usage into the prose.
    #[must_use]
    pub fn from_task(task: &TaskDefinition) -> Self {
        let description = if task.usage().is_empty() {
            task.description().to_owned()
        } else {
            format!("{} Usage: {}", task.description(), task.usage())
        };
        Self {
            name: task.name().to_owned(),
            description,
        }
    }

    /// Tool name, identical to the task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Task description followed by its usage line.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Protocol descriptors for every task, in catalog order.
#[must_use]
pub fn mcp_descriptors(catalog: &TaskCatalog, policy: RequiredPolicy) -> Vec<McpToolDescriptor> {
    catalog
        .iter()
        .map(|task| McpToolDescriptor::from_task(task, policy))
        .collect()
}

/// Agent descriptors for every task, in catalog order.
#[must_use]
pub fn agent_descriptors(catalog: &TaskCatalog) -> Vec<AgentToolDescriptor> {
    catalog.iter().map(AgentToolDescriptor::from_task).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use task_primitives::TaskParameter;

    fn weather() -> TaskDefinition {
        TaskDefinition::builder("weather")
            .unwrap()
            .description("Retrieve a weather forecast.")
            .usage("task weather ZIPCODE=<zip> UNITS=metric")
            .parameter(
                TaskParameter::new("ZIPCODE")
                    .unwrap()
                    .with_description("The zipcode to look up."),
            )
            .parameter(TaskParameter::new("UNITS").unwrap().with_required(false))
            .build()
    }

    fn catalog() -> TaskCatalog {
        let simple = TaskDefinition::builder("simple")
            .unwrap()
            .description("A simple task.")
            .build();
        TaskCatalog::from_tasks([weather(), simple]).unwrap()
    }

    #[test]
    fn mcp_descriptor_preserves_name_and_parameters() {
        let descriptors = mcp_descriptors(&catalog(), RequiredPolicy::default());
        assert_eq!(descriptors.len(), 2);

        let weather = &descriptors[0];
        assert_eq!(weather.name(), "weather");
        assert_eq!(weather.description(), "Retrieve a weather forecast.");
        let names: Vec<_> = weather.parameters().iter().map(McpParameter::name).collect();
        assert_eq!(names, vec!["ZIPCODE", "UNITS"]);
        assert!(weather.parameters().iter().all(McpParameter::required));
        assert_eq!(
            weather.parameters()[0].description(),
            Some("The zipcode to look up.")
        );
    }

    #[test]
    fn honor_policy_keeps_parsed_flags() {
        let descriptor = McpToolDescriptor::from_task(&weather(), RequiredPolicy::HonorTaskFlags);
        assert!(descriptor.parameters()[0].required());
        assert!(!descriptor.parameters()[1].required());
        assert_eq!(descriptor.input_schema()["required"], json!(["ZIPCODE"]));
    }

    #[test]
    fn input_schema_lists_string_properties() {
        let schema = McpToolDescriptor::from_task(&weather(), RequiredPolicy::AllRequired)
            .input_schema();
        assert_eq!(
            Value::Object(schema),
            json!({
                "type": "object",
                "properties": {
                    "ZIPCODE": {"type": "string", "description": "The zipcode to look up."},
                    "UNITS": {"type": "string"}
                },
                "required": ["ZIPCODE", "UNITS"]
            })
        );
    }

    #[test]
    fn parameterless_task_has_empty_schema() {
        let descriptors = mcp_descriptors(&catalog(), RequiredPolicy::AllRequired);
        let schema = descriptors[1].input_schema();
        assert_eq!(schema["properties"], json!({}));
        assert_eq!(schema["required"], json!([]));
    }

    #[test]
    fn duplicate_parameters_collapse() {
        let task = TaskDefinition::builder("dup")
            .unwrap()
            .parameter(TaskParameter::new("A").unwrap().with_description("first"))
            .parameter(TaskParameter::new("A").unwrap().with_description("second"))
            .build();
        let descriptor = McpToolDescriptor::from_task(&task, RequiredPolicy::AllRequired);
        assert_eq!(descriptor.parameters().len(), 1);
        assert_eq!(descriptor.parameters()[0].description(), Some("first"));
        assert_eq!(descriptor.input_schema()["required"], json!(["A"]));
    }

    #[test]
    fn agent_descriptor_folds_usage_into_description() {
        let descriptors = agent_descriptors(&catalog());
        assert_eq!(descriptors[0].name(), "weather");
        assert_eq!(
            descriptors[0].description(),
            "Retrieve a weather forecast. Usage: task weather ZIPCODE=<zip> UNITS=metric"
        );
        assert_eq!(descriptors[1].description(), "A simple task.");
    }

    #[test]
    fn empty_catalog_translates_to_nothing() {
        let catalog = TaskCatalog::new();
        assert!(mcp_descriptors(&catalog, RequiredPolicy::AllRequired).is_empty());
        assert!(agent_descriptors(&catalog).is_empty());
    }

    #[test]
    fn policy_from_flag() {
        assert_eq!(RequiredPolicy::from_honor_flags(false), RequiredPolicy::AllRequired);
        assert_eq!(RequiredPolicy::from_honor_flags(true), RequiredPolicy::HonorTaskFlags);
    }
}
