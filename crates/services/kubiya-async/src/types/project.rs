use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// A project as returned by the API
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Project {
    /// Project identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Project name
    #[serde(default, deserialize_with = "super::null_default")]
    pub name: String,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Current variable values
    #[serde(default, deserialize_with = "super::null_default")]
    pub variables: Vec<ProjectVariable>,
    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One variable assignment on a project
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectVariable {
    /// Variable name
    #[serde(default)]
    pub name: Option<String>,
    /// Assigned value
    #[serde(default)]
    pub value: Value,
}

/// A project template (use case)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectTemplate {
    /// Template identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Template name
    #[serde(default, deserialize_with = "super::null_default")]
    pub name: String,
    /// Top-level variables
    #[serde(default, deserialize_with = "super::null_default")]
    pub variables: Vec<TemplateVariable>,
    /// Resources, each with their own variables
    #[serde(default, deserialize_with = "super::null_default")]
    pub resources: Vec<TemplateResource>,
    /// Secrets the template expects in the environment
    #[serde(default, deserialize_with = "super::null_default")]
    pub secrets: Vec<TemplateSecret>,
    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A variable declared by a template
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TemplateVariable {
    /// Variable name
    #[serde(default)]
    pub name: String,
    /// Whether a value must be supplied
    #[serde(default, deserialize_with = "super::null_default")]
    pub required: bool,
    /// Default value; `None` when absent or null
    #[serde(default)]
    pub default: Option<Value>,
}

/// A resource declared by a template
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TemplateResource {
    /// Variables of the resource; all without default are required
    #[serde(default, deserialize_with = "super::null_default")]
    pub variables: Vec<TemplateVariable>,
}

/// A secret declared by a template
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateSecret {
    /// Secret name
    #[serde(default)]
    pub name: Option<String>,
    /// Environment variable the secret is read from
    #[serde(default, rename = "toEnv")]
    pub to_env: Option<String>,
}

impl TemplateSecret {
    /// Environment variable that must be set for this secret
    #[must_use]
    pub fn env_var(&self) -> Option<&str> {
        self.to_env.as_deref().or(self.name.as_deref())
    }
}

impl ProjectTemplate {
    /// Names of variables that have no default and must be supplied
    #[must_use]
    pub fn required_variables(&self) -> Vec<&str> {
        let top = self
            .variables
            .iter()
            .filter(|v| v.required && v.default.is_none());
        let resources = self
            .resources
            .iter()
            .flat_map(|r| &r.variables)
            .filter(|v| v.default.is_none());
        top.chain(resources).map(|v| v.name.as_str()).collect()
    }
}

/// Request to create a project
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateProject {
    /// Project name
    pub name: String,
    /// Template to instantiate
    pub template_id: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Plain variables
    pub variables: Map<String, Value>,
    /// Sensitive variables, merged after plain ones
    pub sensitive_variables: Map<String, Value>,
    /// JSON file of variables, merged last
    pub variables_file: Option<PathBuf>,
    /// Skip checking variables and secrets against the template
    pub skip_var_validation: bool,
}

impl CreateProject {
    /// Project named `name`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the template
    #[must_use]
    pub fn template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }

    /// Adds a plain variable
    #[must_use]
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Adds a sensitive variable
    #[must_use]
    pub fn sensitive_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.sensitive_variables.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateProjectBody {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usecase_id: Option<String>,
    pub description: String,
    pub variables: Map<String, Value>,
}

/// Request to update a project; unset fields keep their current value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateProject {
    /// New name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// Variables to add or overwrite
    pub variables: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateProjectBody {
    pub name: Option<String>,
    pub description: Option<String>,
    pub variables: Map<String, Value>,
}

/// A plan computed for a project
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    /// Plan identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    /// Planned changes
    #[serde(default)]
    pub changes: Value,
    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Plan {
    /// Whether the plan would change anything
    #[must_use]
    pub fn has_changes(&self) -> bool {
        match &self.changes {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > 0.0),
        }
    }
}

/// Outcome of planning with optional auto-approval
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    /// Plan created and left for review
    Planned(Plan),
    /// Plan auto-approved; execution started
    Approved(Execution),
}

/// A plan execution
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Execution {
    /// Execution identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    /// Execution state, e.g. `running`, `completed`, `failed`
    #[serde(default, deserialize_with = "super::null_default")]
    pub status: String,
    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Execution {
    /// Whether the execution reached `completed` or `failed`
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.status.to_lowercase().as_str(), "completed" | "failed")
    }

    /// Whether the execution completed successfully
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status.eq_ignore_ascii_case("completed")
    }
}

/// Normalizes an execution-logs response into lines
///
/// Accepts a list of lines, an object with `logs`, or anything else as a
/// single line.
#[must_use]
pub fn log_lines(value: Value) -> Vec<String> {
    fn line(v: Value) -> String {
        match v {
            Value::String(s) => s,
            other => other.to_string(),
        }
    }
    match value {
        Value::Array(items) => items.into_iter().map(line).collect(),
        Value::Object(mut map) => match map.remove("logs") {
            Some(Value::Array(items)) => items.into_iter().map(line).collect(),
            _ => Vec::new(),
        },
        other => vec![line(other)],
    }
}
