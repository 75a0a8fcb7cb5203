use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::KubiyaError;
use crate::sse::StreamEvent;

/// A workflow definition as given by the caller
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowDefinition {
    /// Already-parsed JSON
    Json(Value),
    /// JSON text, parsed before sending
    Text(String),
}

impl From<Value> for WorkflowDefinition {
    fn from(v: Value) -> Self {
        Self::Json(v)
    }
}

impl From<&str> for WorkflowDefinition {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for WorkflowDefinition {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl WorkflowDefinition {
    /// Builds the request body: the definition's fields at top level, plus
    /// `parameters` when any are given
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::WorkflowExecution`] if the text is not JSON or
    /// the definition is not an object.
    pub fn into_body(self, parameters: Option<Map<String, Value>>) -> Result<Value, KubiyaError> {
        let value = match self {
            Self::Json(v) => v,
            Self::Text(s) => serde_json::from_str(&s).map_err(|e| KubiyaError::WorkflowExecution {
                message: format!("Invalid workflow JSON: {e}"),
                workflow_id: None,
            })?,
        };
        let Value::Object(mut body) = value else {
            return Err(KubiyaError::WorkflowExecution {
                message: "Workflow definition must be a dictionary".into(),
                workflow_id: None,
            });
        };
        if let Some(params) = parameters.filter(|p| !p.is_empty()) {
            body.insert("parameters".into(), Value::Object(params));
        }
        Ok(Value::Object(body))
    }
}

/// Every event collected from a completed workflow stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowRun {
    /// Events in arrival order
    pub events: Vec<StreamEvent>,
    /// Whether the platform ended the stream explicitly
    pub ended: bool,
}

impl WorkflowRun {
    /// Whether the stream ended with an end signal or `[DONE]` rather than
    /// the connection simply closing
    #[must_use]
    pub const fn ended_cleanly(&self) -> bool {
        self.ended
    }
}

/// Query for listing workflows
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListWorkflows {
    /// Maximum number of results
    pub limit: u32,
    /// Result offset
    pub offset: u32,
    /// Only workflows in this state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Default for ListWorkflows {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
            status: None,
        }
    }
}

impl ListWorkflows {
    pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
        let mut q = vec![
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
        ];
        if let Some(status) = &self.status {
            q.push(("status", status.clone()));
        }
        q
    }
}
