use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool source (repository or integration)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Source {
    /// Source identifier
    #[serde(default)]
    pub uuid: String,
    /// Display name
    #[serde(default, deserialize_with = "super::null_default")]
    pub name: String,
    /// Description
    #[serde(default, deserialize_with = "super::null_default")]
    pub description: String,
    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Full metadata of a source, including its tools
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceMetadata {
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tools defined by the source
    #[serde(default, deserialize_with = "super::null_default")]
    pub tools: Vec<Tool>,
    /// Tools defined inline
    #[serde(default, deserialize_with = "super::null_default")]
    pub inline_tools: Vec<Tool>,
    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SourceMetadata {
    /// Regular tools followed by inline tools
    pub fn all_tools(&self) -> impl Iterator<Item = &Tool> {
        self.tools.iter().chain(&self.inline_tools)
    }

    /// Finds a tool by exact name, regular tools first
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Tool> {
        self.all_tools().find(|t| t.name == name)
    }
}

/// A tool definition
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// Tool name
    #[serde(default, deserialize_with = "super::null_default")]
    pub name: String,
    /// Description
    #[serde(default, deserialize_with = "super::null_default")]
    pub description: String,
    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A search hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolMatch {
    /// Matched tool
    pub tool: Tool,
    /// Source the tool belongs to
    pub source: Source,
    /// Edit distance from the query; 0 for substring hits
    pub distance: usize,
}

/// A tool with the name of the source it was found in
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescription {
    /// Tool definition
    pub tool: Tool,
    /// Source name, if known
    pub source_name: Option<String>,
}
