use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::error::KubiyaError;

/// Secret metadata as listed by the API
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Secret {
    /// Secret name
    pub name: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Creator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SecretValueResponse {
    #[serde(default, deserialize_with = "super::null_default")]
    pub value: String,
}

/// Where a secret's value comes from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ValueSource {
    value: Option<String>,
    from_file: Option<PathBuf>,
}

impl ValueSource {
    async fn resolve(&self) -> Result<String, KubiyaError> {
        if self.value.is_some() && self.from_file.is_some() {
            return Err(KubiyaError::Validation {
                message: "Cannot use both value and from_file".into(),
                field: Some("from_file".into()),
            });
        }
        let value = match (&self.value, &self.from_file) {
            (_, Some(path)) => read_value(path).await?,
            (Some(v), None) => v.clone(),
            (None, None) => String::new(),
        };
        if value.is_empty() {
            return Err(KubiyaError::validation(
                "Secret value must be provided via value or from_file",
                "value",
            ));
        }
        Ok(value)
    }
}

async fn read_value(path: &Path) -> Result<String, KubiyaError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(KubiyaError::Secret {
            message: format!("File not found: {}", path.display()),
            secret_name: None,
        });
    }
    Ok(tokio::fs::read_to_string(path).await?)
}

/// Request to create a secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSecret {
    name: String,
    description: Option<String>,
    source: ValueSource,
}

impl CreateSecret {
    /// Secret named `name`; set a value with [`Self::value`] or [`Self::from_file`]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            source: ValueSource::default(),
        }
    }

    /// Sets the value
    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.source.value = Some(value.into());
        self
    }

    /// Reads the value from a file at send time
    #[must_use]
    pub fn from_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source.from_file = Some(path.into());
        self
    }

    /// Sets the description
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Secret name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) async fn into_body(self) -> Result<SecretBody, KubiyaError> {
        let value = self.source.resolve().await?;
        Ok(SecretBody {
            name: Some(self.name),
            value,
            description: self.description.filter(|d| !d.is_empty()),
        })
    }
}

/// Request to replace a secret's value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSecret {
    description: Option<String>,
    source: ValueSource,
}

impl UpdateSecret {
    /// Empty update; a value is still required before sending
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the new value
    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.source.value = Some(value.into());
        self
    }

    /// Reads the new value from a file at send time
    #[must_use]
    pub fn from_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source.from_file = Some(path.into());
        self
    }

    /// Sets the description
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub(crate) async fn into_body(self) -> Result<SecretBody, KubiyaError> {
        let value = self.source.resolve().await?;
        Ok(SecretBody {
            name: None,
            value,
            description: self.description.filter(|d| !d.is_empty()),
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SecretBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
