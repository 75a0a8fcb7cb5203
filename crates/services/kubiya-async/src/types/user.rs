use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An organization member
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// User identifier
    #[serde(default)]
    pub uuid: Option<String>,
    /// Email address
    #[serde(default)]
    pub email: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Account state
    #[serde(default, alias = "status")]
    pub user_status: Option<String>,
    /// Group memberships
    #[serde(default, deserialize_with = "super::null_default")]
    pub groups: Vec<Value>,
    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A user group
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Group {
    /// Group identifier
    #[serde(default)]
    pub uuid: Option<String>,
    /// Group name
    #[serde(default, deserialize_with = "super::null_default")]
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Built-in group
    #[serde(default, deserialize_with = "super::null_default")]
    pub system: bool,
    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Paging for user listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserPage {
    /// Page size
    pub limit: u32,
    /// One-based page number
    pub page: u32,
}

impl Default for UserPage {
    fn default() -> Self {
        Self { limit: 100, page: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_alias() {
        let u: User = serde_json::from_value(json!({"email": "a@b.c", "status": "active"})).unwrap();
        assert_eq!(u.user_status.as_deref(), Some("active"));
    }
}
