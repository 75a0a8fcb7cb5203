//! Request and response types for the Kubiya API

/// Project, template, plan and execution types
pub mod project;
/// Secret types
pub mod secret;
/// Tool source and search types
pub mod tool;
/// User and group types
pub mod user;
/// Webhook types
pub mod webhook;
/// Workflow execution types
pub mod workflow;

pub use project::*;
pub use secret::*;
pub use tool::*;
pub use user::*;
pub use webhook::*;
pub use workflow::*;

use serde::{Deserialize, Deserializer};

/// Accepts a bare list or an object carrying the list under one key
///
/// Any other shape yields an empty list.
pub(crate) fn list_or_field<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
    field: &str,
) -> Result<Vec<T>, serde_json::Error> {
    match value {
        serde_json::Value::Array(_) => serde_json::from_value(value),
        serde_json::Value::Object(mut map) => match map.remove(field) {
            Some(items) => serde_json::from_value(items),
            None => Ok(Vec::new()),
        },
        _ => Ok(Vec::new()),
    }
}

/// Deserializes `null` as the type's default
pub(crate) fn null_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}
