//! Endpoint templates and path resolution.
//!
//! Every API operation is an [`Endpoint`] with a method and a path template.
//! Templates use `{name}` placeholders that [`resolve`] fills from a parameter
//! list. Nothing here performs I/O.

use reqwest::Method;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Failure to turn a template into a concrete path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// A placeholder had no supplied value
    #[error("missing value for path parameter '{param}' in '{template}'")]
    MissingParam {
        /// Placeholder name
        param: String,
        /// Template being resolved
        template: String,
    },
    /// A `{` was never closed
    #[error("unclosed placeholder in '{0}'")]
    Unclosed(String),
    /// No operation has this name
    #[error("unknown endpoint '{0}'")]
    UnknownEndpoint(String),
}

macro_rules! endpoints {
    ($($variant:ident => $name:literal, $method:ident, $template:literal;)+) => {
        /// Logical API operations
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Endpoint {
            $(
                #[doc = concat!("`", stringify!($method), " ", $template, "`")]
                $variant,
            )+
        }

        impl Endpoint {
            /// Every endpoint, in declaration order
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Snake-case operation name
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }

            /// Path template, including any fixed query string
            #[must_use]
            pub const fn template(self) -> &'static str {
                match self {
                    $(Self::$variant => $template,)+
                }
            }

            /// HTTP method for the operation
            #[must_use]
            pub const fn method(self) -> Method {
                match self {
                    $(Self::$variant => Method::$method,)+
                }
            }
        }
    };
}

endpoints! {
    WorkflowExecute => "workflow_execute", POST, "/api/v1/workflow?runner={runner}&command=execute_workflow";
    WorkflowList => "workflow_list", GET, "/api/v1/workflows";
    WorkflowStatus => "workflow_status", GET, "/api/v1/workflows/{workflow_id}/status";
    WorkflowCancel => "workflow_cancel", POST, "/api/v1/workflows/{workflow_id}/cancel";

    SecretsList => "secrets_list", GET, "/api/v1/secrets";
    SecretsGet => "secrets_get", GET, "/api/v1/secrets/{secret_name}";
    SecretsGetValue => "secrets_get_value", GET, "/api/v1/secrets/get_value/{secret_name}";
    SecretsCreate => "secrets_create", POST, "/api/v1/secrets";
    SecretsUpdate => "secrets_update", PUT, "/api/v1/secrets/{secret_name}";
    SecretsDelete => "secrets_delete", DELETE, "/api/v1/secrets/{secret_name}";

    ProjectList => "project_list", GET, "/api/v1/projects";
    ProjectGet => "project_get", GET, "/api/v1/projects/{project_id}";
    ProjectCreate => "project_create", POST, "/api/v1/projects";
    ProjectUpdate => "project_update", PUT, "/api/v1/projects/{project_id}";
    ProjectDelete => "project_delete", DELETE, "/api/v1/projects/{project_id}";
    ProjectTemplatesList => "project_templates_list", GET, "/api/v1/usecases";
    ProjectTemplateGet => "project_template_get", GET, "/api/v1/usecases/{template_id}";
    ProjectPlanCreate => "project_plan_create", POST, "/api/v1/projects/{project_id}/plan";
    ProjectPlanApprove => "project_plan_approve", PUT, "/api/v1/plans/{plan_id}";
    ProjectExecutionGet => "project_execution_get", GET, "/api/v1/executions/{execution_id}";
    ProjectExecutionLogs => "project_execution_logs", GET, "/api/v1/executions/{execution_id}/logs";

    WebhookList => "webhook_list", GET, "/api/v1/event";
    WebhookGet => "webhook_get", GET, "/api/v1/event/{webhook_id}";
    WebhookCreate => "webhook_create", POST, "/api/v1/event";
    WebhookUpdate => "webhook_update", PUT, "/api/v1/event/{webhook_id}";
    WebhookDelete => "webhook_delete", DELETE, "/api/v1/event/{webhook_id}";
    WebhookTest => "webhook_test", POST, "/api/v1/event/test";

    SourcesList => "sources_list", GET, "/api/v1/sources";
    SourceMetadata => "source_metadata", GET, "/api/v1/sources/{source_uuid}/metadata";

    UserList => "user_list", GET, "/api/v2/users";
    GroupList => "group_list", GET, "/api/v1/manage/groups";
}

impl Endpoint {
    /// Resolves this endpoint's template with `params`
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::MissingParam`] if a placeholder has no value.
    pub fn path(self, params: &[(&str, &str)]) -> Result<String, RouteError> {
        resolve(self.template(), params)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Endpoint {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.name() == s)
            .ok_or_else(|| RouteError::UnknownEndpoint(s.to_string()))
    }
}

/// Substitutes `{name}` placeholders in `template`
///
/// Values are percent-encoded. Extra parameters are ignored.
///
/// # Errors
///
/// Returns an error if a placeholder has no value or a `{` is never closed.
pub fn resolve(template: &str, params: &[(&str, &str)]) -> Result<String, RouteError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| RouteError::Unclosed(template.to_string()))?;
        let name = &after[..close];
        let value = params
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| *v)
            .ok_or_else(|| RouteError::MissingParam {
                param: name.to_string(),
                template: template.to_string(),
            })?;
        out.push_str(&urlencoding::encode(value));
        rest = &after[close + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Appends query pairs to `path`, choosing `?` or `&`
#[must_use]
pub fn with_query(path: &str, pairs: &[(&str, String)]) -> String {
    if pairs.is_empty() {
        return path.to_string();
    }
    let query = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let sep = if path.contains('?') { '&' } else { '?' };
    format!("{path}{sep}{query}")
}
