use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::router::RouteError;

/// Largest response snippet kept on errors and in observability context
pub const BODY_SNIPPET_LIMIT: usize = 400;

/// Errors that can occur when using the Kubiya API client
#[derive(Debug, Error)]
pub enum KubiyaError {
    /// The server rejected the credentials (HTTP 401)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The server returned a non-success status
    #[error("{}", fmt_api(message, *status_code, body.as_deref()))]
    Api {
        /// HTTP status code, when the failure came from a response
        status_code: Option<u16>,
        /// Human-readable error message
        message: String,
        /// Response body (truncated)
        body: Option<String>,
    },

    /// Network-level failure (DNS, refused connection, reset)
    #[error("Failed to connect to Kubiya API: {0}")]
    Connection(String),

    /// The configured deadline elapsed
    #[error("Request timed out after {timeout:?}")]
    Timeout {
        /// Deadline that was exceeded
        timeout: Duration,
    },

    /// Failure while decoding an active workflow stream
    #[error("{}", fmt_details(message, &[("workflow_id", workflow_id.as_deref())]))]
    WorkflowExecution {
        /// Underlying failure message
        message: String,
        /// Workflow the stream belonged to, if known
        workflow_id: Option<String>,
    },

    /// The requested workflow does not exist
    #[error("Workflow {0} not found")]
    WorkflowNotFound(String),

    /// Configuration error (e.g., missing credentials)
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(String),

    /// Endpoint template could not be resolved
    #[error("Route error: {0}")]
    Route(#[from] RouteError),

    /// Caller input failed validation
    #[error("{}", fmt_details(message, &[("field", field.as_deref())]))]
    Validation {
        /// What was wrong
        message: String,
        /// Offending field, if any
        field: Option<String>,
    },

    /// Local file access error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Secret service failure
    #[error("{}", fmt_details(message, &[("secret_name", secret_name.as_deref())]))]
    Secret {
        /// Failure message
        message: String,
        /// Secret involved, if any
        secret_name: Option<String>,
    },

    /// Webhook service failure
    #[error("{}", fmt_details(message, &[("webhook_id", webhook_id.as_deref())]))]
    Webhook {
        /// Failure message
        message: String,
        /// Webhook involved, if any
        webhook_id: Option<String>,
    },

    /// Project service failure
    #[error("{}", fmt_details(message, &[("project_id", project_id.as_deref())]))]
    Project {
        /// Failure message
        message: String,
        /// Project involved, if any
        project_id: Option<String>,
    },

    /// Tool service failure
    #[error("{0}")]
    Tool(String),

    /// No tool with the given name exists in the searched sources
    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    /// User or group service failure
    #[error("{0}")]
    User(String),
}

fn fmt_api(message: &str, status_code: Option<u16>, body: Option<&str>) -> String {
    let mut parts = vec![message.to_string()];
    if let Some(code) = status_code {
        parts.push(format!("Status: {code}"));
    }
    if let Some(body) = body.filter(|b| !b.is_empty()) {
        parts.push(format!("Response: {body}"));
    }
    parts.join(" | ")
}

fn fmt_details(message: &str, details: &[(&str, Option<&str>)]) -> String {
    let present: Vec<String> = details
        .iter()
        .filter_map(|(k, v)| v.map(|v| format!("{k}={v}")))
        .collect();
    if present.is_empty() {
        message.to_string()
    } else {
        format!("{message} - Details: {}", present.join(", "))
    }
}

impl KubiyaError {
    /// Determines if this error is retryable
    ///
    /// Retryable errors are the transient status codes (429, 500, 502, 503, 504),
    /// connection failures and timeouts.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status_code, .. } => {
                status_code.is_some_and(crate::retry::is_retryable_status)
            }
            Self::Connection(_) | Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Returns the HTTP status code carried by this error, if any
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status_code, .. } => *status_code,
            Self::Authentication(_) => Some(401),
            _ => None,
        }
    }

    /// Creates a validation error for a specific field
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Wraps a workflow stream failure
    pub fn workflow_execution(message: impl std::fmt::Display) -> Self {
        Self::WorkflowExecution {
            message: format!("Error processing stream: {message}"),
            workflow_id: None,
        }
    }

    /// Re-wraps an error as a secret service failure
    pub(crate) fn secret(context: &str, name: Option<&str>, err: &Self) -> Self {
        Self::Secret {
            message: format!("{context}: {err}"),
            secret_name: name.map(str::to_string),
        }
    }

    /// Re-wraps an error as a webhook service failure
    pub(crate) fn webhook(context: &str, id: Option<&str>, err: &Self) -> Self {
        Self::Webhook {
            message: format!("{context}: {err}"),
            webhook_id: id.map(str::to_string),
        }
    }

    /// Re-wraps an error as a project service failure
    pub(crate) fn project(context: &str, id: Option<&str>, err: &Self) -> Self {
        Self::Project {
            message: format!("{context}: {err}"),
            project_id: id.map(str::to_string),
        }
    }
}

/// Returns at most [`BODY_SNIPPET_LIMIT`] bytes of `body` as lossy UTF-8
#[must_use]
pub fn body_snippet(body: &[u8]) -> String {
    String::from_utf8_lossy(&body[..body.len().min(BODY_SNIPPET_LIMIT)]).into_owned()
}

/// Maps a serde deserialization error to a `KubiyaError` with context
#[must_use]
pub fn map_deser(e: &serde_json::Error, body: &[u8]) -> KubiyaError {
    KubiyaError::Serde(format!("{e}: {}", body_snippet(body)))
}

/// Builds the error for a non-success response
///
/// 401 becomes [`KubiyaError::Authentication`]; every other status becomes
/// [`KubiyaError::Api`]. The message prefers a `message`/`error`/`detail` field
/// from a JSON body and falls back to the canonical reason phrase.
#[must_use]
pub fn from_status(status: StatusCode, body: &[u8]) -> KubiyaError {
    if status == StatusCode::UNAUTHORIZED {
        return KubiyaError::Authentication("Invalid API token or unauthorized access".into());
    }

    let snippet = body_snippet(body);
    let detail = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error", "detail"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_string))
        });

    let message = match detail {
        Some(d) => format!("API request failed: {d}"),
        None => format!(
            "API request failed: HTTP {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )
        .trim_end()
        .to_string(),
    };

    KubiyaError::Api {
        status_code: Some(status.as_u16()),
        message,
        body: (!snippet.is_empty()).then_some(snippet),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_to_authentication() {
        let err = from_status(StatusCode::UNAUTHORIZED, b"{}");
        assert!(matches!(err, KubiyaError::Authentication(_)));
        assert_eq!(err.status_code(), Some(401));
        assert!(!err.is_retryable());
    }

    #[test]
    fn api_error_prefers_json_message() {
        let err = from_status(
            StatusCode::BAD_REQUEST,
            br#"{"message":"name is required"}"#,
        );
        match &err {
            KubiyaError::Api {
                status_code,
                message,
                body,
            } => {
                assert_eq!(*status_code, Some(400));
                assert_eq!(message, "API request failed: name is required");
                assert!(body.as_deref().unwrap().contains("name is required"));
            }
            other => panic!("Expected Api error, got {other:?}"),
        }
        assert!(!err.is_retryable());
    }

    #[test]
    fn api_error_plain_text_body_is_truncated() {
        let body = "x".repeat(1000);
        let err = from_status(StatusCode::BAD_GATEWAY, body.as_bytes());
        match &err {
            KubiyaError::Api { body, message, .. } => {
                assert_eq!(body.as_ref().unwrap().len(), BODY_SNIPPET_LIMIT);
                assert_eq!(message, "API request failed: HTTP 502 Bad Gateway");
            }
            other => panic!("Expected Api error, got {other:?}"),
        }
        assert!(err.is_retryable());
    }

    #[test]
    fn display_concatenates_details() {
        let err = KubiyaError::Api {
            status_code: Some(500),
            message: "API request failed".into(),
            body: Some("boom".into()),
        };
        assert_eq!(
            err.to_string(),
            "API request failed | Status: 500 | Response: boom"
        );

        let err = KubiyaError::Secret {
            message: "Failed to get secret".into(),
            secret_name: Some("db-pass".into()),
        };
        assert_eq!(
            err.to_string(),
            "Failed to get secret - Details: secret_name=db-pass"
        );

        let err = KubiyaError::Webhook {
            message: "Failed to list webhooks".into(),
            webhook_id: None,
        };
        assert_eq!(err.to_string(), "Failed to list webhooks");
    }

    #[test]
    fn domain_wrap_keeps_underlying_message() {
        let inner = KubiyaError::Connection("refused".into());
        let err = KubiyaError::secret("Failed to list secrets", None, &inner);
        assert!(err.to_string().contains("Failed to connect to Kubiya API: refused"));
    }

    #[test]
    fn retryable_kinds() {
        assert!(KubiyaError::Connection("x".into()).is_retryable());
        assert!(
            KubiyaError::Timeout {
                timeout: Duration::from_secs(1)
            }
            .is_retryable()
        );
        assert!(!KubiyaError::workflow_execution("bad").is_retryable());
        assert!(!KubiyaError::Config("x".into()).is_retryable());
    }

    #[test]
    fn timeout_message_keeps_sub_second_precision() {
        let err = KubiyaError::Timeout {
            timeout: Duration::from_millis(200),
        };
        assert_eq!(err.to_string(), "Request timed out after 200ms");
    }
}
