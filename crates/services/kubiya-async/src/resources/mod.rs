//! API resource implementations for the Kubiya client

/// Projects, templates, plans and executions
pub mod projects;
/// Secrets
pub mod secrets;
/// Tool sources, listing and search
pub mod tools;
/// Users and groups
pub mod users;
/// Webhooks
pub mod webhooks;
/// Workflow execution
pub mod workflows;

pub use projects::Projects;
pub use secrets::Secrets;
pub use tools::Tools;
pub use users::Users;
pub use webhooks::Webhooks;
pub use workflows::Workflows;

use crate::error::KubiyaError;

/// Re-wraps a transport error with service context
///
/// Validation failures and errors that already carry a service context are
/// returned unchanged.
pub(crate) fn rewrap(err: KubiyaError, wrap: impl FnOnce(&KubiyaError) -> KubiyaError) -> KubiyaError {
    match err {
        KubiyaError::Validation { .. }
        | KubiyaError::Secret { .. }
        | KubiyaError::Webhook { .. }
        | KubiyaError::Project { .. }
        | KubiyaError::ToolNotFound(_)
        | KubiyaError::WorkflowNotFound(_) => err,
        other => wrap(&other),
    }
}
