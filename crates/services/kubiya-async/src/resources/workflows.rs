use futures::StreamExt;
use serde_json::{Map, Value};

use crate::{
    client::Client,
    config::Config,
    error::KubiyaError,
    router::Endpoint,
    sse::EventStream,
    types::workflow::{ListWorkflows, WorkflowDefinition, WorkflowRun},
};

/// API resource for workflow execution and lookup
pub struct Workflows<'c, C: Config> {
    client: &'c Client<C>,
}

impl<'c, C: Config> Workflows<'c, C> {
    /// Creates a new Workflows resource
    #[must_use]
    pub const fn new(client: &'c Client<C>) -> Self {
        Self { client }
    }

    /// Starts a workflow and returns its live event stream
    ///
    /// The definition's fields are sent at the top level of the body, with
    /// `parameters` added when given. The configured runner is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition is invalid or the stream cannot be
    /// opened. Failures while reading the stream are yielded by the stream.
    pub async fn execute_stream(
        &self,
        definition: impl Into<WorkflowDefinition>,
        parameters: Option<Map<String, Value>>,
    ) -> Result<EventStream, KubiyaError> {
        let body = definition.into().into_body(parameters)?;
        let endpoint = Endpoint::WorkflowExecute;
        let path = endpoint.path(&[("runner", self.client.config().runner())])?;

        tracing::info!(runner = self.client.config().runner(), "executing workflow");
        tracing::debug!(body = %body, "workflow request body");

        self.client
            .request_stream(endpoint.method(), &path, Some(body))
            .await
    }

    /// Runs a workflow to completion and collects every event
    ///
    /// # Errors
    ///
    /// Returns the first error from opening or reading the stream.
    pub async fn execute(
        &self,
        definition: impl Into<WorkflowDefinition>,
        parameters: Option<Map<String, Value>>,
    ) -> Result<WorkflowRun, KubiyaError> {
        let mut stream = self.execute_stream(definition, parameters).await?;
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event?);
        }
        Ok(WorkflowRun {
            events,
            ended: stream.ended(),
        })
    }

    /// Current status of a workflow
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::WorkflowNotFound`] on 404.
    pub async fn status(&self, workflow_id: &str) -> Result<Value, KubiyaError> {
        let path = Endpoint::WorkflowStatus.path(&[("workflow_id", workflow_id)])?;
        self.client
            .get(&path)
            .await
            .map_err(|e| not_found(e, workflow_id))
    }

    /// Cancels a running workflow
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::WorkflowNotFound`] on 404.
    pub async fn cancel(&self, workflow_id: &str) -> Result<Value, KubiyaError> {
        let path = Endpoint::WorkflowCancel.path(&[("workflow_id", workflow_id)])?;
        self.client
            .request(Endpoint::WorkflowCancel.method(), &path, None)
            .await
            .map_err(|e| not_found(e, workflow_id))
    }

    /// Lists workflows
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list(&self, query: &ListWorkflows) -> Result<Value, KubiyaError> {
        let path = Endpoint::WorkflowList.path(&[])?;
        self.client.get_with_query(&path, &query.query()).await
    }
}

fn not_found(err: KubiyaError, workflow_id: &str) -> KubiyaError {
    if err.status_code() == Some(404) {
        KubiyaError::WorkflowNotFound(workflow_id.to_string())
    } else {
        err
    }
}

// Add accessor to client
impl<C: Config> crate::Client<C> {
    /// Returns the Workflows API resource
    #[must_use]
    pub const fn workflows(&self) -> Workflows<'_, C> {
        Workflows::new(self)
    }
}
