use serde_json::{Map, Value};
use std::path::Path;

use super::rewrap;
use crate::{
    client::Client,
    config::Config,
    error::KubiyaError,
    nested::{default_test_payload, dot_to_nested, generate_test_data},
    router::Endpoint,
    types::{
        list_or_field,
        webhook::{
            CreateWebhook, ExportResult, UpdateWebhook, Webhook, WebhookFormat, WebhookTarget,
            WebhookTest, WebhookTestBody, WorkflowWebhook, example_webhook,
        },
        workflow::WorkflowDefinition,
    },
};

const DEFAULT_TEST_MESSAGE: &str = "Test webhook from Kubiya SDK";

/// API resource for event webhooks
pub struct Webhooks<'c, C: Config> {
    client: &'c Client<C>,
}

impl<'c, C: Config> Webhooks<'c, C> {
    /// Creates a new Webhooks resource
    #[must_use]
    pub const fn new(client: &'c Client<C>) -> Self {
        Self { client }
    }

    /// Lists webhooks, keeping at most `limit` when it is non-zero
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Webhook`] if the request fails.
    pub async fn list(&self, limit: Option<usize>) -> Result<Vec<Webhook>, KubiyaError> {
        let wrap = |e: &KubiyaError| KubiyaError::webhook("Failed to list webhooks", None, e);
        let path = Endpoint::WebhookList.path(&[])?;
        let response: Value = self
            .client
            .get(&path)
            .await
            .map_err(|e| rewrap(e, wrap))?;
        let mut webhooks: Vec<Webhook> = list_or_field(response, "webhooks")
            .map_err(|e| wrap(&KubiyaError::Serde(e.to_string())))?;
        if let Some(limit) = limit.filter(|l| *l > 0) {
            webhooks.truncate(limit);
        }
        Ok(webhooks)
    }

    /// Webhook by id
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Webhook`] if the request fails.
    pub async fn get(&self, webhook_id: &str) -> Result<Webhook, KubiyaError> {
        let path = Endpoint::WebhookGet.path(&[("webhook_id", webhook_id)])?;
        self.client.get(&path).await.map_err(|e| {
            rewrap(e, |e| {
                KubiyaError::webhook(&format!("Failed to get webhook {webhook_id}"), Some(webhook_id), e)
            })
        })
    }

    /// Creates a webhook
    ///
    /// # Errors
    ///
    /// Returns a validation error when the target's requirements are not
    /// met, or [`KubiyaError::Webhook`] if the request fails.
    pub async fn create(&self, request: CreateWebhook) -> Result<Value, KubiyaError> {
        let webhook = request.into_webhook()?;
        tracing::debug!(name = %webhook.name, source = %webhook.source, "creating webhook");
        let path = Endpoint::WebhookCreate.path(&[])?;
        self.client.post(&path, webhook).await.map_err(|e| {
            rewrap(e, |e| KubiyaError::webhook("Failed to create webhook", None, e))
        })
    }

    /// Applies `changes` to the current webhook and stores the result
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Webhook`] if either request fails.
    pub async fn update(
        &self,
        webhook_id: &str,
        changes: UpdateWebhook,
    ) -> Result<Value, KubiyaError> {
        let mut webhook = self.get(webhook_id).await?;
        changes.apply(&mut webhook);
        let path = Endpoint::WebhookUpdate.path(&[("webhook_id", webhook_id)])?;
        self.client.put(&path, webhook).await.map_err(|e| {
            rewrap(e, |e| {
                KubiyaError::webhook(
                    &format!("Failed to update webhook {webhook_id}"),
                    Some(webhook_id),
                    e,
                )
            })
        })
    }

    /// Deletes a webhook
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Webhook`] if the request fails.
    pub async fn delete(&self, webhook_id: &str) -> Result<Value, KubiyaError> {
        let path = Endpoint::WebhookDelete.path(&[("webhook_id", webhook_id)])?;
        self.client.delete(&path).await.map_err(|e| {
            rewrap(e, |e| {
                KubiyaError::webhook(
                    &format!("Failed to delete webhook {webhook_id}"),
                    Some(webhook_id),
                    e,
                )
            })
        })
    }

    /// Sends a test event to a webhook
    ///
    /// A webhook id without a URL is looked up to find the URL; with
    /// `auto_generate` and no data, the payload is derived from its prompt.
    /// Without any data a fixed test payload is sent. Dotted keys are
    /// expanded into nested objects.
    ///
    /// # Errors
    ///
    /// Returns a validation error when no URL can be determined, or
    /// [`KubiyaError::Webhook`] if a request fails.
    pub async fn test(&self, request: WebhookTest) -> Result<Value, KubiyaError> {
        let WebhookTest {
            webhook_id,
            mut webhook_url,
            test_data,
            wait_for_response,
            auto_generate,
        } = request;
        let mut test_data = test_data.filter(|d| !d.is_empty());

        if let Some(id) = webhook_id.as_deref().filter(|_| webhook_url.is_none()) {
            let webhook = self.get(id).await?;
            webhook_url = webhook.webhook_url;
            if auto_generate && test_data.is_none() {
                test_data = as_object(generate_test_data(webhook.prompt.as_deref().unwrap_or("")));
            }
        }

        let Some(webhook_url) = webhook_url.filter(|u| !u.is_empty()) else {
            return Err(KubiyaError::validation(
                "Either webhook_id or webhook_url must be provided",
                "webhook_url",
            ));
        };

        let data = test_data
            .or_else(|| as_object(default_test_payload(DEFAULT_TEST_MESSAGE)))
            .unwrap_or_default();
        let body = WebhookTestBody {
            webhook_url,
            test_data: Value::Object(dot_to_nested(&data)),
            wait_for_response,
        };

        let path = Endpoint::WebhookTest.path(&[])?;
        self.client.post(&path, body).await.map_err(|e| {
            rewrap(e, |e| {
                KubiyaError::webhook("Failed to test webhook", webhook_id.as_deref(), e)
            })
        })
    }

    /// Writes a webhook, minus server-assigned fields, to `path`
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Webhook`] if the lookup or the write fails.
    pub async fn export_to_file(
        &self,
        webhook_id: &str,
        path: impl AsRef<Path>,
        format: WebhookFormat,
    ) -> Result<ExportResult, KubiyaError> {
        let path = path.as_ref();
        let wrap = |e: &KubiyaError| {
            KubiyaError::webhook(
                &format!("Failed to export webhook {webhook_id}"),
                Some(webhook_id),
                e,
            )
        };

        let webhook = self.get(webhook_id).await?;
        let text = format.render(&webhook.portable()).map_err(|e| wrap(&e))?;
        tokio::fs::write(path, text)
            .await
            .map_err(|e| wrap(&KubiyaError::Io(e)))?;

        tracing::debug!(webhook = webhook_id, path = %path.display(), %format, "exported webhook");
        Ok(ExportResult {
            success: true,
            file_path: path.display().to_string(),
            format: format.to_string(),
            webhook_name: if webhook.name.is_empty() {
                "unknown".into()
            } else {
                webhook.name
            },
        })
    }

    /// Creates a webhook from a JSON or YAML definition file
    ///
    /// The format follows the file extension. Server-assigned fields in the
    /// file are ignored.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the file is missing or the definition
    /// is incomplete, or [`KubiyaError::Webhook`] if parsing or the request
    /// fails.
    pub async fn import_from_file(&self, path: impl AsRef<Path>) -> Result<Value, KubiyaError> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(KubiyaError::validation(
                format!("File not found: {}", path.display()),
                "file_path",
            ));
        }
        let wrap = |e: &KubiyaError| {
            KubiyaError::webhook(
                &format!("Failed to import webhook from {}", path.display()),
                None,
                e,
            )
        };

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| wrap(&KubiyaError::Io(e)))?;
        let webhook: Webhook = WebhookFormat::from_path(path)
            .parse(&text)
            .map_err(|e| wrap(&e))?;

        self.create(into_create(webhook.portable())).await
    }

    /// Example webhook definition to start from
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Serde`] if rendering fails.
    pub fn template(&self, format: WebhookFormat) -> Result<String, KubiyaError> {
        format.render(&example_webhook())
    }

    /// Creates a webhook that runs a workflow
    ///
    /// The definition is loaded from a file or URL when given as one, and
    /// sent as serialized JSON.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a missing workflow file or invalid
    /// definition, or [`KubiyaError::Webhook`] if loading or the request
    /// fails.
    pub async fn create_workflow_webhook(
        &self,
        request: WorkflowWebhook,
    ) -> Result<Value, KubiyaError> {
        let definition = self.load_definition(request.definition).await?;
        let workflow = serde_json::to_string(&definition)
            .map_err(|e| KubiyaError::Serde(e.to_string()))?;

        let create = CreateWebhook {
            name: request.name,
            source: request.source,
            target: WebhookTarget::Workflow,
            workflow: Some(workflow),
            runner: Some(request.runner),
            method: Some(request.method),
            destination: request.destination,
            filter: request.filter,
            hide_webhook_headers: request.hide_headers,
            ..CreateWebhook::default()
        };
        self.create(create).await
    }

    async fn load_definition(&self, definition: WorkflowDefinition) -> Result<Value, KubiyaError> {
        let text = match definition {
            WorkflowDefinition::Json(value) => return Ok(value),
            WorkflowDefinition::Text(text) => text,
        };

        if let Some(file) = text.strip_prefix("file://") {
            if !tokio::fs::try_exists(file).await.unwrap_or(false) {
                return Err(KubiyaError::validation(
                    format!("Workflow file not found: {file}"),
                    "workflow",
                ));
            }
            let content = tokio::fs::read_to_string(file).await?;
            return parse_document(&content);
        }
        if text.starts_with("http://") || text.starts_with("https://") {
            let content = self.client.fetch_text(&text).await.map_err(|e| {
                rewrap(e, |e| {
                    KubiyaError::webhook("Failed to load workflow definition", None, e)
                })
            })?;
            return parse_document(&content);
        }
        serde_json::from_str(&text).map_err(|e| {
            KubiyaError::validation(format!("Invalid workflow JSON: {e}"), "workflow")
        })
    }
}

fn as_object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Parses YAML, falling back to JSON
fn parse_document(text: &str) -> Result<Value, KubiyaError> {
    serde_yaml::from_str::<Value>(text)
        .or_else(|_| serde_json::from_str(text))
        .map_err(|e| KubiyaError::validation(format!("Invalid workflow definition: {e}"), "workflow"))
}

/// Turns a stored webhook definition back into a create request
fn into_create(webhook: Webhook) -> CreateWebhook {
    let target = if webhook.workflow.is_some() {
        WebhookTarget::Workflow
    } else {
        WebhookTarget::Agent
    };
    CreateWebhook {
        name: webhook.name,
        source: webhook.source,
        target,
        agent_id: webhook.agent_id,
        workflow: webhook.workflow,
        runner: webhook.runner,
        method: Some(webhook.communication.method).filter(|m| !m.is_empty()),
        destination: Some(webhook.communication.destination),
        filter: webhook.filter,
        prompt: webhook.prompt,
        hide_webhook_headers: webhook.hide_webhook_headers,
    }
}

impl<C: Config> crate::Client<C> {
    /// Returns the Webhooks API resource
    #[must_use]
    pub const fn webhooks(&self) -> Webhooks<'_, C> {
        Webhooks::new(self)
    }
}
