use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::KubiyaError;
use crate::types::workflow::WorkflowDefinition;

/// Default communication method for new webhooks
pub const DEFAULT_METHOD: &str = "Slack";

/// Runner used by workflow webhooks unless another is given
pub const DEFAULT_WORKFLOW_RUNNER: &str = "kubiya-hosted";

/// Fields assigned by the server and dropped on export and import
pub const SERVER_FIELDS: &[&str] = &["id", "created_at", "updated_at", "webhook_url", "org"];

/// Where webhook notifications are delivered
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Communication {
    /// `Slack`, `Teams` or `HTTP`
    #[serde(default, deserialize_with = "super::null_default")]
    pub method: String,
    /// Channel, team/channel pair or URL
    #[serde(default, deserialize_with = "super::null_default")]
    pub destination: String,
}

impl Default for Communication {
    fn default() -> Self {
        Self {
            method: DEFAULT_METHOD.into(),
            destination: String::new(),
        }
    }
}

impl Communication {
    /// Rewrites a Teams `team:channel` destination into the API's JSON form
    ///
    /// Destinations already in `#{...}` form, and non-Teams methods, are left alone.
    pub fn normalize(&mut self) {
        if !self.method.eq_ignore_ascii_case("teams") || self.destination.starts_with("#{") {
            return;
        }
        if let Some((team, channel)) = self.destination.split_once(':') {
            self.destination = format!(r#"{{"team_name": "{team}", "channel_name": "{channel}"}}"#);
        }
    }
}

/// A webhook as stored by the API
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Webhook {
    /// Webhook identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Name
    #[serde(default, deserialize_with = "super::null_default")]
    pub name: String,
    /// Event source, e.g. `github`
    #[serde(default, deserialize_with = "super::null_default")]
    pub source: String,
    /// Agent handling the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Prompt with `{{.event...}}` variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Event filter expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Serialized workflow for workflow webhooks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
    /// Runner for workflow webhooks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner: Option<String>,
    /// Hide request headers in notifications
    #[serde(default, deserialize_with = "super::null_default")]
    pub hide_webhook_headers: bool,
    /// Notification delivery
    #[serde(default, deserialize_with = "super::null_default")]
    pub communication: Communication,
    /// URL that triggers the webhook
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Webhook {
    /// Copy without server-assigned fields
    #[must_use]
    pub fn portable(&self) -> Self {
        let mut out = self.clone();
        out.id = None;
        out.webhook_url = None;
        for field in SERVER_FIELDS {
            out.extra.remove(*field);
        }
        out
    }
}

/// What a webhook triggers
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WebhookTarget {
    /// An agent prompted with the event
    #[default]
    Agent,
    /// A workflow run with the event
    Workflow,
}

/// Request to create a webhook
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateWebhook {
    /// Name
    pub name: String,
    /// Event source
    pub source: String,
    /// What the webhook triggers
    pub target: WebhookTarget,
    /// Agent; required for agent targets
    pub agent_id: Option<String>,
    /// Serialized workflow; required for workflow targets
    pub workflow: Option<String>,
    /// Runner for workflow targets
    pub runner: Option<String>,
    /// Communication method; defaults to `Slack`
    pub method: Option<String>,
    /// Communication destination
    pub destination: Option<String>,
    /// Event filter
    pub filter: Option<String>,
    /// Prompt; required for agent targets
    pub prompt: Option<String>,
    /// Hide request headers in notifications
    pub hide_webhook_headers: bool,
}

impl CreateWebhook {
    /// Agent webhook
    #[must_use]
    pub fn agent(
        name: impl Into<String>,
        source: impl Into<String>,
        agent_id: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            target: WebhookTarget::Agent,
            agent_id: Some(agent_id.into()),
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    /// Workflow webhook
    #[must_use]
    pub fn workflow(name: impl Into<String>, source: impl Into<String>, workflow: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            target: WebhookTarget::Workflow,
            workflow: Some(workflow.into()),
            ..Self::default()
        }
    }

    /// Sets method and destination
    #[must_use]
    pub fn communication(mut self, method: impl Into<String>, destination: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self.destination = Some(destination.into());
        self
    }

    /// Sets the event filter
    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Checks target requirements and builds the request body
    ///
    /// # Errors
    ///
    /// Returns a validation error when an agent target lacks an agent or
    /// prompt, or a workflow target lacks a workflow.
    pub fn into_webhook(self) -> Result<Webhook, KubiyaError> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        match self.target {
            WebhookTarget::Agent if !present(&self.agent_id) => {
                return Err(KubiyaError::validation(
                    "agent_id is required for agent target",
                    "agent_id",
                ));
            }
            WebhookTarget::Agent if !present(&self.prompt) => {
                return Err(KubiyaError::validation(
                    "prompt is required for agent target",
                    "prompt",
                ));
            }
            WebhookTarget::Workflow if !present(&self.workflow) => {
                return Err(KubiyaError::validation(
                    "workflow definition is required for workflow target",
                    "workflow",
                ));
            }
            _ => {}
        }

        let mut communication = Communication {
            method: self.method.unwrap_or_else(|| DEFAULT_METHOD.into()),
            destination: self.destination.unwrap_or_default(),
        };
        communication.normalize();

        let (workflow, runner) = match self.target {
            WebhookTarget::Agent => (None, None),
            WebhookTarget::Workflow => (self.workflow, self.runner.filter(|r| !r.is_empty())),
        };

        Ok(Webhook {
            name: self.name,
            source: self.source,
            agent_id: self.agent_id.filter(|a| !a.is_empty()),
            prompt: self.prompt.filter(|p| !p.is_empty()),
            filter: Some(self.filter.unwrap_or_default()),
            workflow,
            runner,
            hide_webhook_headers: self.hide_webhook_headers,
            communication,
            ..Webhook::default()
        })
    }
}

/// Changes applied to an existing webhook; unset fields are kept
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateWebhook {
    /// New name
    pub name: Option<String>,
    /// New source
    pub source: Option<String>,
    /// New agent
    pub agent_id: Option<String>,
    /// New communication method
    pub method: Option<String>,
    /// New destination
    pub destination: Option<String>,
    /// New filter
    pub filter: Option<String>,
    /// New prompt
    pub prompt: Option<String>,
    /// New header visibility
    pub hide_headers: Option<bool>,
}

impl UpdateWebhook {
    /// Applies the changes to `webhook`
    pub fn apply(self, webhook: &mut Webhook) {
        if let Some(v) = self.name {
            webhook.name = v;
        }
        if let Some(v) = self.source {
            webhook.source = v;
        }
        if let Some(v) = self.agent_id {
            webhook.agent_id = Some(v);
        }
        if let Some(v) = self.method {
            webhook.communication.method = v;
        }
        if let Some(v) = self.destination {
            webhook.communication.destination = v;
        }
        if let Some(v) = self.filter {
            webhook.filter = Some(v);
        }
        if let Some(v) = self.prompt {
            webhook.prompt = Some(v);
        }
        if let Some(v) = self.hide_headers {
            webhook.hide_webhook_headers = v;
        }
        webhook.communication.normalize();
    }
}

/// Request to fire a test event at a webhook
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebhookTest {
    /// Webhook to look up the URL (and prompt) from
    pub webhook_id: Option<String>,
    /// URL to hit directly
    pub webhook_url: Option<String>,
    /// Payload; dotted keys are expanded into nested objects
    pub test_data: Option<Map<String, Value>>,
    /// Wait for the webhook's HTTP response
    pub wait_for_response: bool,
    /// Derive a payload from the webhook prompt's variables
    pub auto_generate: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct WebhookTestBody {
    pub webhook_url: String,
    pub test_data: Value,
    pub wait_for_response: bool,
}

/// File format for webhook export, import and templates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WebhookFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// YAML
    Yaml,
}

impl WebhookFormat {
    /// Format implied by a file extension; YAML for `.yaml`/`.yml`, JSON otherwise
    #[must_use]
    pub fn from_path(path: &std::path::Path) -> Self {
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase) {
            Some(ext) if ext == "yaml" || ext == "yml" => Self::Yaml,
            _ => Self::Json,
        }
    }

    pub(crate) fn render<T: Serialize>(self, value: &T) -> Result<String, KubiyaError> {
        match self {
            Self::Json => serde_json::to_string_pretty(value).map_err(|e| KubiyaError::Serde(e.to_string())),
            Self::Yaml => serde_yaml::to_string(value).map_err(|e| KubiyaError::Serde(e.to_string())),
        }
    }

    pub(crate) fn parse<T: serde::de::DeserializeOwned>(self, text: &str) -> Result<T, KubiyaError> {
        match self {
            Self::Json => serde_json::from_str(text).map_err(|e| KubiyaError::Serde(e.to_string())),
            Self::Yaml => serde_yaml::from_str(text).map_err(|e| KubiyaError::Serde(e.to_string())),
        }
    }
}

impl fmt::Display for WebhookFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        })
    }
}

impl FromStr for WebhookFormat {
    type Err = KubiyaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(KubiyaError::validation(
                format!("unsupported format '{other}'"),
                "format",
            )),
        }
    }
}

/// Request to create a webhook that runs a workflow
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowWebhook {
    /// Name
    pub name: String,
    /// Event source
    pub source: String,
    /// Workflow as JSON, JSON text, or a `file://`, `http://` or `https://`
    /// location of a JSON or YAML document
    pub definition: WorkflowDefinition,
    /// Runner executing the workflow
    pub runner: String,
    /// Communication method
    pub method: String,
    /// Communication destination
    pub destination: Option<String>,
    /// Event filter
    pub filter: Option<String>,
    /// Hide request headers in notifications
    pub hide_headers: bool,
}

impl WorkflowWebhook {
    /// Workflow webhook on the hosted runner, notifying over Slack
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        definition: impl Into<WorkflowDefinition>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            definition: definition.into(),
            runner: DEFAULT_WORKFLOW_RUNNER.into(),
            method: DEFAULT_METHOD.into(),
            destination: None,
            filter: None,
            hide_headers: false,
        }
    }
}

/// Example webhook definition handed out as a starting point
#[must_use]
pub fn example_webhook() -> Webhook {
    Webhook {
        name: "example-webhook".into(),
        source: "github".into(),
        agent_id: Some("AGENT_ID_HERE".into()),
        hide_webhook_headers: false,
        communication: Communication {
            method: DEFAULT_METHOD.into(),
            destination: "#channel-name".into(),
        },
        filter: Some("pull_request[?state == 'open']".into()),
        prompt: Some(
            "# GitHub Pull Request\n\nPlease analyze the following PR details:\n\n\
             - Title: {{.event.pull_request.title}}\n\
             - Author: {{.event.pull_request.user.login}}\n\
             - Description: {{.event.pull_request.body}}"
                .into(),
        ),
        ..Webhook::default()
    }
}

/// Result of exporting a webhook to a file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportResult {
    /// Always true when returned
    pub success: bool,
    /// File written
    pub file_path: String,
    /// Format written
    pub format: String,
    /// Name of the exported webhook
    pub webhook_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teams_destination_is_rewritten() {
        let mut c = Communication {
            method: "teams".into(),
            destination: "Ops:alerts".into(),
        };
        c.normalize();
        assert_eq!(c.destination, r#"{"team_name": "Ops", "channel_name": "alerts"}"#);

        let mut c = Communication {
            method: "Teams".into(),
            destination: r##"#{"team_name":"a"}"##.into(),
        };
        let before = c.destination.clone();
        c.normalize();
        assert_eq!(c.destination, before);

        let mut c = Communication {
            method: "Slack".into(),
            destination: "#a:b".into(),
        };
        c.normalize();
        assert_eq!(c.destination, "#a:b");
    }

    #[test]
    fn agent_target_requires_agent_and_prompt() {
        let mut req = CreateWebhook::agent("w", "github", "", "p");
        assert!(req.clone().into_webhook().unwrap_err().to_string().contains("agent_id"));
        req.agent_id = Some("a1".into());
        req.prompt = None;
        assert!(req.into_webhook().unwrap_err().to_string().contains("prompt"));
    }

    #[test]
    fn workflow_target_requires_workflow() {
        let req = CreateWebhook {
            target: WebhookTarget::Workflow,
            ..CreateWebhook::default()
        };
        assert!(req.into_webhook().unwrap_err().to_string().contains("workflow"));
    }

    #[test]
    fn update_applies_only_set_fields() {
        let mut w = Webhook {
            name: "old".into(),
            source: "github".into(),
            ..Webhook::default()
        };
        UpdateWebhook {
            name: Some("new".into()),
            method: Some("Teams".into()),
            destination: Some("t:c".into()),
            ..UpdateWebhook::default()
        }
        .apply(&mut w);
        assert_eq!(w.name, "new");
        assert_eq!(w.source, "github");
        assert!(w.communication.destination.contains("\"team_name\": \"t\""));
    }

    #[test]
    fn portable_strips_server_fields() {
        let w: Webhook = serde_json::from_value(serde_json::json!({
            "id": "w1", "name": "n", "webhook_url": "https://h", "org": "acme",
            "created_at": "x", "updated_at": "y", "custom": 1
        }))
        .unwrap();
        let p = serde_json::to_value(w.portable()).unwrap();
        for f in SERVER_FIELDS {
            assert!(p.get(*f).is_none(), "{f} should be stripped");
        }
        assert_eq!(p["custom"], 1);
    }

    #[test]
    fn format_from_path() {
        assert_eq!(WebhookFormat::from_path("a/b.YML".as_ref()), WebhookFormat::Yaml);
        assert_eq!(WebhookFormat::from_path("a/b.json".as_ref()), WebhookFormat::Json);
        assert_eq!("yaml".parse::<WebhookFormat>().unwrap(), WebhookFormat::Yaml);
        assert!("xml".parse::<WebhookFormat>().is_err());
    }
}
