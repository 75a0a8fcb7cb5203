use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::error::KubiyaError;

/// Default Kubiya API base URL
pub const KUBIYA_DEFAULT_BASE: &str = "https://api.kubiya.ai";
/// Default runner used for workflow execution
pub const KUBIYA_DEFAULT_RUNNER: &str = "kubiya-hosted";
/// Default request timeout
pub const KUBIYA_DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
/// Authorization scheme used for API keys
pub const AUTH_SCHEME: &str = "UserKey";

/// Helper to read and normalize an env var (trim + filter empty).
fn env_trimmed(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Configuration for the Kubiya client
///
/// Debug output automatically redacts `api_key` via [`SecretString`].
#[derive(Clone, Debug)]
pub struct KubiyaConfig {
    api_base: String,
    api_key: Option<SecretString>,
    runner: String,
    org_name: Option<String>,
    timeout: Duration,
    max_retries: usize,
}

impl Default for KubiyaConfig {
    fn default() -> Self {
        Self {
            api_base: env_trimmed("KUBIYA_BASE_URL").unwrap_or_else(|| KUBIYA_DEFAULT_BASE.into()),
            api_key: env_trimmed("KUBIYA_API_KEY").map(SecretString::from),
            runner: env_trimmed("KUBIYA_RUNNER").unwrap_or_else(|| KUBIYA_DEFAULT_RUNNER.into()),
            org_name: env_trimmed("KUBIYA_ORG"),
            timeout: KUBIYA_DEFAULT_TIMEOUT,
            max_retries: crate::retry::DEFAULT_MAX_RETRIES,
        }
    }
}

impl KubiyaConfig {
    /// Creates a new configuration with default settings
    ///
    /// Attempts to read from environment variables:
    /// - `KUBIYA_API_KEY` for API key authentication
    /// - `KUBIYA_BASE_URL` for custom API base URL (defaults to `https://api.kubiya.ai`)
    /// - `KUBIYA_RUNNER` for the workflow runner (defaults to `kubiya-hosted`)
    /// - `KUBIYA_ORG` for the organization name
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API base URL
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Sets the API key
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Sets the runner used for workflow execution
    #[must_use]
    pub fn with_runner(mut self, runner: impl Into<String>) -> Self {
        self.runner = runner.into();
        self
    }

    /// Sets the organization name
    #[must_use]
    pub fn with_org_name(mut self, org: impl Into<String>) -> Self {
        self.org_name = Some(org.into());
        self
    }

    /// Sets the per-request timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how many times a transient failure is retried
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Returns the configured API base URL
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Returns the configured organization name
    #[must_use]
    pub fn org_name(&self) -> Option<&str> {
        self.org_name.as_deref()
    }
}

/// Configuration trait for the Kubiya client
///
/// Implement this trait to provide custom authentication and API configuration.
pub trait Config: Send + Sync {
    /// Returns HTTP headers to include in requests
    ///
    /// # Errors
    ///
    /// Returns an error if header values contain invalid characters.
    fn headers(&self) -> Result<HeaderMap, KubiyaError>;

    /// Constructs the full URL for an API endpoint
    fn url(&self, path: &str) -> String;

    /// Runner name substituted into workflow endpoints
    fn runner(&self) -> &str;

    /// Deadline applied to each request
    fn timeout(&self) -> Duration;

    /// Number of retries for transient failures
    fn max_retries(&self) -> usize {
        crate::retry::DEFAULT_MAX_RETRIES
    }

    /// Validates that authentication credentials are present.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication is not properly configured.
    fn validate_auth(&self) -> Result<(), KubiyaError>;
}

impl Config for KubiyaConfig {
    fn headers(&self) -> Result<HeaderMap, KubiyaError> {
        let mut h = HeaderMap::new();

        if let Some(secret) = &self.api_key {
            let key = secret.expose_secret().trim();
            if !key.is_empty() {
                h.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("{AUTH_SCHEME} {key}"))
                        .map_err(|_| KubiyaError::Config("Invalid Authorization value".into()))?,
                );
            }
        }

        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        h.insert(ACCEPT, HeaderValue::from_static("application/json"));
        h.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("kubiya-async/", env!("CARGO_PKG_VERSION"))),
        );

        Ok(h)
    }

    fn url(&self, path: &str) -> String {
        let base = self.api_base.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    fn runner(&self) -> &str {
        &self.runner
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn max_retries(&self) -> usize {
        self.max_retries
    }

    fn validate_auth(&self) -> Result<(), KubiyaError> {
        match &self.api_key {
            Some(secret) if !secret.expose_secret().trim().is_empty() => Ok(()),
            _ => Err(KubiyaError::Config(
                "Missing Kubiya credentials: set KUBIYA_API_KEY environment variable".into(),
            )),
        }
    }
}
