use backon::{ExponentialBuilder, Retryable};
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{KubiyaError, from_status, map_deser};
use crate::observability::{ErrorContext, ErrorSink, TracingSink, enrich, report};
use crate::retry;
use crate::sse::{EventStream, event_stream_from_response};

/// Kubiya API client
///
/// The client is generic over a [`Config`] implementation that provides authentication
/// and API configuration. Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct Client<C: Config> {
    http: reqwest::Client,
    config: C,
    backoff: ExponentialBuilder,
    sink: Arc<dyn ErrorSink>,
}

impl<C: Config + fmt::Debug> fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl Client<crate::config::KubiyaConfig> {
    /// Creates a new client with default configuration
    ///
    /// Uses environment variables for authentication:
    /// - `KUBIYA_API_KEY` for API key authentication
    /// - `KUBIYA_BASE_URL` for custom API base URL
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(crate::config::KubiyaConfig::new())
    }
}

impl<C: Config + Default> Default for Client<C> {
    fn default() -> Self {
        Self::with_config(C::default())
    }
}

impl<C: Config> Client<C> {
    /// Creates a new client with the given configuration.
    ///
    /// The retry budget comes from [`Config::max_retries`].
    #[must_use]
    pub fn with_config(config: C) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("falling back to default HTTP client: {e}");
                reqwest::Client::new()
            });
        Self {
            http,
            backoff: retry::default_backoff_builder(config.max_retries()),
            config,
            sink: Arc::new(TracingSink),
        }
    }

    /// Replaces the HTTP client with a custom one
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Replaces the backoff configuration for retry logic
    #[must_use]
    pub fn with_backoff(mut self, backoff: ExponentialBuilder) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replaces the sink that receives transport and stream errors
    #[must_use]
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns a reference to the client's configuration
    #[must_use]
    pub const fn config(&self) -> &C {
        &self.config
    }

    /// Sends a JSON request and returns the decoded JSON response
    ///
    /// An empty response body decodes as `null`.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are missing, the request fails, or the
    /// API returns a non-success status.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, KubiyaError> {
        self.execute(method, path, &[], body).await
    }

    /// `GET path`
    ///
    /// # Errors
    ///
    /// See [`Client::request`].
    pub async fn get<O: DeserializeOwned>(&self, path: &str) -> Result<O, KubiyaError> {
        self.execute(Method::GET, path, &[], None).await
    }

    /// `GET path?query`
    ///
    /// # Errors
    ///
    /// See [`Client::request`].
    pub async fn get_with_query<O: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<O, KubiyaError> {
        self.execute(Method::GET, path, query, None).await
    }

    /// `POST path` with a JSON body
    ///
    /// # Errors
    ///
    /// See [`Client::request`].
    pub async fn post<I, O>(&self, path: &str, body: I) -> Result<O, KubiyaError>
    where
        I: Serialize + Send + Sync,
        O: DeserializeOwned,
    {
        let body = to_body(&body)?;
        self.execute(Method::POST, path, &[], Some(body)).await
    }

    /// `PUT path` with a JSON body
    ///
    /// # Errors
    ///
    /// See [`Client::request`].
    pub async fn put<I, O>(&self, path: &str, body: I) -> Result<O, KubiyaError>
    where
        I: Serialize + Send + Sync,
        O: DeserializeOwned,
    {
        let body = to_body(&body)?;
        self.execute(Method::PUT, path, &[], Some(body)).await
    }

    /// `DELETE path`
    ///
    /// # Errors
    ///
    /// See [`Client::request`].
    pub async fn delete<O: DeserializeOwned>(&self, path: &str) -> Result<O, KubiyaError> {
        self.execute(Method::DELETE, path, &[], None).await
    }

    /// Opens a Server-Sent Events stream
    ///
    /// Transient failures before the stream opens (429, 5xx, connection
    /// errors, timeouts) are retried like buffered calls. A 401 or an
    /// exhausted retry budget is returned as an error; any other response
    /// body is handed to the stream decoder. The configured timeout bounds
    /// the wait for response headers, not the stream's lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are missing, the connection cannot be
    /// established in time, the server rejects the credentials, or a
    /// transient status persists past the retry budget.
    pub async fn request_stream(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<EventStream, KubiyaError> {
        self.config.validate_auth()?;

        let url = self.config.url(path);
        let timeout = self.config.timeout();
        let replayable = retry::is_retryable_method(&method);

        let result = (|| async {
            let mut request = self.build(method.clone(), &url, &[], body.as_ref(), None)?;
            request
                .headers_mut()
                .insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

            let response = tokio::time::timeout(timeout, self.http.execute(request))
                .await
                .map_err(|_| KubiyaError::Timeout { timeout })?
                .map_err(|e| self.transport_error(&e))?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED || retry::is_retryable_status(status.as_u16()) {
                let bytes = tokio::time::timeout(timeout, response.bytes())
                    .await
                    .ok()
                    .and_then(Result::ok)
                    .unwrap_or_default();
                return Err(from_status(status, &bytes));
            }
            Ok(response)
        })
        .retry(self.backoff)
        .when(|e: &KubiyaError| replayable && e.is_retryable())
        .notify(|e: &KubiyaError, delay: Duration| {
            tracing::debug!(url = %url, ?delay, "retrying event stream after error: {e}");
        })
        .await;

        let context = ErrorContext::for_request(&method, &url).with_timeout(timeout);
        let response = result.map_err(|e| self.fail(e, context.clone()))?;

        tracing::debug!(url = %url, status = %response.status(), "opened event stream");
        Ok(event_stream_from_response(
            response,
            Arc::clone(&self.sink),
            context,
        ))
    }

    /// Downloads a document from an absolute URL without API credentials
    pub(crate) async fn fetch_text(&self, url: &str) -> Result<String, KubiyaError> {
        let context = ErrorContext::for_request(&Method::GET, url);
        let response = self
            .http
            .get(url)
            .timeout(self.config.timeout())
            .send()
            .await
            .map_err(|e| self.fail(self.transport_error(&e), context.clone()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.fail(self.transport_error(&e), context.clone()))?;
        if status.is_success() {
            Ok(text)
        } else {
            Err(self.fail(from_status(status, text.as_bytes()), context))
        }
    }

    async fn execute<O: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<O, KubiyaError> {
        // Validate auth before any request
        self.config.validate_auth()?;

        let bytes = self.execute_raw(method, path, query, body.as_ref()).await?;
        let bytes = if bytes.iter().all(u8::is_ascii_whitespace) {
            bytes::Bytes::from_static(b"null")
        } else {
            bytes
        };
        serde_json::from_slice(&bytes).map_err(|e| map_deser(&e, &bytes))
    }

    async fn execute_raw(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<bytes::Bytes, KubiyaError> {
        let url = self.config.url(path);
        let timeout = self.config.timeout();
        let replayable = retry::is_retryable_method(&method);

        let result = (|| async {
            let request = self.build(method.clone(), &url, query, body, Some(timeout))?;
            let response = self
                .http
                .execute(request)
                .await
                .map_err(|e| self.transport_error(&e))?;

            let status = response.status();
            let bytes = response
                .bytes()
                .await
                .map_err(|e| self.transport_error(&e))?;

            if status.is_success() {
                return Ok(bytes);
            }

            Err(from_status(status, &bytes))
        })
        .retry(self.backoff)
        .when(|e: &KubiyaError| replayable && e.is_retryable())
        .notify(|e: &KubiyaError, delay: Duration| {
            tracing::debug!(url = %url, ?delay, "retrying after error: {e}");
        })
        .await;

        result.map_err(|e| {
            let context = ErrorContext::for_request(&method, &url).with_timeout(timeout);
            self.fail(e, context)
        })
    }

    fn build(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Request, KubiyaError> {
        let mut builder = self
            .http
            .request(method, url)
            .headers(self.config.headers()?);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder
            .build()
            .map_err(|e| KubiyaError::Config(format!("invalid request: {e}")))
    }

    fn transport_error(&self, e: &reqwest::Error) -> KubiyaError {
        if e.is_timeout() {
            KubiyaError::Timeout {
                timeout: self.config.timeout(),
            }
        } else {
            KubiyaError::Connection(e.to_string())
        }
    }

    /// Reports `err` to the sink and hands it back
    fn fail(&self, err: KubiyaError, context: ErrorContext) -> KubiyaError {
        report(self.sink.as_ref(), &err, &enrich(context, &err));
        err
    }
}

fn to_body<I: Serialize>(body: &I) -> Result<Value, KubiyaError> {
    serde_json::to_value(body).map_err(|e| KubiyaError::Serde(e.to_string()))
}
