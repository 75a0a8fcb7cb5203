//! Error reporting hook.
//!
//! Every transport or stream error is handed to an [`ErrorSink`] before it is
//! returned to the caller. The default sink writes a `tracing` record.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use crate::error::KubiyaError;

/// Context attached to a reported error
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Request URL
    pub url: Option<String>,
    /// HTTP method
    pub method: Option<String>,
    /// Response status, when one was received
    pub status_code: Option<u16>,
    /// Truncated response body
    pub body: Option<String>,
    /// Request timeout in effect
    pub timeout: Option<Duration>,
}

impl ErrorContext {
    /// Context for a request to `url`
    pub fn for_request(method: &reqwest::Method, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            method: Some(method.to_string()),
            ..Self::default()
        }
    }

    /// Attaches the configured timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Receives errors for out-of-band reporting
///
/// Implementations must return promptly; anything slow belongs on a channel.
pub trait ErrorSink: Send + Sync {
    /// Records one error with its context
    fn capture(&self, error: &KubiyaError, context: &ErrorContext);
}

/// Default sink: one `tracing::error!` record per error
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn capture(&self, error: &KubiyaError, context: &ErrorContext) {
        tracing::error!(
            error = %error,
            url = context.url.as_deref().unwrap_or(""),
            method = context.method.as_deref().unwrap_or(""),
            status_code = context.status_code,
            body = context.body.as_deref().unwrap_or(""),
            "kubiya request failed"
        );
    }
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ErrorSink for NoopSink {
    fn capture(&self, _error: &KubiyaError, _context: &ErrorContext) {}
}

/// Hands `error` to `sink`, containing any panic raised by the sink
pub(crate) fn report(sink: &dyn ErrorSink, error: &KubiyaError, context: &ErrorContext) {
    let outcome = catch_unwind(AssertUnwindSafe(|| sink.capture(error, context)));
    if outcome.is_err() {
        tracing::warn!("error sink panicked while capturing: {error}");
    }
}

/// Augments `context` with the status and body carried by `error`
pub(crate) fn enrich(mut context: ErrorContext, error: &KubiyaError) -> ErrorContext {
    if let KubiyaError::Api {
        status_code, body, ..
    } = error
    {
        context.status_code = *status_code;
        context.body.clone_from(body);
    } else if let Some(code) = error.status_code() {
        context.status_code = Some(code);
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<(String, ErrorContext)>>);

    impl ErrorSink for Recording {
        fn capture(&self, error: &KubiyaError, context: &ErrorContext) {
            self.0
                .lock()
                .unwrap()
                .push((error.to_string(), context.clone()));
        }
    }

    struct Panicking;

    impl ErrorSink for Panicking {
        fn capture(&self, _error: &KubiyaError, _context: &ErrorContext) {
            panic!("sink exploded");
        }
    }

    #[test]
    fn report_forwards_to_sink() {
        let sink = Recording::default();
        let ctx = ErrorContext::for_request(&reqwest::Method::GET, "https://x/api");
        report(&sink, &KubiyaError::Connection("refused".into()), &ctx);

        let seen = sink.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].0.contains("refused"));
        assert_eq!(seen[0].1.url.as_deref(), Some("https://x/api"));
        assert_eq!(seen[0].1.method.as_deref(), Some("GET"));
    }

    #[test]
    fn panicking_sink_is_contained() {
        let ctx = ErrorContext::default();
        report(&Panicking, &KubiyaError::Config("x".into()), &ctx);
    }

    #[test]
    fn enrich_copies_status_and_body() {
        let err = KubiyaError::Api {
            status_code: Some(503),
            message: "unavailable".into(),
            body: Some("try later".into()),
        };
        let ctx = enrich(ErrorContext::default(), &err);
        assert_eq!(ctx.status_code, Some(503));
        assert_eq!(ctx.body.as_deref(), Some("try later"));

        let ctx = enrich(
            ErrorContext::default(),
            &KubiyaError::Authentication("no".into()),
        );
        assert_eq!(ctx.status_code, Some(401));
    }
}
