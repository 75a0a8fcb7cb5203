use backon::ExponentialBuilder;
use reqwest::Method;
use std::time::Duration;

/// Default number of retry attempts after the first request
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Creates the default exponential backoff builder for Kubiya API requests
///
/// Configured with:
/// - Initial interval: 1s
/// - Max interval: 8s
/// - Max times: `max_retries`
/// - Factor: 2.0
/// - Jitter enabled
#[must_use]
pub fn default_backoff_builder(max_retries: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(8))
        .with_max_times(max_retries)
        .with_factor(2.0)
        .with_jitter()
}

/// Determines if an HTTP status code should trigger a retry
///
/// Retries on: 429, 500, 502, 503, 504
#[must_use]
pub const fn is_retryable_status(code: u16) -> bool {
    matches!(code, 429 | 500 | 502 | 503 | 504)
}

/// Determines if requests with this method may be replayed
///
/// Includes POST, for both buffered and streaming calls.
#[must_use]
pub fn is_retryable_method(method: &Method) -> bool {
    [
        Method::HEAD,
        Method::GET,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
        Method::TRACE,
        Method::POST,
    ]
    .contains(method)
}
