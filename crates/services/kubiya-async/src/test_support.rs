//! Test-only utilities for env mutation and fast client construction.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::{Client, KubiyaConfig};

/// RAII guard for temporarily setting an environment variable.
///
/// The variable is restored to its previous state (or removed if it was not
/// set) when the guard is dropped.
pub struct EnvGuard {
    key: &'static str,
    prev: Option<String>,
}

impl EnvGuard {
    /// Set an environment variable temporarily.
    ///
    /// Only call from tests marked `#[serial(env)]`.
    #[must_use]
    pub fn set(key: &'static str, val: &str) -> Self {
        let prev = std::env::var(key).ok();
        // SAFETY: env tests are serialized with `#[serial(env)]`.
        unsafe { std::env::set_var(key, val) };
        Self { key, prev }
    }

    /// Remove an environment variable temporarily.
    ///
    /// Only call from tests marked `#[serial(env)]`.
    #[must_use]
    pub fn remove(key: &'static str) -> Self {
        let prev = std::env::var(key).ok();
        // SAFETY: env tests are serialized with `#[serial(env)]`.
        unsafe { std::env::remove_var(key) };
        Self { key, prev }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.prev {
            // SAFETY: restored under the same serialization as `set`.
            Some(v) => unsafe { std::env::set_var(self.key, v) },
            // SAFETY: restored under the same serialization as `remove`.
            None => unsafe { std::env::remove_var(self.key) },
        }
    }
}

/// Millisecond backoff for retry tests
#[must_use]
pub fn fast_backoff(max_times: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(10))
        .with_max_delay(Duration::from_millis(50))
        .with_max_times(max_times)
}

/// Client pointed at `base` with a fixed key and fast retries
#[must_use]
pub fn client_for(base: &str) -> Client<KubiyaConfig> {
    let config = KubiyaConfig::new()
        .with_api_base(base)
        .with_api_key("test-api-key")
        .with_runner("test-runner")
        .with_timeout(Duration::from_secs(5));
    Client::with_config(config).with_backoff(fast_backoff(3))
}
