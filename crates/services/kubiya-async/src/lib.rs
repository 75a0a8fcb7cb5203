#![warn(missing_docs)]

//! Async Kubiya platform client with SSE workflow streaming, typed resource
//! services, retries, and wiremock tests.

/// HTTP client implementation
pub mod client;
/// Configuration types for the client
pub mod config;
/// Error types
pub mod error;
/// Dotted-key expansion and sample payloads for webhook tests
pub mod nested;
/// Error reporting hooks
pub mod observability;
/// API resource implementations
pub mod resources;
/// Retry logic utilities
pub mod retry;
/// Endpoint table and path resolution
pub mod router;
/// Fuzzy matching for tool search
pub mod search;
/// Server-Sent Events decoding
pub mod sse;
/// Test support utilities (for use in tests)
#[doc(hidden)]
pub mod test_support;
/// Request and response types
pub mod types;

pub use crate::client::Client;
pub use crate::config::{Config, KubiyaConfig};
pub use crate::error::KubiyaError;
pub use crate::observability::{ErrorContext, ErrorSink, NoopSink, TracingSink};
pub use crate::router::{Endpoint, RouteError};
pub use crate::sse::{
    EventStream, StreamEvent, StreamEventKind, StreamPayload, StreamSession, StreamSignal,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::sse::{EventStream, StreamEvent, StreamEventKind, StreamPayload, StreamSignal};
    pub use crate::types::*;
    pub use crate::{Client, KubiyaConfig, KubiyaError};
}
