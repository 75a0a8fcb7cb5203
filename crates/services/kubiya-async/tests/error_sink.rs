use kubiya_async::test_support::client_for;
use kubiya_async::{ErrorContext, ErrorSink, KubiyaError};
use reqwest::Method;
use serde_json::json;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

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
        panic!("sink failure");
    }
}

#[tokio::test]
async fn final_failure_is_reported_once_with_context() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/projects/p-1"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"detail": "bad id"})))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(Recording::default());
    let client = client_for(&server.uri()).with_error_sink(Arc::clone(&sink) as Arc<dyn ErrorSink>);
    let err = client
        .request(Method::GET, "/api/v1/projects/p-1", None)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(422));

    let captured = sink.0.lock().unwrap();
    assert_eq!(captured.len(), 1);
    let (message, context) = &captured[0];
    assert!(message.contains("bad id"));
    assert_eq!(context.status_code, Some(422));
    assert_eq!(context.method.as_deref(), Some("GET"));
    assert!(context.url.as_deref().unwrap().ends_with("/api/v1/projects/p-1"));
    assert!(context.body.as_deref().unwrap().contains("bad id"));
}

#[tokio::test]
async fn panicking_sink_does_not_mask_the_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/secrets"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server.uri()).with_error_sink(Arc::new(Panicking));
    let err = client
        .request(Method::GET, "/api/v1/secrets", None)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(404));
}
