use kubiya_async::test_support::{client_for, fast_backoff};
use kubiya_async::{Client, ErrorContext, ErrorSink, KubiyaConfig, KubiyaError};
use reqwest::Method;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn retry_429_then_success() {
    let server = MockServer::start().await;

    // First request is rate limited, second succeeds
    Mock::given(method("GET"))
        .and(path("/api/v1/secrets"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({"message": "slow down"})))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/secrets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": "db"}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let secrets = client.secrets().list().await.unwrap();
    assert_eq!(secrets.len(), 1);
    assert_eq!(secrets[0].name, "db");
}

#[tokio::test]
async fn retry_503_on_post_then_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/secrets"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/secrets"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"name": "db"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let resp = client
        .request(Method::POST, "/api/v1/secrets", Some(json!({"name": "db", "value": "x"})))
        .await
        .unwrap();
    assert_eq!(resp["name"], "db");
}

#[tokio::test]
async fn no_retry_on_400() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/projects"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "bad query"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let err = client
        .request(Method::GET, "/api/v1/projects", None)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(400));
    assert!(err.to_string().contains("bad query"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn retries_give_up_after_budget() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/projects"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server.uri()).with_backoff(fast_backoff(2));
    let err = client
        .request(Method::GET, "/api/v1/projects", None)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(500));
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/sources"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let err = client
        .request(Method::GET, "/api/v1/sources", None)
        .await
        .unwrap_err();
    assert!(matches!(err, KubiyaError::Authentication(_)));
}

#[tokio::test]
async fn missing_key_fails_before_any_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = KubiyaConfig::new()
        .with_api_base(server.uri())
        .with_api_key("   ");
    let client = Client::with_config(config);
    let err = client
        .request(Method::GET, "/api/v1/secrets", None)
        .await
        .unwrap_err();
    assert!(matches!(err, KubiyaError::Config(_)));
}

#[tokio::test]
async fn empty_body_decodes_as_null() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/secrets/db"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let resp = client
        .request(Method::DELETE, "/api/v1/secrets/db", None)
        .await
        .unwrap();
    assert!(resp.is_null());
}

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

fn short_timeout_client(base: &str, sink: &Arc<Recording>) -> Client<KubiyaConfig> {
    let config = KubiyaConfig::new()
        .with_api_base(base)
        .with_api_key("test-api-key")
        .with_timeout(Duration::from_millis(200));
    Client::with_config(config)
        .with_backoff(fast_backoff(1))
        .with_error_sink(Arc::clone(sink) as Arc<dyn ErrorSink>)
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(800)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let sink = Arc::new(Recording::default());
    let client = short_timeout_client(&server.uri(), &sink);
    let err = client.request(Method::GET, "/slow", None).await.unwrap_err();
    assert!(
        matches!(err, KubiyaError::Timeout { timeout } if timeout == Duration::from_millis(200))
    );
    assert_eq!(err.to_string(), "Request timed out after 200ms");

    let captured = sink.0.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].0, err.to_string());
    assert_eq!(captured[0].1.timeout, Some(Duration::from_millis(200)));
}

#[tokio::test]
async fn slow_stream_headers_time_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/workflow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("data: [DONE]\n\n", "text/event-stream")
                .set_delay(Duration::from_millis(800)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let sink = Arc::new(Recording::default());
    let client = short_timeout_client(&server.uri(), &sink);
    let err = client
        .request_stream(Method::POST, "/api/v1/workflow", Some(json!({"name": "w"})))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, KubiyaError::Timeout { .. }));

    let captured = sink.0.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert!(captured[0].0.contains("timed out"));
    assert_eq!(captured[0].1.method.as_deref(), Some("POST"));
}

#[tokio::test]
async fn closed_port_is_connection_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let sink = Arc::new(Recording::default());
    let client = short_timeout_client(&base, &sink);

    let err = client.request(Method::GET, "/x", None).await.unwrap_err();
    assert!(matches!(err, KubiyaError::Connection(_)), "{err:?}");
    assert!(err.is_retryable());

    let err = client
        .request_stream(Method::POST, "/x", None)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, KubiyaError::Connection(_)), "{err:?}");

    assert_eq!(sink.0.lock().unwrap().len(), 2);
}
