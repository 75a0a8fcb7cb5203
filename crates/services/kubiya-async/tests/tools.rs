use kubiya_async::KubiyaError;
use kubiya_async::test_support::client_for;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_sources(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/sources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"uuid": "s-k8s", "name": "Kubernetes", "description": "cluster tools"},
            {"uuid": "s-aws", "name": "AWS", "description": "cloud tools"},
            {"uuid": "s-bad", "name": "Broken", "description": "always fails"},
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/sources/s-k8s/metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Kubernetes",
            "tools": [
                {"name": "kubectl", "description": "Run kubectl commands"},
                {"name": "pod-logs", "description": "Fetch pod logs"},
            ],
            "inline_tools": [{"name": "restart-deploy", "description": "Restart a deployment"}],
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/sources/s-aws/metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "AWS",
            "tools": [{"name": "s3-ls", "description": "List S3 buckets"}],
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/sources/s-bad/metadata"))
        .respond_with(ResponseTemplate::new(400).set_body_string("broken"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn list_aggregates_and_skips_failing_sources() {
    let server = MockServer::start().await;
    mount_sources(&server).await;

    let client = client_for(&server.uri());
    let tools = client.tools().list(None).await.unwrap();
    let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["kubectl", "pod-logs", "restart-deploy", "s3-ls"]);
}

#[tokio::test]
async fn list_single_source_includes_inline_tools() {
    let server = MockServer::start().await;
    mount_sources(&server).await;

    let client = client_for(&server.uri());
    let tools = client.tools().list(Some("s-k8s")).await.unwrap();
    assert_eq!(tools.len(), 3);
}

#[tokio::test]
async fn search_ranks_substring_hits_first() {
    let server = MockServer::start().await;
    mount_sources(&server).await;

    let client = client_for(&server.uri());
    let matches = client.tools().search("LOGS").await.unwrap();
    assert_eq!(matches[0].tool.name, "pod-logs");
    assert_eq!(matches[0].distance, 0);
    assert_eq!(matches[0].source.uuid, "s-k8s");
    assert!(matches.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[tokio::test]
async fn search_tolerates_typos() {
    let server = MockServer::start().await;
    mount_sources(&server).await;

    let client = client_for(&server.uri());
    let matches = client.tools().search("kubctl").await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].tool.name, "kubectl");
    assert_eq!(matches[0].distance, 1);
}

#[tokio::test]
async fn describe_finds_inline_tools_across_sources() {
    let server = MockServer::start().await;
    mount_sources(&server).await;

    let client = client_for(&server.uri());
    let found = client
        .tools()
        .describe("restart-deploy", None)
        .await
        .unwrap();
    assert_eq!(found.source_name.as_deref(), Some("Kubernetes"));

    let err = client.tools().describe("nope", None).await.unwrap_err();
    assert!(matches!(err, KubiyaError::ToolNotFound(_)));
    assert_eq!(err.to_string(), "Tool 'nope' not found");
}

#[tokio::test]
async fn non_list_sources_response_yields_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/sources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "odd"})))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    assert!(client.tools().list(None).await.unwrap().is_empty());
}
