use kubiya_async::test_support::client_for;
use kubiya_async::types::{CreateProject, PlanOutcome, UpdateProject};
use kubiya_async::KubiyaError;
use serde_json::json;
use std::io::Write;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn create_merges_variables_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/projects"))
        .and(body_json(json!({
            "name": "infra",
            "description": "",
            "variables": {"a": "file", "b": "secret", "c": "plain", "d": "file"},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uuid": "p-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"a": "file", "d": "file"}}"#).unwrap();

    let mut request = CreateProject::new("infra")
        .variable("a", "plain")
        .variable("b", "plain")
        .variable("c", "plain")
        .sensitive_variable("a", "secret")
        .sensitive_variable("b", "secret");
    request.variables_file = Some(file.path().to_path_buf());

    let client = client_for(&server.uri());
    let resp = client.projects().create(request).await.unwrap();
    assert_eq!(resp["uuid"], "p-1");
}

#[tokio::test]
async fn create_validates_against_template() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/usecases/tpl-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "eks",
            "variables": [{"name": "region", "required": true}],
            "resources": [{"variables": [{"name": "vpc_id"}]}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/projects"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let err = client
        .projects()
        .create(CreateProject::new("infra").template("tpl-1").variable("region", "eu"))
        .await
        .unwrap_err();
    assert!(matches!(err, KubiyaError::Validation { .. }));
    assert!(err.to_string().contains("Missing required variables: vpc_id"));
}

#[tokio::test]
async fn update_merges_with_current_project() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/projects/p-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uuid": "p-1",
            "name": "infra",
            "description": "old",
            "variables": [{"name": "a", "value": 1}, {"name": "b", "value": 2}, {"value": 3}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/projects/p-1"))
        .and(body_json(json!({
            "name": "infra",
            "description": "new",
            "variables": {"a": 1, "b": 20, "c": 30},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let mut variables = serde_json::Map::new();
    variables.insert("b".into(), json!(20));
    variables.insert("c".into(), json!(30));
    let update = UpdateProject {
        description: Some("new".into()),
        variables,
        ..UpdateProject::default()
    };

    let client = client_for(&server.uri());
    client.projects().update("p-1", update).await.unwrap();
}

#[tokio::test]
async fn plan_auto_approves_when_changes_exist() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/projects/p-1/plan"))
        .and(body_json(json!({"project_id": "p-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "plan_id": "plan-9",
            "changes": [{"add": "bucket"}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/plans/plan-9"))
        .and(body_json(json!({"action": "approve"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "execution_id": "ex-1",
            "status": "running",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    match client.projects().plan("p-1", true).await.unwrap() {
        PlanOutcome::Approved(execution) => {
            assert_eq!(execution.execution_id.as_deref(), Some("ex-1"));
        }
        other => panic!("expected approval, got {other:?}"),
    }
}

#[tokio::test]
async fn plan_without_changes_is_left_alone() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/projects/p-1/plan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "plan_id": "plan-9",
            "changes": [],
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let outcome = client.projects().plan("p-1", true).await.unwrap();
    assert!(matches!(outcome, PlanOutcome::Planned(_)));
}

#[tokio::test]
async fn templates_filter_by_repository() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/usecases"))
        .and(query_param("repository", "org/templates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": "eks"}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let templates = client
        .projects()
        .templates(Some("org/templates"))
        .await
        .unwrap();
    assert_eq!(templates[0].name, "eks");
}

#[tokio::test]
async fn follow_execution_stops_when_finished() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/executions/ex-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "running"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/executions/ex-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "Completed"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/executions/ex-1/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"logs": ["init", "apply"]})))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let execution = client
        .projects()
        .follow_execution("ex-1", Duration::from_millis(5))
        .await
        .unwrap();
    assert!(execution.succeeded());
}
