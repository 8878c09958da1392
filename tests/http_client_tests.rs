//! HTTP task client tests against a mock server

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use taskrunner::client::AUTH_HEADER;
use taskrunner::{
    Error, HttpClientConfig, HttpTaskClient, PollRequest, Task, TaskClient, TaskRefUpdate,
    TaskResult, TaskResultStatus,
};

fn client(server: &MockServer, token: Option<&str>) -> HttpTaskClient {
    HttpTaskClient::new(HttpClientConfig {
        base_url: format!("{}/api", server.uri()),
        auth_token: token.map(str::to_string),
        request_timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn poll(task_type: &str, domain: Option<&str>) -> PollRequest {
    PollRequest {
        task_type: task_type.to_string(),
        domain: domain.map(str::to_string),
        worker_id: "worker-7".to_string(),
        count: 4,
        timeout: Duration::from_millis(250),
    }
}

// ─────────────────────────────────────────────────────────────────
// Batch Poll
// ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_poll_sends_query_and_decodes_tasks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks/poll/batch/encode"))
        .and(query_param("workerid", "worker-7"))
        .and(query_param("count", "4"))
        .and(query_param("timeout", "250"))
        .and(query_param("domain", "blue"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "taskId": "t-1",
                "taskType": "encode",
                "workflowInstanceId": "wf-1",
                "status": "IN_PROGRESS",
                "inputData": { "file": "a.mp4" }
            },
            {
                "taskId": "t-2",
                "taskType": "encode",
                "workflowInstanceId": "wf-1"
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let tasks = client(&server, None)
        .batch_poll(&poll("encode", Some("blue")))
        .await
        .unwrap();

    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].task_id, "t-1");
    assert_eq!(tasks[0].input("file"), Some(&json!("a.mp4")));
    assert!(tasks[1].input_data.is_empty());
}

#[tokio::test]
async fn test_poll_no_content_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks/poll/batch/encode"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let tasks = client(&server, None)
        .batch_poll(&poll("encode", None))
        .await
        .unwrap();
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn test_poll_without_domain_omits_parameter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks/poll/batch/encode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    client(&server, None)
        .batch_poll(&poll("encode", None))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].url.query_pairs().all(|(key, _)| key != "domain"));
}

#[tokio::test]
async fn test_auth_header_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header(AUTH_HEADER, "secret-token"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client(&server, Some("secret-token"))
        .batch_poll(&poll("encode", None))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_server_error_is_reported_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database down"))
        .mount(&server)
        .await;

    let err = client(&server, None)
        .batch_poll(&poll("encode", None))
        .await
        .unwrap_err();

    match err {
        Error::ServerResponse { status, ref body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "database down");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.is_retryable());
}

// ─────────────────────────────────────────────────────────────────
// Updates
// ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_update_posts_result_json() {
    let server = MockServer::start().await;
    let task = Task::new("t-1", "encode").with_workflow("wf-1");
    let mut result = TaskResult::completed(&task, Default::default()).with_output("size", json!(42));
    result.worker_id = Some("worker-7".to_string());

    Mock::given(method("POST"))
        .and(path("/api/tasks"))
        .and(body_json(json!({
            "taskId": "t-1",
            "workflowInstanceId": "wf-1",
            "status": "COMPLETED",
            "outputData": { "size": 42 },
            "callbackAfterSeconds": 0,
            "workerId": "worker-7"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("t-1"))
        .expect(1)
        .mount(&server)
        .await;

    client(&server, None).update_task(&result).await.unwrap();
}

#[tokio::test]
async fn test_update_rejection_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tasks"))
        .respond_with(ResponseTemplate::new(400).set_body_string("unknown task"))
        .mount(&server)
        .await;

    let task = Task::new("t-1", "encode").with_workflow("wf-1");
    let err = client(&server, None)
        .update_task(&TaskResult::failed(&task, "boom"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ServerResponse { status: 400, .. }));
}

#[tokio::test]
async fn test_update_by_ref_name_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tasks/wf-1/approve/COMPLETED"))
        .and(query_param("workerid", "worker-7"))
        .and(body_json(json!({ "approved": true })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let update = TaskRefUpdate::new("wf-1", "approve", TaskResultStatus::Completed)
        .with_output("approved", json!(true));

    client(&server, None)
        .update_task_by_ref_name(&update, "worker-7")
        .await
        .unwrap();
}
