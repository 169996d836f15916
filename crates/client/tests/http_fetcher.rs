//! HTTP status fetcher against a mock server.

use execwatch_client::{ClientConfig, FetchError, HttpStatusFetcher, RequestContext, StatusFetcher};
use execwatch_status::ExecutionStatus;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{bearer_token, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn fetcher() -> HttpStatusFetcher {
    HttpStatusFetcher::new(&ClientConfig::default()).unwrap()
}

fn ctx(server: &MockServer) -> RequestContext {
    RequestContext::parse(&format!("{}/api/", server.uri()), "org-7")
        .unwrap()
        .with_token("tok-123")
}

// ---------------------------------------------------------------------------
// Single execution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetches_wrapped_record_with_tenant_and_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/executions/ex-1"))
        .and(header("X-Organization-Id", "org-7"))
        .and(bearer_token("tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": "ex-1",
                "status": "running",
                "model": "large",
                "sections": []
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record = fetcher().fetch_status(&ctx(&server), "ex-1").await.unwrap();

    assert_eq!(record.id, "ex-1");
    assert_eq!(record.status, ExecutionStatus::Running);
    assert_eq!(record.field("model"), Some(&json!("large")));
}

#[tokio::test]
async fn non_2xx_surfaces_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/executions/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"message": "execution not found"})),
        )
        .mount(&server)
        .await;

    let err = fetcher()
        .fetch_status(&ctx(&server), "missing")
        .await
        .unwrap_err();

    match err {
        FetchError::Http { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message.as_deref(), Some("execution not found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_json_error_body_has_no_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let err = fetcher().fetch_status(&ctx(&server), "ex").await.unwrap_err();
    assert_eq!(err.status_code(), Some(502));
    assert!(matches!(err, FetchError::Http { message: None, .. }));
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let err = fetcher().fetch_status(&ctx(&server), "ex").await.unwrap_err();
    assert!(matches!(err, FetchError::Decode { .. }));
}

#[tokio::test]
async fn empty_identifiers_issue_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = fetcher().fetch_status(&ctx(&server), "").await.unwrap_err();
    assert!(matches!(
        err,
        FetchError::MissingIdentifier {
            field: "execution_id"
        }
    ));

    let no_tenant = ctx(&server).for_tenant("");
    let err = fetcher()
        .fetch_executions(&no_tenant, "doc-1")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FetchError::MissingIdentifier { field: "tenant_id" }
    ));
}

#[tokio::test]
async fn connection_refused_is_a_network_error() {
    let server = MockServer::start().await;
    let ctx = ctx(&server);
    drop(server);

    let err = fetcher().fetch_status(&ctx, "ex").await.unwrap_err();
    assert!(matches!(err, FetchError::Network { .. }), "{err:?}");
    assert!(err.is_retryable());
}

// ---------------------------------------------------------------------------
// Document list
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetches_document_executions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/documents/doc-9/executions"))
        .and(header("X-Organization-Id", "org-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "a", "status": "completed"},
            {"id": "b", "status": "queued"},
            {"id": "c", "status": "reticulating"}
        ])))
        .mount(&server)
        .await;

    let records = fetcher()
        .fetch_executions(&ctx(&server), "doc-9")
        .await
        .unwrap();

    let statuses: Vec<_> = records.iter().map(|r| r.status.clone()).collect();
    assert_eq!(
        statuses,
        vec![
            ExecutionStatus::Completed,
            ExecutionStatus::Queued,
            ExecutionStatus::Unrecognized("reticulating".into()),
        ]
    );
}

#[tokio::test]
async fn custom_tenant_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("X-Tenant", "org-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig {
        tenant_header: "X-Tenant".into(),
        ..ClientConfig::default()
    };
    let records = HttpStatusFetcher::new(&config)
        .unwrap()
        .fetch_executions(&ctx(&server), "doc")
        .await
        .unwrap();
    assert!(records.is_empty());
}
