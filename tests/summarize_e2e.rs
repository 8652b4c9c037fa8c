mod common;

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use docsum::{
    api::{self, RouterOptions},
    config::{Config, LlmProvider, StoreBackend},
    pipeline::{ObjectReference, PipelineService, PipelineSettings},
    store::{ObjectStore, ObjectStoreClient},
    summarization::ChatCompletionClient,
};
use httpmock::{Method::POST, Mock, MockServer};
use serde_json::{Value, json};
use tower::ServiceExt;

use common::build_pdf;

const BOUNDARY: &str = "docsum-e2e-boundary";
const COMPLETION_PATH: &str = "/openai/deployments/gpt-test/chat/completions";

fn config_for(server: &MockServer) -> Config {
    Config {
        store_backend: StoreBackend::Memory,
        aws_region: None,
        store_endpoint: None,
        upload_bucket: "uploads".into(),
        llm_provider: LlmProvider::Azure,
        llm_endpoint: server.base_url(),
        llm_api_key: "e2e-key".into(),
        llm_engine: "gpt-test".into(),
        llm_api_version: "2025-01-01-preview".into(),
        summary_engine_tag: "gpt-test".into(),
        persist_summaries: true,
        include_error_trace: true,
        log_store_identity: false,
        upstream_max_retries: 0,
        upstream_retry_backoff_ms: 1,
        request_timeout_secs: 10,
        llm_timeout_secs: 5,
        max_upload_bytes: 1024 * 1024,
        server_port: None,
    }
}

struct Harness {
    app: Router,
    store: Arc<ObjectStoreClient>,
}

fn harness(config: &Config) -> Harness {
    let store = Arc::new(ObjectStoreClient::memory());
    let summarizer = ChatCompletionClient::from_config(config).expect("completion client");
    let service = PipelineService::new(
        store.clone(),
        Arc::new(summarizer),
        PipelineSettings::from_config(config),
    );
    Harness {
        app: api::create_router(Arc::new(service), RouterOptions::from_config(config)),
        store,
    }
}

fn upload_request(filename: &str, pdf: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(pdf);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("upload request")
}

fn summarize_request(bucket: &str, key: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/summarize")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "s3_bucket": bucket, "s3_key": key }).to_string(),
        ))
        .expect("summarize request")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("router response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    (status, serde_json::from_slice(&body).expect("json body"))
}

async fn mock_completion<'a>(server: &'a MockServer, content: &str) -> Mock<'a> {
    let content = content.to_string();
    server
        .mock_async(move |when, then| {
            when.method(POST)
                .path(COMPLETION_PATH)
                .query_param("api-version", "2025-01-01-preview")
                .header("api-key", "e2e-key");
            then.status(200).json_body(json!({
                "choices": [{ "message": { "role": "assistant", "content": content } }]
            }));
        })
        .await
}

#[tokio::test]
async fn upload_then_summarize_persists_summary_next_to_source() {
    let server = MockServer::start_async().await;
    let completion = mock_completion(&server, "\n# Quarterly report\n- Revenue grew\n").await;
    let Harness { app, store } = harness(&config_for(&server));

    let pdf = build_pdf(&[Some("Revenue grew in the third quarter"), Some("Costs were flat")]);
    let (status, uploaded) = send(&app, upload_request("report.pdf", &pdf)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(uploaded["s3_bucket"], "uploads");
    assert_eq!(uploaded["s3_key"], "input/report.pdf");

    let (status, summary) = send(&app, summarize_request("uploads", "input/report.pdf")).await;
    assert_eq!(status, StatusCode::OK, "body: {summary}");
    assert_eq!(summary["success"], true);
    assert_eq!(summary["summary"], "# Quarterly report\n- Revenue grew");
    assert_eq!(summary["page_count"], 2);
    assert_eq!(summary["source_file"], "input/report.pdf");
    assert_eq!(summary["bucket"], "uploads");
    assert_eq!(summary["engine_used"], "gpt-test");
    assert_eq!(summary["api_version"], "2025-01-01-preview");
    assert!(summary["characters_analyzed"].as_u64().unwrap() > 0);
    assert_eq!(
        summary["s3_summary_path"],
        "s3://uploads/summaries/gpt-test/report.summary.txt"
    );
    completion.assert_async().await;

    let stored = store
        .fetch(&ObjectReference::new("uploads", "summaries/gpt-test/report.summary.txt").unwrap())
        .await
        .expect("persisted summary");
    assert_eq!(stored.as_ref(), b"# Quarterly report\n- Revenue grew");

    let (_, metrics) = send(
        &app,
        Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(metrics["documents_summarized"], 1);
    assert_eq!(metrics["uploads"], 1);
}

#[tokio::test]
async fn missing_document_returns_not_found_without_calling_model() {
    let server = MockServer::start_async().await;
    let completion = mock_completion(&server, "unused").await;
    let Harness { app, .. } = harness(&config_for(&server));

    let (status, body) = send(&app, summarize_request("uploads", "input/absent.pdf")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["summary"].is_null());
    assert!(body["trace"].is_string());
    completion.assert_hits_async(0).await;
}

#[tokio::test]
async fn corrupt_document_is_unprocessable() {
    let server = MockServer::start_async().await;
    let completion = mock_completion(&server, "unused").await;
    let Harness { app, .. } = harness(&config_for(&server));

    let (status, _) = send(&app, upload_request("broken.pdf", b"not a pdf at all")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, summarize_request("uploads", "input/broken.pdf")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    completion.assert_hits_async(0).await;
}

#[tokio::test]
async fn upstream_failure_maps_to_bad_gateway_and_skips_persistence() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(COMPLETION_PATH);
            then.status(503).body("overloaded");
        })
        .await;
    let Harness { app, store } = harness(&config_for(&server));

    let pdf = build_pdf(&[Some("Some content")]);
    send(&app, upload_request("report.pdf", &pdf)).await;
    let (status, body) = send(&app, summarize_request("uploads", "input/report.pdf")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    let persisted = store
        .fetch(&ObjectReference::new("uploads", "summaries/gpt-test/report.summary.txt").unwrap())
        .await;
    assert!(persisted.is_err());
}

#[tokio::test]
async fn disabled_persistence_reports_null_summary_path() {
    let server = MockServer::start_async().await;
    mock_completion(&server, "Short summary").await;
    let mut config = config_for(&server);
    config.persist_summaries = false;
    let Harness { app, store } = harness(&config);

    let pdf = build_pdf(&[Some("Body text")]);
    send(&app, upload_request("notes.pdf", &pdf)).await;
    let (status, body) = send(&app, summarize_request("uploads", "input/notes.pdf")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["s3_summary_path"].is_null());
    assert!(
        store
            .fetch(&ObjectReference::new("uploads", "summaries/gpt-test/notes.summary.txt").unwrap())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn keys_with_reserved_characters_round_trip_unchanged() {
    let server = MockServer::start_async().await;
    mock_completion(&server, "Board minutes").await;
    let Harness { app, store } = harness(&config_for(&server));

    let pdf = build_pdf(&[Some("Minutes of the board")]);
    let (status, uploaded) = send(&app, upload_request("Q3 #1 [draft] 100%.pdf", &pdf)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(uploaded["s3_key"], "input/Q3 #1 [draft] 100%.pdf");

    let (status, body) = send(
        &app,
        summarize_request("uploads", "input/Q3 #1 [draft] 100%.pdf"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(
        body["s3_summary_path"],
        "s3://uploads/summaries/gpt-test/Q3 #1 [draft] 100%.summary.txt"
    );
    let stored = store
        .fetch(
            &ObjectReference::new("uploads", "summaries/gpt-test/Q3 #1 [draft] 100%.summary.txt")
                .unwrap(),
        )
        .await
        .expect("summary stored under the reported key");
    assert_eq!(stored.as_ref(), b"Board minutes");
}

#[tokio::test]
async fn aliasing_key_is_rejected_as_bad_request() {
    let server = MockServer::start_async().await;
    let completion = mock_completion(&server, "unused").await;
    let Harness { app, .. } = harness(&config_for(&server));

    let pdf = build_pdf(&[Some("Body text")]);
    send(&app, upload_request("report.pdf", &pdf)).await;

    for key in ["/input/report.pdf", "input//report.pdf", "input/report.pdf/"] {
        let (status, body) = send(&app, summarize_request("uploads", key)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{key}: {body}");
        assert_eq!(body["success"], false);
    }
    completion.assert_hits_async(0).await;
}
