//! HTTP surface for docsum.
//!
//! - `POST /upload` – Store a multipart file under `input/<filename>` in the upload bucket.
//!   Returns `{ success, s3_bucket, s3_key }`.
//! - `POST /summarize` – Summarize `{ s3_bucket, s3_key }` and return the summary with page and
//!   character statistics, engine details, timing, and the persisted summary location.
//! - `GET /metrics` – Pipeline counters since startup.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//! - `GET /healthz` – Liveness probe.
//!
//! Failures keep the `success: false` envelope and carry a status derived from the error kind:
//! 400 for bad requests, 404 for missing objects, 422 for unreadable documents, 502 for
//! upstream failures, 413 for uploads over the size limit, 504 when the request deadline passes,
//! 500 otherwise.

use crate::config::Config;
use crate::pipeline::{ObjectReference, PipelineApi, PipelineError};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

/// Form field conventionally carrying the uploaded document.
const UPLOAD_FIELD: &str = "file";

/// Settings for the HTTP surface.
#[derive(Debug, Clone, Copy)]
pub struct RouterOptions {
    /// Include the rendered error chain in failure bodies.
    pub include_error_trace: bool,
    /// Maximum accepted request body size for uploads.
    pub max_upload_bytes: usize,
}

impl RouterOptions {
    /// Derive router settings from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            include_error_trace: config.include_error_trace,
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

struct AppState<S> {
    service: Arc<S>,
    options: RouterOptions,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            options: self.options,
        }
    }
}

/// Build the HTTP router exposing the upload and summarize API surface.
pub fn create_router<S>(service: Arc<S>, options: RouterOptions) -> Router
where
    S: PipelineApi + 'static,
{
    Router::new()
        .route(
            "/upload",
            post(upload_document::<S>).layer(DefaultBodyLimit::max(options.max_upload_bytes)),
        )
        .route("/summarize", post(summarize_document::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .route("/healthz", get(healthz))
        .with_state(AppState { service, options })
}

/// Request body for the `POST /summarize` endpoint.
#[derive(Deserialize)]
struct SummarizeRequest {
    /// Bucket holding the document.
    #[serde(default)]
    s3_bucket: String,
    /// Key of the document inside the bucket.
    #[serde(default)]
    s3_key: String,
}

/// Success response for the `POST /summarize` endpoint.
#[derive(Serialize)]
struct SummarizeResponse {
    summary: String,
    source_file: String,
    bucket: String,
    page_count: usize,
    characters_analyzed: usize,
    engine_used: String,
    api_version: String,
    duration_ms: u64,
    /// `s3://bucket/key` of the stored summary, `null` when nothing was written.
    s3_summary_path: Option<String>,
    success: bool,
}

/// Summarize a stored PDF.
async fn summarize_document<S>(
    State(state): State<AppState<S>>,
    payload: Result<Json<SummarizeRequest>, JsonRejection>,
) -> Result<Json<SummarizeResponse>, AppError>
where
    S: PipelineApi,
{
    let errors = ErrorStyle::summarize(state.options);
    let Json(request) = payload.map_err(|rejection| {
        errors.wrap(PipelineError::InvalidRequest(format!(
            "Invalid summarize request: {}",
            rejection.body_text()
        )))
    })?;
    let reference =
        ObjectReference::new(request.s3_bucket, request.s3_key).map_err(|e| errors.wrap(e))?;

    let response = state
        .service
        .summarize(reference)
        .await
        .map_err(|e| errors.wrap(e))?;

    Ok(Json(SummarizeResponse {
        summary: response.summary.summary,
        source_file: response.source.key,
        bucket: response.source.container,
        page_count: response.page_count,
        characters_analyzed: response.char_count,
        engine_used: response.summary.engine_used,
        api_version: response.summary.api_version,
        duration_ms: response.summary.duration_ms,
        s3_summary_path: response.output_reference.map(|output| output.to_uri()),
        success: true,
    }))
}

/// Success response for the `POST /upload` endpoint.
#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    s3_bucket: String,
    s3_key: String,
}

struct UploadedFile {
    filename: String,
    content_type: Option<String>,
    body: bytes::Bytes,
}

/// Store an uploaded document so it can be summarized later.
async fn upload_document<S>(
    State(state): State<AppState<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response
where
    S: PipelineApi,
{
    let errors = ErrorStyle::upload(state.options);
    let file = match read_upload(multipart).await {
        Ok(Some(file)) => file,
        Ok(None) => return missing_file_response(),
        Err(error) => return errors.wrap(error).into_response(),
    };

    match state
        .service
        .upload(&file.filename, file.content_type.as_deref(), file.body)
        .await
    {
        Ok(outcome) => Json(UploadResponse {
            success: true,
            s3_bucket: outcome.reference.container,
            s3_key: outcome.reference.key,
        })
        .into_response(),
        Err(error) => errors.wrap(error).into_response(),
    }
}

/// Pull the first field that carries a file name, preferring the `file` field.
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Option<UploadedFile>, PipelineError> {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Upload body is not multipart");
            return Ok(None);
        }
    };

    let mut fallback = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| multipart_failure("Failed to read multipart body", error))?
    {
        let Some(filename) = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
        else {
            continue;
        };
        let is_file_field = field.name() == Some(UPLOAD_FIELD);
        let content_type = field.content_type().map(str::to_string);
        let body = field
            .bytes()
            .await
            .map_err(|error| multipart_failure("Failed to read uploaded file", error))?;
        let file = UploadedFile {
            filename,
            content_type,
            body,
        };
        if is_file_field {
            return Ok(Some(file));
        }
        fallback.get_or_insert(file);
    }
    Ok(fallback)
}

/// Body-limit overflows surface as 413, every other multipart failure as 400.
fn multipart_failure(context: &str, error: MultipartError) -> PipelineError {
    let message = format!("{context}: {}", error.body_text());
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        PipelineError::PayloadTooLarge(message)
    } else {
        PipelineError::InvalidRequest(message)
    }
}

fn missing_file_response() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "error": "No file provided" })),
    )
        .into_response()
}

/// Return the pipeline counters.
async fn get_metrics<S>(State(state): State<AppState<S>>) -> Json<crate::metrics::MetricsSnapshot>
where
    S: PipelineApi,
{
    Json(state.service.metrics_snapshot())
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload",
                method: "POST",
                path: "/upload",
                description: "Upload a PDF as multipart field `file`; it is stored at input/<filename> in the upload bucket.",
                request_example: None,
            },
            CommandDescriptor {
                name: "summarize",
                method: "POST",
                path: "/summarize",
                description: "Fetch a PDF from object storage, extract its text, and summarize it with the configured model. The summary is written to summaries/<engine>/<name>.summary.txt.",
                request_example: Some(json!({
                    "s3_bucket": "documents",
                    "s3_key": "input/report.pdf"
                })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return pipeline counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

/// Shapes error bodies the way each endpoint reports them.
#[derive(Clone, Copy)]
struct ErrorStyle {
    include_trace: bool,
    null_summary: bool,
}

impl ErrorStyle {
    fn summarize(options: RouterOptions) -> Self {
        Self {
            include_trace: options.include_error_trace,
            null_summary: true,
        }
    }

    fn upload(options: RouterOptions) -> Self {
        Self {
            include_trace: options.include_error_trace,
            null_summary: false,
        }
    }

    fn wrap(self, inner: PipelineError) -> AppError {
        AppError { inner, style: self }
    }
}

struct AppError {
    inner: PipelineError,
    style: ErrorStyle,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let trace = self
            .style
            .include_trace
            .then(|| self.inner.trace())
            .map_or(Value::Null, Value::String);
        let mut body = json!({
            "success": false,
            "error": self.inner.to_string(),
            "trace": trace,
        });
        if self.style.null_summary {
            body["summary"] = Value::Null;
        }
        (self.inner.status_code(), Json(body)).into_response()
    }
}
