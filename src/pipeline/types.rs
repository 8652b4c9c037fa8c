//! Request-scoped values and the error taxonomy of the summarization pipeline.

use crate::extract::ExtractionError;
use crate::store::StoreError;
use crate::summarization::SummarizationClientError;
use axum::http::StatusCode;
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Location of a blob in the object store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectReference {
    /// Bucket (container) holding the object.
    pub container: String,
    /// Slash-separated key of the object inside the container.
    pub key: String,
}

impl ObjectReference {
    /// Build a reference, rejecting empty container or key.
    pub fn new(
        container: impl Into<String>,
        key: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        let container = container.into();
        let key = key.into();
        if container.trim().is_empty() {
            return Err(PipelineError::InvalidRequest(
                "s3_bucket must be a non-empty string".into(),
            ));
        }
        if key.trim().is_empty() {
            return Err(PipelineError::InvalidRequest(
                "s3_key must be a non-empty string".into(),
            ));
        }
        Ok(Self { container, key })
    }

    /// Reference to another key in the same container.
    pub fn sibling(&self, key: impl Into<String>) -> Self {
        Self {
            container: self.container.clone(),
            key: key.into(),
        }
    }

    /// Render as an `s3://container/key` URI.
    pub fn to_uri(&self) -> String {
        format!("s3://{}/{}", self.container, self.key)
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.key)
    }
}

/// Plain text and structural statistics extracted from a PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    /// Space-joined text of every page that yielded any.
    pub text: String,
    /// True page count of the document, including pages without text.
    pub page_count: usize,
    /// Number of characters in `text`.
    pub char_count: usize,
}

/// Output of the completion stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryResult {
    /// Summary text with surrounding whitespace removed.
    pub summary: String,
    /// Engine identifier the summary was generated with.
    pub engine_used: String,
    /// Protocol revision used for the completion call.
    pub api_version: String,
    /// Wall-clock milliseconds from request start to summary receipt.
    pub duration_ms: u64,
}

/// Successful outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineResponse {
    /// Document that was summarized.
    pub source: ObjectReference,
    /// True page count of the document.
    pub page_count: usize,
    /// Characters submitted to the model.
    pub char_count: usize,
    /// Generated summary and its provenance.
    pub summary: SummaryResult,
    /// Where the summary was written, when persistence happened.
    pub output_reference: Option<ObjectReference>,
}

/// Outcome of an upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// Where the uploaded bytes now live.
    pub reference: ObjectReference,
    /// Number of bytes written.
    pub size_bytes: usize,
}

/// Typed failure of a pipeline stage.
///
/// Each variant keeps the message of the failure that produced it so callers see the same text
/// regardless of which status code the variant maps to.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Caller supplied an unusable request.
    #[error("{0}")]
    InvalidRequest(String),
    /// Request body exceeded the configured size limit.
    #[error("{0}")]
    PayloadTooLarge(String),
    /// Referenced object does not exist.
    #[error("{message}")]
    NotFound {
        /// Human-readable description.
        message: String,
        /// Underlying store failure.
        #[source]
        source: Option<StoreError>,
    },
    /// Bytes are not a parseable document, or the document has no extractable text.
    #[error("{message}")]
    Malformed {
        /// Human-readable description.
        message: String,
        /// Underlying extraction failure.
        #[source]
        source: Option<ExtractionError>,
    },
    /// Store or completion endpoint unreachable or rejecting the request.
    #[error("{message}")]
    UpstreamUnavailable {
        /// Human-readable description.
        message: String,
        /// Underlying upstream failure.
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    /// Whole-request deadline elapsed before the pipeline finished.
    #[error("{0}")]
    Timeout(String),
    /// Completion call succeeded but returned no usable content.
    #[error("{0}")]
    UpstreamEmpty(String),
    /// Anything else (task panics, invariant violations).
    #[error("{0}")]
    Internal(String),
}

impl PipelineError {
    /// HTTP status distinguishing caller-caused (4xx) from upstream/server (5xx) failures.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Malformed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::UpstreamUnavailable { .. } | Self::UpstreamEmpty(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::NotFound { .. } => "not_found",
            Self::Malformed { .. } => "malformed",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::UpstreamEmpty(_) => "upstream_empty",
            Self::Timeout(_) => "timeout",
            Self::Internal(_) => "internal",
        }
    }

    /// Render the error and its `source()` chain, one cause per line.
    pub fn trace(&self) -> String {
        let mut rendered = format!("{}: {}", self.kind(), self);
        let mut cause = self.source();
        while let Some(inner) = cause {
            rendered.push_str("\ncaused by: ");
            rendered.push_str(&inner.to_string());
            cause = inner.source();
        }
        rendered
    }
}

impl From<StoreError> for PipelineError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { .. } => Self::NotFound {
                message: error.to_string(),
                source: Some(error),
            },
            StoreError::InvalidKey { .. } => Self::InvalidRequest(error.to_string()),
            other => Self::UpstreamUnavailable {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}

impl From<ExtractionError> for PipelineError {
    fn from(error: ExtractionError) -> Self {
        match error {
            ExtractionError::TaskFailed(message) => Self::Internal(message),
            other => Self::Malformed {
                message: other.to_string(),
                source: Some(other),
            },
        }
    }
}

impl From<SummarizationClientError> for PipelineError {
    fn from(error: SummarizationClientError) -> Self {
        match error {
            SummarizationClientError::EmptyCompletion(message) => Self::UpstreamEmpty(message),
            other => Self::UpstreamUnavailable {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_rejects_blank_fields() {
        assert!(matches!(
            ObjectReference::new(" ", "input/a.pdf"),
            Err(PipelineError::InvalidRequest(_))
        ));
        assert!(matches!(
            ObjectReference::new("docs", ""),
            Err(PipelineError::InvalidRequest(_))
        ));
        let reference = ObjectReference::new("docs", "odd key without extension").unwrap();
        assert_eq!(reference.to_uri(), "s3://docs/odd key without extension");
    }

    #[test]
    fn store_not_found_maps_to_client_status() {
        let error: PipelineError = StoreError::NotFound {
            container: "docs".into(),
            key: "input/missing.pdf".into(),
        }
        .into();
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert!(error.to_string().contains("input/missing.pdf"));
    }

    #[test]
    fn empty_completion_maps_to_upstream_empty() {
        let error: PipelineError =
            SummarizationClientError::EmptyCompletion("no choices".into()).into();
        assert!(matches!(error, PipelineError::UpstreamEmpty(_)));
        assert_eq!(error.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn trace_includes_source_chain() {
        let error: PipelineError = StoreError::Unavailable {
            message: "connection refused".into(),
        }
        .into();
        let trace = error.trace();
        assert!(trace.starts_with("upstream_unavailable: "));
        assert!(trace.contains("caused by: "));
    }

    #[test]
    fn unaddressable_key_is_a_client_error() {
        let error: PipelineError = StoreError::InvalidKey {
            key: "input//report.pdf".into(),
            reason: "empty path segment".into(),
        }
        .into();
        assert!(matches!(error, PipelineError::InvalidRequest(_)));
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert!(error.to_string().contains("input//report.pdf"));
    }

    #[test]
    fn size_and_deadline_failures_have_dedicated_statuses() {
        let too_large = PipelineError::PayloadTooLarge("body over limit".into());
        assert_eq!(too_large.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(too_large.kind(), "payload_too_large");

        let timeout = PipelineError::Timeout("timed out".into());
        assert_eq!(timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert!(timeout.trace().starts_with("timeout: timed out"));
    }
}
