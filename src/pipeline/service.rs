//! Pipeline orchestrator: fetch → extract → summarize → persist → respond.

use crate::{
    config::Config,
    extract::extract_text_blocking,
    metrics::{MetricsSnapshot, PipelineMetrics},
    pipeline::{
        keys::{KeyMapping, derive_output_key, upload_key},
        observer::{IdentityLogger, PipelineObserver},
        prompts::SUMMARY_SYSTEM_PROMPT,
        types::{ObjectReference, PipelineError, PipelineResponse, SummaryResult, UploadOutcome},
    },
    retry::RetryPolicy,
    store::{ObjectStore, ObjectStoreClient},
    summarization::{ChatCompletionClient, CompletionRequest, SummarizationClientError, Summarizer},
};
use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

/// Content type of persisted summaries.
pub const SUMMARY_CONTENT_TYPE: &str = "text/plain";
const DEFAULT_UPLOAD_CONTENT_TYPE: &str = "application/pdf";

/// Knobs that shape a pipeline run, resolved once from configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Container that receives uploads.
    pub upload_bucket: String,
    /// Segment used in `summaries/<tag>/` output keys.
    pub engine_tag: String,
    /// Whether summaries are written back to the store.
    pub persist_summaries: bool,
    /// Deadline for one summarize request.
    pub request_timeout: Duration,
    /// Retry policy for store and completion calls.
    pub retry: RetryPolicy,
}

impl PipelineSettings {
    /// Resolve settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            upload_bucket: config.upload_bucket.clone(),
            engine_tag: config.summary_engine_tag.clone(),
            persist_summaries: config.persist_summaries,
            request_timeout: config.request_timeout(),
            retry: RetryPolicy::from_config(config),
        }
    }
}

/// Abstraction over the pipeline used by the HTTP surface.
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Summarize the referenced document and optionally persist the summary.
    async fn summarize(
        &self,
        reference: ObjectReference,
    ) -> Result<PipelineResponse, PipelineError>;

    /// Store an uploaded file under `input/<basename>` in the upload container.
    async fn upload(
        &self,
        filename: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<UploadOutcome, PipelineError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Coordinates one document through the summarization pipeline.
///
/// The store and completion clients are built once and shared across requests; nothing
/// request-specific is retained between calls, so concurrent requests never observe each
/// other's text or summaries.
pub struct PipelineService {
    store: Arc<dyn ObjectStore>,
    summarizer: Arc<dyn Summarizer>,
    observer: Option<Arc<dyn PipelineObserver>>,
    settings: PipelineSettings,
    metrics: Arc<PipelineMetrics>,
}

impl PipelineService {
    /// Assemble a service from explicit collaborators.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        summarizer: Arc<dyn Summarizer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            summarizer,
            observer: None,
            settings,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Attach an observer invoked before each summarize request.
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Build the production service: object store client, completion client, and the identity
    /// hook when enabled.
    pub fn from_config(config: &Config) -> Result<Self, SummarizationClientError> {
        tracing::info!("Initializing completion client");
        let summarizer = ChatCompletionClient::from_config(config)?;
        let store = ObjectStoreClient::from_config(config);
        let service = Self::new(
            Arc::new(store),
            Arc::new(summarizer),
            PipelineSettings::from_config(config),
        );
        if config.log_store_identity {
            tracing::info!("Identity logging enabled for summarize requests");
            return Ok(service.with_observer(Arc::new(IdentityLogger::from_config(config))));
        }
        Ok(service)
    }

    async fn run(
        &self,
        reference: &ObjectReference,
        started: Instant,
    ) -> Result<PipelineResponse, PipelineError> {
        if let Some(observer) = &self.observer {
            observer.before_summarize(reference);
        }

        let retry = self.settings.retry;
        let bytes = retry
            .run("store.fetch", || self.store.fetch(reference))
            .await?;
        tracing::debug!(
            size_bytes = bytes.len(),
            sha256 = %hex::encode(Sha256::digest(&bytes)),
            "Fetched document"
        );

        let extracted = extract_text_blocking(bytes).await?;
        let page_count = extracted.page_count;
        let char_count = extracted.char_count;
        if extracted.text.trim().is_empty() {
            return Err(PipelineError::Malformed {
                message: format!(
                    "Document has {page_count} page(s) but no extractable text"
                ),
                source: None,
            });
        }

        let request = CompletionRequest {
            system_prompt: SUMMARY_SYSTEM_PROMPT.to_string(),
            user_text: extracted.text,
        };
        tracing::debug!(page_count, char_count, "Requesting completion");
        let raw = retry
            .run("llm.complete", || self.summarizer.complete(request.clone()))
            .await?;
        let duration_ms = started.elapsed().as_millis() as u64;

        let summary = raw.trim().to_string();
        if summary.is_empty() {
            return Err(PipelineError::UpstreamEmpty(
                "Completion contained only whitespace".into(),
            ));
        }

        let output_reference = self.persist(reference, &summary).await?;

        Ok(PipelineResponse {
            source: reference.clone(),
            page_count,
            char_count,
            summary: SummaryResult {
                summary,
                engine_used: self.summarizer.engine_id().to_string(),
                api_version: self.summarizer.api_version().to_string(),
                duration_ms,
            },
            output_reference,
        })
    }

    async fn persist(
        &self,
        reference: &ObjectReference,
        summary: &str,
    ) -> Result<Option<ObjectReference>, PipelineError> {
        if !self.settings.persist_summaries {
            return Ok(None);
        }

        let key = match derive_output_key(&reference.key, &self.settings.engine_tag) {
            KeyMapping::Mapped(key) => key,
            KeyMapping::PassThrough(key) => {
                // Writing to the unmodified key would replace the source document.
                tracing::warn!(key = %key, "Skipping summary persistence for unmapped key");
                return Ok(None);
            }
        };

        let target = reference.sibling(key);
        let body = Bytes::from(summary.to_owned());
        self.settings
            .retry
            .run("store.put", || {
                self.store.put(&target, body.clone(), SUMMARY_CONTENT_TYPE)
            })
            .await?;
        tracing::info!(output = %target, "Summary persisted");
        Ok(Some(target))
    }
}

#[async_trait]
impl PipelineApi for PipelineService {
    async fn summarize(
        &self,
        reference: ObjectReference,
    ) -> Result<PipelineResponse, PipelineError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "summarize",
            %request_id,
            container = %reference.container,
            key = %reference.key
        );
        let started = Instant::now();
        let timeout = self.settings.request_timeout;

        let outcome = async {
            tracing::info!("Summarize request received");
            match tokio::time::timeout(timeout, self.run(&reference, started)).await {
                Ok(result) => result,
                Err(_) => Err(PipelineError::Timeout(format!(
                    "Summarize request timed out after {} ms",
                    timeout.as_millis()
                ))),
            }
        }
        .instrument(span.clone())
        .await;

        span.in_scope(|| match &outcome {
            Ok(response) => {
                self.metrics
                    .record_summary(response.page_count as u64, response.char_count as u64);
                tracing::info!(
                    page_count = response.page_count,
                    characters = response.char_count,
                    duration_ms = response.summary.duration_ms,
                    persisted = response.output_reference.is_some(),
                    "Summarize request completed"
                );
            }
            Err(error) => {
                self.metrics.record_failure();
                tracing::error!(kind = error.kind(), error = %error, "Summarize request failed");
            }
        });
        outcome
    }

    async fn upload(
        &self,
        filename: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<UploadOutcome, PipelineError> {
        let key = upload_key(filename).ok_or_else(|| {
            PipelineError::InvalidRequest(format!(
                "Uploaded file name '{filename}' is not usable as an object key"
            ))
        })?;
        let target = ObjectReference::new(self.settings.upload_bucket.clone(), key)?;
        let content_type = content_type.unwrap_or(DEFAULT_UPLOAD_CONTENT_TYPE);
        let size_bytes = body.len();

        self.settings
            .retry
            .run("store.put", || self.store.put(&target, body.clone(), content_type))
            .await?;
        self.metrics.record_upload();
        tracing::info!(object = %target, size_bytes, "Upload stored");

        Ok(UploadOutcome {
            reference: target,
            size_bytes,
        })
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
