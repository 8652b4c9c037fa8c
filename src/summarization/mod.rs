//! Chat-completion client used to summarize extracted document text.
//!
//! The client speaks the OpenAI chat-completions wire format in two flavours: Azure OpenAI
//! deployments (deployment in the path, `api-key` header, `api-version` query) and plain
//! OpenAI-compatible endpoints (model in the body, bearer token). Engine, endpoint, credential
//! and protocol version come from configuration; callers only supply the prompt pair.

use crate::config::{Config, LlmProvider};
use crate::retry::Transient;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum SummarizationClientError {
    /// Endpoint unreachable, throttling, or failing server-side.
    #[error("Completion endpoint unavailable: {0}")]
    Unavailable(String),
    /// Endpoint rejected the request (credentials, quota, malformed payload).
    #[error("Completion request rejected: {0}")]
    Rejected(String),
    /// Response body could not be decoded.
    #[error("Malformed completion response: {0}")]
    InvalidResponse(String),
    /// Response decoded but carried no usable content.
    #[error("Completion returned no content: {0}")]
    EmptyCompletion(String),
}

impl Transient for SummarizationClientError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Prompt pair submitted for one completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Fixed instruction describing the assistant's role.
    pub system_prompt: String,
    /// Document body, sent untruncated.
    pub user_text: String,
}

/// Interface implemented by completion providers.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Request a completion and return the first choice's message content.
    async fn complete(&self, request: CompletionRequest)
    -> Result<String, SummarizationClientError>;

    /// Engine identifier requests are sent to.
    fn engine_id(&self) -> &str;

    /// Protocol revision requests are sent with.
    fn api_version(&self) -> &str;
}

/// HTTP chat-completion client for Azure OpenAI and OpenAI-compatible endpoints.
pub struct ChatCompletionClient {
    http: Client,
    provider: LlmProvider,
    base_url: String,
    api_key: String,
    engine: String,
    api_version: String,
}

impl ChatCompletionClient {
    /// Build a client from configuration.
    pub fn from_config(config: &Config) -> Result<Self, SummarizationClientError> {
        let http = Client::builder()
            .user_agent(concat!("docsum/", env!("CARGO_PKG_VERSION")))
            .timeout(config.llm_timeout())
            .build()
            .map_err(|error| {
                SummarizationClientError::Unavailable(format!(
                    "failed to construct HTTP client: {error}"
                ))
            })?;
        tracing::debug!(
            provider = ?config.llm_provider,
            endpoint = %config.llm_endpoint,
            engine = %config.llm_engine,
            api_version = %config.llm_api_version,
            "Initialized completion client"
        );
        Ok(Self {
            http,
            provider: config.llm_provider,
            base_url: config.llm_endpoint.clone(),
            api_key: config.llm_api_key.clone(),
            engine: config.llm_engine.clone(),
            api_version: config.llm_api_version.clone(),
        })
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match self.provider {
            LlmProvider::Azure => format!(
                "{base}/openai/deployments/{}/chat/completions",
                self.engine
            ),
            LlmProvider::OpenAI => format!("{base}/chat/completions"),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl Summarizer for ChatCompletionClient {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<String, SummarizationClientError> {
        let payload = ChatPayload {
            model: matches!(self.provider, LlmProvider::OpenAI).then_some(self.engine.as_str()),
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_text,
                },
            ],
        };

        let mut builder = self.http.post(self.endpoint()).json(&payload);
        builder = match self.provider {
            LlmProvider::Azure => builder
                .query(&[("api-version", self.api_version.as_str())])
                .header("api-key", &self.api_key),
            LlmProvider::OpenAI => builder.bearer_auth(&self.api_key),
        };

        let response = builder.send().await.map_err(|error| {
            SummarizationClientError::Unavailable(format!(
                "failed to reach completion endpoint {}: {error}",
                self.base_url
            ))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("endpoint returned {status}: {body}");
            return Err(
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    SummarizationClientError::Unavailable(message)
                } else {
                    SummarizationClientError::Rejected(message)
                },
            );
        }

        let body: ChatResponse = response.json().await.map_err(|error| {
            SummarizationClientError::InvalidResponse(format!(
                "failed to decode completion response: {error}"
            ))
        })?;

        let choice = body.choices.into_iter().next().ok_or_else(|| {
            SummarizationClientError::EmptyCompletion("response contained no choices".into())
        })?;
        let content = choice
            .message
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                SummarizationClientError::EmptyCompletion(
                    "first choice carried no message content".into(),
                )
            })?;
        tracing::debug!(engine = %self.engine, chars = content.len(), "Completion received");
        Ok(content)
    }

    fn engine_id(&self) -> &str {
        &self.engine
    }

    fn api_version(&self) -> &str {
        &self.api_version
    }
}
