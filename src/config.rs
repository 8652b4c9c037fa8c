use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_API_VERSION: &str = "2025-01-01-preview";
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 90;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the docsum server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Backend used for object storage.
    pub store_backend: StoreBackend,
    /// Optional region passed to the S3 client.
    pub aws_region: Option<String>,
    /// Optional S3-compatible endpoint override (MinIO, R2, LocalStack).
    pub store_endpoint: Option<String>,
    /// Container that receives files posted to `/upload`.
    pub upload_bucket: String,
    /// Wire flavour of the chat-completion endpoint.
    pub llm_provider: LlmProvider,
    /// Base URL of the chat-completion service.
    pub llm_endpoint: String,
    /// Secret sent with every completion request.
    pub llm_api_key: String,
    /// Engine (deployment or model) identifier.
    pub llm_engine: String,
    /// Protocol revision sent as `api-version`.
    pub llm_api_version: String,
    /// Path segment used under `summaries/` when persisting output.
    pub summary_engine_tag: String,
    /// Whether summaries are written back to the store.
    pub persist_summaries: bool,
    /// Whether error bodies carry the rendered error chain.
    pub include_error_trace: bool,
    /// Whether the identity hook logs store/LLM identity before each summarize.
    pub log_store_identity: bool,
    /// Retries attempted after the first failed upstream call.
    pub upstream_max_retries: u32,
    /// Initial backoff between upstream retries, in milliseconds.
    pub upstream_retry_backoff_ms: u64,
    /// Upper bound on one summarize request, in seconds.
    pub request_timeout_secs: u64,
    /// Upper bound on one HTTP call to the completion endpoint, in seconds.
    pub llm_timeout_secs: u64,
    /// Maximum accepted upload body size in bytes.
    pub max_upload_bytes: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported object storage backends.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Amazon S3 or an S3-compatible service.
    S3,
    /// Process-local in-memory buckets.
    Memory,
}

/// Supported chat-completion wire flavours.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Azure OpenAI deployments (`api-key` header, deployment in the path).
    Azure,
    /// OpenAI-compatible endpoints (bearer token, model in the body).
    OpenAI,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let llm_engine = load_env("OPENAI_ENGINE")?;
        let config = Self {
            store_backend: load_env_optional("STORE_BACKEND")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("STORE_BACKEND".into()))
                })
                .transpose()?
                .unwrap_or(StoreBackend::S3),
            aws_region: load_env_optional("AWS_REGION"),
            store_endpoint: load_env_optional("STORE_ENDPOINT"),
            upload_bucket: load_env("UPLOAD_BUCKET")?,
            llm_provider: load_env_optional("LLM_PROVIDER")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("LLM_PROVIDER".into()))
                })
                .transpose()?
                .unwrap_or(LlmProvider::Azure),
            llm_endpoint: load_env("OPENAI_API_BASE")?,
            llm_api_key: load_env("OPENAI_API_KEY")?,
            llm_api_version: load_env_optional("OPENAI_API_VERSION")
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            summary_engine_tag: load_env_optional("SUMMARY_ENGINE_TAG")
                .unwrap_or_else(|| llm_engine.clone()),
            llm_engine,
            persist_summaries: load_bool("PERSIST_SUMMARIES", true)?,
            include_error_trace: load_bool("INCLUDE_ERROR_TRACE", true)?,
            log_store_identity: load_bool("LOG_STORE_IDENTITY", false)?,
            upstream_max_retries: load_parsed("UPSTREAM_MAX_RETRIES")?
                .unwrap_or(DEFAULT_MAX_RETRIES),
            upstream_retry_backoff_ms: load_parsed("UPSTREAM_RETRY_BACKOFF_MS")?
                .unwrap_or(DEFAULT_RETRY_BACKOFF_MS),
            request_timeout_secs: load_parsed("REQUEST_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            llm_timeout_secs: load_parsed("LLM_TIMEOUT_SECS")?.unwrap_or(DEFAULT_LLM_TIMEOUT_SECS),
            max_upload_bytes: load_parsed("MAX_UPLOAD_BYTES")?.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            server_port: load_parsed("SERVER_PORT")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot drive the pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upload_bucket.trim().is_empty() {
            return Err(ConfigError::InvalidValue("UPLOAD_BUCKET".into()));
        }
        if self.llm_engine.trim().is_empty() {
            return Err(ConfigError::InvalidValue("OPENAI_ENGINE".into()));
        }
        if self.summary_engine_tag.contains('/') || self.summary_engine_tag.trim().is_empty() {
            return Err(ConfigError::InvalidValue("SUMMARY_ENGINE_TAG".into()));
        }
        if reqwest::Url::parse(&self.llm_endpoint).is_err() {
            return Err(ConfigError::InvalidValue("OPENAI_API_BASE".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("REQUEST_TIMEOUT_SECS".into()));
        }
        if self.llm_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("LLM_TIMEOUT_SECS".into()));
        }
        Ok(())
    }

    /// Whole-request deadline applied around the pipeline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Per-call deadline applied by the completion HTTP client.
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn load_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    match load_env_optional(key) {
        None => Ok(default),
        Some(value) => parse_bool(&value).ok_or_else(|| ConfigError::InvalidValue(key.into())),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s3" => Ok(Self::S3),
            "memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "azure" => Ok(Self::Azure),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        store_backend = ?config.store_backend,
        upload_bucket = %config.upload_bucket,
        llm_provider = ?config.llm_provider,
        llm_engine = %config.llm_engine,
        llm_api_version = %config.llm_api_version,
        persist_summaries = config.persist_summaries,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        store_backend: StoreBackend::Memory,
        aws_region: None,
        store_endpoint: None,
        upload_bucket: "uploads".into(),
        llm_provider: LlmProvider::Azure,
        llm_endpoint: "http://127.0.0.1:9".into(),
        llm_api_key: "test-key".into(),
        llm_engine: "gpt-test".into(),
        llm_api_version: DEFAULT_API_VERSION.into(),
        summary_engine_tag: "gpt-test".into(),
        persist_summaries: true,
        include_error_trace: true,
        log_store_identity: false,
        upstream_max_retries: 0,
        upstream_retry_backoff_ms: 1,
        request_timeout_secs: 5,
        llm_timeout_secs: 5,
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        server_port: None,
    }
}
