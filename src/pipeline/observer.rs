//! Optional observability hooks around a pipeline run.

use crate::config::{Config, StoreBackend};
use crate::pipeline::ObjectReference;

/// Hook invoked by the orchestrator before it starts work on a document.
pub trait PipelineObserver: Send + Sync {
    /// Called once per summarize request, before the store is read.
    fn before_summarize(&self, reference: &ObjectReference);
}

/// Logs which store and completion identity a request is about to use.
///
/// Handy when a deployment picks up the wrong credentials: the log line shows the region,
/// endpoint, engine and a masked credential next to the object being summarized.
pub struct IdentityLogger {
    store_backend: StoreBackend,
    region: Option<String>,
    store_endpoint: Option<String>,
    access_key: Option<String>,
    llm_endpoint: String,
    llm_engine: String,
    llm_key_hint: String,
}

impl IdentityLogger {
    /// Capture identity details from configuration and the ambient AWS environment.
    pub fn from_config(config: &Config) -> Self {
        Self {
            store_backend: config.store_backend,
            region: config.aws_region.clone(),
            store_endpoint: config.store_endpoint.clone(),
            access_key: std::env::var("AWS_ACCESS_KEY_ID")
                .ok()
                .map(|value| mask_secret(&value)),
            llm_endpoint: config.llm_endpoint.clone(),
            llm_engine: config.llm_engine.clone(),
            llm_key_hint: mask_secret(&config.llm_api_key),
        }
    }
}

impl PipelineObserver for IdentityLogger {
    fn before_summarize(&self, reference: &ObjectReference) {
        tracing::info!(
            object = %reference,
            store_backend = ?self.store_backend,
            region = ?self.region,
            store_endpoint = ?self.store_endpoint,
            access_key = ?self.access_key,
            llm_endpoint = %self.llm_endpoint,
            llm_engine = %self.llm_engine,
            llm_key = %self.llm_key_hint,
            "Caller identity for summarize request"
        );
    }
}

/// Keep the last four characters of a secret, masking the rest.
fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{visible}", "*".repeat(chars.len() - 4))
}

#[cfg(test)]
mod tests {
    use super::mask_secret;

    #[test]
    fn masks_all_but_last_four_characters() {
        assert_eq!(mask_secret("sk-abcdef1234"), "*********1234");
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret(""), "");
    }
}
