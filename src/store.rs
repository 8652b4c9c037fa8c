//! Object storage capability used by the pipeline.
//!
//! The pipeline only needs two operations, fetch and put, addressed by
//! [`ObjectReference`]. [`ObjectStoreClient`] implements them on top of the `object_store`
//! crate: the `s3` backend lazily builds one `AmazonS3` client per container and reuses it for
//! the life of the process; the `memory` backend keeps one `InMemory` store per container for
//! local development and tests.

use crate::config::{Config, StoreBackend};
use crate::pipeline::ObjectReference;
use crate::retry::Transient;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectStore as RemoteStore, PutOptions, PutPayload,
    aws::AmazonS3Builder, memory::InMemory, path::Path,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors returned while reading or writing objects.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced object does not exist.
    #[error("Object not found: s3://{container}/{key}")]
    NotFound {
        /// Container that was queried.
        container: String,
        /// Key that was queried.
        key: String,
    },
    /// The key cannot be addressed without rewriting it.
    #[error("Object key {key:?} is not addressable: {reason}")]
    InvalidKey {
        /// Key as supplied by the caller.
        key: String,
        /// Why the key was refused.
        reason: String,
    },
    /// The store could not be reached or failed transiently.
    #[error("Object store unavailable: {message}")]
    Unavailable {
        /// Diagnostic text from the underlying client.
        message: String,
    },
    /// The store refused the request (bad path, permissions, unsupported operation).
    #[error("Object store rejected request: {message}")]
    Rejected {
        /// Diagnostic text from the underlying client.
        message: String,
    },
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Fetch/put capability over a key-addressed blob store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read the full contents of the referenced object.
    async fn fetch(&self, reference: &ObjectReference) -> Result<Bytes, StoreError>;

    /// Write `body` to the referenced object, replacing any previous contents.
    async fn put(
        &self,
        reference: &ObjectReference,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError>;
}

/// [`ObjectStore`] implementation backed by the `object_store` crate.
pub struct ObjectStoreClient {
    backend: StoreBackend,
    region: Option<String>,
    endpoint: Option<String>,
    buckets: RwLock<HashMap<String, Arc<dyn RemoteStore>>>,
}

impl ObjectStoreClient {
    /// Construct a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        tracing::debug!(
            backend = ?config.store_backend,
            region = ?config.aws_region,
            endpoint = ?config.store_endpoint,
            "Initialized object store client"
        );
        Self {
            backend: config.store_backend,
            region: config.aws_region.clone(),
            endpoint: config.store_endpoint.clone(),
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Client holding every container in process memory.
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            region: None,
            endpoint: None,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    async fn bucket(&self, container: &str) -> Result<Arc<dyn RemoteStore>, StoreError> {
        if let Some(store) = self.buckets.read().await.get(container) {
            return Ok(Arc::clone(store));
        }

        let mut guard = self.buckets.write().await;
        if let Some(store) = guard.get(container) {
            return Ok(Arc::clone(store));
        }
        let store = self.build_bucket(container)?;
        tracing::debug!(container, backend = ?self.backend, "Opened object store container");
        guard.insert(container.to_string(), Arc::clone(&store));
        Ok(store)
    }

    fn build_bucket(&self, container: &str) -> Result<Arc<dyn RemoteStore>, StoreError> {
        match self.backend {
            StoreBackend::Memory => Ok(Arc::new(InMemory::new())),
            StoreBackend::S3 => {
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(container);
                if let Some(region) = &self.region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = &self.endpoint {
                    builder = builder
                        .with_endpoint(endpoint)
                        .with_allow_http(endpoint.starts_with("http://"));
                }
                let store = builder.build().map_err(|error| StoreError::Rejected {
                    message: format!("failed to configure S3 client for {container}: {error}"),
                })?;
                Ok(Arc::new(store))
            }
        }
    }
}

#[async_trait]
impl ObjectStore for ObjectStoreClient {
    async fn fetch(&self, reference: &ObjectReference) -> Result<Bytes, StoreError> {
        let store = self.bucket(&reference.container).await?;
        let path = object_path(reference)?;
        let result = store
            .get(&path)
            .await
            .map_err(|error| map_store_error(reference, error))?;
        let body = result
            .bytes()
            .await
            .map_err(|error| map_store_error(reference, error))?;
        tracing::debug!(object = %reference, size_bytes = body.len(), "Fetched object");
        Ok(body)
    }

    async fn put(
        &self,
        reference: &ObjectReference,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let store = self.bucket(&reference.container).await?;
        let path = object_path(reference)?;
        let size_bytes = body.len();
        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        );
        let options = PutOptions {
            attributes,
            ..Default::default()
        };
        store
            .put_opts(&path, PutPayload::from(body), options)
            .await
            .map_err(|error| map_store_error(reference, error))?;
        tracing::debug!(object = %reference, size_bytes, content_type, "Stored object");
        Ok(())
    }
}

/// Convert a key into a store path without re-encoding or normalizing it.
///
/// `Path::parse` accepts `#`, `%` and spaces verbatim but drops a leading or trailing `/`, so
/// the parsed form is compared against the original to refuse keys that would alias another
/// object.
fn object_path(reference: &ObjectReference) -> Result<Path, StoreError> {
    let key = reference.key.as_str();
    let path = Path::parse(key).map_err(|error| StoreError::InvalidKey {
        key: key.to_string(),
        reason: error.to_string(),
    })?;
    if path.as_ref() != key {
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason: "leading or trailing '/' is not allowed".into(),
        });
    }
    Ok(path)
}

fn map_store_error(reference: &ObjectReference, error: object_store::Error) -> StoreError {
    match error {
        object_store::Error::NotFound { .. } => StoreError::NotFound {
            container: reference.container.clone(),
            key: reference.key.clone(),
        },
        object_store::Error::InvalidPath { .. }
        | object_store::Error::NotSupported { .. }
        | object_store::Error::NotImplemented => StoreError::Rejected {
            message: format!("{reference}: {error}"),
        },
        other => StoreError::Unavailable {
            message: format!("{reference}: {other}"),
        },
    }
}
