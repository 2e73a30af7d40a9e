//! Policy Resolver.

pub mod file;
pub mod mapping;

use async_trait::async_trait;

pub use file::{PolicyDef, PolicyFile, PolicyFileCache};
pub use mapping::{AccountMapping, PolicyMapping, PolicyRef, resolve};

use crate::error::Result;

/// Capability seam over object storage (S3 in production, an in-memory map
/// in tests), so components depend on a narrow trait object instead of
/// reaching for a concrete client directly.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
}

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| crate::error::OrchestratorError::Other(err.to_string()))?;
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|err| crate::error::OrchestratorError::Other(err.to_string()))?;
        Ok(bytes.into_bytes().to_vec())
    }
}
