use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_yaml_bw as serde_yaml;

use crate::error::{OrchestratorError, Result};

use super::ObjectStore;

/// One entry of a policy file's top-level `policies` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDef {
    pub name: String,
    pub resource: String,
    #[serde(default)]
    pub filters: Vec<serde_json::Value>,
    #[serde(default)]
    pub actions: Vec<serde_json::Value>,
    #[serde(default)]
    pub mode: Option<serde_json::Value>,
}

/// YAML document with a top-level `policies` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyFile {
    pub policies: Vec<PolicyDef>,
}

impl PolicyFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        serde_yaml::from_slice(bytes)
            .map_err(OrchestratorError::Yaml)
    }

    pub fn find(&self, policy_name: &str) -> Option<&PolicyDef> {
        self.policies.iter().find(|p| p.name == policy_name)
    }
}

/// Loads and caches `PolicyFile`s for the duration of one invocation, keyed
/// by `source_file`. The mapping's `version` is invocation-wide, so the
/// source file name alone is a sufficient cache key within one invocation.
pub struct PolicyFileCache<'a> {
    bucket: &'a str,
    store: &'a dyn ObjectStore,
    cache: HashMap<String, Arc<PolicyFile>>,
}

impl<'a> PolicyFileCache<'a> {
    pub fn new(bucket: &'a str, store: &'a dyn ObjectStore) -> Self {
        Self {
            bucket,
            store,
            cache: HashMap::new(),
        }
    }

    pub async fn load(&mut self, source_file: &str) -> Result<Arc<PolicyFile>> {
        if let Some(cached) = self.cache.get(source_file) {
            return Ok(cached.clone());
        }

        let bytes = self
            .store
            .get_object(self.bucket, source_file)
            .await
            .map_err(|err| OrchestratorError::PolicyLoad {
                source_file: source_file.to_string(),
                message: err.to_string(),
            })?;
        let file = PolicyFile::parse(&bytes).map_err(|err| OrchestratorError::PolicyLoad {
            source_file: source_file.to_string(),
            message: err.to_string(),
        })?;
        let file = Arc::new(file);
        self.cache.insert(source_file.to_string(), file.clone());
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore {
        fetches: AtomicUsize,
        body: Vec<u8>,
    }

    #[async_trait]
    impl ObjectStore for CountingStore {
        async fn get_object(&self, _bucket: &str, _key: &str) -> Result<Vec<u8>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }

    #[test]
    fn parses_policies_array() {
        let yaml = b"policies:\n  - name: ec2-stop-unencrypted\n    resource: aws.ec2\n";
        let file = PolicyFile::parse(yaml).unwrap();
        assert_eq!(file.policies.len(), 1);
        assert_eq!(file.find("ec2-stop-unencrypted").unwrap().resource, "aws.ec2");
    }

    #[tokio::test]
    async fn caches_by_source_file_within_one_invocation() {
        let store = CountingStore {
            fetches: AtomicUsize::new(0),
            body: b"policies:\n  - name: p\n    resource: aws.ec2\n".to_vec(),
        };
        let mut cache = PolicyFileCache::new("bucket", &store);
        cache.load("a.yml").await.unwrap();
        cache.load("a.yml").await.unwrap();
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
    }
}
