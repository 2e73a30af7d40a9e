use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{OrchestratorError, Result};

/// Schema major version this build understands.
const SUPPORTED_SCHEMA_MAJOR: u64 = 1;

/// One entry of an `event_mapping` list.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyRef {
    pub source_file: String,
    pub policy_name: String,
    #[serde(rename = "resource")]
    pub resource_type: String,
    pub mode_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountMapping {
    pub name: Option<String>,
    pub environment: Option<String>,
    #[serde(default)]
    pub event_mapping: IndexMap<String, Vec<PolicyRef>>,
}

/// Immutable configuration loaded from object storage.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyMapping {
    pub version: String,
    pub event_mapping: IndexMap<String, Vec<PolicyRef>>,
    #[serde(default)]
    pub account_mapping: IndexMap<String, AccountMapping>,
}

impl PolicyMapping {
    /// Parses and validates the mapping file. `version`/`event_mapping` are
    /// required by `serde` (non-`Option` fields); each `PolicyRef` likewise
    /// requires `policy_name`/`resource`/`source_file`, so a structurally
    /// invalid file fails here rather than downstream. `version` must parse
    /// as semver and its major component must match the schema this build
    /// understands, since the mapping file is hand-authored and can drift
    /// ahead of the orchestrator reading it.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mapping: Self = serde_json::from_slice(bytes)
            .map_err(|err| OrchestratorError::ConfigInvalid(format!("account-policy-mapping: {err}")))?;

        let version = semver::Version::parse(&mapping.version)
            .map_err(|err| OrchestratorError::ConfigInvalid(format!("account-policy-mapping version '{}': {err}", mapping.version)))?;
        if version.major != SUPPORTED_SCHEMA_MAJOR {
            return Err(OrchestratorError::ConfigInvalid(format!(
                "account-policy-mapping version {} is not compatible with supported schema major {SUPPORTED_SCHEMA_MAJOR}",
                mapping.version
            )));
        }

        Ok(mapping)
    }
}

/// Resolves which policies apply to one `(tenant_id, event_name)` pair.
///
/// Two-tier lookup: tenant override first, else the global table, else
/// empty (not an error: "no policies configured" is a successful outcome).
pub fn resolve(
    tenant_id: &str,
    event_name: &str,
    mapping: &PolicyMapping,
) -> IndexMap<String, Vec<String>> {
    let tenant_refs = mapping
        .account_mapping
        .get(tenant_id)
        .and_then(|account| account.event_mapping.get(event_name))
        .filter(|refs| !refs.is_empty());

    let refs: &[PolicyRef] = match tenant_refs {
        Some(refs) => refs,
        None => mapping
            .event_mapping
            .get(event_name)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
    };

    let mut grouped: IndexMap<String, Vec<String>> = IndexMap::new();
    for policy_ref in refs {
        grouped
            .entry(policy_ref.source_file.clone())
            .or_default()
            .push(policy_ref.policy_name.clone());
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_mapping() -> PolicyMapping {
        let raw = json!({
            "version": "1.0.0",
            "event_mapping": {
                "RunInstances": [
                    { "source_file": "aws-ec2-security.yml", "policy_name": "ec2-stop-unencrypted", "resource": "aws.ec2" }
                ]
            },
            "account_mapping": {
                "222233334444": {
                    "name": "tenant-a",
                    "environment": "prod",
                    "event_mapping": {
                        "CreateCacheCluster": [
                            { "source_file": "aws-cache-security.yml", "policy_name": "cache-encrypt-at-rest", "resource": "aws.cache-cluster" }
                        ]
                    }
                }
            }
        });
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn falls_back_to_global_when_no_tenant_override() {
        let mapping = sample_mapping();
        let resolved = resolve("111111111111", "RunInstances", &mapping);
        assert_eq!(resolved.get("aws-ec2-security.yml").unwrap(), &vec!["ec2-stop-unencrypted"]);
    }

    #[test]
    fn uses_tenant_override_when_present() {
        let mapping = sample_mapping();
        let resolved = resolve("222233334444", "CreateCacheCluster", &mapping);
        assert_eq!(
            resolved.get("aws-cache-security.yml").unwrap(),
            &vec!["cache-encrypt-at-rest"]
        );
    }

    #[test]
    fn returns_empty_when_neither_tier_matches() {
        let mapping = sample_mapping();
        let resolved = resolve("999999999999", "DeleteBucket", &mapping);
        assert!(resolved.is_empty());
    }

    #[test]
    fn rejects_mapping_missing_required_fields() {
        let raw = json!({ "event_mapping": {} });
        let err = PolicyMapping::parse(raw.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, OrchestratorError::ConfigInvalid(_)));
    }

    #[test]
    fn rejects_incompatible_schema_major_version() {
        let raw = json!({ "version": "2.0.0", "event_mapping": {} });
        let err = PolicyMapping::parse(raw.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, OrchestratorError::ConfigInvalid(_)));
    }

    #[test]
    fn rejects_non_semver_version_string() {
        let raw = json!({ "version": "not-a-version", "event_mapping": {} });
        let err = PolicyMapping::parse(raw.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, OrchestratorError::ConfigInvalid(_)));
    }
}
