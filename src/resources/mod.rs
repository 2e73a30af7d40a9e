//! Filter & prefetch builder, the structural heart of the system.

pub mod prefetch;
pub mod synthesis;
pub mod tables;

use serde_json::Value;

use crate::event::{EventInfo, GenericResources};

pub use prefetch::{AwsPrefetcher, AwsPrefetcherFactory, Prefetcher, PrefetcherFactory};
use tables::{ResourceTypeSpec, arn_matches_type, lookup};

/// A single policy filter emitted by the builder: `{key, value}` equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub key: String,
    pub value: String,
}

/// Output of the filter & prefetch builder for one policy's resource type:
/// either a set of live resource descriptors, or the filters needed to
/// narrow a full enumeration down to the ones the event actually named.
#[derive(Debug, Clone, Default)]
pub struct BuildResult {
    pub filters: Vec<Filter>,
    pub provided_resources: Option<Vec<Value>>,
}

pub async fn build(event_info: &EventInfo, resource_type: &str, prefetcher: &dyn Prefetcher) -> BuildResult {
    let spec = lookup(resource_type);
    let primary = spec.and_then(|spec| primary_filter(&event_info.generic_resources, spec));

    let mut provided_resources = match (&spec, &primary) {
        (Some(spec), Some(filter)) => try_prefetch(resource_type, spec, filter, prefetcher).await,
        _ => None,
    };

    if provided_resources.is_none() {
        provided_resources = try_synthesize(event_info, resource_type);
    }

    let prefetch_succeeded = provided_resources.as_ref().is_some_and(|r| !r.is_empty());

    let mut filters = if prefetch_succeeded {
        Vec::new()
    } else {
        primary.into_iter().collect()
    };

    if filters.is_empty() && !prefetch_succeeded && !event_info.generic_resources.is_empty() {
        filters = naive_fallback(&event_info.generic_resources);
    }

    BuildResult {
        filters,
        provided_resources: provided_resources.filter(|r| !r.is_empty()),
    }
}

/// Strategy order: ARN, then ID (with per-type prefix check), then Name.
/// First match wins; at most one filter is emitted here.
fn primary_filter(generic: &GenericResources, spec: &ResourceTypeSpec) -> Option<Filter> {
    if let Some(arn_field) = spec.arn_field {
        if let Some(arn) = generic.arns.iter().find(|arn| arn_matches_type(arn, spec.resource_type)) {
            return Some(Filter {
                key: arn_field.to_string(),
                value: arn.clone(),
            });
        }
    }

    if let Some(id_field) = spec.id_field {
        let candidate = match spec.id_prefix {
            Some(prefix) => generic.ids.iter().find(|id| id.starts_with(prefix)),
            None => generic.ids.iter().next(),
        };
        if let Some(id) = candidate {
            return Some(Filter {
                key: id_field.to_string(),
                value: id.clone(),
            });
        }
    }

    if let Some(name_field) = spec.name_field {
        if let Some(name) = generic.names.iter().next() {
            return Some(Filter {
                key: name_field.to_string(),
                value: name.clone(),
            });
        }
    }

    None
}

async fn try_prefetch(
    resource_type: &str,
    spec: &ResourceTypeSpec,
    filter: &Filter,
    prefetcher: &dyn Prefetcher,
) -> Option<Vec<Value>> {
    if Some(filter.key.as_str()) == spec.arn_field {
        return prefetcher.describe_by_arns(resource_type, std::slice::from_ref(&filter.value)).await;
    }
    if Some(filter.key.as_str()) == spec.id_field {
        return prefetcher.describe_by_ids(resource_type, std::slice::from_ref(&filter.value)).await;
    }
    None
}

/// Synthesis from `responseElements` (cache clusters, CDN distributions) and
/// name-only stubs (S3 buckets) for resources a live describe call can't
/// reach yet.
fn try_synthesize(event_info: &EventInfo, resource_type: &str) -> Option<Vec<Value>> {
    match resource_type {
        "aws.cache-cluster" | "aws.distribution" => {
            let response = event_info
                .raw_event
                .get("detail")
                .and_then(|d| d.get("responseElements"))?;
            let transformed = synthesis::camel_to_pascal_keys(response);
            Some(vec![synthesis::apply_well_known_defaults(resource_type, transformed)])
        }
        "aws.s3" => {
            let name = event_info.bucket_name.as_ref()?;
            let creator = event_info.user_identity.as_ref().and_then(|u| u.principal());
            Some(vec![synthesis::bucket_stub(name, creator)])
        }
        // Account-wide policies (the original's `resource: aws.account`)
        // match the account itself, not an enumerable resource set: a
        // single synthetic descriptor so the filter/action chain still
        // runs, grounded on the SecurityHub end-to-end scenario where the
        // authored policy's resource type is `aws.account`.
        "aws.account" => Some(vec![serde_json::json!({ "AccountId": event_info.source_account_id })]),
        _ => None,
    }
}

/// Last-resort branch for unmapped resource types: naive equality filters
/// on the literal keys `Id`/`Name`/`Arn`.
fn naive_fallback(generic: &GenericResources) -> Vec<Filter> {
    let mut filters = Vec::new();
    if let Some(arn) = generic.arns.iter().next() {
        filters.push(Filter { key: "Arn".to_string(), value: arn.clone() });
    }
    if let Some(id) = generic.ids.iter().next() {
        filters.push(Filter { key: "Id".to_string(), value: id.clone() });
    }
    if let Some(name) = generic.names.iter().next() {
        filters.push(Filter { key: "Name".to_string(), value: name.clone() });
    }
    filters
}
