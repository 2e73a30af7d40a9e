//! Policy Engine Adapter.
//!
//! The policy DSL itself (the filter/action library) is an external
//! collaborator treated as a black box; this module implements the typed
//! extension surface (`Filter`/`Action` traits) plus the adapter's own
//! responsibilities regardless of which engine sits behind them: injecting
//! the builder's filters/resources, binding the tenant session, enriching
//! provenance, and attaching invocation correlation to outbound
//! notifications.

pub mod actions;
pub mod filters;

use serde_json::Value;
use tracing::info;

use crate::context::Context;
use crate::credentials::AssumedSession;
use crate::error::Result;
use crate::event::EventInfo;
use crate::policy::PolicyDef;
use crate::queue::NotifyQueue;
use crate::resources::{BuildResult, Filter as EventFilter};

pub use actions::Action;
pub use filters::{Filter, ValueFilter};

/// `{policy_name, tenant_id, resource_type, resources_matched, action_taken, dryrun}`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionResult {
    pub policy_name: String,
    pub tenant_id: String,
    pub resource_type: String,
    pub resources_matched: usize,
    pub action_taken: bool,
    pub dryrun: bool,
}

/// Runs one policy's filters and (unless `dryrun`) actions against the
/// resources the builder produced for this policy's `resource` type.
///
/// Pre-fetched or synthesized resources are never taken on faith: they
/// still run through the filter chain exactly as a live enumeration would,
/// so a resource that no longer matches an authored filter is excluded even
/// if it was the one that triggered the event.
pub async fn execute(
    policy: &PolicyDef,
    event_info: &EventInfo,
    build_result: BuildResult,
    session: &AssumedSession,
    dryrun: bool,
    queue: &dyn NotifyQueue,
    ctx: &Context,
) -> Result<ExecutionResult> {
    let mut resources = build_result.provided_resources.unwrap_or_default();

    let principal = event_info.user_identity.as_ref().and_then(|u| u.principal());
    enrich_provenance(&mut resources, principal);

    let chain = build_filter_chain(&build_result.filters, policy);
    let matched: Vec<Value> = resources.into_iter().filter(|r| chain.iter().all(|f| f.matches(r))).collect();

    let mut action_taken = false;
    if !dryrun && !matched.is_empty() {
        for action_spec in &policy.actions {
            let action = actions::build(action_spec)?;
            action
                .act(&matched, policy, event_info, session, queue, ctx)
                .await?;
            action_taken = true;
        }
    }

    info!(
        policy_name = %policy.name,
        tenant_id = %session.tenant_id,
        resources_matched = matched.len(),
        dryrun,
        hub_bypass = session.is_bypass(),
        "policy execution complete"
    );

    Ok(ExecutionResult {
        policy_name: policy.name.clone(),
        tenant_id: session.tenant_id.clone(),
        resource_type: policy.resource.clone(),
        resources_matched: matched.len(),
        action_taken,
        dryrun,
    })
}

/// Event-derived filters precede authored filters, so a policy can rely on
/// the event's own identifiers narrowing the match before its own filters run.
fn build_filter_chain(event_filters: &[EventFilter], policy: &PolicyDef) -> Vec<ValueFilter> {
    let mut chain: Vec<ValueFilter> = event_filters.iter().map(ValueFilter::from_event_filter).collect();
    chain.extend(policy.filters.iter().filter_map(ValueFilter::from_authored));
    chain
}

/// Stamps `c7n:CreatorName` (and a matching `Tags` entry) onto each resource
/// before filters run, so both filters and actions can observe it.
fn enrich_provenance(resources: &mut [Value], principal: Option<&str>) {
    let Some(principal) = principal else {
        return;
    };
    for resource in resources.iter_mut() {
        let Value::Object(map) = resource else {
            continue;
        };
        map.insert(
            "c7n:CreatorName".to_string(),
            Value::String(principal.to_string()),
        );
        if let Some(Value::Array(tags)) = map.get_mut("Tags") {
            tags.push(serde_json::json!({ "Key": "c7n:CreatorName", "Value": principal }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provenance_is_written_before_filtering() {
        let mut resources = vec![json!({ "InstanceId": "i-1", "Tags": [] })];
        enrich_provenance(&mut resources, Some("alice"));
        assert_eq!(resources[0]["c7n:CreatorName"], json!("alice"));
        assert_eq!(resources[0]["Tags"][0]["Value"], json!("alice"));
    }

    #[test]
    fn absent_principal_leaves_resources_untouched() {
        let mut resources = vec![json!({ "InstanceId": "i-1" })];
        enrich_provenance(&mut resources, None);
        assert!(resources[0].get("c7n:CreatorName").is_none());
    }
}
