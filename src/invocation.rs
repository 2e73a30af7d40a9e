//! Invocation entry point: constructs the per-invocation `Context`, drives
//! classification, policy resolution, credential acquisition, filter/action
//! execution, and notification drain in order, and assembles the exit
//! contract from the results.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::context::Context;
use crate::credentials::CredentialBroker;
use crate::engine;
use crate::error::Result;
use crate::event::{self, EventInfo};
use crate::notify::{self, NotificationChannel};
use crate::policy::{ObjectStore, PolicyFileCache};
use crate::queue::NotifyQueue;
use crate::resources::{self, PrefetcherFactory};

/// Host-provided execution budget used to derive `Context::deadline` when
/// running outside an actual Lambda-style host (the CLI path): generous
/// enough that local `invoke`/`dry-run` runs are never cut short by it.
const STANDALONE_EXECUTION_BUDGET: Duration = Duration::from_secs(300);

/// Per-policy outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome")]
pub enum PolicyOutcome {
    Succeeded { resources_matched: usize, action_taken: bool },
    Failed { message: String },
    DeadlineExceeded,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyResult {
    pub policy_name: String,
    pub source_file: String,
    pub outcome: PolicyOutcome,
}

/// `{statusCode, body}`. `body`'s shape mirrors
/// `{success, account_id, region, event_name, policies_executed,
/// policies_successful, policies_failed, realtime_notifications_sent,
/// sqs_messages_processed, results}`.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationResult {
    pub status_code: u16,
    pub invocation_id: String,
    pub success: bool,
    pub account_id: String,
    pub region: String,
    pub event_name: String,
    pub policies_executed: usize,
    pub policies_successful: usize,
    pub policies_failed: usize,
    pub realtime_notifications_sent: usize,
    pub sqs_messages_processed: usize,
    pub policy_results: Vec<PolicyResult>,
}

/// Optional pre-validation extension point: returning `true` skips the
/// event before any policy resolution.
pub trait PreValidator: Send + Sync {
    fn should_skip(&self, event: &EventInfo) -> bool;
}

pub struct Handler<'a> {
    pub config: &'a OrchestratorConfig,
    pub object_store: &'a dyn ObjectStore,
    pub credential_broker: &'a dyn CredentialBroker,
    pub notify_queue: &'a dyn NotifyQueue,
    pub notification_channel: &'a dyn NotificationChannel,
    pub prefetcher_factory: &'a dyn PrefetcherFactory,
    pub pre_validator: Option<&'a dyn PreValidator>,
}

impl<'a> Handler<'a> {
    /// Runs one inbound event through classification, policy resolution,
    /// and execution, and assembles the exit contract. `dryrun` suppresses
    /// action execution but still runs filters/prefetch, matching
    /// `OrchestratorConfig::dry_run`. Uses `STANDALONE_EXECUTION_BUDGET` as
    /// the remaining execution budget; call `handle_with_budget` instead
    /// when a host (e.g. a Lambda shim) knows the platform's actual
    /// remaining time.
    pub async fn handle(&self, raw_event: &Value, dryrun: bool) -> Result<InvocationResult> {
        self.handle_with_budget(raw_event, dryrun, STANDALONE_EXECUTION_BUDGET).await
    }

    /// Same as `handle`, but `remaining_budget` is the host's actual
    /// remaining execution time rather than the CLI's generous standalone
    /// default, so the deadline check (`Context::is_expired`) reflects the
    /// real platform constraint instead of never firing in practice.
    pub async fn handle_with_budget(
        &self,
        raw_event: &Value,
        dryrun: bool,
        remaining_budget: Duration,
    ) -> Result<InvocationResult> {
        let invocation_id = Uuid::new_v4().to_string();
        let event_info = event::classify(raw_event)?;

        if let Some(validator) = self.pre_validator {
            if validator.should_skip(&event_info) {
                info!(invocation_id = %invocation_id, "pre-validator skipped event");
                return Ok(InvocationResult {
                    status_code: 200,
                    invocation_id,
                    success: true,
                    account_id: event_info.source_account_id,
                    region: event_info.region,
                    event_name: event_info.event_name,
                    policies_executed: 0,
                    policies_successful: 0,
                    policies_failed: 0,
                    realtime_notifications_sent: 0,
                    sqs_messages_processed: 0,
                    policy_results: Vec::new(),
                });
            }
        }

        let tenant_id = event_info.source_account_id.clone();
        let ctx = Context::new(
            invocation_id.clone(),
            tenant_id.clone(),
            event_info.region.clone(),
            remaining_budget,
        );

        let mapping_bytes = self
            .object_store
            .get_object(&self.config.policy_bucket, &self.config.account_mapping_key)
            .await?;
        let mapping = crate::policy::mapping::PolicyMapping::parse(&mapping_bytes)?;
        let resolved = crate::policy::mapping::resolve(&tenant_id, &event_info.event_name, &mapping);

        let mut policy_results = Vec::new();
        if resolved.is_empty() {
            info!(
                invocation_id = %invocation_id,
                tenant_id = %tenant_id,
                event_name = %event_info.event_name,
                "no policies resolved for this event"
            );
        } else {
            let session = self.credential_broker.acquire(&tenant_id, &event_info.region).await?;
            let sdk_config = session.sdk_config(&event_info.region);
            let prefetcher = self.prefetcher_factory.build(&sdk_config);
            let mut policy_cache = PolicyFileCache::new(&self.config.policy_bucket, self.object_store);

            'files: for (source_file, policy_names) in &resolved {
                let file = match policy_cache.load(source_file).await {
                    Ok(file) => file,
                    Err(err) => {
                        for policy_name in policy_names {
                            policy_results.push(PolicyResult {
                                policy_name: policy_name.clone(),
                                source_file: source_file.clone(),
                                outcome: PolicyOutcome::Failed { message: err.to_string() },
                            });
                        }
                        continue 'files;
                    }
                };

                for policy_name in policy_names {
                    if ctx.is_expired() {
                        warn!(invocation_id = %invocation_id, policy_name = %policy_name, "deadline exceeded; skipping remaining policies");
                        policy_results.push(PolicyResult {
                            policy_name: policy_name.clone(),
                            source_file: source_file.clone(),
                            outcome: PolicyOutcome::DeadlineExceeded,
                        });
                        continue;
                    }

                    let Some(policy) = file.find(policy_name) else {
                        policy_results.push(PolicyResult {
                            policy_name: policy_name.clone(),
                            source_file: source_file.clone(),
                            outcome: PolicyOutcome::Failed {
                                message: format!("policy '{policy_name}' not found in {source_file}"),
                            },
                        });
                        continue;
                    };

                    let build_result = resources::build(&event_info, &policy.resource, prefetcher.as_ref()).await;

                    match engine::execute(policy, &event_info, build_result, &session, dryrun, self.notify_queue, &ctx).await {
                        Ok(result) => policy_results.push(PolicyResult {
                            policy_name: policy_name.clone(),
                            source_file: source_file.clone(),
                            outcome: PolicyOutcome::Succeeded {
                                resources_matched: result.resources_matched,
                                action_taken: result.action_taken,
                            },
                        }),
                        Err(err) => policy_results.push(PolicyResult {
                            policy_name: policy_name.clone(),
                            source_file: source_file.clone(),
                            outcome: PolicyOutcome::Failed { message: err.to_string() },
                        }),
                    }
                }
            }
        }

        let policies_successful = policy_results
            .iter()
            .filter(|r| matches!(r.outcome, PolicyOutcome::Succeeded { .. }))
            .count();
        let policies_executed = policy_results.len();

        // Drain only runs after at least one policy executed successfully.
        let drain_stats = if policies_successful > 0 && !dryrun {
            notify::process(self.notify_queue, &invocation_id, self.notification_channel).await?
        } else {
            notify::DrainStats::default()
        };

        Ok(InvocationResult {
            status_code: 200,
            invocation_id,
            success: true,
            account_id: tenant_id,
            region: event_info.region,
            event_name: event_info.event_name,
            policies_executed,
            policies_successful,
            policies_failed: policies_executed - policies_successful,
            realtime_notifications_sent: drain_stats.published,
            sqs_messages_processed: drain_stats.processed,
            policy_results,
        })
    }
}
