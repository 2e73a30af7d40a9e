use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::tables::service_for;

/// Per-resource-type "describe the exact identifiers" capability.
/// Implementations never propagate failures: the builder always degrades
/// to filters-only on a partial or failed prefetch.
#[async_trait]
pub trait Prefetcher: Send + Sync {
    async fn describe_by_ids(&self, resource_type: &str, ids: &[String]) -> Option<Vec<Value>>;
    async fn describe_by_arns(&self, resource_type: &str, arns: &[String]) -> Option<Vec<Value>>;
}

/// Builds a tenant-scoped `Prefetcher` from the assumed session's
/// `SdkConfig` (one per invocation, since the session's credentials are
/// only known after the credential broker runs). Separated from `Handler`
/// itself so tests can substitute a fixture prefetcher without touching
/// real AWS clients.
pub trait PrefetcherFactory: Send + Sync {
    fn build(&self, sdk_config: &aws_config::SdkConfig) -> Box<dyn Prefetcher>;
}

pub struct AwsPrefetcherFactory;

impl PrefetcherFactory for AwsPrefetcherFactory {
    fn build(&self, sdk_config: &aws_config::SdkConfig) -> Box<dyn Prefetcher> {
        Box::new(AwsPrefetcher::new(sdk_config))
    }
}

/// Dispatches to the AWS SDK client matching the resource type's service
/// key. Only `aws.ec2` and ALB/NLB describe calls are implemented in full;
/// other resource types degrade gracefully to `None` (filters-only) rather
/// than raising on a missing implementation.
pub struct AwsPrefetcher {
    ec2: aws_sdk_ec2::Client,
    elbv2: aws_sdk_elasticloadbalancingv2::Client,
}

impl AwsPrefetcher {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            ec2: aws_sdk_ec2::Client::new(config),
            elbv2: aws_sdk_elasticloadbalancingv2::Client::new(config),
        }
    }

    async fn describe_ec2_instances(&self, ids: &[String]) -> Option<Vec<Value>> {
        let response = self
            .ec2
            .describe_instances()
            .set_instance_ids(Some(ids.to_vec()))
            .send()
            .await
            .inspect_err(|err| debug!(error = %err, "describe_instances failed; degrading to filters-only"))
            .ok()?;

        let descriptors = response
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .map(|instance| {
                json!({
                    "InstanceId": instance.instance_id(),
                    "Arn": instance.instance_id().map(|id| format!("arn:aws:ec2:::instance/{id}")),
                    "State": instance.state().and_then(|s| s.name()).map(|n| n.as_str()),
                    "c7n:MatchedFilters": ["event-filter"],
                })
            })
            .collect::<Vec<_>>();

        if descriptors.is_empty() { None } else { Some(descriptors) }
    }

    async fn describe_load_balancers_by_arn(&self, arns: &[String]) -> Option<Vec<Value>> {
        let response = self
            .elbv2
            .describe_load_balancers()
            .set_load_balancer_arns(Some(arns.to_vec()))
            .send()
            .await
            .inspect_err(|err| debug!(error = %err, "describe_load_balancers failed; degrading to filters-only"))
            .ok()?;

        let descriptors = response
            .load_balancers()
            .iter()
            .map(|lb| {
                json!({
                    "LoadBalancerArn": lb.load_balancer_arn(),
                    "LoadBalancerName": lb.load_balancer_name(),
                    "c7n:MatchedFilters": ["event-filter"],
                })
            })
            .collect::<Vec<_>>();

        if descriptors.is_empty() { None } else { Some(descriptors) }
    }
}

#[async_trait]
impl Prefetcher for AwsPrefetcher {
    async fn describe_by_ids(&self, resource_type: &str, ids: &[String]) -> Option<Vec<Value>> {
        if ids.is_empty() {
            return None;
        }
        match service_for(resource_type)? {
            "ec2" if resource_type == "aws.ec2" => self.describe_ec2_instances(ids).await,
            _ => None,
        }
    }

    async fn describe_by_arns(&self, resource_type: &str, arns: &[String]) -> Option<Vec<Value>> {
        if arns.is_empty() {
            return None;
        }
        match service_for(resource_type)? {
            "elasticloadbalancing" => self.describe_load_balancers_by_arn(arns).await,
            _ => None,
        }
    }
}
