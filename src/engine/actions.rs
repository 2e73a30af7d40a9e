use std::env;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::context::Context;
use crate::credentials::AssumedSession;
use crate::error::Result;
use crate::event::EventInfo;
use crate::policy::PolicyDef;
use crate::queue::{ActionTemplate, NotificationMessage, NotifyQueue};

/// Extension seam for the policy DSL's action library, treated as a black
/// box beyond this trait. `notify` is the one action type this adapter
/// executes directly, since it is the action the notification processor
/// depends on; any other action type an authored policy names is
/// acknowledged but not enforced here.
#[async_trait]
pub trait Action: Send + Sync {
    async fn act(
        &self,
        resources: &[Value],
        policy: &PolicyDef,
        event_info: &EventInfo,
        session: &AssumedSession,
        queue: &dyn NotifyQueue,
        ctx: &Context,
    ) -> Result<()>;
}

/// `{type: notify, template, subject, violation_desc}`.
pub struct NotifyAction {
    template: String,
    subject: String,
    violation_desc: String,
}

#[async_trait]
impl Action for NotifyAction {
    async fn act(
        &self,
        resources: &[Value],
        policy: &PolicyDef,
        event_info: &EventInfo,
        session: &AssumedSession,
        queue: &dyn NotifyQueue,
        ctx: &Context,
    ) -> Result<()> {
        let message = NotificationMessage {
            policy_name: policy.name.clone(),
            account: session.tenant_id.clone(),
            account_id: session.tenant_id.clone(),
            region: ctx.region.clone(),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "production".to_string()),
            action: ActionTemplate {
                template: self.template.clone(),
                subject: self.subject.clone(),
                violation_desc: self.violation_desc.clone(),
            },
            resources: resources.to_vec(),
            event: event_info.raw_event.clone(),
        };
        queue.publish(&message, &ctx.invocation_id).await
    }
}

/// Acknowledges an action type outside this adapter's concrete
/// implementation. Logged rather than rejected, matching the black-box
/// treatment `ValueFilter::from_authored` gives unrecognised filter shapes.
struct NoOpAction {
    action_type: String,
}

#[async_trait]
impl Action for NoOpAction {
    async fn act(
        &self,
        resources: &[Value],
        policy: &PolicyDef,
        _event_info: &EventInfo,
        _session: &AssumedSession,
        _queue: &dyn NotifyQueue,
        _ctx: &Context,
    ) -> Result<()> {
        warn!(
            policy_name = %policy.name,
            action_type = %self.action_type,
            resources_matched = resources.len(),
            "action type is not implemented by this adapter; skipping"
        );
        Ok(())
    }
}

/// Parses one entry of `policy.actions`. Supports the bare string shorthand
/// (`actions: [notify]`) and the object form carrying the template fields.
pub fn build(action_spec: &Value) -> Result<Box<dyn Action>> {
    if let Some(action_type) = action_spec.as_str() {
        return Ok(build_by_type(action_type, action_spec));
    }

    let map = action_spec.as_object();
    let action_type = map
        .and_then(|m| m.get("type"))
        .and_then(|t| t.as_str())
        .unwrap_or("unknown");

    Ok(build_by_type(action_type, action_spec))
}

fn build_by_type(action_type: &str, action_spec: &Value) -> Box<dyn Action> {
    if action_type == "notify" {
        let field = |key: &str, default: &str| {
            action_spec
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or(default)
                .to_string()
        };
        return Box::new(NotifyAction {
            template: field("template", "default.j2"),
            subject: field("subject", "Policy {{ policy_name }} matched in {{ account }}/{{ region }}"),
            violation_desc: field("violation_desc", "{{ resources | length }} resource(s) matched."),
        });
    }

    Box::new(NoOpAction {
        action_type: action_type.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryNotifyQueue;
    use aws_credential_types::Credentials;
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;

    fn session() -> AssumedSession {
        AssumedSession {
            tenant_id: "222233334444".to_string(),
            role_arn: Some("arn:aws:iam::222233334444:role/Role".to_string()),
            credentials: Credentials::for_tests(),
            expiration: Utc::now(),
        }
    }

    fn policy() -> PolicyDef {
        PolicyDef {
            name: "ec2-stop-unencrypted".to_string(),
            resource: "aws.ec2".to_string(),
            filters: vec![],
            actions: vec![json!("notify")],
            mode: None,
        }
    }

    fn event_info() -> EventInfo {
        crate::event::classify(&json!({
            "detail-type": "AWS API Call via CloudTrail",
            "account": "222233334444", "region": "us-east-1", "time": "2026-01-01T00:00:00Z",
            "detail": { "eventName": "RunInstances", "eventSource": "ec2.amazonaws.com" }
        }))
        .unwrap()
    }

    #[test]
    fn build_parses_bare_string_shorthand() {
        let action = build(&json!("notify")).unwrap();
        let _: &dyn Action = action.as_ref();
    }

    #[tokio::test]
    async fn notify_action_publishes_to_the_queue() {
        let action = build(&json!({ "type": "notify", "template": "t.j2" })).unwrap();
        let queue = InMemoryNotifyQueue::new();
        let ctx = Context::new("inv-1", "222233334444", "us-east-1", Duration::from_secs(30));

        action
            .act(
                &[json!({ "InstanceId": "i-abc" })],
                &policy(),
                &event_info(),
                &session(),
                &queue,
                &ctx,
            )
            .await
            .unwrap();

        let drained = queue.drain("inv-1").await.unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].action.template, "t.j2");
        assert_eq!(drained[0].account, "222233334444");
    }

    #[tokio::test]
    async fn unrecognised_action_type_is_skipped_not_errored() {
        let action = build(&json!({ "type": "tag" })).unwrap();
        let queue = InMemoryNotifyQueue::new();
        let ctx = Context::new("inv-1", "222233334444", "us-east-1", Duration::from_secs(30));
        action
            .act(&[], &policy(), &event_info(), &session(), &queue, &ctx)
            .await
            .unwrap();
        assert!(queue.drain("inv-1").await.unwrap().is_empty());
    }
}
