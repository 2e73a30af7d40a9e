use minijinja::{Environment, context};

use crate::error::{OrchestratorError, Result};
use crate::queue::NotificationMessage;

/// One rendered notification, ready for an outbound channel.
#[derive(Debug, Clone)]
pub struct RenderedNotification {
    pub subject: String,
    pub body: String,
}

/// Template context fields: `{account, account_id, region, policy,
/// policy_name, environment, event}`. Missing fields fall back to whatever
/// literal the template's own `or` operator names; minijinja's lenient
/// undefined handling makes this fall out naturally without special-casing
/// here.
pub fn render(message: &NotificationMessage) -> Result<RenderedNotification> {
    let subject = render_subject(&message.action.subject, message);
    let body = render_body(&message.action.violation_desc, message)?;
    Ok(RenderedNotification { subject, body })
}

/// Subject substitution is a plain string replace, not full Jinja: only the
/// flat top-level fields are substituted, nested `event.*` lookups are not
/// supported in the subject.
fn render_subject(template: &str, message: &NotificationMessage) -> String {
    let mut subject = template.to_string();
    for (key, value) in flat_fields(message) {
        subject = subject.replace(&format!("{{{{ {key} }}}}"), &value);
    }
    subject
}

fn render_body(template: &str, message: &NotificationMessage) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("body", template)
        .map_err(|err| OrchestratorError::NotificationRender {
            policy_name: message.policy_name.clone(),
            message: err.to_string(),
        })?;
    let tmpl = env.get_template("body").unwrap();
    tmpl.render(context! {
        account => message.account,
        account_id => message.account_id,
        region => message.region,
        policy => message.policy_name,
        policy_name => message.policy_name,
        environment => message.environment,
        event => message.event,
    })
    .map_err(|err| OrchestratorError::NotificationRender {
        policy_name: message.policy_name.clone(),
        message: err.to_string(),
    })
}

fn flat_fields(message: &NotificationMessage) -> Vec<(&'static str, String)> {
    vec![
        ("account", message.account.clone()),
        ("account_id", message.account_id.clone()),
        ("region", message.region.clone()),
        ("policy", message.policy_name.clone()),
        ("policy_name", message.policy_name.clone()),
        ("environment", message.environment.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::ActionTemplate;
    use serde_json::{Value, json};

    fn message(event: Value) -> NotificationMessage {
        NotificationMessage {
            policy_name: "securityhub-failed-findings-remediation".to_string(),
            account: "813185901390".to_string(),
            account_id: "813185901390".to_string(),
            region: "us-east-1".to_string(),
            environment: "dev".to_string(),
            action: ActionTemplate {
                template: "default.html".to_string(),
                subject: "SecurityHub Critical Finding - {{ account }} - {{ region }}".to_string(),
                violation_desc: "Severity: {{ event.detail.findings[0].Severity.Label or \"High\" }}, \
                                  Status: {{ event.detail.findings[0].Workflow.Status or \"NEW\" }}"
                    .to_string(),
            },
            resources: vec![],
            event,
        }
    }

    #[test]
    fn subject_uses_plain_field_substitution() {
        let rendered = render(&message(json!({}))).unwrap();
        assert!(rendered.subject.contains("813185901390"));
        assert!(rendered.subject.contains("us-east-1"));
        assert!(!rendered.subject.contains("{{"));
    }

    #[test]
    fn body_renders_finding_fields_when_present() {
        let event = json!({
            "detail": {
                "findings": [{
                    "Severity": { "Label": "CRITICAL" },
                    "Workflow": { "Status": "NEW" }
                }]
            }
        });
        let rendered = render(&message(event)).unwrap();
        assert!(rendered.body.contains("CRITICAL"));
        assert!(!rendered.body.contains("{{"));
    }

    #[test]
    fn body_falls_back_to_literals_when_event_is_empty() {
        let rendered = render(&message(json!({}))).unwrap();
        assert!(rendered.body.contains("High"));
        assert!(rendered.body.contains("NEW"));
    }
}
