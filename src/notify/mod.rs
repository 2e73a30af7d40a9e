//! Notification Processor. Drains the invocation's queued messages,
//! renders each against its template, and publishes to an outbound channel.
//! The channel itself (email/SMS/chat) is out of scope; this module stops
//! at the documented publish contract.

pub mod template;

use async_trait::async_trait;
use tracing::{info, warn};

pub use template::{RenderedNotification, render};

use crate::error::Result;
use crate::queue::{NotificationMessage, NotifyQueue};

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, message: &NotificationMessage, rendered: &RenderedNotification) -> Result<()>;
}

/// Default channel: logs the rendered notification rather than delivering
/// it anywhere, since the concrete transport is outside this system's scope.
pub struct LoggingNotificationChannel;

#[async_trait]
impl NotificationChannel for LoggingNotificationChannel {
    async fn send(&self, message: &NotificationMessage, rendered: &RenderedNotification) -> Result<()> {
        info!(
            policy_name = %message.policy_name,
            account = %message.account,
            subject = %rendered.subject,
            "notification rendered"
        );
        Ok(())
    }
}

/// `{processed, published}`: how many of the drained messages were
/// considered at all, versus how many were rendered and handed to the
/// outbound channel successfully.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub processed: usize,
    pub published: usize,
}

/// Drains `invocation_id`'s messages, renders, and publishes each. Caller is
/// responsible for the drain gate: only runs after at least one policy
/// executed successfully. A message that fails to render or send is logged
/// and skipped rather than aborting the rest of the batch, so one bad
/// template doesn't suppress delivery of every other finding.
pub async fn process(
    queue: &dyn NotifyQueue,
    invocation_id: &str,
    channel: &dyn NotificationChannel,
) -> Result<DrainStats> {
    let messages = queue.drain(invocation_id).await?;
    let mut stats = DrainStats { processed: messages.len(), published: 0 };

    for message in &messages {
        let rendered = match render(message) {
            Ok(rendered) => rendered,
            Err(err) => {
                warn!(policy_name = %message.policy_name, error = %err, "failed to render notification; skipping");
                continue;
            }
        };
        match channel.send(message, &rendered).await {
            Ok(()) => stats.published += 1,
            Err(err) => {
                warn!(policy_name = %message.policy_name, error = %err, "failed to publish notification; skipping");
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{ActionTemplate, InMemoryNotifyQueue};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingChannel {
        subjects: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        async fn send(&self, _message: &NotificationMessage, rendered: &RenderedNotification) -> Result<()> {
            self.subjects.lock().unwrap().push(rendered.subject.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn process_drains_renders_and_publishes_each_message() {
        let queue = InMemoryNotifyQueue::new();
        let message = NotificationMessage {
            policy_name: "ec2-stop-unencrypted".to_string(),
            account: "111111111111".to_string(),
            account_id: "111111111111".to_string(),
            region: "us-east-1".to_string(),
            environment: "prod".to_string(),
            action: ActionTemplate {
                template: "default.j2".to_string(),
                subject: "Policy {{ policy_name }} matched".to_string(),
                violation_desc: "matched".to_string(),
            },
            resources: vec![],
            event: json!({}),
        };
        queue.publish(&message, "inv-1").await.unwrap();

        let channel = RecordingChannel::default();
        let stats = process(&queue, "inv-1", &channel).await.unwrap();
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.published, 1);
        assert_eq!(channel.subjects.lock().unwrap()[0], "Policy ec2-stop-unencrypted matched");
    }

    #[tokio::test]
    async fn a_message_that_fails_to_publish_is_counted_processed_but_not_published() {
        struct FailingChannel;

        #[async_trait]
        impl NotificationChannel for FailingChannel {
            async fn send(&self, _message: &NotificationMessage, _rendered: &RenderedNotification) -> Result<()> {
                Err(crate::error::OrchestratorError::Other("channel unavailable".to_string()))
            }
        }

        let queue = InMemoryNotifyQueue::new();
        let message = NotificationMessage {
            policy_name: "ec2-stop-unencrypted".to_string(),
            account: "111111111111".to_string(),
            account_id: "111111111111".to_string(),
            region: "us-east-1".to_string(),
            environment: "prod".to_string(),
            action: ActionTemplate {
                template: "default.j2".to_string(),
                subject: "Policy {{ policy_name }} matched".to_string(),
                violation_desc: "matched".to_string(),
            },
            resources: vec![],
            event: json!({}),
        };
        queue.publish(&message, "inv-1").await.unwrap();

        let stats = process(&queue, "inv-1", &FailingChannel).await.unwrap();
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.published, 0);
    }
}
