//! The internal queue between the policy engine's `notify` action (producer)
//! and the notification processor (consumer). Messages are
//! `base64(zlib(json))` with an `InvocationId` message attribute.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{OrchestratorError, Result};

/// Template source carried by a policy's notify action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionTemplate {
    pub template: String,
    pub subject: String,
    pub violation_desc: String,
}

/// The envelope produced by a policy's notify action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub policy_name: String,
    /// Display account identifier. This orchestrator only has the numeric
    /// tenant id available (no separate friendly-alias lookup), so `account`
    /// and `account_id` carry the same value; see DESIGN.md.
    pub account: String,
    pub account_id: String,
    pub region: String,
    pub environment: String,
    pub action: ActionTemplate,
    pub resources: Vec<Value>,
    pub event: Value,
}

/// Encodes the envelope as `base64(zlib(json))`.
pub fn encode(message: &NotificationMessage) -> Result<String> {
    let json = serde_json::to_vec(message)?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;
    Ok(BASE64.encode(compressed))
}

/// Decodes a `base64(zlib(json))` body back into the envelope.
pub fn decode(body: &str) -> Result<NotificationMessage> {
    let compressed = BASE64
        .decode(body)
        .map_err(|err| OrchestratorError::Other(format!("invalid base64 notification body: {err}")))?;
    let mut decoder = ZlibDecoder::new(compressed.as_slice());
    let mut json = Vec::new();
    decoder.read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}

/// One message as held by the queue, carrying the `InvocationId` attribute
/// separately from the envelope body (mirrors an SQS message attribute,
/// which sits outside the message body proper).
#[derive(Debug, Clone)]
struct QueuedEnvelope {
    invocation_id: String,
    body: String,
    delivery_attempts: u32,
}

/// Maximum drain attempts before a message is dropped (Open Question
/// resolution: drop-after-N, see DESIGN.md).
const MAX_DELIVERY_ATTEMPTS: u32 = 3;

#[async_trait]
pub trait NotifyQueue: Send + Sync {
    /// Enqueues `message`, tagging it with `invocation_id` before publish
    /// completes so a crash between enqueue and tagging can't leave an
    /// unattributable message behind.
    async fn publish(&self, message: &NotificationMessage, invocation_id: &str) -> Result<()>;

    /// Drains messages tagged with `invocation_id`; messages belonging to a
    /// concurrent invocation are left in place.
    async fn drain(&self, invocation_id: &str) -> Result<Vec<NotificationMessage>>;
}

/// In-process queue. This crate doesn't assume a specific outbound transport
/// for the internal queue, so the core ships with this in-memory default and
/// lets a host wire a durable queue behind the same trait.
#[derive(Default)]
pub struct InMemoryNotifyQueue {
    messages: Mutex<VecDeque<QueuedEnvelope>>,
}

impl InMemoryNotifyQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotifyQueue for InMemoryNotifyQueue {
    async fn publish(&self, message: &NotificationMessage, invocation_id: &str) -> Result<()> {
        let body = encode(message)?;
        self.messages.lock().unwrap().push_back(QueuedEnvelope {
            invocation_id: invocation_id.to_string(),
            body,
            delivery_attempts: 0,
        });
        Ok(())
    }

    async fn drain(&self, invocation_id: &str) -> Result<Vec<NotificationMessage>> {
        let mut queue = self.messages.lock().unwrap();
        let mut drained = Vec::new();
        let mut requeue = VecDeque::new();

        while let Some(mut envelope) = queue.pop_front() {
            if envelope.invocation_id != invocation_id {
                requeue.push_back(envelope);
                continue;
            }
            match decode(&envelope.body) {
                Ok(message) => drained.push(message),
                Err(err) => {
                    envelope.delivery_attempts += 1;
                    if envelope.delivery_attempts >= MAX_DELIVERY_ATTEMPTS {
                        warn!(
                            invocation_id = %invocation_id,
                            attempts = envelope.delivery_attempts,
                            error = %err,
                            "dropping notification message after exceeding max delivery attempts"
                        );
                    } else {
                        requeue.push_back(envelope);
                    }
                }
            }
        }

        queue.extend(requeue);
        Ok(drained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_message() -> NotificationMessage {
        NotificationMessage {
            policy_name: "ec2-stop-unencrypted".to_string(),
            account: "111111111111".to_string(),
            account_id: "111111111111".to_string(),
            region: "us-east-1".to_string(),
            environment: "prod".to_string(),
            action: ActionTemplate {
                template: "default.j2".to_string(),
                subject: "Policy {{ policy_name }} triggered".to_string(),
                violation_desc: "{{ event.detail.eventName }} on {{ resources | length }} resources".to_string(),
            },
            resources: vec![json!({ "InstanceId": "i-abc" })],
            event: json!({ "detail": { "eventName": "RunInstances" } }),
        }
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let message = sample_message();
        let encoded = encode(&message).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.policy_name, message.policy_name);
        assert_eq!(decoded.resources, message.resources);
    }

    #[tokio::test]
    async fn drain_only_returns_messages_for_the_matching_invocation() {
        let queue = InMemoryNotifyQueue::new();
        queue.publish(&sample_message(), "inv-1").await.unwrap();
        queue.publish(&sample_message(), "inv-2").await.unwrap();

        let drained = queue.drain("inv-1").await.unwrap();
        assert_eq!(drained.len(), 1);

        // inv-2's message is still there for its own invocation to drain.
        let drained_other = queue.drain("inv-2").await.unwrap();
        assert_eq!(drained_other.len(), 1);
    }
}
