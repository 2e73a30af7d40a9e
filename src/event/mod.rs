//! Event classification and resource extraction.
//!
//! `classify` is the single entry point: it normalizes one of the four
//! inbound event shapes into an [`EventInfo`], running both the
//! source-specific extraction and the generic recursive walk.

pub mod classify;
pub mod extract;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use classify::classify;

/// Discriminator for the four recognised inbound event shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    CloudTrail,
    GuardDuty,
    SecurityHub,
    Config,
    Unknown,
}

/// `{principalId, userName, accountId}`, read from `detail.userIdentity`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserIdentity {
    pub principal_id: Option<String>,
    pub user_name: Option<String>,
    pub account_id: Option<String>,
}

impl UserIdentity {
    /// The principal attributed to provenance tags: prefers the
    /// human-readable user name, falls back to the opaque principal id.
    pub fn principal(&self) -> Option<&str> {
        self.user_name.as_deref().or(self.principal_id.as_deref())
    }
}

/// `{arns, ids, names}`, deduplicated, collected by the bounded-depth walk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenericResources {
    pub arns: BTreeSet<String>,
    pub ids: BTreeSet<String>,
    pub names: BTreeSet<String>,
}

impl GenericResources {
    pub fn is_empty(&self) -> bool {
        self.arns.is_empty() && self.ids.is_empty() && self.names.is_empty()
    }
}

/// Canonical internal event representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventInfo {
    pub event_name: String,
    pub event_source: EventSource,
    pub event_time: DateTime<Utc>,
    pub region: String,
    pub source_account_id: String,
    pub user_identity: Option<UserIdentity>,
    pub raw_event: Value,
    pub generic_resources: GenericResources,

    pub bucket_name: Option<String>,
    pub instance_id: Option<String>,
    pub group_id: Option<String>,
    pub username: Option<String>,
    pub load_balancer_arn: Option<String>,
    pub listener_arn: Option<String>,

    pub finding_id: Option<String>,
    pub finding_type: Option<String>,
    pub finding_severity: Option<f64>,
}

impl EventInfo {
    /// For aggregated-findings envelopes: the finding templates address via
    /// `event.detail.findings[0]` (Open Question resolution, see DESIGN.md).
    pub fn primary_finding(&self) -> Option<&Value> {
        self.raw_event
            .get("detail")
            .and_then(|d| d.get("findings"))
            .and_then(|f| f.as_array())
            .and_then(|arr| arr.first())
    }
}
