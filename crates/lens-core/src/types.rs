// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by storage, transport, engine, and gateway crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::LensError;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Transport,
}

// --- Domains ---

/// A tenant site owning subscribers and campaigns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub id: i64,
    pub hostname: String,
    pub is_active: bool,
    pub vapid_public_key: Option<String>,
    #[serde(skip_serializing)]
    pub vapid_private_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Domain {
    /// Returns the domain's VAPID key pair when both halves are present.
    pub fn signing_keys(&self) -> Option<VapidKeys> {
        let public_key = self.vapid_public_key.as_deref()?.trim();
        let private_key = self.vapid_private_key.as_deref()?.trim();
        if public_key.is_empty() || private_key.is_empty() {
            return None;
        }
        Some(VapidKeys {
            public_key: public_key.to_string(),
            private_key: private_key.to_string(),
        })
    }
}

/// Input for creating a domain.
#[derive(Debug, Clone, Default)]
pub struct NewDomain {
    pub hostname: String,
    pub vapid_public_key: Option<String>,
    pub vapid_private_key: Option<String>,
}

/// A domain-scoped VAPID key pair, base64url encoded.
#[derive(Clone, PartialEq, Eq)]
pub struct VapidKeys {
    pub public_key: String,
    pub private_key: String,
}

impl std::fmt::Debug for VapidKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidKeys")
            .field("public_key", &self.public_key)
            .field("private_key", &"[redacted]")
            .finish()
    }
}

// --- Subscribers ---

/// One registered browser push endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub id: i64,
    pub domain_id: i64,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub user_agent: Option<String>,
    pub subscribed_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub is_active: bool,
}

/// Input for registering a subscriber. Registration is an upsert on
/// `(domain_id, endpoint)`.
#[derive(Debug, Clone)]
pub struct NewSubscriber {
    pub domain_id: i64,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub user_agent: Option<String>,
}

/// Admin edits to a subscriber. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SubscriberPatch {
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

impl SubscriberPatch {
    pub fn is_empty(&self) -> bool {
        self.is_active.is_none() && self.user_agent.is_none() && self.last_seen.is_none()
    }
}

// --- Campaigns ---

/// Lifecycle state of a campaign.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Sending,
    Sent,
}

impl CampaignStatus {
    /// Whether the lifecycle permits moving from `self` to `next`.
    ///
    /// Forward moves are draft -> sending -> sent; the only backward move is
    /// the sending -> draft rollback.
    pub fn can_transition_to(self, next: CampaignStatus) -> bool {
        matches!(
            (self, next),
            (CampaignStatus::Draft, CampaignStatus::Sending)
                | (CampaignStatus::Sending, CampaignStatus::Sent)
                | (CampaignStatus::Sending, CampaignStatus::Draft)
        )
    }
}

/// Who a campaign is addressed to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    All,
    Segment,
}

/// One message to broadcast to a domain's subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: i64,
    pub domain_id: i64,
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub badge: Option<String>,
    pub click_url: Option<String>,
    pub target_type: TargetType,
    pub target_filter: Option<TargetFilter>,
    pub status: CampaignStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Input for authoring a campaign. New campaigns always start as drafts.
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub domain_id: i64,
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub badge: Option<String>,
    pub click_url: Option<String>,
    pub target_type: TargetType,
    pub target_filter: Option<TargetFilter>,
}

impl NewCampaign {
    /// A draft addressed to every active subscriber of the domain.
    pub fn broadcast(domain_id: i64, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            domain_id,
            title: title.into(),
            body: body.into(),
            icon: None,
            image: None,
            badge: None,
            click_url: None,
            target_type: TargetType::All,
            target_filter: None,
        }
    }

    /// A draft addressed to the subscribers matching `filter`.
    pub fn segment(
        domain_id: i64,
        title: impl Into<String>,
        body: impl Into<String>,
        filter: TargetFilter,
    ) -> Self {
        Self {
            target_type: TargetType::Segment,
            target_filter: Some(filter),
            ..Self::broadcast(domain_id, title, body)
        }
    }
}

// --- Target filter ---

/// Predicates narrowing which subscribers receive a segment campaign.
///
/// Every present field is one predicate and a subscriber must satisfy all of
/// them. Absent fields constrain nothing; an empty list matches nobody.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TargetFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countries: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribed_after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribed_before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl TargetFilter {
    /// Parse and validate a filter from its stored JSON form.
    pub fn from_json(raw: &str) -> Result<Self, LensError> {
        let filter: TargetFilter =
            serde_json::from_str(raw).map_err(|e| LensError::InvalidFilter(e.to_string()))?;
        filter.validate()?;
        Ok(filter)
    }

    /// Serialize to the stored JSON form.
    pub fn to_json(&self) -> Result<String, LensError> {
        serde_json::to_string(self).map_err(|e| LensError::InvalidFilter(e.to_string()))
    }

    /// Check constraints serde cannot express.
    pub fn validate(&self) -> Result<(), LensError> {
        if let (Some(after), Some(before)) = (self.subscribed_after, self.subscribed_before) {
            if after > before {
                return Err(LensError::InvalidFilter(format!(
                    "subscribedAfter ({after}) is later than subscribedBefore ({before})"
                )));
            }
        }
        for (name, list) in [("countries", &self.countries), ("cities", &self.cities)] {
            if let Some(values) = list {
                if values.iter().any(|v| v.trim().is_empty()) {
                    return Err(LensError::InvalidFilter(format!(
                        "{name} must not contain blank entries"
                    )));
                }
            }
        }
        Ok(())
    }

    /// True when no predicate is present.
    pub fn is_unconstrained(&self) -> bool {
        *self == TargetFilter::default()
    }
}

// --- Delivery records ---

/// Status of a delivery record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Sent,
    Failed,
    Clicked,
    Closed,
}

impl NotificationStatus {
    /// Statuses that mean the push service accepted the message.
    pub fn is_delivered(self) -> bool {
        !matches!(self, NotificationStatus::Failed)
    }
}

/// One delivery attempt of a campaign to a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub campaign_id: i64,
    pub subscriber_id: i64,
    pub dispatch_run_id: i64,
    pub status: NotificationStatus,
    pub error: Option<String>,
    pub user_agent: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a delivery attempt.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub campaign_id: i64,
    pub subscriber_id: i64,
    pub dispatch_run_id: i64,
    pub status: NotificationStatus,
    pub error: Option<String>,
    pub user_agent: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Client-side interaction reported by the service worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum EngagementEvent {
    Clicked,
    Closed,
}

impl EngagementEvent {
    pub fn status(self) -> NotificationStatus {
        match self {
            EngagementEvent::Clicked => NotificationStatus::Clicked,
            EngagementEvent::Closed => NotificationStatus::Closed,
        }
    }
}

/// Aggregate delivery counters for one campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationStats {
    pub total: u64,
    pub sent: u64,
    pub failed: u64,
    pub clicked: u64,
    pub closed: u64,
}

// --- Dispatch runs ---

/// Lifecycle of a persisted dispatch run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Aborted,
}

/// Durable record of one dispatch invocation, checkpointed per batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRun {
    pub id: i64,
    pub campaign_id: i64,
    pub status: RunStatus,
    pub total_subscribers: u64,
    pub batch_size: u64,
    pub batches_completed: u64,
    pub successful: u64,
    pub failed: u64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Progress persisted after each batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunCheckpoint {
    pub batches_completed: u64,
    pub successful: u64,
    pub failed: u64,
}

/// Aggregate result of a dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub successful: u64,
    pub failed: u64,
}

impl DispatchSummary {
    pub fn total(&self) -> u64 {
        self.successful + self.failed
    }
}
