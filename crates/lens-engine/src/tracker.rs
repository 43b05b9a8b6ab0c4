// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engagement tracking: click and close callbacks from the service worker,
//! and per-campaign delivery counters.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use lens_core::types::{EngagementEvent, Notification, NotificationStats};
use lens_core::{LensError, StorageAdapter};

/// A click or close report as the service worker sends it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngagementReport {
    pub campaign_id: i64,
    pub notification_id: i64,
    /// When the user interacted. Defaults to the time the report arrives.
    pub timestamp: Option<DateTime<Utc>>,
    pub user_agent: Option<String>,
}

#[derive(Clone)]
pub struct EngagementTracker {
    storage: Arc<dyn StorageAdapter>,
}

impl EngagementTracker {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    /// Apply `event` to the delivery record named by `report`.
    ///
    /// The record must belong to the reported campaign.
    pub async fn track(
        &self,
        event: EngagementEvent,
        report: &EngagementReport,
    ) -> Result<Notification, LensError> {
        let at = report.timestamp.unwrap_or_else(Utc::now);
        let updated = self
            .storage
            .record_engagement(
                report.campaign_id,
                report.notification_id,
                event,
                at,
                report.user_agent.as_deref(),
            )
            .await?
            .ok_or(LensError::NotificationNotFound {
                campaign_id: report.campaign_id,
                notification_id: report.notification_id,
            })?;
        debug!(
            campaign_id = report.campaign_id,
            notification_id = report.notification_id,
            %event,
            "engagement recorded"
        );
        Ok(updated)
    }

    pub async fn campaign_stats(&self, campaign_id: i64) -> Result<NotificationStats, LensError> {
        if self.storage.get_campaign(campaign_id).await?.is_none() {
            return Err(LensError::CampaignNotFound(campaign_id));
        }
        self.storage.notification_stats(campaign_id).await
    }
}
