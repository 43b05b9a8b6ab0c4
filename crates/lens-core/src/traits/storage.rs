// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends (SQLite, in-memory fakes).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::LensError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Campaign, CampaignStatus, DispatchRun, Domain, EngagementEvent, NewCampaign, NewDomain,
    NewNotification, NewSubscriber, Notification, NotificationStats, RunCheckpoint, RunStatus,
    Subscriber, SubscriberPatch,
};

/// Adapter for storage and persistence backends.
///
/// Every engine component receives the storage as an injected
/// `Arc<dyn StorageAdapter>`; nothing reaches for a global connection.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), LensError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), LensError>;

    // --- Domains ---

    async fn create_domain(&self, domain: &NewDomain) -> Result<Domain, LensError>;

    async fn get_domain(&self, id: i64) -> Result<Option<Domain>, LensError>;

    // --- Subscribers ---

    /// Insert a subscriber, or refresh keys/metadata and reactivate it when
    /// the `(domain_id, endpoint)` pair is already registered.
    async fn upsert_subscriber(&self, subscriber: &NewSubscriber) -> Result<Subscriber, LensError>;

    async fn get_subscriber(&self, id: i64) -> Result<Option<Subscriber>, LensError>;

    /// Active subscribers of a domain, ordered by id.
    async fn list_active_subscribers(&self, domain_id: i64) -> Result<Vec<Subscriber>, LensError>;

    /// Apply an admin patch. Returns the updated row, or `None` if absent.
    async fn update_subscriber(
        &self,
        id: i64,
        patch: &SubscriberPatch,
    ) -> Result<Option<Subscriber>, LensError>;

    /// Set `is_active = false`. Returns false if the subscriber does not exist.
    async fn deactivate_subscriber(&self, id: i64) -> Result<bool, LensError>;

    /// Delete a subscriber and its delivery history.
    async fn delete_subscriber(&self, id: i64) -> Result<bool, LensError>;

    // --- Campaigns ---

    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<Campaign, LensError>;

    async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>, LensError>;

    /// Campaigns currently in `status`, oldest first.
    async fn list_campaigns_with_status(
        &self,
        status: CampaignStatus,
    ) -> Result<Vec<Campaign>, LensError>;

    /// Atomically move a campaign from `expected` to `next`.
    ///
    /// Returns false, changing nothing, when the stored status is not
    /// `expected`. `sent_at` is written only when `Some`.
    async fn compare_and_set_campaign_status(
        &self,
        id: i64,
        expected: CampaignStatus,
        next: CampaignStatus,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<bool, LensError>;

    // --- Delivery records ---

    /// Insert a delivery record. Returns `None` when the run already holds a
    /// record for this subscriber; the existing row is left untouched.
    async fn record_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Option<Notification>, LensError>;

    async fn list_notifications(&self, campaign_id: i64) -> Result<Vec<Notification>, LensError>;

    /// Mark a delivery record clicked or closed. Returns the updated row, or
    /// `None` when no record with that id belongs to the campaign.
    async fn record_engagement(
        &self,
        campaign_id: i64,
        notification_id: i64,
        event: EngagementEvent,
        at: DateTime<Utc>,
        user_agent: Option<&str>,
    ) -> Result<Option<Notification>, LensError>;

    async fn notification_stats(&self, campaign_id: i64) -> Result<NotificationStats, LensError>;

    // --- Dispatch runs ---

    async fn create_dispatch_run(
        &self,
        campaign_id: i64,
        total_subscribers: u64,
        batch_size: u64,
    ) -> Result<DispatchRun, LensError>;

    async fn get_dispatch_run(&self, id: i64) -> Result<Option<DispatchRun>, LensError>;

    async fn checkpoint_dispatch_run(
        &self,
        id: i64,
        checkpoint: RunCheckpoint,
    ) -> Result<(), LensError>;

    async fn finish_dispatch_run(&self, id: i64, status: RunStatus) -> Result<(), LensError>;

    /// Runs still marked `running`, oldest first.
    async fn list_unfinished_dispatch_runs(&self) -> Result<Vec<DispatchRun>, LensError>;

    /// Subscriber ids that already have a delivery record in the run.
    async fn recorded_subscriber_ids(&self, run_id: i64) -> Result<Vec<i64>, LensError>;
}
