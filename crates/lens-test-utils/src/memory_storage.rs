// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory storage adapter for deterministic engine tests.
//!
//! `MemoryStorage` mirrors the SQLite adapter's observable behavior (upsert
//! keys, compare-and-set, per-run uniqueness of delivery records) and adds
//! switches that make selected operations fail.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use lens_core::types::{
    AdapterType, Campaign, CampaignStatus, DispatchRun, Domain, EngagementEvent, HealthStatus,
    NewCampaign, NewDomain, NewNotification, NewSubscriber, Notification, NotificationStats,
    RunCheckpoint, RunStatus, Subscriber, SubscriberPatch,
};
use lens_core::{LensError, PluginAdapter, StorageAdapter};

#[derive(Default)]
struct State {
    next_id: i64,
    domains: BTreeMap<i64, Domain>,
    subscribers: BTreeMap<i64, Subscriber>,
    campaigns: BTreeMap<i64, Campaign>,
    notifications: BTreeMap<i64, Notification>,
    runs: BTreeMap<i64, DispatchRun>,
    recorded: HashSet<(i64, i64)>,
}

impl State {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// A `StorageAdapter` that keeps everything in process memory.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<State>,
    fail_checkpoints: AtomicBool,
    fail_subscriber_listing: AtomicBool,
    fail_run_creation: AtomicBool,
    fail_finalize: AtomicBool,
}

fn injected(operation: &str) -> LensError {
    LensError::Storage {
        source: format!("injected failure: {operation}").into(),
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `checkpoint_dispatch_run` call fail.
    pub fn fail_checkpoints(&self, fail: bool) {
        self.fail_checkpoints.store(fail, Ordering::SeqCst);
    }

    /// Make every `list_active_subscribers` call fail.
    pub fn fail_subscriber_listing(&self, fail: bool) {
        self.fail_subscriber_listing.store(fail, Ordering::SeqCst);
    }

    /// Make every `create_dispatch_run` call fail.
    pub fn fail_run_creation(&self, fail: bool) {
        self.fail_run_creation.store(fail, Ordering::SeqCst);
    }

    /// Make every campaign transition into `sent` fail.
    pub fn fail_finalize(&self, fail: bool) {
        self.fail_finalize.store(fail, Ordering::SeqCst);
    }

    /// Number of delivery records across all campaigns.
    pub async fn notification_count(&self) -> usize {
        self.state.lock().await.notifications.len()
    }

    /// Force a campaign into `status`, bypassing the lifecycle checks.
    pub async fn force_campaign_status(&self, id: i64, status: CampaignStatus) {
        if let Some(campaign) = self.state.lock().await.campaigns.get_mut(&id) {
            campaign.status = status;
        }
    }

    /// Replace a domain's stored key pair.
    pub async fn set_domain_keys(&self, id: i64, public: Option<&str>, private: Option<&str>) {
        if let Some(domain) = self.state.lock().await.domains.get_mut(&id) {
            domain.vapid_public_key = public.map(String::from);
            domain.vapid_private_key = private.map(String::from);
        }
    }
}

#[async_trait]
impl PluginAdapter for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, LensError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LensError> {
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn initialize(&self) -> Result<(), LensError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), LensError> {
        Ok(())
    }

    async fn create_domain(&self, domain: &NewDomain) -> Result<Domain, LensError> {
        let hostname = domain.hostname.trim();
        if hostname.is_empty() {
            return Err(LensError::InvalidInput("hostname must not be empty".into()));
        }
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let stored = Domain {
            id,
            hostname: hostname.to_string(),
            is_active: true,
            vapid_public_key: domain.vapid_public_key.clone(),
            vapid_private_key: domain.vapid_private_key.clone(),
            created_at: Utc::now(),
        };
        state.domains.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_domain(&self, id: i64) -> Result<Option<Domain>, LensError> {
        Ok(self.state.lock().await.domains.get(&id).cloned())
    }

    async fn upsert_subscriber(&self, subscriber: &NewSubscriber) -> Result<Subscriber, LensError> {
        let endpoint = subscriber.endpoint.trim();
        if endpoint.is_empty() || subscriber.p256dh.trim().is_empty() || subscriber.auth.trim().is_empty()
        {
            return Err(LensError::InvalidInput(
                "endpoint, p256dh and auth are required".into(),
            ));
        }
        let mut state = self.state.lock().await;
        if !state.domains.contains_key(&subscriber.domain_id) {
            return Err(LensError::DomainNotFound(subscriber.domain_id));
        }
        let now = Utc::now();
        let existing = state
            .subscribers
            .values_mut()
            .find(|s| s.domain_id == subscriber.domain_id && s.endpoint == endpoint);
        if let Some(existing) = existing {
            existing.p256dh = subscriber.p256dh.trim().to_string();
            existing.auth = subscriber.auth.trim().to_string();
            if subscriber.country.is_some() {
                existing.country = subscriber.country.clone();
            }
            if subscriber.city.is_some() {
                existing.city = subscriber.city.clone();
            }
            if subscriber.user_agent.is_some() {
                existing.user_agent = subscriber.user_agent.clone();
            }
            existing.last_seen = now;
            existing.is_active = true;
            return Ok(existing.clone());
        }
        let id = state.allocate_id();
        let stored = Subscriber {
            id,
            domain_id: subscriber.domain_id,
            endpoint: endpoint.to_string(),
            p256dh: subscriber.p256dh.trim().to_string(),
            auth: subscriber.auth.trim().to_string(),
            country: subscriber.country.clone(),
            city: subscriber.city.clone(),
            user_agent: subscriber.user_agent.clone(),
            subscribed_at: now,
            last_seen: now,
            is_active: true,
        };
        state.subscribers.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_subscriber(&self, id: i64) -> Result<Option<Subscriber>, LensError> {
        Ok(self.state.lock().await.subscribers.get(&id).cloned())
    }

    async fn list_active_subscribers(&self, domain_id: i64) -> Result<Vec<Subscriber>, LensError> {
        if self.fail_subscriber_listing.load(Ordering::SeqCst) {
            return Err(injected("list_active_subscribers"));
        }
        Ok(self
            .state
            .lock()
            .await
            .subscribers
            .values()
            .filter(|s| s.domain_id == domain_id && s.is_active)
            .cloned()
            .collect())
    }

    async fn update_subscriber(
        &self,
        id: i64,
        patch: &SubscriberPatch,
    ) -> Result<Option<Subscriber>, LensError> {
        let mut state = self.state.lock().await;
        let Some(subscriber) = state.subscribers.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(active) = patch.is_active {
            subscriber.is_active = active;
        }
        if let Some(user_agent) = &patch.user_agent {
            subscriber.user_agent = Some(user_agent.clone());
        }
        if let Some(last_seen) = patch.last_seen {
            subscriber.last_seen = last_seen;
        }
        Ok(Some(subscriber.clone()))
    }

    async fn deactivate_subscriber(&self, id: i64) -> Result<bool, LensError> {
        let mut state = self.state.lock().await;
        match state.subscribers.get_mut(&id) {
            Some(subscriber) => {
                subscriber.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_subscriber(&self, id: i64) -> Result<bool, LensError> {
        let mut state = self.state.lock().await;
        if state.subscribers.remove(&id).is_none() {
            return Ok(false);
        }
        state.notifications.retain(|_, n| n.subscriber_id != id);
        state.recorded.retain(|(_, subscriber_id)| *subscriber_id != id);
        Ok(true)
    }

    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<Campaign, LensError> {
        if campaign.title.trim().is_empty() || campaign.body.trim().is_empty() {
            return Err(LensError::InvalidInput("title and body are required".into()));
        }
        if let Some(filter) = &campaign.target_filter {
            filter.validate()?;
        }
        let mut state = self.state.lock().await;
        if !state.domains.contains_key(&campaign.domain_id) {
            return Err(LensError::DomainNotFound(campaign.domain_id));
        }
        let id = state.allocate_id();
        let stored = Campaign {
            id,
            domain_id: campaign.domain_id,
            title: campaign.title.clone(),
            body: campaign.body.clone(),
            icon: campaign.icon.clone(),
            image: campaign.image.clone(),
            badge: campaign.badge.clone(),
            click_url: campaign.click_url.clone(),
            target_type: campaign.target_type,
            target_filter: campaign.target_filter.clone(),
            status: CampaignStatus::Draft,
            sent_at: None,
            created_at: Utc::now(),
        };
        state.campaigns.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>, LensError> {
        Ok(self.state.lock().await.campaigns.get(&id).cloned())
    }

    async fn list_campaigns_with_status(
        &self,
        status: CampaignStatus,
    ) -> Result<Vec<Campaign>, LensError> {
        Ok(self
            .state
            .lock()
            .await
            .campaigns
            .values()
            .filter(|c| c.status == status)
            .cloned()
            .collect())
    }

    async fn compare_and_set_campaign_status(
        &self,
        id: i64,
        expected: CampaignStatus,
        next: CampaignStatus,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<bool, LensError> {
        if !expected.can_transition_to(next) {
            return Err(LensError::Internal(format!(
                "illegal campaign transition {expected} -> {next}"
            )));
        }
        if next == CampaignStatus::Sent && self.fail_finalize.load(Ordering::SeqCst) {
            return Err(injected("compare_and_set_campaign_status"));
        }
        let mut state = self.state.lock().await;
        match state.campaigns.get_mut(&id) {
            Some(campaign) if campaign.status == expected => {
                campaign.status = next;
                if sent_at.is_some() {
                    campaign.sent_at = sent_at;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Option<Notification>, LensError> {
        let mut state = self.state.lock().await;
        let key = (notification.dispatch_run_id, notification.subscriber_id);
        if !state.recorded.insert(key) {
            return Ok(None);
        }
        let id = state.allocate_id();
        let stored = Notification {
            id,
            campaign_id: notification.campaign_id,
            subscriber_id: notification.subscriber_id,
            dispatch_run_id: notification.dispatch_run_id,
            status: notification.status,
            error: notification.error.clone(),
            user_agent: notification.user_agent.clone(),
            sent_at: notification.sent_at,
            clicked_at: None,
            closed_at: None,
            created_at: Utc::now(),
        };
        state.notifications.insert(id, stored.clone());
        Ok(Some(stored))
    }

    async fn list_notifications(&self, campaign_id: i64) -> Result<Vec<Notification>, LensError> {
        Ok(self
            .state
            .lock()
            .await
            .notifications
            .values()
            .filter(|n| n.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn record_engagement(
        &self,
        campaign_id: i64,
        notification_id: i64,
        event: EngagementEvent,
        at: DateTime<Utc>,
        user_agent: Option<&str>,
    ) -> Result<Option<Notification>, LensError> {
        let mut state = self.state.lock().await;
        let Some(record) = state
            .notifications
            .get_mut(&notification_id)
            .filter(|n| n.campaign_id == campaign_id)
        else {
            return Ok(None);
        };
        record.status = event.status();
        match event {
            EngagementEvent::Clicked => record.clicked_at = Some(at),
            EngagementEvent::Closed => record.closed_at = Some(at),
        }
        if let Some(ua) = user_agent {
            record.user_agent = Some(ua.to_string());
        }
        Ok(Some(record.clone()))
    }

    async fn notification_stats(&self, campaign_id: i64) -> Result<NotificationStats, LensError> {
        let state = self.state.lock().await;
        let mut stats = NotificationStats::default();
        for n in state.notifications.values().filter(|n| n.campaign_id == campaign_id) {
            stats.total += 1;
            if n.status.is_delivered() {
                stats.sent += 1;
            } else {
                stats.failed += 1;
            }
            stats.clicked += u64::from(n.clicked_at.is_some());
            stats.closed += u64::from(n.closed_at.is_some());
        }
        Ok(stats)
    }

    async fn create_dispatch_run(
        &self,
        campaign_id: i64,
        total_subscribers: u64,
        batch_size: u64,
    ) -> Result<DispatchRun, LensError> {
        if self.fail_run_creation.load(Ordering::SeqCst) {
            return Err(injected("create_dispatch_run"));
        }
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let now = Utc::now();
        let run = DispatchRun {
            id,
            campaign_id,
            status: RunStatus::Running,
            total_subscribers,
            batch_size,
            batches_completed: 0,
            successful: 0,
            failed: 0,
            started_at: now,
            updated_at: now,
            finished_at: None,
        };
        state.runs.insert(id, run.clone());
        Ok(run)
    }

    async fn get_dispatch_run(&self, id: i64) -> Result<Option<DispatchRun>, LensError> {
        Ok(self.state.lock().await.runs.get(&id).cloned())
    }

    async fn checkpoint_dispatch_run(
        &self,
        id: i64,
        checkpoint: RunCheckpoint,
    ) -> Result<(), LensError> {
        if self.fail_checkpoints.load(Ordering::SeqCst) {
            return Err(injected("checkpoint_dispatch_run"));
        }
        let mut state = self.state.lock().await;
        match state.runs.get_mut(&id) {
            Some(run) if run.status == RunStatus::Running => {
                run.batches_completed = checkpoint.batches_completed;
                run.successful = checkpoint.successful;
                run.failed = checkpoint.failed;
                run.updated_at = Utc::now();
                Ok(())
            }
            _ => Err(LensError::Internal(format!(
                "dispatch run {id} is missing or no longer running"
            ))),
        }
    }

    async fn finish_dispatch_run(&self, id: i64, status: RunStatus) -> Result<(), LensError> {
        if status == RunStatus::Running {
            return Err(LensError::Internal(
                "a dispatch run cannot be finished as running".into(),
            ));
        }
        let mut state = self.state.lock().await;
        if let Some(run) = state.runs.get_mut(&id) {
            let now = Utc::now();
            run.status = status;
            run.finished_at = Some(now);
            run.updated_at = now;
        }
        Ok(())
    }

    async fn list_unfinished_dispatch_runs(&self) -> Result<Vec<DispatchRun>, LensError> {
        Ok(self
            .state
            .lock()
            .await
            .runs
            .values()
            .filter(|r| r.status == RunStatus::Running)
            .cloned()
            .collect())
    }

    async fn recorded_subscriber_ids(&self, run_id: i64) -> Result<Vec<i64>, LensError> {
        let state = self.state.lock().await;
        let mut ids: Vec<i64> = state
            .recorded
            .iter()
            .filter(|(run, _)| *run == run_id)
            .map(|(_, subscriber_id)| *subscriber_id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lens_core::types::NotificationStatus;

    async fn seeded() -> (MemoryStorage, Domain) {
        let storage = MemoryStorage::new();
        let domain = storage
            .create_domain(&NewDomain {
                hostname: "mem.example".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        (storage, domain)
    }

    #[tokio::test]
    async fn compare_and_set_has_a_single_winner() {
        let (storage, domain) = seeded().await;
        let campaign = storage
            .create_campaign(&NewCampaign::broadcast(domain.id, "t", "b"))
            .await
            .unwrap();

        let first = storage
            .compare_and_set_campaign_status(campaign.id, CampaignStatus::Draft, CampaignStatus::Sending, None)
            .await
            .unwrap();
        let second = storage
            .compare_and_set_campaign_status(campaign.id, CampaignStatus::Draft, CampaignStatus::Sending, None)
            .await
            .unwrap();
        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn duplicate_records_are_ignored() {
        let (storage, domain) = seeded().await;
        let sub = storage
            .upsert_subscriber(&NewSubscriber {
                domain_id: domain.id,
                endpoint: "https://push/1".into(),
                p256dh: "k".into(),
                auth: "a".into(),
                country: None,
                city: None,
                user_agent: None,
            })
            .await
            .unwrap();
        let record = NewNotification {
            campaign_id: 1,
            subscriber_id: sub.id,
            dispatch_run_id: 9,
            status: NotificationStatus::Sent,
            error: None,
            user_agent: None,
            sent_at: None,
        };
        assert!(storage.record_notification(&record).await.unwrap().is_some());
        assert!(storage.record_notification(&record).await.unwrap().is_none());
        assert_eq!(storage.notification_count().await, 1);
        assert_eq!(storage.recorded_subscriber_ids(9).await.unwrap(), vec![sub.id]);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_storage_errors() {
        let (storage, domain) = seeded().await;
        storage.fail_subscriber_listing(true);
        let err = storage.list_active_subscribers(domain.id).await.unwrap_err();
        assert!(matches!(err, LensError::Storage { .. }));

        storage.fail_subscriber_listing(false);
        assert!(storage.list_active_subscribers(domain.id).await.unwrap().is_empty());
    }
}
