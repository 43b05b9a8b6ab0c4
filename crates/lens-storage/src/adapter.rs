// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use lens_config::model::StorageConfig;
use lens_core::types::{
    Campaign, CampaignStatus, DispatchRun, Domain, EngagementEvent, NewCampaign, NewDomain,
    NewNotification, NewSubscriber, Notification, NotificationStats, RunCheckpoint, RunStatus,
    Subscriber, SubscriberPatch,
};
use lens_core::{AdapterType, HealthStatus, LensError, PluginAdapter, StorageAdapter};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// The database is opened lazily by [`StorageAdapter::initialize`]; every
/// other call fails with a storage error until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, LensError> {
        self.db.get().ok_or_else(|| LensError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, LensError> {
        let Some(db) = self.db.get() else {
            return Ok(HealthStatus::Unhealthy("storage not initialized".into()));
        };
        let probe = db
            .connection()
            .call(|conn| -> rusqlite::Result<i64> {
                conn.query_row("SELECT COUNT(*) FROM dispatch_runs WHERE status = 'running'", [], |row| {
                    row.get(0)
                })
            })
            .await;
        Ok(match probe {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(map_tr_err(e).to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), LensError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), LensError> {
        let path = self.config.database_path.clone();
        if let Some(parent) = std::path::Path::new(&path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(LensError::storage)?;
            }
        }
        let db = Database::open_with_options(&path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| LensError::Storage {
            source: "storage already initialized".into(),
        })?;
        info!(path = %path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), LensError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Domains ---

    async fn create_domain(&self, domain: &NewDomain) -> Result<Domain, LensError> {
        queries::domains::create_domain(self.db()?, domain).await
    }

    async fn get_domain(&self, id: i64) -> Result<Option<Domain>, LensError> {
        queries::domains::get_domain(self.db()?, id).await
    }

    // --- Subscribers ---

    async fn upsert_subscriber(&self, subscriber: &NewSubscriber) -> Result<Subscriber, LensError> {
        queries::subscribers::upsert_subscriber(self.db()?, subscriber).await
    }

    async fn get_subscriber(&self, id: i64) -> Result<Option<Subscriber>, LensError> {
        queries::subscribers::get_subscriber(self.db()?, id).await
    }

    async fn list_active_subscribers(&self, domain_id: i64) -> Result<Vec<Subscriber>, LensError> {
        queries::subscribers::list_active_subscribers(self.db()?, domain_id).await
    }

    async fn update_subscriber(
        &self,
        id: i64,
        patch: &SubscriberPatch,
    ) -> Result<Option<Subscriber>, LensError> {
        queries::subscribers::update_subscriber(self.db()?, id, patch).await
    }

    async fn deactivate_subscriber(&self, id: i64) -> Result<bool, LensError> {
        queries::subscribers::deactivate_subscriber(self.db()?, id).await
    }

    async fn delete_subscriber(&self, id: i64) -> Result<bool, LensError> {
        queries::subscribers::delete_subscriber(self.db()?, id).await
    }

    // --- Campaigns ---

    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<Campaign, LensError> {
        queries::campaigns::create_campaign(self.db()?, campaign).await
    }

    async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>, LensError> {
        queries::campaigns::get_campaign(self.db()?, id).await
    }

    async fn list_campaigns_with_status(
        &self,
        status: CampaignStatus,
    ) -> Result<Vec<Campaign>, LensError> {
        queries::campaigns::list_campaigns_with_status(self.db()?, status).await
    }

    async fn compare_and_set_campaign_status(
        &self,
        id: i64,
        expected: CampaignStatus,
        next: CampaignStatus,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<bool, LensError> {
        queries::campaigns::compare_and_set_status(self.db()?, id, expected, next, sent_at).await
    }

    // --- Delivery records ---

    async fn record_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Option<Notification>, LensError> {
        queries::notifications::record_notification(self.db()?, notification).await
    }

    async fn list_notifications(&self, campaign_id: i64) -> Result<Vec<Notification>, LensError> {
        queries::notifications::list_notifications(self.db()?, campaign_id).await
    }

    async fn record_engagement(
        &self,
        campaign_id: i64,
        notification_id: i64,
        event: EngagementEvent,
        at: DateTime<Utc>,
        user_agent: Option<&str>,
    ) -> Result<Option<Notification>, LensError> {
        queries::notifications::record_engagement(
            self.db()?,
            campaign_id,
            notification_id,
            event,
            at,
            user_agent,
        )
        .await
    }

    async fn notification_stats(&self, campaign_id: i64) -> Result<NotificationStats, LensError> {
        queries::notifications::notification_stats(self.db()?, campaign_id).await
    }

    // --- Dispatch runs ---

    async fn create_dispatch_run(
        &self,
        campaign_id: i64,
        total_subscribers: u64,
        batch_size: u64,
    ) -> Result<DispatchRun, LensError> {
        queries::dispatch_runs::create_dispatch_run(
            self.db()?,
            campaign_id,
            total_subscribers,
            batch_size,
        )
        .await
    }

    async fn get_dispatch_run(&self, id: i64) -> Result<Option<DispatchRun>, LensError> {
        queries::dispatch_runs::get_dispatch_run(self.db()?, id).await
    }

    async fn checkpoint_dispatch_run(
        &self,
        id: i64,
        checkpoint: RunCheckpoint,
    ) -> Result<(), LensError> {
        queries::dispatch_runs::checkpoint_dispatch_run(self.db()?, id, checkpoint).await
    }

    async fn finish_dispatch_run(&self, id: i64, status: RunStatus) -> Result<(), LensError> {
        queries::dispatch_runs::finish_dispatch_run(self.db()?, id, status).await
    }

    async fn list_unfinished_dispatch_runs(&self) -> Result<Vec<DispatchRun>, LensError> {
        queries::dispatch_runs::list_unfinished_dispatch_runs(self.db()?).await
    }

    async fn recorded_subscriber_ids(&self, run_id: i64) -> Result<Vec<i64>, LensError> {
        queries::notifications::recorded_subscriber_ids(self.db()?, run_id).await
    }
}
