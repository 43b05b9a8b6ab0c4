// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery outcome recorder.
//!
//! Turns one send outcome into one delivery record, and deactivates the
//! subscriber when the push service says the subscription is gone.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use lens_core::types::{NewNotification, NotificationStatus, Subscriber};
use lens_core::{DeliveryOutcome, LensError, StorageAdapter};

#[derive(Clone)]
pub struct DeliveryRecorder {
    storage: Arc<dyn StorageAdapter>,
}

impl DeliveryRecorder {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    /// Persist `outcome` for `subscriber` within a dispatch run.
    ///
    /// Returns false when the run already holds a record for the subscriber;
    /// the earlier record wins and nothing is changed.
    pub async fn record(
        &self,
        campaign_id: i64,
        run_id: i64,
        subscriber: &Subscriber,
        outcome: &DeliveryOutcome,
    ) -> Result<bool, LensError> {
        let (status, error, sent_at) = match outcome {
            Ok(()) => (NotificationStatus::Sent, None, Some(Utc::now())),
            Err(e) => (NotificationStatus::Failed, Some(e.message.clone()), None),
        };
        let inserted = self
            .storage
            .record_notification(&NewNotification {
                campaign_id,
                subscriber_id: subscriber.id,
                dispatch_run_id: run_id,
                status,
                error,
                user_agent: subscriber.user_agent.clone(),
                sent_at,
            })
            .await?;
        if inserted.is_none() {
            debug!(
                campaign_id,
                run_id,
                subscriber_id = subscriber.id,
                "delivery already recorded, ignoring"
            );
            return Ok(false);
        }

        if matches!(outcome, Err(e) if e.is_permanent()) {
            self.storage.deactivate_subscriber(subscriber.id).await?;
            info!(
                subscriber_id = subscriber.id,
                endpoint = %subscriber.endpoint,
                "subscription gone, subscriber deactivated"
            );
        }
        Ok(true)
    }
}
