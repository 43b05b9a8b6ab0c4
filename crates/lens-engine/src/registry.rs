// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscriber registry: registration, lookup, and admin maintenance.

use std::sync::Arc;

use tracing::{debug, info};

use lens_core::types::{NewSubscriber, Subscriber, SubscriberPatch};
use lens_core::{LensError, StorageAdapter};

#[derive(Clone)]
pub struct SubscriberRegistry {
    storage: Arc<dyn StorageAdapter>,
}

impl SubscriberRegistry {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    /// Register a browser subscription, or refresh it if the endpoint is
    /// already known for the domain.
    pub async fn register(&self, subscription: NewSubscriber) -> Result<Subscriber, LensError> {
        for (field, value) in [
            ("endpoint", &subscription.endpoint),
            ("keys.p256dh", &subscription.p256dh),
            ("keys.auth", &subscription.auth),
        ] {
            if value.trim().is_empty() {
                return Err(LensError::InvalidInput(format!("{field} is required")));
            }
        }
        let subscriber = self.storage.upsert_subscriber(&subscription).await?;
        debug!(
            subscriber_id = subscriber.id,
            domain_id = subscriber.domain_id,
            "subscriber registered"
        );
        Ok(subscriber)
    }

    pub async fn get(&self, id: i64) -> Result<Subscriber, LensError> {
        self.storage
            .get_subscriber(id)
            .await?
            .ok_or(LensError::SubscriberNotFound(id))
    }

    /// Active subscribers of a domain, ordered by id.
    pub async fn active_for_domain(&self, domain_id: i64) -> Result<Vec<Subscriber>, LensError> {
        self.storage.list_active_subscribers(domain_id).await
    }

    pub async fn update(&self, id: i64, patch: SubscriberPatch) -> Result<Subscriber, LensError> {
        if patch.is_empty() {
            return Err(LensError::InvalidInput(
                "patch must set at least one of isActive, userAgent, lastSeen".into(),
            ));
        }
        self.storage
            .update_subscriber(id, &patch)
            .await?
            .ok_or(LensError::SubscriberNotFound(id))
    }

    pub async fn deactivate(&self, id: i64) -> Result<(), LensError> {
        if !self.storage.deactivate_subscriber(id).await? {
            return Err(LensError::SubscriberNotFound(id));
        }
        info!(subscriber_id = id, "subscriber deactivated");
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), LensError> {
        if !self.storage.delete_subscriber(id).await? {
            return Err(LensError::SubscriberNotFound(id));
        }
        info!(subscriber_id = id, "subscriber deleted");
        Ok(())
    }
}
