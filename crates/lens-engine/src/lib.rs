// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign delivery engine for Traffic-Lens.
//!
//! The [`Engine`] bundles the components the HTTP surface and the binary
//! drive:
//! - [`CampaignOrchestrator`] sends campaigns and resumes interrupted runs
//! - [`SubscriberRegistry`] registers and maintains browser subscriptions
//! - [`EngagementTracker`] records clicks and closes and reports counters
//!
//! Storage and push transport are injected as trait objects.

pub mod dispatcher;
pub mod filter;
pub mod orchestrator;
pub mod payload;
pub mod recorder;
pub mod registry;
pub mod state;
pub mod tracker;

use std::sync::Arc;

use lens_core::{LensError, PushTransport, StorageAdapter};
use lens_core::types::HealthStatus;

pub use dispatcher::{BatchDispatcher, DispatchJob, DispatchOutcome, DispatchReport, DispatchSettings};
pub use orchestrator::{CampaignOrchestrator, DispatchHandle, SendReceipt};
pub use payload::PushPayload;
pub use recorder::DeliveryRecorder;
pub use registry::SubscriberRegistry;
pub use state::CampaignStateMachine;
pub use tracker::{EngagementReport, EngagementTracker};

/// The engine components wired to one storage and one transport.
#[derive(Clone)]
pub struct Engine {
    pub orchestrator: Arc<CampaignOrchestrator>,
    pub registry: SubscriberRegistry,
    pub tracker: EngagementTracker,
    storage: Arc<dyn StorageAdapter>,
}

impl Engine {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        transport: Arc<dyn PushTransport>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            orchestrator: Arc::new(CampaignOrchestrator::new(
                storage.clone(),
                transport,
                settings,
            )),
            registry: SubscriberRegistry::new(storage.clone()),
            tracker: EngagementTracker::new(storage.clone()),
            storage,
        }
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.storage
    }

    /// Health of the storage backend.
    pub async fn health(&self) -> Result<HealthStatus, LensError> {
        self.storage.health_check().await
    }
}
