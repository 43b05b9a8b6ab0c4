// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign send orchestration.
//!
//! A send validates its preconditions, moves the campaign to `sending`,
//! resolves the audience, persists a dispatch run, marks the campaign `sent`
//! and hands the run to a background task. The caller is acknowledged as soon
//! as the task is spawned. Anything that fails between the status change and
//! the spawn puts the campaign back to `draft`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use lens_core::types::{Campaign, CampaignStatus, DispatchRun, RunStatus, VapidKeys};
use lens_core::{LensError, PushTransport, StorageAdapter};

use crate::dispatcher::{BatchDispatcher, DispatchJob, DispatchReport, DispatchSettings};
use crate::filter;
use crate::payload::PushPayload;
use crate::registry::SubscriberRegistry;
use crate::state::CampaignStateMachine;

pub const DISPATCH_STARTED: &str = "Campaign dispatch started";
pub const NO_SUBSCRIBERS: &str = "No active subscribers match this campaign";

/// Handle to a background dispatch.
#[derive(Debug)]
pub struct DispatchHandle {
    pub campaign_id: i64,
    pub run_id: i64,
    task: JoinHandle<Result<DispatchReport, LensError>>,
}

impl DispatchHandle {
    /// Wait for the dispatch to end.
    pub async fn wait(self) -> Result<DispatchReport, LensError> {
        self.task
            .await
            .map_err(|e| LensError::Internal(format!("dispatch task failed: {e}")))?
    }
}

/// Acknowledgement of an accepted send request.
#[derive(Debug)]
pub struct SendReceipt {
    pub campaign_id: i64,
    pub total_subscribers: u64,
    pub message: &'static str,
    /// `None` when no subscriber matched and nothing was dispatched.
    pub dispatch: Option<DispatchHandle>,
}

/// Everything a send resolves before touching the campaign status.
struct Prepared {
    keys: VapidKeys,
    payload: Vec<u8>,
}

pub struct CampaignOrchestrator {
    storage: Arc<dyn StorageAdapter>,
    state: CampaignStateMachine,
    registry: SubscriberRegistry,
    dispatcher: Arc<BatchDispatcher>,
    tasks: TaskTracker,
    cancel: CancellationToken,
}

impl CampaignOrchestrator {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        transport: Arc<dyn PushTransport>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            state: CampaignStateMachine::new(storage.clone()),
            registry: SubscriberRegistry::new(storage.clone()),
            dispatcher: Arc::new(BatchDispatcher::new(storage.clone(), transport, settings)),
            storage,
            tasks: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Token observed by every dispatch this orchestrator launches.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Number of dispatches still running in the background.
    pub fn active_dispatches(&self) -> usize {
        self.tasks.len()
    }

    /// Send a campaign to its audience.
    ///
    /// Preconditions are checked in order: the campaign exists, is not sent,
    /// is not sending, its filter is valid, and its domain has both VAPID
    /// keys. A refused request changes nothing.
    pub async fn send(&self, campaign_id: i64) -> Result<SendReceipt, LensError> {
        if self.cancel.is_cancelled() {
            return Err(LensError::Internal("engine is shutting down".into()));
        }
        let (campaign, prepared) = self.preflight(campaign_id).await.inspect_err(|e| {
            if e.is_precondition() {
                info!(campaign_id, code = e.code(), "send refused");
            }
        })?;

        self.state.begin_send(&campaign).await?;
        match self.launch(&campaign, prepared).await {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                error!(campaign_id, error = %e, "send failed before dispatch, rolling back");
                if let Err(rollback) = self.state.rollback(campaign_id).await {
                    error!(campaign_id, error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn preflight(&self, campaign_id: i64) -> Result<(Campaign, Prepared), LensError> {
        let campaign = self
            .storage
            .get_campaign(campaign_id)
            .await?
            .ok_or(LensError::CampaignNotFound(campaign_id))?;
        CampaignStateMachine::check_sendable(&campaign)?;
        if let Some(target_filter) = &campaign.target_filter {
            target_filter.validate()?;
        }
        let prepared = self.prepare(&campaign).await?;
        Ok((campaign, prepared))
    }

    async fn prepare(&self, campaign: &Campaign) -> Result<Prepared, LensError> {
        let domain = self
            .storage
            .get_domain(campaign.domain_id)
            .await?
            .ok_or(LensError::DomainNotFound(campaign.domain_id))?;
        let keys = domain.signing_keys().ok_or(LensError::MissingSigningKeys {
            domain_id: domain.id,
        })?;
        let payload = PushPayload::from_campaign(campaign).to_bytes()?;
        Ok(Prepared { keys, payload })
    }

    /// Steps between `begin_send` and the background spawn.
    async fn launch(&self, campaign: &Campaign, prepared: Prepared) -> Result<SendReceipt, LensError> {
        let active = self.registry.active_for_domain(campaign.domain_id).await?;
        let targets = filter::select(active, campaign.target_type, campaign.target_filter.as_ref());

        if targets.is_empty() {
            self.state.finalize_send(campaign.id, Utc::now()).await?;
            info!(campaign_id = campaign.id, "no subscribers matched, campaign marked sent");
            return Ok(SendReceipt {
                campaign_id: campaign.id,
                total_subscribers: 0,
                message: NO_SUBSCRIBERS,
                dispatch: None,
            });
        }

        let total = targets.len() as u64;
        let batch_size = self.dispatcher.settings().batch_size as u64;
        let run = self
            .storage
            .create_dispatch_run(campaign.id, total, batch_size)
            .await?;
        if let Err(e) = self.state.finalize_send(campaign.id, Utc::now()).await {
            self.abort_run(run.id).await;
            return Err(e);
        }

        let handle = self.spawn(DispatchJob {
            campaign_id: campaign.id,
            keys: prepared.keys,
            run,
            subscribers: targets,
            payload: prepared.payload,
        });
        info!(
            campaign_id = campaign.id,
            run_id = handle.run_id,
            total_subscribers = total,
            "campaign dispatch launched"
        );
        Ok(SendReceipt {
            campaign_id: campaign.id,
            total_subscribers: total,
            message: DISPATCH_STARTED,
            dispatch: Some(handle),
        })
    }

    fn spawn(&self, job: DispatchJob) -> DispatchHandle {
        let campaign_id = job.campaign_id;
        let run_id = job.run.id;
        let dispatcher = self.dispatcher.clone();
        let cancel = self.cancel.clone();
        let task = self.tasks.spawn(async move {
            let result = dispatcher.dispatch(job, &cancel).await;
            if let Err(e) = &result {
                error!(campaign_id, run_id, error = %e, "dispatch aborted");
            }
            result
        });
        DispatchHandle {
            campaign_id,
            run_id,
            task,
        }
    }

    async fn abort_run(&self, run_id: i64) {
        if let Err(e) = self.storage.finish_dispatch_run(run_id, RunStatus::Aborted).await {
            warn!(run_id, error = %e, "could not mark run aborted");
        }
    }

    /// Resume every dispatch run a previous process left `running`.
    ///
    /// Subscribers already recorded in a run are skipped and its counters
    /// carry on from the last checkpoint. Runs whose campaign can no longer
    /// be sent are marked aborted. Campaigns left `sending` without a running
    /// run are rolled back to `draft`. Call this before accepting new sends.
    pub async fn resume_unfinished(&self) -> Result<Vec<DispatchHandle>, LensError> {
        let runs = self.storage.list_unfinished_dispatch_runs().await?;
        let mut handles = Vec::with_capacity(runs.len());
        for run in runs {
            let run_id = run.id;
            match self.resume_run(run).await {
                Ok(Some(handle)) => handles.push(handle),
                Ok(None) => {}
                Err(e) => {
                    error!(run_id, error = %e, "could not resume dispatch run");
                    self.abort_run(run_id).await;
                }
            }
        }
        if !handles.is_empty() {
            info!(resumed = handles.len(), "resumed unfinished dispatch runs");
        }
        self.release_stranded_campaigns().await?;
        Ok(handles)
    }

    /// Roll back campaigns stuck in `sending` with no running dispatch run,
    /// left by a process that stopped between `begin_send` and creating the run.
    async fn release_stranded_campaigns(&self) -> Result<(), LensError> {
        let running: HashSet<i64> = self
            .storage
            .list_unfinished_dispatch_runs()
            .await?
            .into_iter()
            .map(|run| run.campaign_id)
            .collect();
        let stranded = self
            .storage
            .list_campaigns_with_status(CampaignStatus::Sending)
            .await?;
        for campaign in stranded.into_iter().filter(|c| !running.contains(&c.id)) {
            warn!(campaign_id = campaign.id, "campaign stuck in sending without a dispatch run");
            self.state.rollback(campaign.id).await?;
        }
        Ok(())
    }

    async fn resume_run(&self, mut run: DispatchRun) -> Result<Option<DispatchHandle>, LensError> {
        let Some(campaign) = self.storage.get_campaign(run.campaign_id).await? else {
            warn!(run_id = run.id, campaign_id = run.campaign_id, "campaign of run is gone");
            self.abort_run(run.id).await;
            return Ok(None);
        };
        match campaign.status {
            CampaignStatus::Sent => {}
            // The process stopped between creating the run and finalizing.
            CampaignStatus::Sending => {
                if let Err(e) = self.state.finalize_send(campaign.id, Utc::now()).await {
                    if let Err(rollback) = self.state.rollback(campaign.id).await {
                        error!(campaign_id = campaign.id, error = %rollback, "rollback failed");
                    }
                    return Err(e);
                }
            }
            CampaignStatus::Draft => {
                warn!(run_id = run.id, campaign_id = campaign.id, "campaign was rolled back, dropping run");
                self.abort_run(run.id).await;
                return Ok(None);
            }
        }

        let prepared = self.prepare(&campaign).await?;
        let recorded: HashSet<i64> = self
            .storage
            .recorded_subscriber_ids(run.id)
            .await?
            .into_iter()
            .collect();
        // Rows written after the last checkpoint are not in the run counters.
        let stats = self.storage.notification_stats(campaign.id).await?;
        run.successful = stats.sent;
        run.failed = stats.failed;

        let active = self.registry.active_for_domain(campaign.domain_id).await?;
        let remaining: Vec<_> =
            filter::select(active, campaign.target_type, campaign.target_filter.as_ref())
                .into_iter()
                .filter(|s| !recorded.contains(&s.id))
                .collect();
        info!(
            run_id = run.id,
            campaign_id = campaign.id,
            already_recorded = recorded.len(),
            remaining = remaining.len(),
            "resuming dispatch run"
        );

        Ok(Some(self.spawn(DispatchJob {
            campaign_id: campaign.id,
            keys: prepared.keys,
            run,
            subscribers: remaining,
            payload: prepared.payload,
        })))
    }

    /// Stop launching batches and wait up to `grace` for in-flight ones.
    ///
    /// Returns true when every dispatch settled in time. Runs interrupted
    /// here stay `running` and are picked up by the next
    /// [`resume_unfinished`](Self::resume_unfinished).
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.cancel.cancel();
        self.tasks.close();
        let drained = tokio::time::timeout(grace, self.tasks.wait()).await.is_ok();
        if drained {
            info!("all dispatches settled");
        } else {
            warn!(
                pending = self.tasks.len(),
                grace_secs = grace.as_secs(),
                "shutdown grace elapsed with dispatches still running"
            );
        }
        drained
    }
}
