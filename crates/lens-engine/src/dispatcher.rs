// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batch dispatcher.
//!
//! Subscribers are split into fixed-size batches. Every send in a batch runs
//! concurrently and the batch is awaited as a unit, so at most `batch_size`
//! requests are in flight. Batches run one after another with a pause in
//! between, and the run checkpoint is persisted after each one.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use lens_config::model::DispatchConfig;
use lens_core::types::{DispatchRun, DispatchSummary, RunCheckpoint, RunStatus, Subscriber, VapidKeys};
use lens_core::{DeliveryError, LensError, PushTarget, PushTransport, StorageAdapter};

use crate::recorder::DeliveryRecorder;

/// Pacing and per-message settings for a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub ttl_secs: u32,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_pause: Duration::from_secs(1),
            ttl_secs: 86_400,
        }
    }
}

impl From<&DispatchConfig> for DispatchSettings {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            batch_pause: config.batch_pause(),
            ttl_secs: config.ttl_secs,
        }
    }
}

/// Everything one dispatch needs, resolved before it starts.
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub campaign_id: i64,
    pub keys: VapidKeys,
    /// The persisted run; its counters are the starting point.
    pub run: DispatchRun,
    pub subscribers: Vec<Subscriber>,
    pub payload: Vec<u8>,
}

/// How a dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every batch was sent and the run marked completed.
    Completed,
    /// Shutdown was requested between batches. The run stays `running`.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub run_id: i64,
    pub summary: DispatchSummary,
    pub batches_completed: u64,
    pub outcome: DispatchOutcome,
}

pub struct BatchDispatcher {
    storage: Arc<dyn StorageAdapter>,
    transport: Arc<dyn PushTransport>,
    recorder: DeliveryRecorder,
    settings: DispatchSettings,
}

impl BatchDispatcher {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        transport: Arc<dyn PushTransport>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            recorder: DeliveryRecorder::new(storage.clone()),
            storage,
            transport,
            settings,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Send `job.payload` to every subscriber of the job.
    ///
    /// Per-subscriber failures are recorded and counted, never returned. The
    /// only error is a failed checkpoint, which marks the run aborted; rows
    /// already recorded stay.
    pub async fn dispatch(
        &self,
        job: DispatchJob,
        cancel: &CancellationToken,
    ) -> Result<DispatchReport, LensError> {
        let span = info_span!("dispatch", campaign_id = job.campaign_id, run_id = job.run.id);
        self.run_batches(job, cancel).instrument(span).await
    }

    async fn run_batches(
        &self,
        job: DispatchJob,
        cancel: &CancellationToken,
    ) -> Result<DispatchReport, LensError> {
        let batch_size = self.settings.batch_size.max(1);
        let total_batches = job.subscribers.len().div_ceil(batch_size);
        let mut summary = DispatchSummary {
            successful: job.run.successful,
            failed: job.run.failed,
        };
        let mut batches_completed = job.run.batches_completed;
        info!(
            subscribers = job.subscribers.len(),
            batches = total_batches,
            batch_size,
            "dispatch started"
        );

        for (index, batch) in job.subscribers.chunks(batch_size).enumerate() {
            if index > 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.settings.batch_pause) => {}
                }
            }
            if cancel.is_cancelled() {
                info!(
                    batches_completed,
                    remaining = total_batches - index,
                    "dispatch cancelled, run left resumable"
                );
                return Ok(DispatchReport {
                    run_id: job.run.id,
                    summary,
                    batches_completed,
                    outcome: DispatchOutcome::Cancelled,
                });
            }

            let counts = self.send_batch(&job, batch).await;
            summary.successful += counts.successful;
            summary.failed += counts.failed;
            batches_completed += 1;
            debug!(
                batch = index + 1,
                of = total_batches,
                successful = counts.successful,
                failed = counts.failed,
                "batch settled"
            );

            let checkpoint = RunCheckpoint {
                batches_completed,
                successful: summary.successful,
                failed: summary.failed,
            };
            if let Err(e) = self.storage.checkpoint_dispatch_run(job.run.id, checkpoint).await {
                error!(error = %e, "run checkpoint failed, aborting dispatch");
                if let Err(abort) = self
                    .storage
                    .finish_dispatch_run(job.run.id, RunStatus::Aborted)
                    .await
                {
                    warn!(error = %abort, "could not mark run aborted");
                }
                return Err(e);
            }
        }

        self.storage
            .finish_dispatch_run(job.run.id, RunStatus::Completed)
            .await?;
        info!(
            successful = summary.successful,
            failed = summary.failed,
            "dispatch completed"
        );
        Ok(DispatchReport {
            run_id: job.run.id,
            summary,
            batches_completed,
            outcome: DispatchOutcome::Completed,
        })
    }

    /// Send one batch concurrently. A transport panic fails only the
    /// subscriber it happened for; a panic outside per-subscriber work counts
    /// the whole batch as failed.
    async fn send_batch(&self, job: &DispatchJob, batch: &[Subscriber]) -> DispatchSummary {
        let sends = batch.iter().map(|subscriber| self.deliver(job, subscriber));
        match AssertUnwindSafe(join_all(sends)).catch_unwind().await {
            Ok(results) => {
                let successful = results.iter().filter(|ok| **ok).count() as u64;
                DispatchSummary {
                    successful,
                    failed: results.len() as u64 - successful,
                }
            }
            Err(_) => {
                error!(
                    subscribers = batch.len(),
                    "batch panicked, counting every subscriber in it as failed"
                );
                DispatchSummary {
                    successful: 0,
                    failed: batch.len() as u64,
                }
            }
        }
    }

    async fn deliver(&self, job: &DispatchJob, subscriber: &Subscriber) -> bool {
        let target = PushTarget::from(subscriber);
        let send = self
            .transport
            .send(&target, &job.payload, &job.keys, self.settings.ttl_secs);
        let outcome = match AssertUnwindSafe(send).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(subscriber_id = subscriber.id, "push transport panicked");
                Err(DeliveryError::internal("push transport panicked"))
            }
        };
        if let Err(e) = &outcome {
            debug!(subscriber_id = subscriber.id, kind = ?e.kind, error = %e, "delivery failed");
        }
        if let Err(e) = self
            .recorder
            .record(job.campaign_id, job.run.id, subscriber, &outcome)
            .await
        {
            error!(subscriber_id = subscriber.id, error = %e, "failed to record delivery outcome");
        }
        outcome.is_ok()
    }
}
