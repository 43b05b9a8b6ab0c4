// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lens send` command implementation.
//!
//! Sends one campaign in-process and waits for the dispatch to end. Ctrl+C
//! stops after the batch in flight; the run is left for `lens serve` to
//! resume.

use tracing::{error, warn};

use lens_config::LensConfig;
use lens_core::{LensError, StorageAdapter};
use lens_engine::DispatchOutcome;

use crate::serve::{build_engine, init_tracing};
use crate::shutdown;

/// Runs the `lens send` command.
pub async fn run_send(config: LensConfig, campaign_id: i64) -> Result<(), LensError> {
    init_tracing(&config.server.log_level);

    let (storage, engine) = build_engine(&config).await?;
    let cancel = shutdown::install_signal_handler();

    let receipt = engine.orchestrator.send(campaign_id).await?;
    println!(
        "campaign {campaign_id}: {} ({} subscribers)",
        receipt.message, receipt.total_subscribers
    );

    if let Some(dispatch) = receipt.dispatch {
        let run_id = dispatch.run_id;
        let orchestrator = engine.orchestrator.clone();
        let grace = config.dispatch.shutdown_grace();
        let stopper = tokio::spawn(async move {
            cancel.cancelled().await;
            orchestrator.shutdown(grace).await
        });

        let result = dispatch.wait().await;
        stopper.abort();
        match result {
            Ok(report) => {
                let outcome = match report.outcome {
                    DispatchOutcome::Completed => "completed",
                    DispatchOutcome::Cancelled => "interrupted",
                };
                println!(
                    "run {run_id} {outcome}: {} delivered, {} failed, {} batches",
                    report.summary.successful, report.summary.failed, report.batches_completed
                );
                if report.outcome == DispatchOutcome::Cancelled {
                    warn!(run_id, "run left unfinished, `lens serve` will resume it");
                }
            }
            Err(e) => {
                error!(run_id, error = %e, "dispatch aborted");
                close(storage.as_ref()).await;
                return Err(e);
            }
        }
    }

    close(storage.as_ref()).await;
    Ok(())
}

async fn close(storage: &dyn StorageAdapter) {
    if let Err(e) = storage.close().await {
        error!(error = %e, "failed to close storage cleanly");
    }
}
