// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lens runs` command implementation: lists dispatch runs still `running`.

use lens_config::LensConfig;
use lens_core::types::DispatchRun;
use lens_core::{LensError, StorageAdapter};

use crate::serve::open_storage;

/// Runs the `lens runs` command.
pub async fn run_runs(config: LensConfig, json: bool) -> Result<(), LensError> {
    let storage = open_storage(&config).await?;
    let runs = storage.list_unfinished_dispatch_runs().await?;
    storage.close().await?;

    if json {
        let out = serde_json::to_string_pretty(&runs)
            .map_err(|e| LensError::Internal(format!("failed to serialize runs: {e}")))?;
        println!("{out}");
    } else if runs.is_empty() {
        println!("no unfinished dispatch runs");
    } else {
        println!("{}", header());
        for run in &runs {
            println!("{}", row(run));
        }
    }
    Ok(())
}

fn header() -> String {
    format!(
        "{:>6}  {:>8}  {:>9}  {:>7}  {:>9}  {:>6}  {}",
        "RUN", "CAMPAIGN", "PROGRESS", "BATCHES", "DELIVERED", "FAILED", "UPDATED"
    )
}

fn row(run: &DispatchRun) -> String {
    let progress = format!("{}/{}", run.successful + run.failed, run.total_subscribers);
    format!(
        "{:>6}  {:>8}  {:>9}  {:>7}  {:>9}  {:>6}  {}",
        run.id,
        run.campaign_id,
        progress,
        run.batches_completed,
        run.successful,
        run.failed,
        run.updated_at.format("%Y-%m-%d %H:%M:%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lens_core::types::RunStatus;

    #[test]
    fn row_shows_progress_against_total() {
        let now = chrono::Utc::now();
        let run = DispatchRun {
            id: 3,
            campaign_id: 12,
            status: RunStatus::Running,
            total_subscribers: 250,
            batch_size: 100,
            batches_completed: 1,
            successful: 97,
            failed: 3,
            started_at: now,
            updated_at: now,
            finished_at: None,
        };
        let line = row(&run);
        assert!(line.contains("100/250"));
        assert!(line.contains(" 12 "));
        assert!(header().starts_with("   RUN"));
    }
}
