// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch run bookkeeping: creation, per-batch checkpoints, completion.

use lens_core::LensError;
use lens_core::types::{DispatchRun, RunCheckpoint, RunStatus};
use rusqlite::{OptionalExtension, params};

use super::sql_count;
use crate::database::{Database, map_tr_err, now};
use crate::models::{DISPATCH_RUN_COLUMNS, dispatch_run_from_row};

/// Open a new `running` dispatch run for a campaign.
pub async fn create_dispatch_run(
    db: &Database,
    campaign_id: i64,
    total_subscribers: u64,
    batch_size: u64,
) -> Result<DispatchRun, LensError> {
    let started_at = now();
    let total = sql_count(total_subscribers);
    let batch = sql_count(batch_size);

    db.connection()
        .call(move |conn| -> rusqlite::Result<DispatchRun> {
            conn.execute(
                "INSERT INTO dispatch_runs
                     (campaign_id, status, total_subscribers, batch_size, started_at, updated_at)
                 VALUES (?1, 'running', ?2, ?3, ?4, ?4)",
                params![campaign_id, total, batch, started_at],
            )?;
            let id = conn.last_insert_rowid();
            conn.query_row(
                &format!("SELECT {DISPATCH_RUN_COLUMNS} FROM dispatch_runs WHERE id = ?1"),
                params![id],
                dispatch_run_from_row,
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a dispatch run by id.
pub async fn get_dispatch_run(db: &Database, id: i64) -> Result<Option<DispatchRun>, LensError> {
    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<DispatchRun>> {
            conn.query_row(
                &format!("SELECT {DISPATCH_RUN_COLUMNS} FROM dispatch_runs WHERE id = ?1"),
                params![id],
                dispatch_run_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Persist progress after a batch. Only `running` runs accept checkpoints.
pub async fn checkpoint_dispatch_run(
    db: &Database,
    id: i64,
    checkpoint: RunCheckpoint,
) -> Result<(), LensError> {
    let updated_at = now();
    let batches = sql_count(checkpoint.batches_completed);
    let successful = sql_count(checkpoint.successful);
    let failed = sql_count(checkpoint.failed);

    let changed = db
        .connection()
        .call(move |conn| -> rusqlite::Result<usize> {
            conn.execute(
                "UPDATE dispatch_runs
                 SET batches_completed = ?2, successful = ?3, failed = ?4, updated_at = ?5
                 WHERE id = ?1 AND status = 'running'",
                params![id, batches, successful, failed, updated_at],
            )
        })
        .await
        .map_err(map_tr_err)?;

    if changed == 0 {
        return Err(LensError::Internal(format!(
            "dispatch run {id} is missing or no longer running"
        )));
    }
    Ok(())
}

/// Close a run as `completed` or `aborted`.
pub async fn finish_dispatch_run(db: &Database, id: i64, status: RunStatus) -> Result<(), LensError> {
    if status == RunStatus::Running {
        return Err(LensError::Internal(
            "a dispatch run cannot be finished as running".into(),
        ));
    }
    let finished_at = now();
    let status = status.to_string();

    db.connection()
        .call(move |conn| -> rusqlite::Result<()> {
            conn.execute(
                "UPDATE dispatch_runs SET status = ?2, finished_at = ?3, updated_at = ?3
                 WHERE id = ?1",
                params![id, status, finished_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Runs still marked `running`, oldest first.
pub async fn list_unfinished_dispatch_runs(db: &Database) -> Result<Vec<DispatchRun>, LensError> {
    db.connection()
        .call(|conn| -> rusqlite::Result<Vec<DispatchRun>> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DISPATCH_RUN_COLUMNS} FROM dispatch_runs
                 WHERE status = 'running' ORDER BY id ASC"
            ))?;
            let rows = stmt.query_map([], dispatch_run_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
