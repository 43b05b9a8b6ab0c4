// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Query modules accept `&Database` and call through `connection().call()`;
//! do not open additional connections for writes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use lens_core::LensError;
use tracing::debug;

use crate::migrations;

/// How long a statement waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Convert a tokio-rusqlite error into [`LensError::Storage`].
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> LensError {
    LensError::storage(e)
}

/// Current time truncated to milliseconds, the precision rows are stored with.
pub(crate) fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Handle to the Traffic-Lens SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` in WAL mode and run
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, LensError> {
        Self::open_with_options(path, true).await
    }

    /// Open the database, choosing the journal mode explicitly.
    pub async fn open_with_options(path: &str, wal_mode: bool) -> Result<Self, LensError> {
        let setup_path = path.to_string();
        tokio::task::spawn_blocking(move || prepare(&setup_path, wal_mode))
            .await
            .map_err(|e| LensError::Internal(format!("database setup task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(LensError::storage)?;

        // Per-connection settings; the journal mode persists in the file.
        conn.call(|conn| -> rusqlite::Result<()> {
            conn.pragma_update(None, "foreign_keys", true)?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The single writer connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL so the main database file is self-contained.
    pub async fn checkpoint(&self) -> Result<(), LensError> {
        self.conn
            .call(|conn| -> rusqlite::Result<()> {
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoint and release the connection.
    pub async fn close(self) -> Result<(), LensError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(LensError::storage)
    }
}

/// Synchronous first-open work: journal mode and schema migrations.
fn prepare(path: &str, wal_mode: bool) -> Result<(), LensError> {
    let mut conn = rusqlite::Connection::open(path).map_err(LensError::storage)?;
    let mode = if wal_mode { "WAL" } else { "DELETE" };
    let applied: String = conn
        .pragma_update_and_check(None, "journal_mode", mode, |row| row.get(0))
        .map_err(LensError::storage)?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .map_err(LensError::storage)?;
    debug!(journal_mode = %applied, "journal mode set");
    migrations::run_migrations(&mut conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schema.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> rusqlite::Result<Vec<String>> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                stmt.query_map([], |row| row.get(0))?.collect()
            })
            .await
            .unwrap();

        for table in ["campaigns", "dispatch_runs", "domains", "notifications", "subscribers"] {
            assert!(tables.iter().any(|t| t == table), "missing table {table}");
        }
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopening_does_not_rerun_migrations() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reopen.db");
        let path = path.to_str().unwrap();

        Database::open(path).await.unwrap().close().await.unwrap();
        let db = Database::open(path).await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fk.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let result = db
            .connection()
            .call(|conn| -> rusqlite::Result<usize> {
                conn.execute(
                    "INSERT INTO subscribers (domain_id, endpoint, p256dh, auth, subscribed_at, last_seen)
                     VALUES (999, 'https://push.example/x', 'k', 'a', '2026-01-01', '2026-01-01')",
                    [],
                )
            })
            .await;
        assert!(result.is_err(), "insert with dangling domain_id must fail");
        db.close().await.unwrap();
    }
}
