// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery record operations: per-run inserts, engagement updates, counters.

use chrono::{DateTime, Utc};
use lens_core::LensError;
use lens_core::types::{EngagementEvent, NewNotification, Notification, NotificationStats};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err, now};
use crate::models::{NOTIFICATION_COLUMNS, count_column, notification_from_row};

/// Insert a delivery record.
///
/// The `(dispatch_run_id, subscriber_id)` pair is unique; a second insert for
/// the same pair is ignored and yields `None`.
pub async fn record_notification(
    db: &Database,
    notification: &NewNotification,
) -> Result<Option<Notification>, LensError> {
    let n = notification.clone();
    let created_at = now();

    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<Notification>> {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO notifications
                     (campaign_id, subscriber_id, dispatch_run_id, status, error,
                      user_agent, sent_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    n.campaign_id,
                    n.subscriber_id,
                    n.dispatch_run_id,
                    n.status.to_string(),
                    n.error,
                    n.user_agent,
                    n.sent_at,
                    created_at,
                ],
            )?;
            if inserted == 0 {
                return Ok(None);
            }
            let id = conn.last_insert_rowid();
            conn.query_row(
                &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
                params![id],
                notification_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// All delivery records of a campaign, oldest first.
pub async fn list_notifications(
    db: &Database,
    campaign_id: i64,
) -> Result<Vec<Notification>, LensError> {
    db.connection()
        .call(move |conn| -> rusqlite::Result<Vec<Notification>> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE campaign_id = ?1 ORDER BY id ASC"
            ))?;
            let rows = stmt.query_map(params![campaign_id], notification_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a click or close callback to a delivery record of `campaign_id`.
pub async fn record_engagement(
    db: &Database,
    campaign_id: i64,
    notification_id: i64,
    event: EngagementEvent,
    at: DateTime<Utc>,
    user_agent: Option<&str>,
) -> Result<Option<Notification>, LensError> {
    let sql = match event {
        EngagementEvent::Clicked => {
            "UPDATE notifications
             SET status = ?3, clicked_at = ?4, user_agent = COALESCE(?5, user_agent)
             WHERE id = ?1 AND campaign_id = ?2"
        }
        EngagementEvent::Closed => {
            "UPDATE notifications
             SET status = ?3, closed_at = ?4, user_agent = COALESCE(?5, user_agent)
             WHERE id = ?1 AND campaign_id = ?2"
        }
    };
    let status = event.status().to_string();
    let user_agent = user_agent.map(str::to_string);

    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<Notification>> {
            let changed = conn.execute(
                sql,
                params![notification_id, campaign_id, status, at, user_agent],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            conn.query_row(
                &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
                params![notification_id],
                notification_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Aggregate counters for a campaign.
///
/// `sent` counts every record the push service accepted, including those
/// later clicked or closed.
pub async fn notification_stats(
    db: &Database,
    campaign_id: i64,
) -> Result<NotificationStats, LensError> {
    db.connection()
        .call(move |conn| -> rusqlite::Result<NotificationStats> {
            conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(status != 'failed'), 0),
                        COALESCE(SUM(status = 'failed'), 0),
                        COALESCE(SUM(clicked_at IS NOT NULL), 0),
                        COALESCE(SUM(closed_at IS NOT NULL), 0)
                 FROM notifications WHERE campaign_id = ?1",
                params![campaign_id],
                |row| {
                    Ok(NotificationStats {
                        total: count_column(row, 0)?,
                        sent: count_column(row, 1)?,
                        failed: count_column(row, 2)?,
                        clicked: count_column(row, 3)?,
                        closed: count_column(row, 4)?,
                    })
                },
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Subscriber ids already holding a record in the dispatch run.
pub async fn recorded_subscriber_ids(db: &Database, run_id: i64) -> Result<Vec<i64>, LensError> {
    db.connection()
        .call(move |conn| -> rusqlite::Result<Vec<i64>> {
            let mut stmt = conn.prepare(
                "SELECT subscriber_id FROM notifications
                 WHERE dispatch_run_id = ?1 ORDER BY subscriber_id ASC",
            )?;
            let rows = stmt.query_map(params![run_id], |row| row.get(0))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
