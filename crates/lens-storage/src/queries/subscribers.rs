// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscriber registry operations.

use lens_core::LensError;
use lens_core::types::{NewSubscriber, Subscriber, SubscriberPatch};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err, now};
use crate::models::{SUBSCRIBER_COLUMNS, subscriber_from_row};

/// Register a subscriber, or refresh an existing `(domain_id, endpoint)` pair.
///
/// Re-registration replaces the encryption keys, updates `last_seen`, keeps
/// previously known location fields when the new ones are absent, and
/// reactivates the subscriber.
pub async fn upsert_subscriber(
    db: &Database,
    subscriber: &NewSubscriber,
) -> Result<Subscriber, LensError> {
    let domain_id = subscriber.domain_id;
    let endpoint = subscriber.endpoint.trim().to_string();
    let p256dh = subscriber.p256dh.trim().to_string();
    let auth = subscriber.auth.trim().to_string();
    if endpoint.is_empty() || p256dh.is_empty() || auth.is_empty() {
        return Err(LensError::InvalidInput(
            "endpoint, p256dh and auth are required".into(),
        ));
    }
    let country = subscriber.country.clone();
    let city = subscriber.city.clone();
    let user_agent = subscriber.user_agent.clone();
    let seen = now();

    let stored = db
        .connection()
        .call(move |conn| -> rusqlite::Result<Option<Subscriber>> {
            let tx = conn.transaction()?;
            let domain_exists = tx
                .query_row("SELECT 1 FROM domains WHERE id = ?1", params![domain_id], |_| {
                    Ok(())
                })
                .optional()?
                .is_some();
            if !domain_exists {
                return Ok(None);
            }
            tx.execute(
                "INSERT INTO subscribers
                     (domain_id, endpoint, p256dh, auth, country, city, user_agent,
                      subscribed_at, last_seen, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, 1)
                 ON CONFLICT (domain_id, endpoint) DO UPDATE SET
                     p256dh = excluded.p256dh,
                     auth = excluded.auth,
                     country = COALESCE(excluded.country, subscribers.country),
                     city = COALESCE(excluded.city, subscribers.city),
                     user_agent = COALESCE(excluded.user_agent, subscribers.user_agent),
                     last_seen = excluded.last_seen,
                     is_active = 1",
                params![domain_id, endpoint, p256dh, auth, country, city, user_agent, seen],
            )?;
            let row = tx.query_row(
                &format!(
                    "SELECT {SUBSCRIBER_COLUMNS} FROM subscribers
                     WHERE domain_id = ?1 AND endpoint = ?2"
                ),
                params![domain_id, endpoint],
                subscriber_from_row,
            )?;
            tx.commit()?;
            Ok(Some(row))
        })
        .await
        .map_err(map_tr_err)?;

    stored.ok_or(LensError::DomainNotFound(domain_id))
}

/// Fetch a subscriber by id.
pub async fn get_subscriber(db: &Database, id: i64) -> Result<Option<Subscriber>, LensError> {
    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<Subscriber>> {
            conn.query_row(
                &format!("SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE id = ?1"),
                params![id],
                subscriber_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Active subscribers of a domain, ordered by id.
pub async fn list_active_subscribers(
    db: &Database,
    domain_id: i64,
) -> Result<Vec<Subscriber>, LensError> {
    db.connection()
        .call(move |conn| -> rusqlite::Result<Vec<Subscriber>> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SUBSCRIBER_COLUMNS} FROM subscribers
                 WHERE domain_id = ?1 AND is_active = 1
                 ORDER BY id ASC"
            ))?;
            let rows = stmt.query_map(params![domain_id], subscriber_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Apply an admin patch; absent fields keep their stored values.
pub async fn update_subscriber(
    db: &Database,
    id: i64,
    patch: &SubscriberPatch,
) -> Result<Option<Subscriber>, LensError> {
    let is_active = patch.is_active;
    let user_agent = patch.user_agent.clone();
    let last_seen = patch.last_seen;

    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<Subscriber>> {
            let changed = conn.execute(
                "UPDATE subscribers SET
                     is_active = COALESCE(?2, is_active),
                     user_agent = COALESCE(?3, user_agent),
                     last_seen = COALESCE(?4, last_seen)
                 WHERE id = ?1",
                params![id, is_active, user_agent, last_seen],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            conn.query_row(
                &format!("SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE id = ?1"),
                params![id],
                subscriber_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a subscriber inactive. Returns false when the id is unknown.
pub async fn deactivate_subscriber(db: &Database, id: i64) -> Result<bool, LensError> {
    db.connection()
        .call(move |conn| -> rusqlite::Result<bool> {
            let changed = conn.execute(
                "UPDATE subscribers SET is_active = 0 WHERE id = ?1",
                params![id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a subscriber; its delivery records go with it.
pub async fn delete_subscriber(db: &Database, id: i64) -> Result<bool, LensError> {
    db.connection()
        .call(move |conn| -> rusqlite::Result<bool> {
            let changed = conn.execute("DELETE FROM subscribers WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}
