// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain (tenant site) operations.

use lens_core::LensError;
use lens_core::types::{Domain, NewDomain};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err, now};
use crate::models::{DOMAIN_COLUMNS, domain_from_row};

/// Insert a domain and return the stored row.
pub async fn create_domain(db: &Database, domain: &NewDomain) -> Result<Domain, LensError> {
    let hostname = domain.hostname.trim().to_string();
    if hostname.is_empty() {
        return Err(LensError::InvalidInput("hostname must not be empty".into()));
    }
    let public_key = domain.vapid_public_key.clone();
    let private_key = domain.vapid_private_key.clone();
    let created_at = now();

    db.connection()
        .call(move |conn| -> rusqlite::Result<Domain> {
            conn.execute(
                "INSERT INTO domains (hostname, is_active, vapid_public_key, vapid_private_key, created_at)
                 VALUES (?1, 1, ?2, ?3, ?4)",
                params![hostname, public_key, private_key, created_at],
            )?;
            let id = conn.last_insert_rowid();
            conn.query_row(
                &format!("SELECT {DOMAIN_COLUMNS} FROM domains WHERE id = ?1"),
                params![id],
                domain_from_row,
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a domain by id.
pub async fn get_domain(db: &Database, id: i64) -> Result<Option<Domain>, LensError> {
    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<Domain>> {
            conn.query_row(
                &format!("SELECT {DOMAIN_COLUMNS} FROM domains WHERE id = ?1"),
                params![id],
                domain_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
