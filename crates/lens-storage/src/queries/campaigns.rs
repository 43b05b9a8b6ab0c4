// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign authoring and lifecycle transitions.

use chrono::{DateTime, Utc};
use lens_core::LensError;
use lens_core::types::{Campaign, CampaignStatus, NewCampaign};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err, now};
use crate::models::{CAMPAIGN_COLUMNS, CampaignRow};

/// Store a new draft campaign.
pub async fn create_campaign(db: &Database, campaign: &NewCampaign) -> Result<Campaign, LensError> {
    if campaign.title.trim().is_empty() || campaign.body.trim().is_empty() {
        return Err(LensError::InvalidInput("title and body are required".into()));
    }
    let target_filter = match &campaign.target_filter {
        Some(filter) => {
            filter.validate()?;
            Some(filter.to_json()?)
        }
        None => None,
    };
    let domain_id = campaign.domain_id;
    let fields = campaign.clone();
    let created_at = now();

    let row = db
        .connection()
        .call(move |conn| -> rusqlite::Result<Option<CampaignRow>> {
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
                "INSERT INTO campaigns
                     (domain_id, title, body, icon, image, badge, click_url,
                      target_type, target_filter, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'draft', ?10)",
                params![
                    domain_id,
                    fields.title,
                    fields.body,
                    fields.icon,
                    fields.image,
                    fields.badge,
                    fields.click_url,
                    fields.target_type.to_string(),
                    target_filter,
                    created_at,
                ],
            )?;
            let id = tx.last_insert_rowid();
            let row = tx.query_row(
                &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"),
                params![id],
                CampaignRow::from_row,
            )?;
            tx.commit()?;
            Ok(Some(row))
        })
        .await
        .map_err(map_tr_err)?;

    row.ok_or(LensError::DomainNotFound(domain_id))?
        .into_campaign()
}

/// Fetch a campaign by id.
pub async fn get_campaign(db: &Database, id: i64) -> Result<Option<Campaign>, LensError> {
    let row = db
        .connection()
        .call(move |conn| -> rusqlite::Result<Option<CampaignRow>> {
            conn.query_row(
                &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"),
                params![id],
                CampaignRow::from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;

    row.map(CampaignRow::into_campaign).transpose()
}

/// Campaigns currently in `status`, oldest first.
pub async fn list_campaigns_with_status(
    db: &Database,
    status: CampaignStatus,
) -> Result<Vec<Campaign>, LensError> {
    let status = status.to_string();
    let rows = db
        .connection()
        .call(move |conn| -> rusqlite::Result<Vec<CampaignRow>> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE status = ?1 ORDER BY id ASC"
            ))?;
            let rows = stmt.query_map(params![status], CampaignRow::from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)?;

    rows.into_iter().map(CampaignRow::into_campaign).collect()
}

/// Move a campaign from `expected` to `next` in a single conditional UPDATE.
///
/// Returns false when the stored status differs from `expected`; concurrent
/// callers racing on the same transition see exactly one `true`.
pub async fn compare_and_set_status(
    db: &Database,
    id: i64,
    expected: CampaignStatus,
    next: CampaignStatus,
    sent_at: Option<DateTime<Utc>>,
) -> Result<bool, LensError> {
    if !expected.can_transition_to(next) {
        return Err(LensError::Internal(format!(
            "illegal campaign transition {expected} -> {next}"
        )));
    }
    let expected = expected.to_string();
    let next = next.to_string();

    db.connection()
        .call(move |conn| -> rusqlite::Result<bool> {
            let changed = conn.execute(
                "UPDATE campaigns
                 SET status = ?3, sent_at = COALESCE(?4, sent_at), version = version + 1
                 WHERE id = ?1 AND status = ?2",
                params![id, expected, next, sent_at],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}
