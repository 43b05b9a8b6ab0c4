// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row mapping between SQLite and the domain types in `lens-core`.
//!
//! The canonical types live in `lens_core::types` and are re-exported here.
//! Enum columns are stored as their lowercase names; campaign target filters
//! are stored as JSON text and parsed after the row is read.

use std::str::FromStr;

use rusqlite::Row;
use rusqlite::types::Type;

use lens_core::LensError;
pub use lens_core::types::{
    Campaign, CampaignStatus, DispatchRun, Domain, Notification, NotificationStatus, RunStatus,
    Subscriber, TargetFilter, TargetType,
};

/// Parse a text column into a strum-backed enum.
pub(crate) fn enum_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a non-negative counter column.
pub(crate) fn count_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

pub(crate) const DOMAIN_COLUMNS: &str =
    "id, hostname, is_active, vapid_public_key, vapid_private_key, created_at";

pub(crate) fn domain_from_row(row: &Row<'_>) -> rusqlite::Result<Domain> {
    Ok(Domain {
        id: row.get(0)?,
        hostname: row.get(1)?,
        is_active: row.get(2)?,
        vapid_public_key: row.get(3)?,
        vapid_private_key: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub(crate) const SUBSCRIBER_COLUMNS: &str = "id, domain_id, endpoint, p256dh, auth, country, city, \
     user_agent, subscribed_at, last_seen, is_active";

pub(crate) fn subscriber_from_row(row: &Row<'_>) -> rusqlite::Result<Subscriber> {
    Ok(Subscriber {
        id: row.get(0)?,
        domain_id: row.get(1)?,
        endpoint: row.get(2)?,
        p256dh: row.get(3)?,
        auth: row.get(4)?,
        country: row.get(5)?,
        city: row.get(6)?,
        user_agent: row.get(7)?,
        subscribed_at: row.get(8)?,
        last_seen: row.get(9)?,
        is_active: row.get(10)?,
    })
}

pub(crate) const CAMPAIGN_COLUMNS: &str = "id, domain_id, title, body, icon, image, badge, \
     click_url, target_type, target_filter, status, sent_at, created_at";

/// A campaign row before its target filter JSON has been parsed.
pub(crate) struct CampaignRow {
    campaign: Campaign,
    target_filter: Option<String>,
}

impl CampaignRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            campaign: Campaign {
                id: row.get(0)?,
                domain_id: row.get(1)?,
                title: row.get(2)?,
                body: row.get(3)?,
                icon: row.get(4)?,
                image: row.get(5)?,
                badge: row.get(6)?,
                click_url: row.get(7)?,
                target_type: enum_column::<TargetType>(row, 8)?,
                target_filter: None,
                status: enum_column::<CampaignStatus>(row, 10)?,
                sent_at: row.get(11)?,
                created_at: row.get(12)?,
            },
            target_filter: row.get(9)?,
        })
    }

    /// Finish the conversion. A stored filter that no longer parses is an
    /// [`LensError::InvalidFilter`].
    pub(crate) fn into_campaign(self) -> Result<Campaign, LensError> {
        let mut campaign = self.campaign;
        campaign.target_filter = match self.target_filter.as_deref().map(str::trim) {
            None | Some("") | Some("null") => None,
            Some(raw) => Some(TargetFilter::from_json(raw)?),
        };
        Ok(campaign)
    }
}

pub(crate) const NOTIFICATION_COLUMNS: &str = "id, campaign_id, subscriber_id, dispatch_run_id, \
     status, error, user_agent, sent_at, clicked_at, closed_at, created_at";

pub(crate) fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        subscriber_id: row.get(2)?,
        dispatch_run_id: row.get(3)?,
        status: enum_column::<NotificationStatus>(row, 4)?,
        error: row.get(5)?,
        user_agent: row.get(6)?,
        sent_at: row.get(7)?,
        clicked_at: row.get(8)?,
        closed_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

pub(crate) const DISPATCH_RUN_COLUMNS: &str = "id, campaign_id, status, total_subscribers, \
     batch_size, batches_completed, successful, failed, started_at, updated_at, finished_at";

pub(crate) fn dispatch_run_from_row(row: &Row<'_>) -> rusqlite::Result<DispatchRun> {
    Ok(DispatchRun {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        status: enum_column::<RunStatus>(row, 2)?,
        total_subscribers: count_column(row, 3)?,
        batch_size: count_column(row, 4)?,
        batches_completed: count_column(row, 5)?,
        successful: count_column(row, 6)?,
        failed: count_column(row, 7)?,
        started_at: row.get(8)?,
        updated_at: row.get(9)?,
        finished_at: row.get(10)?,
    })
}
