// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign lifecycle: draft -> sending -> sent, with a sending -> draft
//! rollback for sends that never launched.
//!
//! Every transition is a compare-and-set against the stored status, so two
//! concurrent send requests cannot both enter `sending`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use lens_core::types::{Campaign, CampaignStatus};
use lens_core::{LensError, StorageAdapter};

/// Guards campaign status changes.
#[derive(Clone)]
pub struct CampaignStateMachine {
    storage: Arc<dyn StorageAdapter>,
}

impl CampaignStateMachine {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    /// Refuse campaigns that are already sent or sending.
    pub fn check_sendable(campaign: &Campaign) -> Result<(), LensError> {
        match campaign.status {
            CampaignStatus::Sent => Err(LensError::AlreadySent(campaign.id)),
            CampaignStatus::Sending => Err(LensError::AlreadySending(campaign.id)),
            CampaignStatus::Draft => Ok(()),
        }
    }

    /// Move a draft campaign to `sending`. Returns the previous status.
    ///
    /// Losing the compare-and-set to a concurrent request reports the status
    /// the winner left behind.
    pub async fn begin_send(&self, campaign: &Campaign) -> Result<CampaignStatus, LensError> {
        Self::check_sendable(campaign)?;
        let swapped = self
            .storage
            .compare_and_set_campaign_status(
                campaign.id,
                CampaignStatus::Draft,
                CampaignStatus::Sending,
                None,
            )
            .await?;
        if swapped {
            info!(campaign_id = campaign.id, "campaign entered sending");
            return Ok(CampaignStatus::Draft);
        }

        let current = self
            .storage
            .get_campaign(campaign.id)
            .await?
            .ok_or(LensError::CampaignNotFound(campaign.id))?;
        Self::check_sendable(&current)?;
        // Stored status is draft again: a competing send rolled back between
        // our read and our write. Report it as in progress.
        Err(LensError::AlreadySending(campaign.id))
    }

    /// Mark a sending campaign `sent`.
    pub async fn finalize_send(
        &self,
        campaign_id: i64,
        sent_at: DateTime<Utc>,
    ) -> Result<(), LensError> {
        let swapped = self
            .storage
            .compare_and_set_campaign_status(
                campaign_id,
                CampaignStatus::Sending,
                CampaignStatus::Sent,
                Some(sent_at),
            )
            .await?;
        if !swapped {
            return Err(LensError::Internal(format!(
                "campaign {campaign_id} left sending before it was finalized"
            )));
        }
        info!(campaign_id, %sent_at, "campaign marked sent");
        Ok(())
    }

    /// Return a sending campaign to `draft`.
    pub async fn rollback(&self, campaign_id: i64) -> Result<(), LensError> {
        let swapped = self
            .storage
            .compare_and_set_campaign_status(
                campaign_id,
                CampaignStatus::Sending,
                CampaignStatus::Draft,
                None,
            )
            .await?;
        if swapped {
            warn!(campaign_id, "campaign rolled back to draft");
        } else {
            warn!(campaign_id, "rollback skipped, campaign is no longer sending");
        }
        Ok(())
    }
}
