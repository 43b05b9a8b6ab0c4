// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The JSON document the service worker receives for a campaign.

use serde::Serialize;

use lens_core::LensError;
use lens_core::types::Campaign;

/// Wire payload of a campaign push. Absent optionals are omitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub campaign_id: i64,
    /// Lets the browser collapse repeated displays of one campaign.
    pub tag: String,
}

impl PushPayload {
    pub fn from_campaign(campaign: &Campaign) -> Self {
        Self {
            title: campaign.title.clone(),
            body: campaign.body.clone(),
            icon: campaign.icon.clone(),
            image: campaign.image.clone(),
            badge: campaign.badge.clone(),
            url: campaign.click_url.clone(),
            campaign_id: campaign.id,
            tag: format!("campaign-{}", campaign.id),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, LensError> {
        serde_json::to_vec(self)
            .map_err(|e| LensError::Internal(format!("failed to serialize push payload: {e}")))
    }
}
