// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP transport delivering encrypted messages to browser push services.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use tracing::{debug, warn};

use lens_config::model::PushConfig;
use lens_core::types::{AdapterType, HealthStatus, VapidKeys};
use lens_core::{DeliveryError, DeliveryOutcome, LensError, PluginAdapter, PushTarget, PushTransport};

use crate::encoding;
use crate::{ece, vapid::VapidSigner};

/// Longest response body excerpt kept in a failure message.
const ERROR_BODY_LIMIT: usize = 256;

/// Web Push transport over HTTPS.
pub struct WebPushTransport {
    client: reqwest::Client,
    subject: String,
}

impl WebPushTransport {
    pub fn new(config: &PushConfig) -> Result<Self, LensError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LensError::Push {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            subject: config.vapid_subject.clone(),
        })
    }

    fn encrypt_for(target: &PushTarget, payload: &[u8]) -> Result<Vec<u8>, DeliveryError> {
        let p256dh = encoding::decode_key(&target.p256dh)
            .map_err(|e| DeliveryError::encoding(format!("p256dh is not base64: {e}")))?;
        let auth = encoding::decode_key(&target.auth)
            .map_err(|e| DeliveryError::encoding(format!("auth secret is not base64: {e}")))?;
        ece::encrypt(&p256dh, &auth, payload)
    }
}

/// Map a push service response status onto a delivery outcome.
///
/// Only 410 means the subscription is gone for good. Everything else that is
/// not a success, including 404 and 429, is a rejection of this message.
pub fn classify_status(status: StatusCode, body: &str) -> DeliveryOutcome {
    if status.is_success() {
        return Ok(());
    }
    let detail = body.trim();
    let detail = match detail.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((cut, _)) => &detail[..cut],
        None => detail,
    };
    let message = if detail.is_empty() {
        format!("push service responded {status}")
    } else {
        format!("push service responded {status}: {detail}")
    };
    if status == StatusCode::GONE {
        Err(DeliveryError::gone(message))
    } else {
        Err(DeliveryError::rejected(status.as_u16(), message))
    }
}

#[async_trait]
impl PluginAdapter for WebPushTransport {
    fn name(&self) -> &str {
        "web-push"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, LensError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LensError> {
        Ok(())
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    async fn send(
        &self,
        target: &PushTarget,
        payload: &[u8],
        keys: &VapidKeys,
        ttl_secs: u32,
    ) -> DeliveryOutcome {
        let body = Self::encrypt_for(target, payload)?;
        let authorization =
            VapidSigner::new(keys)?.authorization(&target.endpoint, &self.subject, Utc::now())?;

        let response = self
            .client
            .post(&target.endpoint)
            .header("TTL", ttl_secs.to_string())
            .header("Content-Encoding", "aes128gcm")
            .header("Content-Type", "application/octet-stream")
            .header("Authorization", authorization)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!(endpoint = %target.endpoint, error = %e, "push request failed");
                DeliveryError::network(format!("push request failed: {e}"))
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(endpoint = %target.endpoint, %status, "push accepted");
            return Ok(());
        }
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                debug!(
                    endpoint = %target.endpoint,
                    %status,
                    error = %e,
                    "could not read push service response body"
                );
                String::new()
            }
        };
        classify_status(status, &text)
    }
}
