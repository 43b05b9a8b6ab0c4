// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push transport trait for delivering one encrypted message to one endpoint.

use async_trait::async_trait;

use crate::delivery::{DeliveryOutcome, PushTarget};
use crate::traits::adapter::PluginAdapter;
use crate::types::VapidKeys;

/// Adapter that delivers a payload to a browser push service.
///
/// Implementations encrypt `payload` for `target`, sign the request with
/// `keys`, and classify the push service's answer. A send never returns a
/// system error: every failure is a [`DeliveryError`](crate::DeliveryError)
/// scoped to this one subscriber.
#[async_trait]
pub trait PushTransport: PluginAdapter {
    async fn send(
        &self,
        target: &PushTarget,
        payload: &[u8],
        keys: &VapidKeys,
        ttl_secs: u32,
    ) -> DeliveryOutcome;
}
