// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock push transport for deterministic dispatch testing.
//!
//! `MockTransport` implements `PushTransport` with per-endpoint scripted
//! outcomes, captures every payload it is handed, and tracks how many sends
//! were in flight at once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use lens_core::types::{AdapterType, HealthStatus, VapidKeys};
use lens_core::{DeliveryError, DeliveryOutcome, LensError, PluginAdapter, PushTarget, PushTransport};

/// One captured call to [`PushTransport::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPush {
    pub endpoint: String,
    pub payload: Vec<u8>,
    pub public_key: String,
    pub ttl_secs: u32,
}

impl SentPush {
    /// The payload parsed as JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

/// A scripted push transport.
///
/// Endpoints without a script succeed. Clones share state, so a test can keep
/// one handle while the engine owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    scripted: Arc<Mutex<HashMap<String, DeliveryError>>>,
    panicking: Arc<Mutex<HashSet<String>>>,
    sent: Arc<Mutex<Vec<SentPush>>>,
    latency: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send sleeps for `latency` before answering, so concurrent sends
    /// overlap observably.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Script a failure for one endpoint.
    pub async fn fail_endpoint(&self, endpoint: impl Into<String>, error: DeliveryError) {
        self.scripted.lock().await.insert(endpoint.into(), error);
    }

    /// Make sends to `endpoint` panic, simulating a bug inside the transport.
    pub async fn panic_on(&self, endpoint: impl Into<String>) {
        self.panicking.lock().await.insert(endpoint.into());
    }

    /// Every payload handed to `send`, in call order.
    pub async fn sent(&self) -> Vec<SentPush> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Highest number of sends observed in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
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
impl PushTransport for MockTransport {
    async fn send(
        &self,
        target: &PushTarget,
        payload: &[u8],
        keys: &VapidKeys,
        ttl_secs: u32,
    ) -> DeliveryOutcome {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.sent.lock().await.push(SentPush {
            endpoint: target.endpoint.clone(),
            payload: payload.to_vec(),
            public_key: keys.public_key.clone(),
            ttl_secs,
        });

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panicking.lock().await.contains(&target.endpoint) {
            panic!("mock transport panic for {}", target.endpoint);
        }
        match self.scripted.lock().await.get(&target.endpoint) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
