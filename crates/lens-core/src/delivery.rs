// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-subscriber delivery primitives shared by transports and the dispatcher.

use thiserror::Error;

use crate::types::Subscriber;

/// The endpoint and encryption keys a push message is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTarget {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

impl From<&Subscriber> for PushTarget {
    fn from(subscriber: &Subscriber) -> Self {
        Self {
            endpoint: subscriber.endpoint.clone(),
            p256dh: subscriber.p256dh.clone(),
            auth: subscriber.auth.clone(),
        }
    }
}

/// Why a single push delivery failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryErrorKind {
    /// The push service reported the subscription as permanently gone (HTTP 410).
    Gone,
    /// The push service rejected the message with a non-success status.
    Rejected { status: u16 },
    /// The push service could not be reached.
    Network,
    /// The message could not be encrypted or signed for this subscriber.
    Encoding,
    /// The transport failed unexpectedly, e.g. it panicked mid-send.
    Internal,
}

/// A failed delivery to one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DeliveryError {
    pub kind: DeliveryErrorKind,
    pub message: String,
}

impl DeliveryError {
    pub fn new(kind: DeliveryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn gone(message: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::Gone, message)
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::Rejected { status }, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::Network, message)
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::Encoding, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::Internal, message)
    }

    /// The endpoint will never accept messages again; the subscriber should be deactivated.
    pub fn is_permanent(&self) -> bool {
        self.kind == DeliveryErrorKind::Gone
    }
}

/// Result of a single push send.
pub type DeliveryOutcome = Result<(), DeliveryError>;
