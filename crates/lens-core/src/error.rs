// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Traffic-Lens push engine.

use thiserror::Error;

/// The primary error type used across all Traffic-Lens adapters and engine operations.
#[derive(Debug, Error)]
pub enum LensError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Push transport errors that are not tied to a single subscriber.
    #[error("push transport error: {message}")]
    Push {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The requested campaign does not exist.
    #[error("campaign {0} not found")]
    CampaignNotFound(i64),

    /// The campaign has already been sent.
    #[error("campaign {0} has already been sent")]
    AlreadySent(i64),

    /// A dispatch for the campaign is already in flight.
    #[error("campaign {0} is currently being sent")]
    AlreadySending(i64),

    /// The campaign's domain lacks one or both VAPID keys.
    #[error("domain {domain_id} has no VAPID key pair configured")]
    MissingSigningKeys { domain_id: i64 },

    /// The requested domain does not exist.
    #[error("domain {0} not found")]
    DomainNotFound(i64),

    /// The requested subscriber does not exist.
    #[error("subscriber {0} not found")]
    SubscriberNotFound(i64),

    /// The requested delivery record does not exist for the given campaign.
    #[error("notification {notification_id} not found for campaign {campaign_id}")]
    NotificationNotFound {
        campaign_id: i64,
        notification_id: i64,
    },

    /// A target filter failed to parse or validate.
    #[error("invalid target filter: {0}")]
    InvalidFilter(String),

    /// Request input failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LensError {
    /// Stable machine-readable code surfaced in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            LensError::CampaignNotFound(_) => "CAMPAIGN_NOT_FOUND",
            LensError::AlreadySent(_) => "CAMPAIGN_ALREADY_SENT",
            LensError::AlreadySending(_) => "CAMPAIGN_SENDING",
            LensError::MissingSigningKeys { .. } => "MISSING_VAPID_KEYS",
            LensError::DomainNotFound(_) => "DOMAIN_NOT_FOUND",
            LensError::SubscriberNotFound(_) => "SUBSCRIBER_NOT_FOUND",
            LensError::NotificationNotFound { .. } => "NOTIFICATION_NOT_FOUND",
            LensError::InvalidFilter(_) => "INVALID_TARGET_FILTER",
            LensError::InvalidInput(_) => "INVALID_INPUT",
            LensError::Config(_)
            | LensError::Storage { .. }
            | LensError::Push { .. }
            | LensError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true for errors caused by the request rather than the system.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            LensError::CampaignNotFound(_)
                | LensError::AlreadySent(_)
                | LensError::AlreadySending(_)
                | LensError::MissingSigningKeys { .. }
                | LensError::DomainNotFound(_)
                | LensError::InvalidFilter(_)
        )
    }

    /// Wrap any error as a storage error.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        LensError::Storage {
            source: Box::new(err),
        }
    }
}
