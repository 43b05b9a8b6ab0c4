// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! API error bodies: `{"code": ..., "message": ...}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use lens_core::LensError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// An error on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    /// Map an engine error. System failures become `fallback_code` with a
    /// generic message; the detail goes to the log only.
    pub fn from_lens(err: LensError, fallback_code: &'static str) -> Self {
        let status = match &err {
            LensError::CampaignNotFound(_)
            | LensError::DomainNotFound(_)
            | LensError::SubscriberNotFound(_)
            | LensError::NotificationNotFound { .. } => StatusCode::NOT_FOUND,
            LensError::AlreadySent(_) | LensError::AlreadySending(_) => StatusCode::CONFLICT,
            LensError::MissingSigningKeys { .. }
            | LensError::InvalidFilter(_)
            | LensError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => {
                tracing::error!(error = %err, code = fallback_code, "request failed");
                return Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    fallback_code,
                    "internal server error",
                );
            }
        };
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<LensError> for ApiError {
    fn from(err: LensError) -> Self {
        Self::from_lens(err, "INTERNAL_ERROR")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                code: self.code,
                message: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preconditions_keep_their_code() {
        let e = ApiError::from_lens(LensError::AlreadySending(3), "SEND_CAMPAIGN_ERROR");
        assert_eq!(e.status, StatusCode::CONFLICT);
        assert_eq!(e.code, "CAMPAIGN_SENDING");

        let e = ApiError::from(LensError::MissingSigningKeys { domain_id: 1 });
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert_eq!(e.code, "MISSING_VAPID_KEYS");

        let e = ApiError::from(LensError::SubscriberNotFound(9));
        assert_eq!(e.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn system_errors_use_fallback_code_and_hide_detail() {
        let e = ApiError::from_lens(
            LensError::Internal("db path /secret".into()),
            "SEND_CAMPAIGN_ERROR",
        );
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.code, "SEND_CAMPAIGN_ERROR");
        assert!(!e.message.contains("secret"));
    }

    #[test]
    fn body_serializes_code_and_message() {
        let body = ErrorBody {
            code: "INVALID_CAMPAIGN_ID",
            message: "campaign id must be a positive integer".into(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], "INVALID_CAMPAIGN_ID");
        assert_eq!(json["message"], "campaign id must be a positive integer");
    }
}
