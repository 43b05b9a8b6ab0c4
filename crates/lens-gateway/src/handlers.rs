// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the Traffic-Lens REST API.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lens_core::types::{EngagementEvent, HealthStatus, NewSubscriber, NotificationStats, Subscriber, SubscriberPatch};
use lens_engine::EngagementReport;

use crate::error::ApiError;
use crate::server::AppState;

/// Response body for POST /campaigns/{id}/send.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub total_subscribers: u64,
    pub message: String,
}

/// Subscription keys as the browser's `PushSubscription.toJSON()` reports them.
#[derive(Debug, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Request body for POST /domains/{id}/subscribers.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Request body for the click and close callbacks.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementRequest {
    pub campaign_id: i64,
    pub notification_id: i64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EngagementResponse {
    pub success: bool,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage: String,
    pub version: &'static str,
}

/// Parse a positive integer id from a path segment.
fn parse_id(raw: &str, code: &'static str, what: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::bad_request(
            code,
            format!("{what} id must be a positive integer, got {raw:?}"),
        )),
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request("INVALID_INPUT", rejection.body_text()))
}

/// POST /campaigns/{id}/send
///
/// Accepts the send and returns once the dispatch is launched.
pub async fn send_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<SendResponse>), ApiError> {
    let campaign_id = parse_id(&id, "INVALID_CAMPAIGN_ID", "campaign")?;
    let receipt = state
        .engine
        .orchestrator
        .send(campaign_id)
        .await
        .map_err(|e| ApiError::from_lens(e, "SEND_CAMPAIGN_ERROR"))?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SendResponse {
            total_subscribers: receipt.total_subscribers,
            message: receipt.message.to_string(),
        }),
    ))
}

/// GET /campaigns/{id}/stats
pub async fn campaign_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<NotificationStats>, ApiError> {
    let campaign_id = parse_id(&id, "INVALID_CAMPAIGN_ID", "campaign")?;
    Ok(Json(state.engine.tracker.campaign_stats(campaign_id).await?))
}

/// POST /domains/{id}/subscribers
pub async fn register_subscriber(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Subscriber>), ApiError> {
    let domain_id = parse_id(&id, "INVALID_DOMAIN_ID", "domain")?;
    let request = json_body(body)?;
    let subscriber = state
        .engine
        .registry
        .register(NewSubscriber {
            domain_id,
            endpoint: request.endpoint,
            p256dh: request.keys.p256dh,
            auth: request.keys.auth,
            country: request.country,
            city: request.city,
            user_agent: request.user_agent,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(subscriber)))
}

/// GET /subscribers/{id}
pub async fn get_subscriber(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Subscriber>, ApiError> {
    let id = parse_id(&id, "INVALID_SUBSCRIBER_ID", "subscriber")?;
    Ok(Json(state.engine.registry.get(id).await?))
}

/// PATCH /subscribers/{id}
pub async fn update_subscriber(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SubscriberPatch>, JsonRejection>,
) -> Result<Json<Subscriber>, ApiError> {
    let id = parse_id(&id, "INVALID_SUBSCRIBER_ID", "subscriber")?;
    let patch = json_body(body)?;
    Ok(Json(state.engine.registry.update(id, patch).await?))
}

/// DELETE /subscribers/{id}
pub async fn delete_subscriber(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "INVALID_SUBSCRIBER_ID", "subscriber")?;
    state.engine.registry.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn track(
    state: AppState,
    event: EngagementEvent,
    body: Result<Json<EngagementRequest>, JsonRejection>,
) -> Result<Json<EngagementResponse>, ApiError> {
    let request = json_body(body)?;
    state
        .engine
        .tracker
        .track(
            event,
            &EngagementReport {
                campaign_id: request.campaign_id,
                notification_id: request.notification_id,
                timestamp: request.timestamp,
                user_agent: request.user_agent,
            },
        )
        .await?;
    Ok(Json(EngagementResponse { success: true }))
}

/// POST /notifications/click
pub async fn notification_clicked(
    State(state): State<AppState>,
    body: Result<Json<EngagementRequest>, JsonRejection>,
) -> Result<Json<EngagementResponse>, ApiError> {
    track(state, EngagementEvent::Clicked, body).await
}

/// POST /notifications/close
pub async fn notification_closed(
    State(state): State<AppState>,
    body: Result<Json<EngagementRequest>, JsonRejection>,
) -> Result<Json<EngagementResponse>, ApiError> {
    track(state, EngagementEvent::Closed, body).await
}

/// GET /health
///
/// Liveness plus storage health. Unhealthy storage answers 503.
pub async fn health(State(state): State<AppState>) -> Response {
    let (status, storage) = match state.engine.health().await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "healthy".to_string()),
        Ok(HealthStatus::Degraded(reason)) => (StatusCode::OK, format!("degraded: {reason}")),
        Ok(HealthStatus::Unhealthy(reason)) => {
            (StatusCode::SERVICE_UNAVAILABLE, format!("unhealthy: {reason}"))
        }
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, format!("unhealthy: {e}")),
    };
    let body = HealthResponse {
        status: if status == StatusCode::OK { "ok" } else { "unavailable" },
        storage,
        version: env!("CARGO_PKG_VERSION"),
    };
    (status, Json(body)).into_response()
}
