// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router-level tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use lens_core::StorageAdapter;
use lens_core::types::{CampaignStatus, NotificationStatus};
use lens_engine::{DispatchSettings, Engine};
use lens_gateway::{AppState, build_router};
use lens_test_utils::{MemoryStorage, MockTransport, fixtures};

struct Api {
    storage: Arc<MemoryStorage>,
    engine: Engine,
    router: Router,
}

fn api() -> Api {
    let storage = Arc::new(MemoryStorage::new());
    let settings = DispatchSettings {
        batch_size: 100,
        batch_pause: Duration::ZERO,
        ttl_secs: 86_400,
    };
    let engine = Engine::new(storage.clone(), Arc::new(MockTransport::new()), settings);
    let router = build_router(AppState {
        engine: engine.clone(),
    });
    Api {
        storage,
        engine,
        router,
    }
}

fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn call(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

/// Wait until every background dispatch has settled.
async fn settle(engine: &Engine) {
    while engine.orchestrator.active_dispatches() > 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn send_accepts_and_dispatches() {
    let api = api();
    let domain = fixtures::domain_with_keys(api.storage.as_ref()).await.unwrap();
    fixtures::seed_subscribers(api.storage.as_ref(), domain.id, 3, |_| None)
        .await
        .unwrap();
    let campaign = fixtures::broadcast_campaign(api.storage.as_ref(), domain.id)
        .await
        .unwrap();

    let (status, body) = call(
        &api.router,
        request("POST", &format!("/campaigns/{}/send", campaign.id), None),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["totalSubscribers"], 3);
    assert_eq!(body["message"], "Campaign dispatch started");

    settle(&api.engine).await;
    let (status, stats) = call(
        &api.router,
        request("GET", &format!("/campaigns/{}/stats", campaign.id), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats, json!({"total": 3, "sent": 3, "failed": 0, "clicked": 0, "closed": 0}));

    let (status, body) = call(
        &api.router,
        request("POST", &format!("/campaigns/{}/send", campaign.id), None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CAMPAIGN_ALREADY_SENT");
}

#[tokio::test]
async fn send_error_codes() {
    let api = api();
    let (status, body) = call(&api.router, request("POST", "/campaigns/abc/send", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_CAMPAIGN_ID");

    let (status, body) = call(&api.router, request("POST", "/campaigns/77/send", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "CAMPAIGN_NOT_FOUND");

    let domain = fixtures::domain_without_keys(api.storage.as_ref()).await.unwrap();
    let campaign = fixtures::broadcast_campaign(api.storage.as_ref(), domain.id)
        .await
        .unwrap();
    let (status, body) = call(
        &api.router,
        request("POST", &format!("/campaigns/{}/send", campaign.id), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_VAPID_KEYS");
    assert_eq!(api.storage.notification_count().await, 0);

    let keyed = fixtures::domain_with_keys(api.storage.as_ref()).await.unwrap();
    let sending = fixtures::broadcast_campaign(api.storage.as_ref(), keyed.id)
        .await
        .unwrap();
    api.storage
        .force_campaign_status(sending.id, CampaignStatus::Sending)
        .await;
    let (status, body) = call(
        &api.router,
        request("POST", &format!("/campaigns/{}/send", sending.id), None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CAMPAIGN_SENDING");
}

#[tokio::test]
async fn storage_failure_during_send_is_a_send_error() {
    let api = api();
    let domain = fixtures::domain_with_keys(api.storage.as_ref()).await.unwrap();
    let campaign = fixtures::broadcast_campaign(api.storage.as_ref(), domain.id)
        .await
        .unwrap();
    api.storage.fail_subscriber_listing(true);

    let (status, body) = call(
        &api.router,
        request("POST", &format!("/campaigns/{}/send", campaign.id), None),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "SEND_CAMPAIGN_ERROR");
    let stored = api.storage.get_campaign(campaign.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CampaignStatus::Draft);
}

#[tokio::test]
async fn subscriber_lifecycle() {
    let api = api();
    let domain = fixtures::domain_with_keys(api.storage.as_ref()).await.unwrap();

    let (status, created) = call(
        &api.router,
        request(
            "POST",
            &format!("/domains/{}/subscribers", domain.id),
            Some(json!({
                "endpoint": "https://fcm.googleapis.com/fcm/send/xyz",
                "keys": {"p256dh": "BPub", "auth": "sec"},
                "country": "KR",
                "city": "Seoul"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["country"], "KR");
    assert_eq!(created["isActive"], true);
    let id = created["id"].as_i64().unwrap();

    let (status, fetched) = call(&api.router, request("GET", &format!("/subscribers/{id}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["endpoint"], "https://fcm.googleapis.com/fcm/send/xyz");

    let (status, patched) = call(
        &api.router,
        request(
            "PATCH",
            &format!("/subscribers/{id}"),
            Some(json!({"isActive": false, "userAgent": "Firefox/130"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["isActive"], false);
    assert_eq!(patched["userAgent"], "Firefox/130");

    let (status, body) = call(
        &api.router,
        request("PATCH", &format!("/subscribers/{id}"), Some(json!({"colour": "red"}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (status, _) = call(&api.router, request("DELETE", &format!("/subscribers/{id}"), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call(&api.router, request("GET", &format!("/subscribers/{id}"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "SUBSCRIBER_NOT_FOUND");
}

#[tokio::test]
async fn registration_validation() {
    let api = api();
    let (status, body) = call(
        &api.router,
        request(
            "POST",
            "/domains/5/subscribers",
            Some(json!({"endpoint": "https://push/x", "keys": {"p256dh": "k", "auth": "a"}})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "DOMAIN_NOT_FOUND");

    let (status, body) = call(
        &api.router,
        request("POST", "/domains/5/subscribers", Some(json!({"endpoint": "https://push/x"}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn click_and_close_callbacks() {
    let api = api();
    let domain = fixtures::domain_with_keys(api.storage.as_ref()).await.unwrap();
    fixtures::seed_subscribers(api.storage.as_ref(), domain.id, 2, |_| None)
        .await
        .unwrap();
    let campaign = fixtures::broadcast_campaign(api.storage.as_ref(), domain.id)
        .await
        .unwrap();
    api.engine
        .orchestrator
        .send(campaign.id)
        .await
        .unwrap()
        .dispatch
        .unwrap()
        .wait()
        .await
        .unwrap();
    let rows = api.storage.list_notifications(campaign.id).await.unwrap();

    let (status, body) = call(
        &api.router,
        request(
            "POST",
            "/notifications/click",
            Some(json!({
                "campaignId": campaign.id,
                "notificationId": rows[0].id,
                "timestamp": "2026-05-01T10:00:00Z",
                "userAgent": "Chrome/126"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = call(
        &api.router,
        request(
            "POST",
            "/notifications/close",
            Some(json!({"campaignId": campaign.id, "notificationId": rows[1].id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let rows = api.storage.list_notifications(campaign.id).await.unwrap();
    assert_eq!(rows[0].status, NotificationStatus::Clicked);
    assert_eq!(rows[1].status, NotificationStatus::Closed);

    let (status, body) = call(
        &api.router,
        request(
            "POST",
            "/notifications/click",
            Some(json!({"campaignId": campaign.id + 50, "notificationId": rows[0].id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOTIFICATION_NOT_FOUND");
}

#[tokio::test]
async fn health_reports_storage() {
    let api = api();
    let (status, body) = call(&api.router, request("GET", "/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "healthy");
}
