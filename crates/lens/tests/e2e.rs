// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests over a real SQLite database.
//!
//! Each test uses its own temp directory; push delivery goes through
//! `MockTransport` so nothing leaves the process.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use lens_config::model::StorageConfig;
use lens_core::StorageAdapter;
use lens_core::types::{CampaignStatus, RunStatus};
use lens_engine::{DispatchOutcome, DispatchSettings, Engine};
use lens_gateway::{AppState, build_router};
use lens_storage::SqliteStorage;
use lens_test_utils::{MockTransport, fixtures};

async fn open(dir: &TempDir) -> Arc<SqliteStorage> {
    let storage = SqliteStorage::new(StorageConfig {
        database_path: dir.path().join("lens.db").to_string_lossy().into_owned(),
        wal_mode: true,
    });
    storage.initialize().await.unwrap();
    Arc::new(storage)
}

fn settings(batch_size: usize, pause: Duration) -> DispatchSettings {
    DispatchSettings {
        batch_size,
        batch_pause: pause,
        ttl_secs: 86_400,
    }
}

async fn call(router: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn settle(engine: &Engine) {
    for _ in 0..500 {
        if engine.orchestrator.active_dispatches() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("dispatch did not settle");
}

#[tokio::test]
async fn register_send_and_track_over_http() {
    let dir = TempDir::new().unwrap();
    let storage = open(&dir).await;
    let transport = MockTransport::new();
    let engine = Engine::new(
        storage.clone(),
        Arc::new(transport.clone()),
        settings(2, Duration::from_millis(10)),
    );
    let router = build_router(AppState {
        engine: engine.clone(),
    });

    let domain = fixtures::domain_with_keys(storage.as_ref()).await.unwrap();
    for (n, country) in ["KR", "US", "KR", "JP", "KR"].into_iter().enumerate() {
        let (status, _) = call(
            &router,
            "POST",
            &format!("/domains/{}/subscribers", domain.id),
            Some(json!({
                "endpoint": fixtures::endpoint(domain.id, n),
                "keys": {"p256dh": format!("key-{n}"), "auth": format!("auth-{n}")},
                "country": country,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let campaign = fixtures::broadcast_campaign(storage.as_ref(), domain.id)
        .await
        .unwrap();
    let (status, body) = call(&router, "POST", &format!("/campaigns/{}/send", campaign.id), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["totalSubscribers"], 5);

    settle(&engine).await;
    assert_eq!(transport.sent_count().await, 5);
    let stored = storage.get_campaign(campaign.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CampaignStatus::Sent);

    let rows = storage.list_notifications(campaign.id).await.unwrap();
    assert_eq!(rows.len(), 5);
    let (status, _) = call(
        &router,
        "POST",
        "/notifications/click",
        Some(json!({"campaignId": campaign.id, "notificationId": rows[2].id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, stats) = call(&router, "GET", &format!("/campaigns/{}/stats", campaign.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats, json!({"total": 5, "sent": 5, "failed": 0, "clicked": 1, "closed": 0}));

    let (status, health) = call(&router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["storage"], "healthy");
}

#[tokio::test]
async fn interrupted_run_resumes_after_restart() {
    let dir = TempDir::new().unwrap();
    let (campaign_id, run_id) = {
        let storage = open(&dir).await;
        let transport = MockTransport::new();
        let engine = Engine::new(
            storage.clone(),
            Arc::new(transport.clone()),
            settings(2, Duration::from_secs(60)),
        );
        let domain = fixtures::domain_with_keys(storage.as_ref()).await.unwrap();
        fixtures::seed_subscribers(storage.as_ref(), domain.id, 5, |_| None)
            .await
            .unwrap();
        let campaign = fixtures::broadcast_campaign(storage.as_ref(), domain.id)
            .await
            .unwrap();

        let receipt = engine.orchestrator.send(campaign.id).await.unwrap();
        let handle = receipt.dispatch.unwrap();
        let run_id = handle.run_id;

        // Wait for the first batch checkpoint, then stop during the pause.
        for _ in 0..500 {
            let run = storage.get_dispatch_run(run_id).await.unwrap().unwrap();
            if run.batches_completed == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(engine.orchestrator.shutdown(Duration::from_secs(5)).await);
        let report = handle.wait().await.unwrap();
        assert_eq!(report.outcome, DispatchOutcome::Cancelled);
        assert_eq!(transport.sent_count().await, 2);
        storage.close().await.unwrap();
        (campaign.id, run_id)
    };

    let storage = open(&dir).await;
    let run = storage.get_dispatch_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(run.successful, 2);

    let transport = MockTransport::new();
    let engine = Engine::new(
        storage.clone(),
        Arc::new(transport.clone()),
        settings(2, Duration::ZERO),
    );
    let handles = engine.orchestrator.resume_unfinished().await.unwrap();
    assert_eq!(handles.len(), 1);
    let report = handles.into_iter().next().unwrap().wait().await.unwrap();
    assert_eq!(report.outcome, DispatchOutcome::Completed);
    assert_eq!(report.summary.successful, 5);
    assert_eq!(report.batches_completed, 3);

    assert_eq!(transport.sent_count().await, 3);
    assert_eq!(storage.list_notifications(campaign_id).await.unwrap().len(), 5);
    let run = storage.get_dispatch_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert!(storage.list_unfinished_dispatch_runs().await.unwrap().is_empty());
}
