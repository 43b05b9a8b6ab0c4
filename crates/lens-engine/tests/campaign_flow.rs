// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end campaign sends against in-memory storage and a mock transport.

use std::sync::Arc;
use std::time::Duration;

use lens_core::types::{CampaignStatus, DispatchSummary, NotificationStatus, RunStatus, TargetFilter};
use lens_core::{DeliveryError, LensError, StorageAdapter};
use lens_engine::orchestrator::{DISPATCH_STARTED, NO_SUBSCRIBERS};
use lens_engine::{DispatchOutcome, DispatchSettings, Engine};
use lens_test_utils::{MemoryStorage, MockTransport, fixtures};

struct World {
    storage: Arc<MemoryStorage>,
    transport: MockTransport,
    engine: Engine,
}

fn world_with(transport: MockTransport, batch_size: usize) -> World {
    let storage = Arc::new(MemoryStorage::new());
    let settings = DispatchSettings {
        batch_size,
        batch_pause: Duration::from_secs(1),
        ttl_secs: 86_400,
    };
    let engine = Engine::new(storage.clone(), Arc::new(transport.clone()), settings);
    World {
        storage,
        transport,
        engine,
    }
}

fn world() -> World {
    world_with(MockTransport::new(), 100)
}

async fn status(storage: &MemoryStorage, campaign_id: i64) -> CampaignStatus {
    storage.get_campaign(campaign_id).await.unwrap().unwrap().status
}

#[tokio::test(start_paused = true)]
async fn broadcast_to_250_subscribers_runs_three_batches() {
    let w = world();
    let domain = fixtures::domain_with_keys(w.storage.as_ref()).await.unwrap();
    fixtures::seed_subscribers(w.storage.as_ref(), domain.id, 250, |_| None)
        .await
        .unwrap();
    let campaign = fixtures::broadcast_campaign(w.storage.as_ref(), domain.id)
        .await
        .unwrap();

    let receipt = w.engine.orchestrator.send(campaign.id).await.unwrap();
    assert_eq!(receipt.total_subscribers, 250);
    assert_eq!(receipt.message, DISPATCH_STARTED);
    // The campaign is marked sent as soon as the dispatch is launched.
    assert_eq!(status(&w.storage, campaign.id).await, CampaignStatus::Sent);

    let started = tokio::time::Instant::now();
    let report = receipt.dispatch.unwrap().wait().await.unwrap();
    assert_eq!(report.outcome, DispatchOutcome::Completed);
    assert_eq!(report.batches_completed, 3);
    assert_eq!(report.summary, DispatchSummary { successful: 250, failed: 0 });
    assert_eq!(started.elapsed(), Duration::from_secs(2));

    let rows = w.storage.list_notifications(campaign.id).await.unwrap();
    assert_eq!(rows.len(), 250);
    assert!(rows.iter().all(|r| r.status == NotificationStatus::Sent));

    let run = w.storage.get_dispatch_run(report.run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.total_subscribers, 250);

    let sent = w.transport.sent().await;
    let payload = sent[0].json();
    assert_eq!(payload["title"], "Spring sale");
    assert_eq!(payload["url"], "https://shop.example/sale");
    assert_eq!(payload["campaignId"], campaign.id);
    assert_eq!(payload["tag"], format!("campaign-{}", campaign.id));
    assert!(payload.get("image").is_none());
    assert_eq!(sent[0].public_key, fixtures::TEST_VAPID_PUBLIC_KEY);
}

#[tokio::test(start_paused = true)]
async fn segment_reaches_only_matching_country() {
    let w = world();
    let domain = fixtures::domain_with_keys(w.storage.as_ref()).await.unwrap();
    fixtures::seed_subscribers(w.storage.as_ref(), domain.id, 10, |n| {
        if n % 3 == 0 { Some("KR") } else { Some("US") }
    })
    .await
    .unwrap();
    let campaign = fixtures::segment_campaign(
        w.storage.as_ref(),
        domain.id,
        TargetFilter {
            countries: Some(vec!["KR".into()]),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let receipt = w.engine.orchestrator.send(campaign.id).await.unwrap();
    assert_eq!(receipt.total_subscribers, 4);
    receipt.dispatch.unwrap().wait().await.unwrap();

    assert_eq!(w.storage.list_notifications(campaign.id).await.unwrap().len(), 4);
    let endpoints: Vec<String> = w.transport.sent().await.into_iter().map(|p| p.endpoint).collect();
    for n in [0, 3, 6, 9] {
        assert!(endpoints.contains(&fixtures::endpoint(domain.id, n)));
    }
}

#[tokio::test]
async fn missing_keys_refuses_without_side_effects() {
    let w = world();
    let domain = fixtures::domain_without_keys(w.storage.as_ref()).await.unwrap();
    fixtures::seed_subscribers(w.storage.as_ref(), domain.id, 5, |_| None)
        .await
        .unwrap();
    let campaign = fixtures::broadcast_campaign(w.storage.as_ref(), domain.id)
        .await
        .unwrap();

    let err = w.engine.orchestrator.send(campaign.id).await.unwrap_err();
    assert_eq!(err.code(), "MISSING_VAPID_KEYS");
    assert_eq!(w.storage.notification_count().await, 0);
    assert_eq!(status(&w.storage, campaign.id).await, CampaignStatus::Draft);
    assert!(w.storage.list_unfinished_dispatch_runs().await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_campaign_is_not_found() {
    let w = world();
    let err = w.engine.orchestrator.send(404).await.unwrap_err();
    assert!(matches!(err, LensError::CampaignNotFound(404)));
}

#[tokio::test]
async fn empty_audience_marks_sent_without_dispatch() {
    let w = world();
    let domain = fixtures::domain_with_keys(w.storage.as_ref()).await.unwrap();
    let campaign = fixtures::broadcast_campaign(w.storage.as_ref(), domain.id)
        .await
        .unwrap();

    let receipt = w.engine.orchestrator.send(campaign.id).await.unwrap();
    assert_eq!(receipt.total_subscribers, 0);
    assert_eq!(receipt.message, NO_SUBSCRIBERS);
    assert!(receipt.dispatch.is_none());

    let stored = w.storage.get_campaign(campaign.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CampaignStatus::Sent);
    assert!(stored.sent_at.is_some());
    assert_eq!(w.storage.notification_count().await, 0);
    let stats = w.engine.tracker.campaign_stats(campaign.id).await.unwrap();
    assert_eq!((stats.sent, stats.failed), (0, 0));
}

#[tokio::test(start_paused = true)]
async fn second_send_is_refused() {
    let w = world();
    let domain = fixtures::domain_with_keys(w.storage.as_ref()).await.unwrap();
    fixtures::seed_subscribers(w.storage.as_ref(), domain.id, 3, |_| None)
        .await
        .unwrap();
    let campaign = fixtures::broadcast_campaign(w.storage.as_ref(), domain.id)
        .await
        .unwrap();

    let receipt = w.engine.orchestrator.send(campaign.id).await.unwrap();
    let err = w.engine.orchestrator.send(campaign.id).await.unwrap_err();
    assert!(matches!(err, LensError::AlreadySent(_)));
    receipt.dispatch.unwrap().wait().await.unwrap();
    assert_eq!(w.storage.notification_count().await, 3);
}

#[tokio::test]
async fn sending_campaign_is_refused() {
    let w = world();
    let domain = fixtures::domain_with_keys(w.storage.as_ref()).await.unwrap();
    let campaign = fixtures::broadcast_campaign(w.storage.as_ref(), domain.id)
        .await
        .unwrap();
    w.storage
        .force_campaign_status(campaign.id, CampaignStatus::Sending)
        .await;
    let err = w.engine.orchestrator.send(campaign.id).await.unwrap_err();
    assert_eq!(err.code(), "CAMPAIGN_SENDING");
}

#[tokio::test(start_paused = true)]
async fn gone_subscriber_is_deactivated_and_skipped_later() {
    let w = world();
    let domain = fixtures::domain_with_keys(w.storage.as_ref()).await.unwrap();
    let seeded = fixtures::seed_subscribers(w.storage.as_ref(), domain.id, 5, |_| None)
        .await
        .unwrap();
    w.transport
        .fail_endpoint(
            fixtures::endpoint(domain.id, 2),
            DeliveryError::gone("push service responded 410 Gone"),
        )
        .await;

    let first = fixtures::broadcast_campaign(w.storage.as_ref(), domain.id)
        .await
        .unwrap();
    let report = w
        .engine
        .orchestrator
        .send(first.id)
        .await
        .unwrap()
        .dispatch
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(report.summary, DispatchSummary { successful: 4, failed: 1 });
    let gone = w.storage.get_subscriber(seeded[2].id).await.unwrap().unwrap();
    assert!(!gone.is_active);

    let second = fixtures::broadcast_campaign(w.storage.as_ref(), domain.id)
        .await
        .unwrap();
    let receipt = w.engine.orchestrator.send(second.id).await.unwrap();
    assert_eq!(receipt.total_subscribers, 4);
    receipt.dispatch.unwrap().wait().await.unwrap();
    let rows = w.storage.list_notifications(second.id).await.unwrap();
    assert!(rows.iter().all(|r| r.subscriber_id != seeded[2].id));
}

#[tokio::test(start_paused = true)]
async fn concurrency_never_exceeds_batch_size() {
    let w = world_with(MockTransport::with_latency(Duration::from_millis(300)), 10);
    let domain = fixtures::domain_with_keys(w.storage.as_ref()).await.unwrap();
    fixtures::seed_subscribers(w.storage.as_ref(), domain.id, 35, |_| None)
        .await
        .unwrap();
    let campaign = fixtures::broadcast_campaign(w.storage.as_ref(), domain.id)
        .await
        .unwrap();

    let report = w
        .engine
        .orchestrator
        .send(campaign.id)
        .await
        .unwrap()
        .dispatch
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(report.batches_completed, 4);
    assert_eq!(w.transport.max_in_flight(), 10);
    assert_eq!(w.transport.sent_count().await, 35);
}

#[tokio::test]
async fn listing_failure_rolls_back_to_draft() {
    let w = world();
    let domain = fixtures::domain_with_keys(w.storage.as_ref()).await.unwrap();
    let campaign = fixtures::broadcast_campaign(w.storage.as_ref(), domain.id)
        .await
        .unwrap();
    w.storage.fail_subscriber_listing(true);

    let err = w.engine.orchestrator.send(campaign.id).await.unwrap_err();
    assert!(matches!(err, LensError::Storage { .. }));
    assert_eq!(status(&w.storage, campaign.id).await, CampaignStatus::Draft);

    // Once storage recovers the campaign can be sent.
    w.storage.fail_subscriber_listing(false);
    w.engine.orchestrator.send(campaign.id).await.unwrap();
}

#[tokio::test]
async fn run_creation_failure_rolls_back_to_draft() {
    let w = world();
    let domain = fixtures::domain_with_keys(w.storage.as_ref()).await.unwrap();
    fixtures::seed_subscribers(w.storage.as_ref(), domain.id, 2, |_| None)
        .await
        .unwrap();
    let campaign = fixtures::broadcast_campaign(w.storage.as_ref(), domain.id)
        .await
        .unwrap();
    w.storage.fail_run_creation(true);

    assert!(w.engine.orchestrator.send(campaign.id).await.is_err());
    assert_eq!(status(&w.storage, campaign.id).await, CampaignStatus::Draft);
    assert_eq!(w.transport.sent_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn checkpoint_failure_aborts_run_but_keeps_campaign_sent() {
    let w = world_with(MockTransport::new(), 2);
    let domain = fixtures::domain_with_keys(w.storage.as_ref()).await.unwrap();
    fixtures::seed_subscribers(w.storage.as_ref(), domain.id, 6, |_| None)
        .await
        .unwrap();
    let campaign = fixtures::broadcast_campaign(w.storage.as_ref(), domain.id)
        .await
        .unwrap();
    w.storage.fail_checkpoints(true);

    let receipt = w.engine.orchestrator.send(campaign.id).await.unwrap();
    let run_id = receipt.dispatch.as_ref().unwrap().run_id;
    let err = receipt.dispatch.unwrap().wait().await.unwrap_err();
    assert!(matches!(err, LensError::Storage { .. }));

    assert_eq!(w.storage.notification_count().await, 2);
    let run = w.storage.get_dispatch_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Aborted);
    assert_eq!(status(&w.storage, campaign.id).await, CampaignStatus::Sent);
}

#[tokio::test(start_paused = true)]
async fn transport_panic_is_recorded_as_one_failure() {
    let w = world_with(MockTransport::new(), 4);
    let domain = fixtures::domain_with_keys(w.storage.as_ref()).await.unwrap();
    fixtures::seed_subscribers(w.storage.as_ref(), domain.id, 12, |_| None)
        .await
        .unwrap();
    w.transport.panic_on(fixtures::endpoint(domain.id, 5)).await;
    let campaign = fixtures::broadcast_campaign(w.storage.as_ref(), domain.id)
        .await
        .unwrap();

    let report = w
        .engine
        .orchestrator
        .send(campaign.id)
        .await
        .unwrap()
        .dispatch
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(report.outcome, DispatchOutcome::Completed);
    assert_eq!(report.batches_completed, 3);
    assert_eq!(report.summary, DispatchSummary { successful: 11, failed: 1 });

    let rows = w.storage.list_notifications(campaign.id).await.unwrap();
    assert_eq!(rows.len(), 12);
    let stats = w.storage.notification_stats(campaign.id).await.unwrap();
    assert_eq!(stats.total, 12);
    assert_eq!(stats.sent, report.summary.successful);
    assert_eq!(stats.failed, report.summary.failed);
}

#[tokio::test(start_paused = true)]
async fn shutdown_then_resume_skips_recorded_subscribers() {
    let storage = Arc::new(MemoryStorage::new());
    let settings = DispatchSettings {
        batch_size: 10,
        batch_pause: Duration::from_secs(5),
        ttl_secs: 86_400,
    };
    let first_transport = MockTransport::new();
    let first = Engine::new(storage.clone(), Arc::new(first_transport.clone()), settings.clone());

    let domain = fixtures::domain_with_keys(storage.as_ref()).await.unwrap();
    fixtures::seed_subscribers(storage.as_ref(), domain.id, 25, |_| None)
        .await
        .unwrap();
    let campaign = fixtures::broadcast_campaign(storage.as_ref(), domain.id)
        .await
        .unwrap();

    let receipt = first.orchestrator.send(campaign.id).await.unwrap();
    let handle = receipt.dispatch.unwrap();
    let run_id = handle.run_id;
    // Let the first batch settle, then stop during the pause.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(first.orchestrator.shutdown(Duration::from_secs(30)).await);
    let report = handle.wait().await.unwrap();
    assert_eq!(report.outcome, DispatchOutcome::Cancelled);
    assert_eq!(first_transport.sent_count().await, 10);
    assert!(first.orchestrator.send(campaign.id).await.is_err());

    let run = storage.get_dispatch_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Running);

    let second_transport = MockTransport::new();
    let second = Engine::new(storage.clone(), Arc::new(second_transport.clone()), settings);
    let handles = second.orchestrator.resume_unfinished().await.unwrap();
    assert_eq!(handles.len(), 1);
    let resumed = handles.into_iter().next().unwrap().wait().await.unwrap();
    assert_eq!(resumed.outcome, DispatchOutcome::Completed);
    assert_eq!(resumed.summary, DispatchSummary { successful: 25, failed: 0 });
    assert_eq!(resumed.batches_completed, 3);

    // Only the fifteen subscribers left over were contacted again.
    assert_eq!(second_transport.sent_count().await, 15);
    assert_eq!(storage.list_notifications(campaign.id).await.unwrap().len(), 25);
    let run = storage.get_dispatch_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn resume_drops_runs_of_rolled_back_campaigns() {
    let w = world();
    let domain = fixtures::domain_with_keys(w.storage.as_ref()).await.unwrap();
    let campaign = fixtures::broadcast_campaign(w.storage.as_ref(), domain.id)
        .await
        .unwrap();
    let run = w.storage.create_dispatch_run(campaign.id, 3, 100).await.unwrap();

    let handles = w.engine.orchestrator.resume_unfinished().await.unwrap();
    assert!(handles.is_empty());
    let run = w.storage.get_dispatch_run(run.id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Aborted);
}

#[tokio::test(start_paused = true)]
async fn resume_finalizes_campaign_left_sending() {
    let w = world();
    let domain = fixtures::domain_with_keys(w.storage.as_ref()).await.unwrap();
    fixtures::seed_subscribers(w.storage.as_ref(), domain.id, 3, |_| None)
        .await
        .unwrap();
    let campaign = fixtures::broadcast_campaign(w.storage.as_ref(), domain.id)
        .await
        .unwrap();
    w.storage
        .force_campaign_status(campaign.id, CampaignStatus::Sending)
        .await;
    w.storage.create_dispatch_run(campaign.id, 3, 100).await.unwrap();

    let handles = w.engine.orchestrator.resume_unfinished().await.unwrap();
    assert_eq!(handles.len(), 1);
    assert_eq!(status(&w.storage, campaign.id).await, CampaignStatus::Sent);
    handles.into_iter().next().unwrap().wait().await.unwrap();
    assert_eq!(w.storage.notification_count().await, 3);
}

#[tokio::test(start_paused = true)]
async fn resume_releases_campaign_stuck_sending_without_a_run() {
    let w = world();
    let domain = fixtures::domain_with_keys(w.storage.as_ref()).await.unwrap();
    fixtures::seed_subscribers(w.storage.as_ref(), domain.id, 2, |_| None)
        .await
        .unwrap();
    let campaign = fixtures::broadcast_campaign(w.storage.as_ref(), domain.id)
        .await
        .unwrap();
    // The previous process claimed the campaign and stopped before creating a run.
    assert!(
        w.storage
            .compare_and_set_campaign_status(campaign.id, CampaignStatus::Draft, CampaignStatus::Sending, None)
            .await
            .unwrap()
    );

    let handles = w.engine.orchestrator.resume_unfinished().await.unwrap();
    assert!(handles.is_empty());
    assert_eq!(status(&w.storage, campaign.id).await, CampaignStatus::Draft);

    let receipt = w.engine.orchestrator.send(campaign.id).await.unwrap();
    assert_eq!(receipt.total_subscribers, 2);
    receipt.dispatch.unwrap().wait().await.unwrap();
    assert_eq!(status(&w.storage, campaign.id).await, CampaignStatus::Sent);
    assert_eq!(w.storage.notification_count().await, 2);
}

#[tokio::test]
async fn resume_keeps_sending_campaigns_that_have_a_run() {
    let w = world();
    let domain = fixtures::domain_with_keys(w.storage.as_ref()).await.unwrap();
    let campaign = fixtures::broadcast_campaign(w.storage.as_ref(), domain.id)
        .await
        .unwrap();
    w.storage
        .force_campaign_status(campaign.id, CampaignStatus::Sending)
        .await;
    w.storage.create_dispatch_run(campaign.id, 0, 100).await.unwrap();

    let handles = w.engine.orchestrator.resume_unfinished().await.unwrap();
    assert_eq!(handles.len(), 1);
    assert_eq!(status(&w.storage, campaign.id).await, CampaignStatus::Sent);
}

#[tokio::test]
async fn resume_rolls_back_when_finalize_fails() {
    let w = world();
    let domain = fixtures::domain_with_keys(w.storage.as_ref()).await.unwrap();
    let campaign = fixtures::broadcast_campaign(w.storage.as_ref(), domain.id)
        .await
        .unwrap();
    w.storage
        .force_campaign_status(campaign.id, CampaignStatus::Sending)
        .await;
    let run = w.storage.create_dispatch_run(campaign.id, 3, 100).await.unwrap();
    w.storage.fail_finalize(true);

    let handles = w.engine.orchestrator.resume_unfinished().await.unwrap();
    assert!(handles.is_empty());
    assert_eq!(status(&w.storage, campaign.id).await, CampaignStatus::Draft);
    let run = w.storage.get_dispatch_run(run.id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Aborted);

    w.storage.fail_finalize(false);
    let err = w.engine.orchestrator.send(campaign.id).await.err();
    assert!(err.is_none(), "campaign should be sendable again: {err:?}");
}

#[tokio::test]
async fn engagement_round_trip() {
    let w = world();
    let domain = fixtures::domain_with_keys(w.storage.as_ref()).await.unwrap();
    fixtures::seed_subscribers(w.storage.as_ref(), domain.id, 2, |_| None)
        .await
        .unwrap();
    let campaign = fixtures::broadcast_campaign(w.storage.as_ref(), domain.id)
        .await
        .unwrap();
    w.engine
        .orchestrator
        .send(campaign.id)
        .await
        .unwrap()
        .dispatch
        .unwrap()
        .wait()
        .await
        .unwrap();

    let rows = w.storage.list_notifications(campaign.id).await.unwrap();
    let report = lens_engine::EngagementReport {
        campaign_id: campaign.id,
        notification_id: rows[0].id,
        timestamp: Some(fixtures::ts("2026-06-01T08:00:00Z")),
        user_agent: None,
    };
    w.engine
        .tracker
        .track(lens_core::types::EngagementEvent::Clicked, &report)
        .await
        .unwrap();
    let stats = w.engine.tracker.campaign_stats(campaign.id).await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.sent, 2);
    assert_eq!(stats.clicked, 1);
}
