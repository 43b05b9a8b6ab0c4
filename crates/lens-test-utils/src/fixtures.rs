// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seeding helpers shared by engine, gateway, and binary tests.

use chrono::{DateTime, Utc};

use lens_core::types::{
    Campaign, Domain, NewCampaign, NewDomain, NewSubscriber, Subscriber, TargetFilter,
};
use lens_core::{LensError, StorageAdapter};

/// A syntactically valid P-256 VAPID key pair (base64url, unpadded).
///
/// Only for tests; never use these keys against a real push service.
pub const TEST_VAPID_PUBLIC_KEY: &str =
    "BMBlr6YznhYMX3NgcWIDRxZXs0sh7tCv7_YCsWcww0ZCv9WGg-tRCXfMEHTiBPCksSqeve1twlbmVAZFv7GSuj0";
pub const TEST_VAPID_PRIVATE_KEY: &str = "IQ9Ur0ykXoHS9gzfYX0aBjy9lvdrjx_PFUXmie9YRcY";

/// Create a domain carrying the test key pair.
pub async fn domain_with_keys(storage: &dyn StorageAdapter) -> Result<Domain, LensError> {
    storage
        .create_domain(&NewDomain {
            hostname: "keys.example".into(),
            vapid_public_key: Some(TEST_VAPID_PUBLIC_KEY.into()),
            vapid_private_key: Some(TEST_VAPID_PRIVATE_KEY.into()),
        })
        .await
}

/// Create a domain with no key pair.
pub async fn domain_without_keys(storage: &dyn StorageAdapter) -> Result<Domain, LensError> {
    storage
        .create_domain(&NewDomain {
            hostname: "nokeys.example".into(),
            ..Default::default()
        })
        .await
}

/// Registration input for subscriber `n` of a domain.
pub fn new_subscriber(domain_id: i64, n: usize) -> NewSubscriber {
    NewSubscriber {
        domain_id,
        endpoint: endpoint(domain_id, n),
        p256dh: format!("p256dh-{n}"),
        auth: format!("auth-{n}"),
        country: None,
        city: None,
        user_agent: Some("Mozilla/5.0 (test)".into()),
    }
}

/// The endpoint URL [`new_subscriber`] assigns to subscriber `n`.
pub fn endpoint(domain_id: i64, n: usize) -> String {
    format!("https://push.example.test/{domain_id}/{n}")
}

/// Register `count` subscribers; `country` picks each one's country.
pub async fn seed_subscribers(
    storage: &dyn StorageAdapter,
    domain_id: i64,
    count: usize,
    country: impl Fn(usize) -> Option<&'static str>,
) -> Result<Vec<Subscriber>, LensError> {
    let mut seeded = Vec::with_capacity(count);
    for n in 0..count {
        let mut input = new_subscriber(domain_id, n);
        input.country = country(n).map(String::from);
        seeded.push(storage.upsert_subscriber(&input).await?);
    }
    Ok(seeded)
}

/// A draft broadcast campaign with a click URL.
pub async fn broadcast_campaign(
    storage: &dyn StorageAdapter,
    domain_id: i64,
) -> Result<Campaign, LensError> {
    let mut campaign = NewCampaign::broadcast(domain_id, "Spring sale", "Everything 30% off");
    campaign.icon = Some("https://cdn.example/icon.png".into());
    campaign.click_url = Some("https://shop.example/sale".into());
    storage.create_campaign(&campaign).await
}

/// A draft segment campaign.
pub async fn segment_campaign(
    storage: &dyn StorageAdapter,
    domain_id: i64,
    filter: TargetFilter,
) -> Result<Campaign, LensError> {
    storage
        .create_campaign(&NewCampaign::segment(
            domain_id,
            "Regional news",
            "Something happened nearby",
            filter,
        ))
        .await
}

/// Parse an RFC 3339 timestamp; panics on malformed test input.
pub fn ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|e| panic!("bad test timestamp {raw}: {e}"))
}
