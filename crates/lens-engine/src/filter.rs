// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Target filter engine: narrows a subscriber list to a campaign's audience.
//!
//! Pure functions only; nothing here touches storage.

use lens_core::types::{Subscriber, TargetFilter, TargetType};

/// Whether `subscriber` satisfies every predicate present in `filter`.
///
/// List predicates compare exactly. A subscriber with no country (or city)
/// never matches a present country (or city) list, and an empty list matches
/// nobody. Date bounds are inclusive.
pub fn matches(filter: &TargetFilter, subscriber: &Subscriber) -> bool {
    fn in_list(list: &Option<Vec<String>>, value: Option<&str>) -> bool {
        match list {
            None => true,
            Some(allowed) => value.is_some_and(|v| allowed.iter().any(|a| a == v)),
        }
    }

    in_list(&filter.countries, subscriber.country.as_deref())
        && in_list(&filter.cities, subscriber.city.as_deref())
        && filter
            .subscribed_after
            .is_none_or(|after| subscriber.subscribed_at >= after)
        && filter
            .subscribed_before
            .is_none_or(|before| subscriber.subscribed_at <= before)
        && filter
            .last_seen_after
            .is_none_or(|after| subscriber.last_seen >= after)
        && filter
            .is_active
            .is_none_or(|active| subscriber.is_active == active)
}

/// Select the subscribers a campaign addresses.
///
/// `all`, and `segment` without a filter, return the input unchanged.
pub fn select(
    subscribers: Vec<Subscriber>,
    target_type: TargetType,
    filter: Option<&TargetFilter>,
) -> Vec<Subscriber> {
    match (target_type, filter) {
        (TargetType::Segment, Some(filter)) => subscribers
            .into_iter()
            .filter(|s| matches(filter, s))
            .collect(),
        _ => subscribers,
    }
}
