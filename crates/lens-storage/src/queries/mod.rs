// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table.

pub mod campaigns;
pub mod dispatch_runs;
pub mod domains;
pub mod notifications;
pub mod subscribers;

/// Counters are stored as INTEGER; values beyond `i64::MAX` saturate.
pub(crate) fn sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
