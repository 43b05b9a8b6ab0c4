// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as bind addresses, batch bounds, and the VAPID contact URI.

use crate::diagnostic::ConfigError;
use crate::model::LensConfig;

/// Largest batch the dispatcher will fan out at once.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Longest TTL push services are required to honor (four weeks).
pub const MAX_TTL_SECS: u32 = 2_419_200;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &LensConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let batch_size = config.dispatch.batch_size;
    if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
        fail(format!(
            "dispatch.batch_size must be between 1 and {MAX_BATCH_SIZE}, got {batch_size}"
        ));
    }

    let ttl = config.dispatch.ttl_secs;
    if ttl == 0 || ttl > MAX_TTL_SECS {
        fail(format!(
            "dispatch.ttl_secs must be between 1 and {MAX_TTL_SECS}, got {ttl}"
        ));
    }

    let subject = config.push.vapid_subject.trim();
    if !(subject.starts_with("mailto:") || subject.starts_with("https://")) {
        fail(format!(
            "push.vapid_subject must be a mailto: or https:// URI, got `{subject}`"
        ));
    }

    if config.push.request_timeout_secs == 0 {
        fail("push.request_timeout_secs must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
