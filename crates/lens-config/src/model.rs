// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Traffic-Lens push engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Traffic-Lens configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LensConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Campaign dispatch pacing and recovery settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Web Push transport settings.
    #[serde(default)]
    pub push: PushConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the HTTP API to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind the HTTP API to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8420
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("lens").join("lens.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("lens.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Campaign dispatch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Number of subscribers sent to concurrently in one batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between consecutive batches, in milliseconds.
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,

    /// Time-to-live handed to the push service, in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u32,

    /// How long shutdown waits for in-flight batches before exiting.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Resume dispatch runs left `running` by a previous process on start.
    #[serde(default = "default_resume_on_start")]
    pub resume_on_start: bool,
}

impl DispatchConfig {
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
            ttl_secs: default_ttl_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            resume_on_start: default_resume_on_start(),
        }
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_batch_pause_ms() -> u64 {
    1000
}

fn default_ttl_secs() -> u32 {
    86_400
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

fn default_resume_on_start() -> bool {
    true
}

/// Web Push transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PushConfig {
    /// Contact URI placed in the VAPID `sub` claim (`mailto:` or `https:`).
    #[serde(default = "default_vapid_subject")]
    pub vapid_subject: String,

    /// Per-request timeout against push services, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            vapid_subject: default_vapid_subject(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_vapid_subject() -> String {
    "mailto:push@localhost".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}
