// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./lens.toml` > `~/.config/lens/lens.toml` > `/etc/lens/lens.toml`
//! with environment variable overrides via `LENS_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use tracing::debug;

use crate::model::LensConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/lens/lens.toml` (system-wide)
/// 3. `~/.config/lens/lens.toml` (user XDG config)
/// 4. `./lens.toml` (local directory)
/// 5. `LENS_*` environment variables
pub fn load_config() -> Result<LensConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<LensConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LensConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LensConfig, figment::Error> {
    debug!(path = %path.display(), "loading config file");
    Figment::new()
        .merge(Serialized::defaults(LensConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    let user_config = dirs::config_dir()
        .map(|d| d.join("lens/lens.toml"))
        .unwrap_or_default();
    for layer in [Path::new("/etc/lens/lens.toml"), user_config.as_path(), Path::new("lens.toml")] {
        if layer.is_file() {
            debug!(path = %layer.display(), "config layer found");
        }
    }
    Figment::new()
        .merge(Serialized::defaults(LensConfig::default()))
        .merge(Toml::file("/etc/lens/lens.toml"))
        .merge(Toml::file(&user_config))
        .merge(Toml::file("lens.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `LENS_DISPATCH_BATCH_SIZE` must map to `dispatch.batch_size`,
/// not `dispatch.batch.size`.
fn env_provider() -> Env {
    Env::prefixed("LENS_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("dispatch_", "dispatch.", 1)
            .replacen("push_", "push.", 1);
        mapped.into()
    })
}
