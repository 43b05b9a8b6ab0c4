// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lens serve` command implementation.
//!
//! Opens SQLite storage, builds the Web Push transport and the engine,
//! resumes dispatch runs a previous process left unfinished, and serves the
//! HTTP API until SIGINT or SIGTERM.

use std::sync::Arc;

use tracing::{error, info, warn};

use lens_config::LensConfig;
use lens_core::{LensError, StorageAdapter};
use lens_engine::{DispatchSettings, Engine};
use lens_gateway::{AppState, ServerConfig};
use lens_push::WebPushTransport;
use lens_storage::SqliteStorage;

use crate::shutdown;

/// Open and migrate the configured SQLite database.
pub(crate) async fn open_storage(config: &LensConfig) -> Result<Arc<SqliteStorage>, LensError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    info!(path = %config.storage.database_path, "storage initialized");
    Ok(Arc::new(storage))
}

/// Wire the engine to SQLite storage and the Web Push transport.
pub(crate) async fn build_engine(
    config: &LensConfig,
) -> Result<(Arc<SqliteStorage>, Engine), LensError> {
    let storage = open_storage(config).await?;
    let transport = Arc::new(WebPushTransport::new(&config.push)?);
    let engine = Engine::new(
        storage.clone(),
        transport,
        DispatchSettings::from(&config.dispatch),
    );
    Ok((storage, engine))
}

/// Runs the `lens serve` command.
pub async fn run_serve(config: LensConfig) -> Result<(), LensError> {
    init_tracing(&config.server.log_level);
    info!(version = env!("CARGO_PKG_VERSION"), "starting lens serve");

    let (storage, engine) = build_engine(&config).await?;
    let cancel = shutdown::install_signal_handler();

    if config.dispatch.resume_on_start {
        match engine.orchestrator.resume_unfinished().await {
            Ok(handles) if handles.is_empty() => info!("no unfinished dispatch runs"),
            Ok(handles) => info!(count = handles.len(), "dispatch runs resumed in background"),
            Err(e) => error!(error = %e, "failed to resume unfinished dispatch runs"),
        }
    }

    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    let served = lens_gateway::start_server(
        &server_config,
        AppState {
            engine: engine.clone(),
        },
        cancel.clone(),
    )
    .await;
    // A server that failed to bind still owns background dispatches.
    cancel.cancel();

    let grace = config.dispatch.shutdown_grace();
    if !engine.orchestrator.shutdown(grace).await {
        warn!("interrupted dispatch runs will resume on next start");
    }
    if let Err(e) = storage.close().await {
        error!(error = %e, "failed to close storage cleanly");
    }
    info!("lens stopped");
    served
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured level.
pub(crate) fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lens={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
