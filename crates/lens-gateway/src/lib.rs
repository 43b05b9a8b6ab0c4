// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP API for the Traffic-Lens push engine.
//!
//! Exposes campaign sends and delivery counters, subscriber registration and
//! maintenance, and the click/close callbacks posted by service workers.
//! Every error answers with `{"code": ..., "message": ...}`.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::{ApiError, ErrorBody};
pub use server::{AppState, ServerConfig, build_router, start_server};
