// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Traffic-Lens integration tests.
//!
//! Provides in-memory and scripted adapters for fast, deterministic,
//! CI-runnable tests without a database or a push service.
//!
//! # Components
//!
//! - [`MemoryStorage`] - `StorageAdapter` backed by in-process maps, with
//!   switchable failure injection
//! - [`MockTransport`] - `PushTransport` with per-endpoint scripted outcomes
//!   and concurrency tracking
//! - [`fixtures`] - seeding helpers for domains, subscribers, and campaigns

pub mod fixtures;
pub mod memory_storage;
pub mod mock_transport;

pub use memory_storage::MemoryStorage;
pub use mock_transport::{MockTransport, SentPush};
