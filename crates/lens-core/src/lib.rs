// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Traffic-Lens push campaign engine.
//!
//! This crate provides the adapter traits, error type, and domain types used
//! throughout the workspace. Storage backends and push transports implement
//! traits defined here; the engine only ever sees them as trait objects.

pub mod delivery;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use delivery::{DeliveryError, DeliveryErrorKind, DeliveryOutcome, PushTarget};
pub use error::LensError;
pub use types::{AdapterType, HealthStatus};

pub use traits::{PluginAdapter, PushTransport, StorageAdapter};
