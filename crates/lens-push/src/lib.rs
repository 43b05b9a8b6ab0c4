// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Web Push transport for the Traffic-Lens push engine.
//!
//! Messages are encrypted per subscription with the `aes128gcm` content
//! coding, signed with the owning domain's VAPID key pair, and POSTed to the
//! subscriber's push service. Responses are classified into
//! [`DeliveryErrorKind`](lens_core::DeliveryErrorKind)s so the engine can
//! tell a gone subscription from a transient rejection.

pub mod ece;
pub mod encoding;
pub mod transport;
pub mod vapid;

pub use transport::{WebPushTransport, classify_status};
pub use vapid::VapidSigner;
