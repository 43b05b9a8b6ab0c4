// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! VAPID (RFC 8292) request signing.
//!
//! Each push request carries `Authorization: vapid t=<jwt>, k=<public key>`,
//! where the JWT is ES256-signed with the domain's private key and scoped to
//! the push service origin.

use chrono::{DateTime, Duration, Utc};
use lens_core::DeliveryError;
use lens_core::types::VapidKeys;
use ring::rand::SystemRandom;
use ring::signature::{ECDSA_P256_SHA256_FIXED_SIGNING, EcdsaKeyPair};

use crate::encoding;

/// How long a signed token stays valid. Push services reject anything over 24h.
pub const TOKEN_LIFETIME: Duration = Duration::hours(12);

/// Signs VAPID tokens with one domain's key pair.
pub struct VapidSigner {
    key_pair: EcdsaKeyPair,
    public_key: String,
    rng: SystemRandom,
}

impl VapidSigner {
    /// Build a signer from a base64url key pair. Keys that do not decode, or
    /// a public key that does not match the private key, are rejected.
    pub fn new(keys: &VapidKeys) -> Result<Self, DeliveryError> {
        let private = encoding::decode_key(&keys.private_key)
            .map_err(|e| DeliveryError::encoding(format!("VAPID private key is not base64: {e}")))?;
        let public = encoding::decode_key(&keys.public_key)
            .map_err(|e| DeliveryError::encoding(format!("VAPID public key is not base64: {e}")))?;
        let rng = SystemRandom::new();
        let key_pair = EcdsaKeyPair::from_private_key_and_public_key(
            &ECDSA_P256_SHA256_FIXED_SIGNING,
            &private,
            &public,
            &rng,
        )
        .map_err(|e| DeliveryError::encoding(format!("VAPID key pair rejected: {e}")))?;

        Ok(Self {
            key_pair,
            public_key: encoding::encode(&public),
            rng,
        })
    }

    /// The `Authorization` header value for a request to `endpoint`.
    pub fn authorization(
        &self,
        endpoint: &str,
        subject: &str,
        now: DateTime<Utc>,
    ) -> Result<String, DeliveryError> {
        let token = self.token(endpoint, subject, now)?;
        Ok(format!("vapid t={token}, k={}", self.public_key))
    }

    fn token(&self, endpoint: &str, subject: &str, now: DateTime<Utc>) -> Result<String, DeliveryError> {
        let audience = reqwest::Url::parse(endpoint)
            .map_err(|e| DeliveryError::encoding(format!("invalid push endpoint: {e}")))?
            .origin()
            .ascii_serialization();

        let header = serde_json::json!({ "typ": "JWT", "alg": "ES256" });
        let claims = serde_json::json!({
            "aud": audience,
            "exp": (now + TOKEN_LIFETIME).timestamp(),
            "sub": subject,
        });
        let signing_input = format!(
            "{}.{}",
            encoding::encode(header.to_string().as_bytes()),
            encoding::encode(claims.to_string().as_bytes())
        );
        let signature = self
            .key_pair
            .sign(&self.rng, signing_input.as_bytes())
            .map_err(|_| DeliveryError::encoding("VAPID signing failed"))?;
        Ok(format!(
            "{signing_input}.{}",
            encoding::encode(signature.as_ref())
        ))
    }
}
