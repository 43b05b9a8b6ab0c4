// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message encryption for Web Push (RFC 8291) in the `aes128gcm` content
//! coding (RFC 8188).
//!
//! Every call generates a fresh ephemeral P-256 key and a random 16-byte salt,
//! so the same payload never encrypts to the same body twice. The output is a
//! single record: `salt || rs || idlen || keyid || ciphertext`.

use lens_core::DeliveryError;
use ring::aead::{AES_128_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::agreement::{self, ECDH_P256, EphemeralPrivateKey, UnparsedPublicKey};
use ring::hkdf::{self, HKDF_SHA256, KeyType, Salt};
use ring::rand::{SecureRandom, SystemRandom};

/// Record size advertised in the header.
const RECORD_SIZE: u32 = 4096;

/// Length of an uncompressed P-256 public key.
pub const PUBLIC_KEY_LEN: usize = 65;

/// Length of the subscription auth secret.
pub const AUTH_SECRET_LEN: usize = 16;

const SALT_LEN: usize = 16;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = SALT_LEN + 4 + 1 + PUBLIC_KEY_LEN;

/// Largest plaintext that fits a 4096-byte push message body.
pub const MAX_PAYLOAD_LEN: usize = RECORD_SIZE as usize - HEADER_LEN - TAG_LEN - 1;

/// Padding delimiter marking the final (and only) record.
const LAST_RECORD: u8 = 0x02;

struct OutputLen(usize);

impl KeyType for OutputLen {
    fn len(&self) -> usize {
        self.0
    }
}

fn expand(prk: &hkdf::Prk, info: &[&[u8]], out: &mut [u8]) -> Result<(), DeliveryError> {
    prk.expand(info, OutputLen(out.len()))
        .and_then(|okm| okm.fill(out))
        .map_err(|_| DeliveryError::encoding("HKDF expansion failed"))
}

/// Derived content-encryption key and nonce for one message.
pub(crate) struct ContentKeys {
    pub cek: [u8; 16],
    pub nonce: [u8; 12],
}

/// Key schedule shared by encryption and the decrypting side in tests.
pub(crate) fn derive_keys(
    ecdh_secret: &[u8],
    auth_secret: &[u8],
    ua_public: &[u8],
    as_public: &[u8],
    salt: &[u8],
) -> Result<ContentKeys, DeliveryError> {
    let prk_key = Salt::new(HKDF_SHA256, auth_secret).extract(ecdh_secret);
    let mut ikm = [0u8; 32];
    expand(
        &prk_key,
        &[&b"WebPush: info\0"[..], ua_public, as_public],
        &mut ikm,
    )?;

    let prk = Salt::new(HKDF_SHA256, salt).extract(&ikm);
    let mut keys = ContentKeys {
        cek: [0u8; 16],
        nonce: [0u8; 12],
    };
    expand(&prk, &[&b"Content-Encoding: aes128gcm\0"[..]], &mut keys.cek)?;
    expand(&prk, &[&b"Content-Encoding: nonce\0"[..]], &mut keys.nonce)?;
    Ok(keys)
}

/// Encrypt `payload` for the subscription identified by `ua_public` (the
/// `p256dh` key) and `auth_secret`.
pub fn encrypt(ua_public: &[u8], auth_secret: &[u8], payload: &[u8]) -> Result<Vec<u8>, DeliveryError> {
    if ua_public.len() != PUBLIC_KEY_LEN || ua_public[0] != 0x04 {
        return Err(DeliveryError::encoding(
            "p256dh is not an uncompressed P-256 public key",
        ));
    }
    if auth_secret.len() != AUTH_SECRET_LEN {
        return Err(DeliveryError::encoding(format!(
            "auth secret must be {AUTH_SECRET_LEN} bytes, got {}",
            auth_secret.len()
        )));
    }
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(DeliveryError::encoding(format!(
            "payload of {} bytes exceeds the {MAX_PAYLOAD_LEN}-byte limit",
            payload.len()
        )));
    }

    let rng = SystemRandom::new();
    let as_private = EphemeralPrivateKey::generate(&ECDH_P256, &rng)
        .map_err(|_| DeliveryError::encoding("failed to generate ephemeral key"))?;
    let as_public = as_private
        .compute_public_key()
        .map_err(|_| DeliveryError::encoding("failed to compute ephemeral public key"))?;
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| DeliveryError::encoding("failed to generate salt"))?;

    let peer = UnparsedPublicKey::new(&ECDH_P256, ua_public);
    let ecdh_secret = agreement::agree_ephemeral(as_private, &peer, |secret| secret.to_vec())
        .map_err(|_| DeliveryError::encoding("ECDH agreement with p256dh failed"))?;

    let keys = derive_keys(
        &ecdh_secret,
        auth_secret,
        ua_public,
        as_public.as_ref(),
        &salt,
    )?;

    let key = UnboundKey::new(&AES_128_GCM, &keys.cek)
        .map(LessSafeKey::new)
        .map_err(|_| DeliveryError::encoding("failed to create AES-128-GCM key"))?;
    let mut record = Vec::with_capacity(payload.len() + 1 + TAG_LEN);
    record.extend_from_slice(payload);
    record.push(LAST_RECORD);
    key.seal_in_place_append_tag(Nonce::assume_unique_for_key(keys.nonce), Aad::empty(), &mut record)
        .map_err(|_| DeliveryError::encoding("AES-128-GCM encryption failed"))?;

    let mut body = Vec::with_capacity(HEADER_LEN + record.len());
    body.extend_from_slice(&salt);
    body.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    body.push(PUBLIC_KEY_LEN as u8);
    body.extend_from_slice(as_public.as_ref());
    body.extend_from_slice(&record);
    Ok(body)
}
