// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HMAC-SHA256 signed-URL minting and verification for buffer access.
//!
//! No teacher crate owns this concern directly — grounded on
//! `examples/eosin-platform-eosin/iam` (base64 token encoding) and
//! `.../storage-operator` (sha2 digests) for the same "mint a verifiable,
//! time-bounded token" shape, generalized into a keyed HMAC signer since
//! Tyger's Buffer Access Service is specified backend-agnostically.

use crate::error::{AccessError, AccessResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Minimum lifetime granted to a minted access token, regardless of what
/// the caller requests.
pub const MIN_VALIDITY_MS: u64 = 60 * 60 * 1000;

/// Tolerance applied when checking a token's `issued_at_ms` against the
/// verifier's clock, to absorb skew between the minting and validating
/// hosts.
pub const CLOCK_SKEW_TOLERANCE_MS: u64 = 5 * 60 * 1000;

/// Schema version of the signed claims payload (spec.md §4.2's signed
/// string includes `version` alongside resource id/permissions/bounds).
/// Bump this if `AccessClaims`'s shape ever changes incompatibly; a
/// verifier rejects any other value outright rather than guessing at the
/// old layout.
pub const CLAIMS_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    Read,
    Write,
}

/// One HMAC signing key, identified by `id` so a verifier can pick the
/// right secret out of its key set without trial-and-error.
#[derive(Clone)]
pub struct SigningKey {
    pub id: String,
    pub secret: Vec<u8>,
}

impl SigningKey {
    pub fn new(id: impl Into<String>, secret: impl Into<Vec<u8>>) -> Self {
        Self { id: id.into(), secret: secret.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub version: u32,
    pub buffer_id: String,
    pub mode: AccessMode,
    pub issued_at_ms: u64,
    pub expires_at_ms: u64,
}

/// Signs and verifies buffer access tokens with HMAC-SHA256.
///
/// `active_key` signs every newly minted token. `verification_keys` holds
/// every key, including `active_key`, a verifier should accept — this is
/// how key rotation works: roll a new active key in, keep the previous
/// one in the verification set until every token it signed has expired,
/// then drop it.
pub struct TokenSigner {
    active_key: SigningKey,
    verification_keys: Vec<SigningKey>,
}

impl TokenSigner {
    pub fn new(active_key: SigningKey, mut verification_keys: Vec<SigningKey>) -> Self {
        if !verification_keys.iter().any(|k| k.id == active_key.id) {
            verification_keys.push(active_key.clone());
        }
        Self { active_key, verification_keys }
    }

    pub fn single(active_key: SigningKey) -> Self {
        Self::new(active_key, Vec::new())
    }

    /// Mint a token for `buffer_id`/`mode`, valid from `now_ms` for at
    /// least [`MIN_VALIDITY_MS`]. `requested_validity_ms`, if longer than
    /// the floor, is honored as-is.
    pub fn mint(
        &self,
        buffer_id: &str,
        mode: AccessMode,
        now_ms: u64,
        requested_validity_ms: Option<u64>,
    ) -> AccessResult<(String, u64)> {
        if buffer_id.is_empty() {
            return Err(AccessError::Validation("buffer_id must not be empty".into()));
        }
        let validity_ms = requested_validity_ms.unwrap_or(MIN_VALIDITY_MS).max(MIN_VALIDITY_MS);
        let expires_at_ms = now_ms + validity_ms;
        let claims = AccessClaims {
            version: CLAIMS_VERSION,
            buffer_id: buffer_id.to_string(),
            mode,
            issued_at_ms: now_ms,
            expires_at_ms,
        };

        let payload = serde_json::to_vec(&claims).map_err(|e| AccessError::Validation(e.to_string()))?;
        let signature = sign(&self.active_key.secret, &payload);

        let token = format!(
            "{}.{}.{}",
            self.active_key.id,
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(&signature),
        );
        Ok((token, expires_at_ms))
    }

    /// Verify a token minted by [`Self::mint`], checking signature,
    /// expiry, and clock-skew-tolerant issuance time against `now_ms`.
    pub fn verify(&self, token: &str, now_ms: u64) -> AccessResult<AccessClaims> {
        let mut parts = token.splitn(3, '.');
        let (key_id, payload_b64, sig_b64) = match (parts.next(), parts.next(), parts.next()) {
            (Some(k), Some(p), Some(s)) => (k, p, s),
            _ => return Err(AccessError::Validation("malformed access token".into())),
        };

        let key = self
            .verification_keys
            .iter()
            .find(|k| k.id == key_id)
            .ok_or_else(|| AccessError::UnknownKey(key_id.to_string()))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AccessError::Validation("malformed access token payload".into()))?;
        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| AccessError::Validation("malformed access token signature".into()))?;

        if !verify_signature(&key.secret, &payload, &signature) {
            return Err(AccessError::InvalidSignature);
        }

        let claims: AccessClaims =
            serde_json::from_slice(&payload).map_err(|_| AccessError::Validation("malformed access claims".into()))?;

        if claims.version != CLAIMS_VERSION {
            return Err(AccessError::Validation(format!("unsupported access claims version {}", claims.version)));
        }
        if claims.issued_at_ms > now_ms.saturating_add(CLOCK_SKEW_TOLERANCE_MS) {
            return Err(AccessError::NotYetValid);
        }
        if now_ms > claims.expires_at_ms.saturating_add(CLOCK_SKEW_TOLERANCE_MS) {
            return Err(AccessError::Expired);
        }

        Ok(claims)
    }
}

fn sign(secret: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

fn verify_signature(secret: &[u8], payload: &[u8], signature: &[u8]) -> bool {
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(payload);
    mac.verify_slice(signature).is_ok()
}

#[cfg(test)]
#[path = "signer_tests.rs"]
mod tests;
