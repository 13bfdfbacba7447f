// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Buffer Access Service (spec.md §4.2/§6): mints signed, time-bounded
//! URIs for reading or writing a buffer's contents, on either the
//! internal (cluster-local) or external (public) network path.

use crate::error::{AccessError, AccessResult};
use crate::signer::{AccessMode, TokenSigner};
use tyger_core::Buffer;

#[derive(Debug)]
pub struct AccessGrant {
    pub uri: String,
    pub expires_at_ms: u64,
}

/// Wraps a [`TokenSigner`] with the two base URIs Tyger exposes a buffer
/// through, picking one by the caller's `external` flag.
pub struct BufferAccessService {
    signer: TokenSigner,
    internal_base_uri: String,
    external_base_uri: String,
}

impl BufferAccessService {
    pub fn new(signer: TokenSigner, internal_base_uri: impl Into<String>, external_base_uri: impl Into<String>) -> Self {
        Self { signer, internal_base_uri: internal_base_uri.into(), external_base_uri: external_base_uri.into() }
    }

    /// Grant `mode` access to `buffer`, refusing it once its soft-delete
    /// grace period has elapsed (spec.md §4.2: a soft-deleted buffer stays
    /// readable/writable through its grace period, and only then starts
    /// rejecting access).
    pub fn grant_access(
        &self,
        buffer: &Buffer,
        mode: AccessMode,
        external: bool,
        now_ms: u64,
    ) -> AccessResult<AccessGrant> {
        if buffer.is_expired(now_ms) {
            return Err(AccessError::NotFound(format!("buffer {} has been deleted", buffer.id)));
        }

        let (token, expires_at_ms) = self.signer.mint(buffer.id.as_str(), mode, now_ms, None)?;
        let base = if external { &self.external_base_uri } else { &self.internal_base_uri };
        let uri = format!("{base}/v1/buffers/{}?token={token}", buffer.id);
        Ok(AccessGrant { uri, expires_at_ms })
    }

    /// Validate a token presented against an inbound read/write request,
    /// e.g. by an ingress filter in front of the buffer storage backend.
    pub fn validate(&self, buffer_id: &str, token: &str, mode: AccessMode, now_ms: u64) -> AccessResult<()> {
        let claims = self.signer.verify(token, now_ms)?;
        if claims.buffer_id != buffer_id {
            return Err(AccessError::Validation("token does not match requested buffer".into()));
        }
        if claims.mode != mode {
            return Err(AccessError::Validation("token does not grant the requested access mode".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
