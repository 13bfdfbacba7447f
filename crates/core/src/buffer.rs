// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Buffer: a durable, named byte-stream endpoint referenced by runs.
//!
//! `BufferId` is a [`crate::define_id!`] expansion, same as the teacher's
//! `JobId`/`WorkspaceId`. The struct itself has no teacher analogue — Tyger
//! is the first component in this lineage to need an object-storage handle
//! with soft-delete and tags.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a buffer.
    pub struct BufferId("buf-");
}

/// A durable, named byte-stream endpoint (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Buffer {
    pub id: BufferId,
    #[serde(default)]
    pub tags: IndexMap<String, String>,
    pub created_at_ms: u64,
    /// Seconds of inactivity after which the Run Sweeper marks the buffer
    /// eligible for soft deletion (spec.md §4.6). `None` means no limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_lifetime_secs: Option<u64>,
    /// Epoch millis at which the buffer was soft-deleted, if any. A
    /// soft-deleted buffer still answers metadata reads but rejects new
    /// write/read access grants (spec.md §4.2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_deleted_at_ms: Option<u64>,
}

impl Buffer {
    /// Grace period after a soft delete during which the buffer is still
    /// readable/writable (spec.md §3: "soft-deleted after TTL → hard-deleted
    /// after grace"; spec.md §4.2: access fails `NotFound` only once this
    /// has elapsed).
    pub const SOFT_DELETE_GRACE_MS: u64 = 30_000;

    pub fn new(id: BufferId, tags: IndexMap<String, String>, created_at_ms: u64) -> Self {
        Self { id, tags, created_at_ms, active_lifetime_secs: None, soft_deleted_at_ms: None }
    }

    pub fn is_soft_deleted(&self) -> bool {
        self.soft_deleted_at_ms.is_some()
    }

    /// True once a soft-deleted buffer's grace period has elapsed, i.e. it
    /// is eligible for hard deletion and should no longer grant access.
    /// A buffer that has not been soft-deleted is never expired.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        match self.soft_deleted_at_ms {
            Some(deleted_at_ms) => now_ms.saturating_sub(deleted_at_ms) >= Self::SOFT_DELETE_GRACE_MS,
            None => false,
        }
    }
}

crate::builder! {
    pub struct BufferBuilder => Buffer {
        set {
            id: BufferId = BufferId::new(),
            tags: IndexMap<String, String> = IndexMap::new(),
            created_at_ms: u64 = 0,
        }
        option {
            active_lifetime_secs: u64 = None,
            soft_deleted_at_ms: u64 = None,
        }
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
