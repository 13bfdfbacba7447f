// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic JSON+zstd snapshots of [`MaterializedState`], so recovery
//! doesn't have to replay the whole WAL from the beginning.

use crate::error::StoreResult;
use crate::migration::MigrationRegistry;
use crate::state::MaterializedState;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Bump when [`MaterializedState`]'s shape changes in a way that requires a
/// [`crate::migration::Migration`] to read snapshots written by older
/// binaries.
pub const SNAPSHOT_VERSION: u32 = 1;
const ZSTD_LEVEL: i32 = 3;

/// Persist `state` as of WAL sequence `seq`, atomically (write to a `.tmp`
/// sibling, then rename over the target).
pub fn save(path: impl AsRef<Path>, seq: u64, state: &MaterializedState) -> StoreResult<()> {
    let path = path.as_ref();
    let envelope = serde_json::json!({
        "v": SNAPSHOT_VERSION,
        "seq": seq,
        "state": state,
    });
    let json = serde_json::to_vec(&envelope)?;
    let compressed = zstd::encode_all(json.as_slice(), ZSTD_LEVEL)?;

    let tmp_path = path.with_extension("snapshot.tmp");
    fs::write(&tmp_path, compressed)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Load a snapshot, migrating it forward to [`SNAPSHOT_VERSION`] if it was
/// written by an older binary. Returns `None` if no snapshot file exists
/// yet (a fresh store replays the WAL from the beginning).
pub fn load(
    path: impl AsRef<Path>,
    registry: &MigrationRegistry,
) -> StoreResult<Option<(u64, MaterializedState)>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }

    let compressed = fs::read(path)?;
    let json = zstd::decode_all(compressed.as_slice())?;
    let envelope: Value = serde_json::from_slice(&json)?;
    let envelope = registry.migrate_to(envelope, SNAPSHOT_VERSION)?;

    let seq = envelope
        .get("seq")
        .and_then(Value::as_u64)
        .ok_or_else(|| crate::migration::MigrationError::Malformed("missing \"seq\" field".to_string()))?;
    let state: MaterializedState = serde_json::from_value(
        envelope.get("state").cloned().unwrap_or(Value::Null),
    )?;

    Ok(Some((seq, state)))
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
