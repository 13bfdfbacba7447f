// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned snapshot migrations.
//!
//! Reconstructed from `oj-storage`'s `migration_tests.rs`: a registry of
//! single-version-step [`Migration`]s chained together by
//! [`MigrationRegistry::migrate_to`].

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MigrationError {
    #[error("snapshot version {0} is newer than the running binary (max known {1})")]
    TooNew(u32, u32),

    #[error("no migration path from version {0} to {1}")]
    NoPath(u32, u32),

    #[error("malformed snapshot: {0}")]
    Malformed(String),
}

/// A single-step migration from `source_version` to `target_version`.
pub trait Migration: Send + Sync {
    fn source_version(&self) -> u32;
    fn target_version(&self) -> u32;
    fn migrate(&self, snapshot: &mut Value) -> Result<(), MigrationError>;
}

#[derive(Default)]
pub struct MigrationRegistry {
    pub(crate) migrations: Vec<Box<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self { migrations: Vec::new() }
    }

    pub fn register(&mut self, migration: Box<dyn Migration>) {
        self.migrations.push(migration);
    }

    /// Migrate `snapshot` (expected to carry a `"v"` field) up to
    /// `current_version`, applying registered migrations one step at a
    /// time. A no-op if the snapshot is already at `current_version`.
    pub fn migrate_to(&self, mut snapshot: Value, current_version: u32) -> Result<Value, MigrationError> {
        let mut version = snapshot
            .get("v")
            .and_then(Value::as_u64)
            .ok_or_else(|| MigrationError::Malformed("missing \"v\" field".to_string()))? as u32;

        if version == current_version {
            return Ok(snapshot);
        }
        if version > current_version {
            return Err(MigrationError::TooNew(version, current_version));
        }

        while version < current_version {
            let step = self
                .migrations
                .iter()
                .find(|m| m.source_version() == version)
                .ok_or(MigrationError::NoPath(version, current_version))?;
            step.migrate(&mut snapshot)?;
            version = step.target_version();
            if let Some(obj) = snapshot.as_object_mut() {
                obj.insert("v".to_string(), version.into());
            }
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
