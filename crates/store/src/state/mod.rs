// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state derived from WAL replay.

mod buffers;
mod codespecs;
mod runs;

use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tyger_core::{Buffer, Codespec, Run};

/// Materialized state built by folding [`Event`]s over an empty state, in
/// WAL order, one event at a time.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    /// Codespec name → versions, ordered ascending by `version`.
    pub codespecs: HashMap<String, Vec<Codespec>>,
    pub runs: HashMap<u64, Run>,
    pub buffers: HashMap<String, Buffer>,
}

impl MaterializedState {
    pub fn get_codespec(&self, name: &str, version: Option<u32>) -> Option<&Codespec> {
        let versions = self.codespecs.get(name)?;
        match version {
            Some(v) => versions.iter().find(|c| c.version == v),
            None => versions.last(),
        }
    }

    pub fn latest_codespec_version(&self, name: &str) -> Option<u32> {
        self.codespecs.get(name).and_then(|v| v.last()).map(|c| c.version)
    }

    pub fn get_run(&self, id: u64) -> Option<&Run> {
        self.runs.get(&id)
    }

    pub fn get_buffer(&self, id: &str) -> Option<&Buffer> {
        self.buffers.get(id)
    }

    /// Apply an event to derive state changes.
    ///
    /// Event handlers must be idempotent: replaying the same event twice
    /// must yield the same state as replaying it once, since a crash right
    /// after an append (before the in-memory state update completes) can
    /// cause that last event to be folded again on the next restart.
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::CodespecUpserted { .. } => codespecs::apply(self, event),
            Event::RunCreated { .. }
            | Event::RunStatusChanged { .. }
            | Event::RunFinalized { .. }
            | Event::RunRunningCountChanged { .. } => runs::apply(self, event),
            Event::BufferCreated { .. } | Event::BufferSoftDeleted { .. } => {
                buffers::apply(self, event)
            }
            Event::Shutdown => {}
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
