// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codespec Resolver (spec.md §4.1): a thin, lock-guarded facade over
//! `PersistentStore::{upsert_codespec, get_codespec}` exposing the
//! resolve/upsert contract by canonical reference.

use parking_lot::Mutex;
use std::sync::Arc;
use tyger_core::{Clock, Codespec, TygerResult};
use tyger_store::PersistentStore;

/// `resolve`/`upsert` over codespecs, sharing the same store instance the
/// rest of the engine uses — codespec upserts are serialized by the
/// store's own single-writer `Mutex`, which doubles as the "per-name lock"
/// spec.md §4.1 calls for.
pub struct CodespecResolver<C: Clock> {
    store: Arc<Mutex<PersistentStore<C>>>,
}

impl<C: Clock> CodespecResolver<C> {
    pub fn new(store: Arc<Mutex<PersistentStore<C>>>) -> Self {
        Self { store }
    }

    /// Resolve `reference` (`NAME` or `NAME/versions/V`) to its codespec.
    pub fn resolve(&self, reference: &str) -> TygerResult<Codespec> {
        Ok(self.store.lock().get_codespec(reference)?)
    }

    /// Upsert `draft` under `name`, returning the resulting version
    /// (unchanged if content-identical to the latest version on file).
    pub fn upsert(&self, name: impl Into<String>, mut draft: Codespec) -> TygerResult<Codespec> {
        draft.name = name.into();
        Ok(self.store.lock().upsert_codespec(draft)?)
    }
}

#[cfg(test)]
#[path = "codespec_resolver_tests.rs"]
mod tests;
