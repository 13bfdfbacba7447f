// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The in-process surface spec.md §6 would otherwise expose over HTTP
//! (spec.md §1 places the HTTP/CLI layer out of scope): one async method
//! per external interface, implemented by [`crate::engine::Engine`].
//!
//! Grounded on `oj-daemon`'s `wire` protocol request/response enum — same
//! one-request-per-endpoint shape — collapsed here into a single trait
//! since there is no second process on the other end of a socket to
//! negotiate a wire format with.

use async_trait::async_trait;
use indexmap::IndexMap;
use tyger_access::AccessGrant;
use tyger_core::{Buffer, Codespec, Run, RunConfig, RunId, TygerResult};

use crate::archiver::LogFilterOptions;

/// Which network path a minted buffer URI should be reachable from
/// (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

impl From<AccessMode> for tyger_access::AccessMode {
    fn from(mode: AccessMode) -> Self {
        match mode {
            AccessMode::Read => tyger_access::AccessMode::Read,
            AccessMode::Write => tyger_access::AccessMode::Write,
        }
    }
}

#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn upsert_codespec(&self, name: String, draft: Codespec) -> TygerResult<Codespec>;

    async fn get_codespec(&self, reference: String) -> TygerResult<Codespec>;

    async fn create_buffer(
        &self,
        tags: IndexMap<String, String>,
        active_lifetime_secs: Option<u64>,
    ) -> TygerResult<Buffer>;

    async fn buffer_access(
        &self,
        buffer_id: String,
        mode: AccessMode,
        external: bool,
    ) -> TygerResult<AccessGrant>;

    async fn create_run(&self, config: RunConfig) -> TygerResult<Run>;

    async fn get_run(&self, id: RunId) -> TygerResult<Run>;

    /// Idempotent: requesting cancellation of an already-canceling or
    /// already-terminal run just returns the current row.
    async fn cancel_run(&self, id: RunId) -> TygerResult<Run>;

    async fn read_logs(&self, id: RunId, opts: LogFilterOptions) -> TygerResult<Vec<u8>>;

    async fn list_runs(&self, cursor: Option<u64>, limit: usize) -> TygerResult<(Vec<Run>, Option<u64>)>;

    /// Cheap liveness probe: does not touch the store or any backend.
    async fn healthcheck(&self) -> TygerResult<()>;
}
