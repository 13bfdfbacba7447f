// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log Archiver (spec.md §4.7): writes a run's logs to a single immutable
//! blob, and serves reads either from that blob (once archived) or from
//! the live workload driver, through a small filter pipeline.
//!
//! Archival writes atomically (tmp file + rename) the way
//! `tyger_store::snapshot::save` persists a `MaterializedState` snapshot.
//! The filter pipeline chains transform stages over paired reader/writer
//! halves the way the teacher's `crates/shell/src/exec/redirect.rs` wires
//! a command's stdio, adapted here to a `FilterStage` trait instead of a
//! full redirection AST.

mod filter;

pub use filter::{FilterStage, LogFilterOptions, SinceStage, SkipLinesStage, StripTimestampStage};

use std::io::Read;
use std::path::PathBuf;
use thiserror::Error;
use tyger_core::RunId;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Writes and serves archived run logs under a root directory, one file
/// per run.
pub struct LogArchiver {
    root: PathBuf,
}

impl LogArchiver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn blob_path(&self, run_id: RunId) -> PathBuf {
        self.root.join(format!("{run_id}.log"))
    }

    pub fn is_archived(&self, run_id: RunId) -> bool {
        self.blob_path(run_id).exists()
    }

    /// Write `content` as the run's immutable log blob, atomically
    /// overwriting any prior (partial) attempt — archival is
    /// at-least-once, so a retried call after a mid-flight failure must
    /// be safe (spec.md §4.7).
    pub async fn archive(&self, run_id: RunId, content: Vec<u8>) -> ArchiveResult<()> {
        let root = self.root.clone();
        let path = self.blob_path(run_id);
        tokio::task::spawn_blocking(move || -> ArchiveResult<()> {
            std::fs::create_dir_all(&root)?;
            let tmp_path = path.with_extension("log.tmp");
            std::fs::write(&tmp_path, &content)?;
            std::fs::rename(&tmp_path, &path)?;
            Ok(())
        })
        .await
        .unwrap_or_else(|e| Err(ArchiveError::Io(std::io::Error::other(e))))
    }

    /// Apply `opts` to the archived blob, or to `live` (the bytes the
    /// workload driver's `listLogs` returned) if nothing has been
    /// archived yet. Reads the archived blob off disk line by line rather
    /// than loading it whole, so a large archive doesn't sit fully in
    /// memory twice over (spec.md §4.7).
    pub fn read(&self, run_id: RunId, opts: &LogFilterOptions, live: Vec<u8>) -> ArchiveResult<Vec<u8>> {
        let path = self.blob_path(run_id);
        let mut out = Vec::new();
        if path.exists() {
            let file = std::fs::File::open(&path)?;
            filter::apply_stream(std::io::BufReader::new(file), &mut out, opts)?;
        } else {
            filter::apply_stream(live.as_slice(), &mut out, opts)?;
        }
        Ok(out)
    }
}

/// Read an entire reader into memory. Used by callers that hand the
/// archiver a `Read` (e.g. a driver's chunked log stream) rather than an
/// already-materialized `Vec<u8>`.
pub fn read_to_vec(mut r: impl Read) -> ArchiveResult<Vec<u8>> {
    let mut buf = Vec::new();
    r.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
#[path = "archiver_tests.rs"]
mod tests;
