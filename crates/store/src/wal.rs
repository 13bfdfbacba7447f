// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only write-ahead log of [`Event`]s.
//!
//! Reconstructed from `oj-storage`'s `wal_tests.rs` — the only WAL source
//! artifact retrieved into this pack — which pins down the full API and
//! corruption-recovery behavior exercised below.
//!
//! Entries are newline-delimited JSON. On open, the file is scanned from
//! the first byte; the first line that fails to parse as UTF-8 JSON marks
//! the start of a corrupt tail. The corrupt file is quarantined to `.bak`
//! (rotating up to three generations) and the live file is rewritten with
//! only the valid prefix.

use crate::error::{StoreError, StoreResult};
use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const FLUSH_THRESHOLD: usize = 100;
const FLUSH_INTERVAL: Duration = Duration::from_secs(5);
const MAX_BACKUP_GENERATIONS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub event: Event,
}

pub struct Wal {
    path: PathBuf,
    writer: BufWriter<File>,
    entries: Vec<WalEntry>,
    write_seq: u64,
    processed_seq: u64,
    read_cursor: u64,
    unflushed: usize,
    last_flush: Instant,
}

impl Wal {
    pub fn open(path: impl AsRef<Path>, processed_seq: u64) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let (entries, corrupted) = if path.exists() {
            scan(&path)?
        } else {
            (Vec::new(), false)
        };

        if corrupted {
            tracing::warn!(
                path = %path.display(),
                valid_entries = entries.len(),
                "wal corruption detected, quarantining and rewriting"
            );
            quarantine(&path)?;
            rewrite(&path, &entries)?;
        } else if !path.exists() {
            File::create(&path)?;
        }

        let write_seq = entries.last().map(|e| e.seq).unwrap_or(0);
        let file = OpenOptions::new().append(true).open(&path)?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            entries,
            write_seq,
            processed_seq,
            read_cursor: processed_seq,
            unflushed: 0,
            last_flush: Instant::now(),
        })
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }

    pub fn append(&mut self, event: &Event) -> StoreResult<u64> {
        self.write_seq += 1;
        let entry = WalEntry { seq: self.write_seq, event: event.clone() };
        let line = serde_json::to_string(&entry)?;
        writeln!(self.writer, "{line}")?;
        self.unflushed += 1;
        self.entries.push(entry);
        Ok(self.write_seq)
    }

    pub fn flush(&mut self) -> StoreResult<()> {
        self.writer.flush()?;
        self.unflushed = 0;
        self.last_flush = Instant::now();
        Ok(())
    }

    /// True once unflushed writes cross the batching threshold or enough
    /// time has passed since the last flush, signalling the daemon should
    /// call [`Self::flush`].
    pub fn needs_flush(&self) -> bool {
        self.unflushed >= FLUSH_THRESHOLD || self.last_flush.elapsed() >= FLUSH_INTERVAL
    }

    /// Returns (and advances past) the next entry after the read cursor,
    /// which starts at the `processed_seq` the WAL was opened with.
    pub fn next_unprocessed(&mut self) -> StoreResult<Option<WalEntry>> {
        match self.entries.iter().find(|e| e.seq > self.read_cursor) {
            Some(entry) => {
                self.read_cursor = entry.seq;
                Ok(Some(entry.clone()))
            }
            None => Ok(None),
        }
    }

    pub fn mark_processed(&mut self, seq: u64) {
        self.processed_seq = self.processed_seq.max(seq);
    }

    pub fn entries_after(&self, seq: u64) -> StoreResult<Vec<WalEntry>> {
        Ok(self.entries.iter().filter(|e| e.seq > seq).cloned().collect())
    }

    /// Drop entries with `seq < keep_from` from memory and rewrite the live
    /// file to contain only the retained entries. Called after a snapshot
    /// has durably captured everything up to `keep_from - 1`.
    pub fn truncate_before(&mut self, keep_from: u64) -> StoreResult<()> {
        self.entries.retain(|e| e.seq >= keep_from);
        rewrite(&self.path, &self.entries)?;
        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.unflushed = 0;
        self.last_flush = Instant::now();
        Ok(())
    }
}

/// Scan `path` from the start, returning the valid prefix of entries and
/// whether a corrupt tail was found.
fn scan(path: &Path) -> StoreResult<(Vec<WalEntry>, bool)> {
    let bytes = fs::read(path)?;
    let mut entries = Vec::new();
    let mut offset = 0usize;
    let mut corrupted = false;

    while offset < bytes.len() {
        let rest = &bytes[offset..];
        let newline_pos = rest.iter().position(|&b| b == b'\n');
        let line_end = newline_pos.unwrap_or(rest.len());
        let line = &rest[..line_end];
        let consumed = line_end + if newline_pos.is_some() { 1 } else { 0 };

        if line.is_empty() {
            offset += consumed;
            continue;
        }

        let parsed = std::str::from_utf8(line)
            .ok()
            .and_then(|text| serde_json::from_str::<WalEntry>(text).ok());

        match parsed {
            Some(entry) => {
                entries.push(entry);
                offset += consumed;
            }
            None => {
                corrupted = true;
                break;
            }
        }
    }

    Ok((entries, corrupted))
}

/// Rotate up to [`MAX_BACKUP_GENERATIONS`] `.bak` files and copy the
/// current (corrupt) contents of `path` into the freshest slot.
fn quarantine(path: &Path) -> StoreResult<()> {
    let backup = |n: u32| -> PathBuf {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = backup(MAX_BACKUP_GENERATIONS);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for gen in (1..MAX_BACKUP_GENERATIONS).rev() {
        let from = backup(gen);
        if from.exists() {
            fs::rename(&from, backup(gen + 1))?;
        }
    }
    fs::copy(path, backup(1))?;
    Ok(())
}

fn rewrite(path: &Path, entries: &[WalEntry]) -> StoreResult<()> {
    let mut file = OpenOptions::new().write(true).truncate(true).create(true).open(path)?;
    for entry in entries {
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{line}")?;
    }
    file.flush()?;
    Ok(())
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
