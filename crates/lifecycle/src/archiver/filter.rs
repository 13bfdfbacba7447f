// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The three-stage filter pipeline from spec.md §4.7: strip leading
//! timestamps, skip a line count, drop lines before a `since` bound.
//!
//! Each stage consumes one parsed [`LogLine`] at a time and passes it (or
//! nothing) to the next, so [`apply_stream`] never holds more than a
//! single line of the log in memory regardless of how large the archived
//! blob is — no stage buffers the full stream.

use chrono::DateTime;
use std::io::{BufRead, Write};

/// One log line, parsed once: `raw` is the byte-for-byte original line;
/// `text` is `raw` with a leading RFC3339Nano timestamp and separating
/// space removed, if one was present.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp_ms: Option<i64>,
    pub raw: String,
    pub text: String,
}

fn parse_line(raw: &str) -> LogLine {
    match raw.split_once(' ') {
        Some((prefix, rest)) => match DateTime::parse_from_rfc3339(prefix) {
            Ok(dt) => LogLine {
                timestamp_ms: Some(dt.timestamp_millis()),
                raw: raw.to_string(),
                text: rest.to_string(),
            },
            Err(_) => LogLine { timestamp_ms: None, raw: raw.to_string(), text: raw.to_string() },
        },
        None => LogLine { timestamp_ms: None, raw: raw.to_string(), text: raw.to_string() },
    }
}

/// One stage of the pipeline: given the next line from upstream, either
/// passes a (possibly transformed) line downstream or drops it.
pub trait FilterStage: Send + Sync {
    fn apply(&mut self, line: LogLine) -> Option<LogLine>;
}

/// Stage 2: skip the first `n` lines, counted before any removal by a
/// later stage (spec.md §4.7 step 2 — "after stripping", which does not
/// itself remove lines, so skip still counts by original position).
pub struct SkipLinesStage {
    n: usize,
    seen: usize,
}

impl SkipLinesStage {
    pub fn new(n: usize) -> Self {
        Self { n, seen: 0 }
    }
}

impl FilterStage for SkipLinesStage {
    fn apply(&mut self, line: LogLine) -> Option<LogLine> {
        if self.seen < self.n {
            self.seen += 1;
            None
        } else {
            Some(line)
        }
    }
}

/// Stage 3: drop lines whose original timestamp is strictly before
/// `since_ms`. Lines with no parseable timestamp are kept, since there is
/// no original timestamp to compare.
pub struct SinceStage {
    pub since_ms: i64,
}

impl FilterStage for SinceStage {
    fn apply(&mut self, line: LogLine) -> Option<LogLine> {
        if line.timestamp_ms.is_none_or(|t| t >= self.since_ms) {
            Some(line)
        } else {
            None
        }
    }
}

/// Stage 1: replace each line's displayed text with the timestamp-
/// stripped form. A no-op on `LogLine`, which is always parsed with both
/// forms available — [`apply_stream`] picks `text` over `raw` at output
/// time instead of running this stage, but it's kept for callers that
/// want it as an explicit pipeline step.
pub struct StripTimestampStage;

impl FilterStage for StripTimestampStage {
    fn apply(&mut self, line: LogLine) -> Option<LogLine> {
        Some(line)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogFilterOptions {
    pub include_timestamps: bool,
    pub skip_lines: usize,
    pub since_ms: Option<i64>,
}

/// Stream `reader` line by line through the filter pipeline, writing
/// surviving lines to `writer` as it goes. Never materializes more than
/// one line's worth of the log at a time.
pub fn apply_stream(reader: impl BufRead, mut writer: impl Write, opts: &LogFilterOptions) -> std::io::Result<()> {
    let mut skip = (opts.skip_lines > 0).then(|| SkipLinesStage::new(opts.skip_lines));
    let mut since = opts.since_ms.map(|since_ms| SinceStage { since_ms });

    for raw in reader.lines() {
        let mut line = Some(parse_line(&raw?));
        if let Some(stage) = skip.as_mut() {
            line = line.and_then(|l| stage.apply(l));
        }
        if let Some(stage) = since.as_mut() {
            line = line.and_then(|l| stage.apply(l));
        }
        let Some(line) = line else { continue };

        writer.write_all(if opts.include_timestamps { line.raw.as_bytes() } else { line.text.as_bytes() })?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// In-memory convenience wrapper over [`apply_stream`] for callers (and
/// tests) that already hold the whole blob.
pub fn apply(blob: Vec<u8>, opts: &LogFilterOptions) -> Vec<u8> {
    let mut out = Vec::new();
    let _ = apply_stream(blob.as_slice(), &mut out, opts);
    out
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
