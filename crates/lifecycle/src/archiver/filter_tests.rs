// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn blob(lines: &[&str]) -> Vec<u8> {
    lines.join("\n").into_bytes()
}

#[test]
fn strips_leading_timestamp_by_default() {
    let input = blob(&["2026-08-01T00:00:00.000000000Z hello", "2026-08-01T00:00:01.000000000Z world"]);
    let out = apply(input, &LogFilterOptions::default());
    assert_eq!(String::from_utf8(out).unwrap(), "hello\nworld\n");
}

#[test]
fn keeps_timestamps_when_requested() {
    let input = blob(&["2026-08-01T00:00:00.000000000Z hello"]);
    let opts = LogFilterOptions { include_timestamps: true, ..Default::default() };
    let out = apply(input, &opts);
    assert_eq!(String::from_utf8(out).unwrap(), "2026-08-01T00:00:00.000000000Z hello\n");
}

#[test]
fn skips_the_requested_number_of_lines() {
    let input = blob(&["one", "two", "three"]);
    let opts = LogFilterOptions { skip_lines: 2, ..Default::default() };
    let out = apply(input, &opts);
    assert_eq!(String::from_utf8(out).unwrap(), "three\n");
}

#[test]
fn drops_lines_before_the_since_bound() {
    let input = blob(&[
        "2026-08-01T00:00:00.000000000Z early",
        "2026-08-01T00:00:10.000000000Z late",
    ]);
    let since_ms = chrono::DateTime::parse_from_rfc3339("2026-08-01T00:00:05.000000000Z")
        .unwrap()
        .timestamp_millis();
    let opts = LogFilterOptions { since_ms: Some(since_ms), ..Default::default() };
    let out = apply(input, &opts);
    assert_eq!(String::from_utf8(out).unwrap(), "late\n");
}

#[test]
fn lines_without_a_timestamp_survive_since_filtering() {
    let input = blob(&["no timestamp here"]);
    let opts = LogFilterOptions { since_ms: Some(i64::MAX), ..Default::default() };
    let out = apply(input, &opts);
    assert_eq!(String::from_utf8(out).unwrap(), "no timestamp here\n");
}
