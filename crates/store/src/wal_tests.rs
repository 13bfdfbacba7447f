// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write;
use tempfile::tempdir;
use tyger_core::BufferId;

fn test_event(tag: &str) -> Event {
    Event::BufferCreated {
        id: BufferId::from_string(format!("buf-{tag:0<19}")),
        tags: Default::default(),
        active_lifetime_secs: None,
        created_at_ms: 0,
    }
}

#[test]
fn open_creates_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let wal = Wal::open(&path, 0).unwrap();

    assert!(path.exists());
    assert_eq!(wal.write_seq(), 0);
    assert_eq!(wal.processed_seq(), 0);
}

#[test]
fn append_and_flush() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let mut wal = Wal::open(&path, 0).unwrap();

    let seq1 = wal.append(&test_event("cmd1")).unwrap();
    let seq2 = wal.append(&test_event("cmd2")).unwrap();

    assert_eq!(seq1, 1);
    assert_eq!(seq2, 2);

    wal.flush().unwrap();

    let metadata = std::fs::metadata(&path).unwrap();
    assert!(metadata.len() > 0);
}

#[test]
fn next_unprocessed_walks_entries_in_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let mut wal = Wal::open(&path, 0).unwrap();

    wal.append(&test_event("cmd1")).unwrap();
    wal.append(&test_event("cmd2")).unwrap();

    let entry1 = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(entry1.seq, 1);

    let entry2 = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(entry2.seq, 2);

    assert!(wal.next_unprocessed().unwrap().is_none());
}

#[test]
fn mark_processed_updates_processed_seq() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let mut wal = Wal::open(&path, 0).unwrap();

    wal.append(&test_event("cmd1")).unwrap();
    wal.flush().unwrap();

    let entry = wal.next_unprocessed().unwrap().unwrap();
    wal.mark_processed(entry.seq);

    assert_eq!(wal.processed_seq(), 1);
}

#[test]
fn reopen_with_processed_seq_skips_already_processed_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&test_event("cmd1")).unwrap();
        wal.append(&test_event("cmd2")).unwrap();
        wal.append(&test_event("cmd3")).unwrap();
        wal.flush().unwrap();
    }

    let mut wal = Wal::open(&path, 2).unwrap();

    let entry = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(entry.seq, 3);
    assert!(wal.next_unprocessed().unwrap().is_none());
}

#[test]
fn entries_after_returns_suffix() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let mut wal = Wal::open(&path, 0).unwrap();

    wal.append(&test_event("cmd1")).unwrap();
    wal.append(&test_event("cmd2")).unwrap();
    wal.append(&test_event("cmd3")).unwrap();
    wal.flush().unwrap();

    let entries = wal.entries_after(1).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 2);
    assert_eq!(entries[1].seq, 3);
}

#[test]
fn truncate_before_drops_earlier_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let mut wal = Wal::open(&path, 0).unwrap();

    wal.append(&test_event("cmd1")).unwrap();
    wal.append(&test_event("cmd2")).unwrap();
    wal.append(&test_event("cmd3")).unwrap();
    wal.flush().unwrap();

    wal.truncate_before(2).unwrap();

    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 2);
    assert_eq!(entries[1].seq, 3);
}

/// Regression test: Shutdown events persisted in the WAL must be visible on
/// recovery so the daemon can skip them without erroring.
#[test]
fn shutdown_event_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&test_event("cmd1")).unwrap();
        wal.append(&Event::Shutdown).unwrap();
        wal.flush().unwrap();
    }

    let mut wal = Wal::open(&path, 1).unwrap();

    let entries = wal.entries_after(1).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].seq, 2);
    assert!(matches!(entries[0].event, Event::Shutdown));

    let entry = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(entry.seq, 2);
    assert!(matches!(entry.event, Event::Shutdown));

    assert!(wal.next_unprocessed().unwrap().is_none());
}

#[test]
fn needs_flush_threshold() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let mut wal = Wal::open(&path, 0).unwrap();

    assert!(!wal.needs_flush());

    for i in 0..50 {
        wal.append(&test_event(&format!("{i}"))).unwrap();
    }

    for i in 50..101 {
        wal.append(&test_event(&format!("{i}"))).unwrap();
    }

    assert!(wal.needs_flush());
}

#[test]
fn open_corrupt_wal_creates_bak_and_preserves_valid_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&test_event("cmd1")).unwrap();
        wal.append(&test_event("cmd2")).unwrap();
        wal.flush().unwrap();
    }
    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"not-valid-json\n").unwrap();
    }

    let wal = Wal::open(&path, 0).unwrap();

    assert_eq!(wal.write_seq(), 2);

    let bak = path.with_extension("bak");
    assert!(bak.exists());

    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 1);
    assert_eq!(entries[1].seq, 2);
}

#[test]
fn open_corrupt_wal_rotates_bak_files() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    for i in 1..=4u8 {
        {
            let mut f = std::fs::File::create(&path).unwrap();
            f.write_all(&[i; 8]).unwrap();
        }

        let wal = Wal::open(&path, 0).unwrap();
        assert_eq!(wal.write_seq(), 0);
    }

    let bak1 = path.with_extension("bak");
    assert!(bak1.exists());
    assert_eq!(std::fs::read(&bak1).unwrap(), vec![4u8; 8]);

    let bak2 = path.with_extension("bak.2");
    assert!(bak2.exists());
    assert_eq!(std::fs::read(&bak2).unwrap(), vec![3u8; 8]);

    let bak3 = path.with_extension("bak.3");
    assert!(bak3.exists());
    assert_eq!(std::fs::read(&bak3).unwrap(), vec![2u8; 8]);

    let bak4 = path.with_extension("bak.4");
    assert!(!bak4.exists());
}

#[test]
fn entries_after_stops_at_corruption() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&test_event("cmd1")).unwrap();
        wal.append(&test_event("cmd2")).unwrap();
        wal.flush().unwrap();
    }
    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"corrupted-data\n").unwrap();
    }

    let wal = Wal::open(&path, 0).unwrap();

    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"post-open-corruption\n").unwrap();
    }

    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 1);
    assert_eq!(entries[1].seq, 2);
}

#[test]
fn next_unprocessed_skips_corrupt_entry() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let mut wal = Wal::open(&path, 0).unwrap();
    wal.append(&test_event("cmd1")).unwrap();
    wal.flush().unwrap();

    let entry = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(entry.seq, 1);

    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"corrupt-line\n").unwrap();
    }

    let result = wal.next_unprocessed().unwrap();
    assert!(result.is_none());

    wal.append(&test_event("cmd2")).unwrap();
    wal.flush().unwrap();

    let entry = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(entry.seq, 2);
}

#[test]
fn open_with_binary_wal_data() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    std::fs::write(&path, b"\x80\x81\x82\xff\xfe\n").unwrap();

    let wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.write_seq(), 0);

    let bak = path.with_extension("bak");
    assert!(bak.exists());
}

#[test]
fn open_with_valid_entries_then_binary() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&test_event("cmd1")).unwrap();
        wal.append(&test_event("cmd2")).unwrap();
        wal.flush().unwrap();
    }

    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"\x80\x81\x82\xff\xfe\n").unwrap();
    }

    let wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.write_seq(), 2);

    let bak = path.with_extension("bak");
    assert!(bak.exists());

    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 1);
    assert_eq!(entries[1].seq, 2);
}
