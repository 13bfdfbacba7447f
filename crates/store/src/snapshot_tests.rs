// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::event::Event;
use tempfile::tempdir;
use tyger_core::{BufferId, CodespecKind, Resources};

#[test]
fn round_trips_empty_state() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.snapshot");
    let state = MaterializedState::default();

    save(&path, 0, &state).unwrap();
    let (seq, loaded) = load(&path, &MigrationRegistry::new()).unwrap().unwrap();

    assert_eq!(seq, 0);
    assert_eq!(loaded.runs.len(), 0);
}

#[test]
fn round_trips_populated_state() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.snapshot");

    let mut state = MaterializedState::default();
    state.apply_event(&Event::CodespecUpserted {
        name: "echo".to_string(),
        version: 1,
        kind: CodespecKind::Job,
        image: "example.test/image:latest".to_string(),
        command: Vec::new(),
        args: Vec::new(),
        env: Default::default(),
        working_dir: None,
        resources: Resources::default(),
        buffer_inputs: Vec::new(),
        buffer_outputs: Vec::new(),
    });
    state.apply_event(&Event::BufferCreated {
        id: BufferId::new(),
        tags: Default::default(),
        active_lifetime_secs: Some(3600),
        created_at_ms: 5_000,
    });

    save(&path, 42, &state).unwrap();
    let (seq, loaded) = load(&path, &MigrationRegistry::new()).unwrap().unwrap();

    assert_eq!(seq, 42);
    assert_eq!(loaded.latest_codespec_version("echo"), Some(1));
    assert_eq!(loaded.buffers.len(), 1);
}

#[test]
fn missing_file_returns_none() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nonexistent.snapshot");
    assert!(load(&path, &MigrationRegistry::new()).unwrap().is_none());
}
