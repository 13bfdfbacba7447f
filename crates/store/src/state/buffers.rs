// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Buffer event handlers.

use super::MaterializedState;
use crate::event::Event;
use tyger_core::Buffer;

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::BufferCreated { id, tags, active_lifetime_secs, created_at_ms } => {
            if state.buffers.contains_key(id.as_str()) {
                return;
            }
            let mut buffer = Buffer::new(*id, tags.clone(), *created_at_ms);
            buffer.active_lifetime_secs = *active_lifetime_secs;
            state.buffers.insert(id.as_str().to_string(), buffer);
        }

        Event::BufferSoftDeleted { id, epoch_ms } => {
            if let Some(buffer) = state.buffers.get_mut(id.as_str()) {
                if buffer.soft_deleted_at_ms.is_none() {
                    buffer.soft_deleted_at_ms = Some(*epoch_ms);
                }
            }
        }

        _ => {}
    }
}
