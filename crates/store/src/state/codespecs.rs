// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codespec event handlers.

use super::MaterializedState;
use crate::event::Event;
use tyger_core::{BufferParameters, Codespec};

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    if let Event::CodespecUpserted {
        name,
        version,
        kind,
        image,
        command,
        args,
        env,
        working_dir,
        resources,
        buffer_inputs,
        buffer_outputs,
    } = event
    {
        let versions = state.codespecs.entry(name.clone()).or_default();
        // Idempotency: a replayed upsert for a version already present is a no-op.
        if versions.iter().any(|c| c.version == *version) {
            return;
        }
        let mut buffers = BufferParameters::default();
        buffers.inputs.extend(buffer_inputs.iter().cloned());
        buffers.outputs.extend(buffer_outputs.iter().cloned());
        versions.push(Codespec {
            name: name.clone(),
            version: *version,
            kind: *kind,
            image: image.clone(),
            command: command.clone(),
            args: args.clone(),
            env: env.clone(),
            working_dir: working_dir.clone(),
            resources: resources.clone(),
            buffers,
        });
        versions.sort_by_key(|c| c.version);
    }
}
