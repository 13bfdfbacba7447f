// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tag-update observer channel (spec.md §4.5): an in-memory
//! `runId → set<subscriber>` map. Registration is guarded by a
//! copy-on-write swap rather than a lock held across the fan-out send, so
//! a slow or dead subscriber never blocks the writer that just committed
//! a Run mutation.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tyger_core::{Run, RunId};

const SUBSCRIBER_CHANNEL_CAPACITY: usize = 16;

type SubscriberList = Vec<Weak<mpsc::Sender<Run>>>;

/// `runId → set<subscriber>`, copy-on-write: every mutation clones the
/// per-run `Vec`, mutates the clone, and swaps it in, so readers fanning
/// out a notification never observe a half-updated list.
#[derive(Default, Clone)]
pub struct SubscriberRegistry {
    by_run: Arc<Mutex<HashMap<RunId, Arc<SubscriberList>>>>,
}

/// Held by a caller watching a run's updates. Dropping it releases the
/// receiver; the registry notices and drops the dead `Weak` on the next
/// fan-out rather than requiring an explicit unregister call, so
/// request-abort always cleans up (spec.md §4.5).
pub struct Subscription {
    receiver: mpsc::Receiver<Run>,
    _sender: Arc<mpsc::Sender<Run>>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Run> {
        self.receiver.recv().await
    }
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to updates for `run_id`.
    pub fn subscribe(&self, run_id: RunId) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        let sender = Arc::new(tx);
        let weak = Arc::downgrade(&sender);

        let mut guard = self.by_run.lock();
        let mut list = guard.get(&run_id).map(|l| (**l).clone()).unwrap_or_default();
        list.push(weak);
        guard.insert(run_id, Arc::new(list));

        Subscription { receiver: rx, _sender: sender }
    }

    /// Fan out `run` to every live subscriber of `run.id`, non-blocking.
    /// A subscriber whose channel is full is dropped and logged (spec.md
    /// §4.5); a subscriber whose `Subscription` was already dropped is
    /// pruned silently.
    pub fn notify(&self, run: &Run) {
        let snapshot = {
            let guard = self.by_run.lock();
            match guard.get(&run.id) {
                Some(list) => list.clone(),
                None => return,
            }
        };

        let mut survivors: SubscriberList = Vec::with_capacity(snapshot.len());
        for weak in snapshot.iter() {
            let Some(sender) = weak.upgrade() else { continue };
            match sender.try_send(run.clone()) {
                Ok(()) => survivors.push(weak.clone()),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(run_id = %run.id, "dropping slow run-update subscriber");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }

        let mut guard = self.by_run.lock();
        if survivors.is_empty() {
            guard.remove(&run.id);
        } else {
            guard.insert(run.id, Arc::new(survivors));
        }
    }
}

#[cfg(test)]
#[path = "subscribers_tests.rs"]
mod tests;
