// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tyger_core::test_support::pending_run;

#[tokio::test]
async fn subscriber_receives_notified_run() {
    let registry = SubscriberRegistry::new();
    let mut sub = registry.subscribe(RunId::new(1));

    let run = pending_run(1, "echo/versions/1", 1_000);
    registry.notify(&run);

    let received = sub.recv().await.unwrap();
    assert_eq!(received.id, run.id);
}

#[tokio::test]
async fn notifying_an_unsubscribed_run_is_a_noop() {
    let registry = SubscriberRegistry::new();
    let run = pending_run(7, "echo/versions/1", 1_000);
    registry.notify(&run);
}

#[tokio::test]
async fn dropped_subscription_is_pruned_on_next_notify() {
    let registry = SubscriberRegistry::new();
    let sub = registry.subscribe(RunId::new(2));
    drop(sub);

    let run = pending_run(2, "echo/versions/1", 1_000);
    registry.notify(&run);

    assert!(registry.by_run.lock().get(&RunId::new(2)).is_none());
}

#[tokio::test]
async fn full_channel_drops_the_subscriber_without_panicking() {
    let registry = SubscriberRegistry::new();
    let mut sub = registry.subscribe(RunId::new(3));
    let run = pending_run(3, "echo/versions/1", 1_000);

    for _ in 0..(SUBSCRIBER_CHANNEL_CAPACITY + 5) {
        registry.notify(&run);
    }

    // At least the channel capacity worth of messages should be queued.
    let mut count = 0;
    while sub.receiver.try_recv().is_ok() {
        count += 1;
    }
    assert!(count > 0 && count <= SUBSCRIBER_CHANNEL_CAPACITY);
}
