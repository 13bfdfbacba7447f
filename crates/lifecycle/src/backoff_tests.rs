// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn delays_grow_then_stay_capped() {
    let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(1));
    let mut previous = Duration::ZERO;
    for _ in 0..4 {
        let delay = backoff.next_delay();
        assert!(delay >= previous, "backoff should not shrink across early attempts");
        previous = delay;
    }
    for _ in 0..20 {
        assert!(backoff.next_delay() <= Duration::from_secs(1));
    }
}

#[test]
fn reset_restarts_from_the_base_delay() {
    let mut backoff = Backoff::new(Duration::from_millis(50), Duration::from_secs(10));
    backoff.next_delay();
    backoff.next_delay();
    backoff.reset();
    assert_eq!(backoff.attempt(), 0);
}
