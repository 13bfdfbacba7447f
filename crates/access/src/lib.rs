// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]

//! Buffer Access Service: mints and verifies signed, time-bounded URIs
//! for reading or writing buffer contents (spec.md §4.2/§6).

mod error;
mod service;
mod signer;

pub use error::{AccessError, AccessResult};
pub use service::{AccessGrant, BufferAccessService};
pub use signer::{AccessClaims, AccessMode, SigningKey, TokenSigner, CLOCK_SKEW_TOLERANCE_MS, MIN_VALIDITY_MS};
