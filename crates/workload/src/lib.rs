// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Workload Driver layer (spec.md §4.3): a backend-agnostic interface
//! for launching, observing, and tearing down the container objects a run
//! needs, with a Kubernetes orchestrator implementation and a Docker
//! single-host implementation.

#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]

mod docker;
mod driver;
mod error;
pub mod labels;
mod kubernetes;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use docker::DockerDriver;
pub use driver::{
    derive_status, CreatedObjects, LabelPage, LaunchRequest, LogOptions, WorkloadDriver,
    WorkloadObservation,
};
pub use error::{WorkloadError, WorkloadResult};
pub use kubernetes::KubernetesDriver;
