// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error taxonomy (spec.md §7): every component surfaces one of
//! these kinds, and the out-of-scope HTTP layer would map them onto the
//! documented status codes mechanically.

use thiserror::Error;

/// Error kind shared by the Codespec Resolver, Buffer Access Service,
/// Workload Driver, and Run Lifecycle Engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TygerError {
    /// Caller-correctable input error. Never retried internally.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Referenced codespec/run/buffer does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Optimistic-concurrency loss after one transparent retry.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Transient infra failure after exhausting retries.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TygerError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn validation(what: impl std::fmt::Display) -> Self {
        Self::Validation(what.to_string())
    }

    /// PascalCase error code for the (out-of-scope) HTTP error body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "InvalidInput",
            Self::NotFound(_) => "NotFound",
            Self::PreconditionFailed(_) => "PreconditionFailed",
            Self::Internal(_) => "InternalServerError",
        }
    }
}

pub type TygerResult<T> = Result<T, TygerError>;
