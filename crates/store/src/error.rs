// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Migration(#[from] crate::migration::MigrationError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("precondition failed: expected version {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("invalid input: {0}")]
    Validation(String),
}

impl From<StoreError> for tyger_core::TygerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => tyger_core::TygerError::NotFound(what),
            StoreError::VersionConflict { expected, actual } => {
                tyger_core::TygerError::PreconditionFailed(format!(
                    "expected version {expected}, found {actual}"
                ))
            }
            StoreError::Validation(what) => tyger_core::TygerError::Validation(what),
            other => tyger_core::TygerError::Internal(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
