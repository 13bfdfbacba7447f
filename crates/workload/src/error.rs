// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("objects already exist for this run")]
    ConflictExists,

    #[error("cluster unavailable: {0}")]
    ClusterUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl From<WorkloadError> for tyger_core::TygerError {
    fn from(err: WorkloadError) -> Self {
        match err {
            WorkloadError::ConflictExists => {
                tyger_core::TygerError::PreconditionFailed("objects already exist for this run".into())
            }
            WorkloadError::ClusterUnavailable(msg) => tyger_core::TygerError::Internal(msg),
            WorkloadError::NotFound(msg) => tyger_core::TygerError::NotFound(msg),
            WorkloadError::Internal(msg) => tyger_core::TygerError::Internal(msg),
        }
    }
}

pub type WorkloadResult<T> = Result<T, WorkloadError>;
