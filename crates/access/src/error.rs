// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("access token expired")]
    Expired,

    #[error("access token not yet valid (clock skew exceeded)")]
    NotYetValid,

    #[error("unknown signing key: {0}")]
    UnknownKey(String),
}

impl From<AccessError> for tyger_core::TygerError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Validation(msg) => tyger_core::TygerError::Validation(msg),
            AccessError::NotFound(msg) => tyger_core::TygerError::NotFound(msg),
            other => tyger_core::TygerError::Validation(other.to_string()),
        }
    }
}

pub type AccessResult<T> = Result<T, AccessError>;
