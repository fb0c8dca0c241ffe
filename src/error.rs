// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Error type shared by every ledger operation.

use rusqlite::ffi;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Concurrent modification: {0}")]
    Concurrency(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported statement format '{0}'")]
    UnsupportedFormat(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        LedgerError::NotFound { entity, id }
    }
}

/// Which storage constraint a failed statement tripped, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    ForeignKey,
    Unique,
    Other,
}

pub fn constraint_kind(err: &rusqlite::Error) -> Option<ConstraintKind> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            Some(match e.extended_code {
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ConstraintKind::ForeignKey,
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    ConstraintKind::Unique
                }
                _ => ConstraintKind::Other,
            })
        }
        _ => None,
    }
}

/// Re-raise a referential-integrity failure as a Conflict carrying `cause`;
/// every other storage error passes through untouched.
pub fn map_fk_violation(err: rusqlite::Error, cause: impl Into<String>) -> LedgerError {
    match constraint_kind(&err) {
        Some(ConstraintKind::ForeignKey) => LedgerError::Conflict(cause.into()),
        _ => LedgerError::Storage(err),
    }
}
