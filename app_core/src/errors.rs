//! Error taxonomy shared across the engine (spec §7).
//!
//! Every component-specific error type (`DbError`, `PushError`, ...) is
//! defined next to its port trait and folds into `CoreError` here, mirroring
//! how the teacher's `CoreError` aggregates `DbError` / `CrError` / `SportError`.

use crate::ports::{CacheError, DbError, GovernorError, JournalError, PushError};
use crate::utils::validation::{FieldError, ValidationErrors};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum CoreError {
    /// match store error
    #[error("store error: {0}")]
    Store(#[from] DbError),

    /// push fabric error
    #[error("push error: {0}")]
    Push(#[from] PushError),

    /// activity journal error
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    /// rate governor error
    #[error("governor error: {0}")]
    Governor(#[from] GovernorError),

    /// media cache error
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// arguments violate a contract (spec: BadInput)
    #[error("bad input: {0}")]
    BadInput(String),

    /// referenced entity does not exist (spec: NotFound)
    #[error("not found: {0}")]
    NotFound(String),

    /// precondition violated (spec: RefusedPrecondition)
    #[error("refused: {0}")]
    RefusedPrecondition(String),

    /// optimistic-update collision, re-serialised under the tenant lane (spec: Conflict)
    #[error("conflict: {0}")]
    Conflict(String),

    /// unrecoverable inconsistency; quarantines the tenant lane (spec: Fatal)
    #[error("fatal: {0}")]
    Fatal(String),

    /// single field validation error
    #[error("field validation error: {0}")]
    Field(#[from] FieldError),

    /// collected validation errors
    #[error("validation error: {0:?}")]
    Validation(#[from] ValidationErrors),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::Fatal(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CoreError::Conflict(_)) || matches!(self, CoreError::Store(DbError::OptimisticLockConflict))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::Store(DbError::SerializationFailure))
            || matches!(self, CoreError::Store(DbError::Other(_)))
            || matches!(self, CoreError::Push(PushError::Transient(_)))
    }
}
