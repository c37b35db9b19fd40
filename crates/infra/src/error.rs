use thiserror::Error;

use reskill_core::DomainError;

/// Failures of the in-process repositories.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl RepositoryError {
    pub(crate) fn poisoned() -> Self {
        Self::Storage("store lock poisoned".to_string())
    }
}
