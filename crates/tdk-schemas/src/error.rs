//! Error taxonomy shared by every crate in the workspace.
//!
//! Crate-local error enums classify themselves into [`EngineError`] so the
//! control plane can map any failure onto a stable response without knowing
//! where it came from.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Exchange or backend unreachable. Retried by the next scheduled cycle.
    TransientNetwork,
    /// Business-rule violation. Surfaced to the caller, nothing written.
    Validation,
    /// Duplicate key or lost conditional update.
    PersistenceConflict,
    Unclassified,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TransientNetwork => "transient_network",
            ErrorKind::Validation => "validation",
            ErrorKind::PersistenceConflict => "persistence_conflict",
            ErrorKind::Unclassified => "unclassified",
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("persistence conflict: {0}")]
    PersistenceConflict(String),

    #[error("{0}")]
    Unclassified(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::TransientNetwork(_) => ErrorKind::TransientNetwork,
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::PersistenceConflict(_) => ErrorKind::PersistenceConflict,
            EngineError::Unclassified(_) => ErrorKind::Unclassified,
        }
    }

    /// Wrap an arbitrary application error. The full cause chain is kept in
    /// the message since the original type is erased.
    pub fn unclassified(err: impl std::fmt::Display) -> Self {
        EngineError::Unclassified(format!("{err:#}"))
    }
}
