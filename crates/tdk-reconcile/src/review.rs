use serde::{Deserialize, Serialize};
use tdk_schemas::{EngineError, FindingStatus};
use thiserror::Error;
use uuid::Uuid;

/// Operator decision on one finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub status: FindingStatus,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("finding {0} not found")]
    NotFound(Uuid),
    #[error("illegal review transition {} -> {}", .from.as_str(), .to.as_str())]
    IllegalTransition {
        from: FindingStatus,
        to: FindingStatus,
    },
    /// The row stopped being open between read and conditional update.
    #[error("finding {0} was reviewed concurrently")]
    Conflict(Uuid),
    #[error("findings store unavailable: {0:#}")]
    Store(anyhow::Error),
}

impl From<ReviewError> for EngineError {
    fn from(e: ReviewError) -> Self {
        match e {
            ReviewError::NotFound(_) | ReviewError::IllegalTransition { .. } => {
                EngineError::Validation(e.to_string())
            }
            ReviewError::Conflict(_) => EngineError::PersistenceConflict(e.to_string()),
            ReviewError::Store(_) => EngineError::Unclassified(e.to_string()),
        }
    }
}

/// Only open -> acknowledged and open -> resolved are allowed.
pub fn validate_transition(from: FindingStatus, to: FindingStatus) -> Result<(), ReviewError> {
    match (from, to) {
        (FindingStatus::Open, FindingStatus::Acknowledged)
        | (FindingStatus::Open, FindingStatus::Resolved) => Ok(()),
        _ => Err(ReviewError::IllegalTransition { from, to }),
    }
}
