//! Error types for riskcheck-ai
//!
//! Only invalid invocations and unexpected internal failures surface as
//! errors. Judgement-service failures are absorbed at the adapter boundary
//! (see [`crate::types::Judged`]) and missing reference data degrades to
//! empty values.

use thiserror::Error;
use uuid::Uuid;

/// Pipeline and project-store error
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Analysis requested while the project is already analyzing
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unknown project id
    #[error("Project not found: {0}")]
    NotFound(Uuid),

    /// Store rejected an update (unknown step, invalid transition)
    #[error("Store error: {0}")]
    Store(String),

    /// Artifact could not be written
    #[error("Artifact error: {0}")]
    Artifact(#[from] std::io::Error),

    /// Artifact or report could not be serialised
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
