use std::path::PathBuf;

use sparza_core::error::CoreError;
use sparza_core::store::StoreError;

/// Errors that abort a job.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A model response that cannot be turned into a document update.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("Field '{field}' is invalid: {reason}")]
    InvalidField { field: String, reason: String },
}

impl TaskError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        TaskError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache file {path} could not be read or written: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}
