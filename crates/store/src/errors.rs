use std::path::PathBuf;

use pipeline::PipelineError;
use thiserror::Error;

/// Failures of snapshot persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot I/O failed for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot '{path}' is not valid: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        PipelineError::storage(e.to_string())
    }
}
