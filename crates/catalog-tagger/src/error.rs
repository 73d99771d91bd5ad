//! Error types for the tagging engine.

use tagsync_catalog_client::ClientError;

/// Errors that abort a load step or a whole run.
///
/// Per-entity failures during reconciliation are not errors at this level;
/// they are recorded as outcomes and counted in the run statistics.
#[derive(Debug, thiserror::Error)]
pub enum TaggerError {
    /// File could not be read or written
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV input
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed JSON input
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required CSV column is absent
    #[error("{path}: no {wanted} column (expected one of {candidates:?}, found {available:?})")]
    MissingColumn {
        path: String,
        wanted: &'static str,
        candidates: &'static [&'static str],
        available: Vec<String>,
    },

    /// Mapping file parsed but an entry is unusable
    #[error("Invalid mapping entry '{key}': {reason}")]
    InvalidMapping { key: String, reason: String },

    /// Catalog call failed in a way that stops the run
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl TaggerError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        TaggerError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, TaggerError>;
