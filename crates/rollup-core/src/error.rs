//! Error types for the computed field engine
//!
//! Provides error handling for:
//! - Resolution failures (storage, depth guards)
//! - Unknown or non-computed fields
//! - Invalid submitted values
//! - Configuration loading

use rollup_graph::AccessError;
use rollup_model::{RecordId, SubmissionError};
use rollup_resolve::ResolveError;
use std::path::PathBuf;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Resolution failed
    #[error("resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    /// Record's tracker has no field with that name
    #[error("record {record} has no field named '{field}'")]
    UnknownField {
        /// Record that was looked up
        record: RecordId,
        /// Requested field name
        field: String,
    },

    /// Field exists but is not computed
    #[error("field '{field}' is not a computed field")]
    NotComputed {
        /// Field name
        field: String,
    },

    /// Submitted value rejected
    #[error("invalid submission: {0}")]
    Submission(#[from] SubmissionError),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<AccessError> for EngineError {
    fn from(err: AccessError) -> Self {
        Self::Resolve(ResolveError::Access(err))
    }
}

impl EngineError {
    /// Storage failure underneath, if any
    #[must_use]
    pub fn access_error(&self) -> Option<&AccessError> {
        match self {
            Self::Resolve(ResolveError::Access(err)) => Some(err),
            _ => None,
        }
    }
}

/// Configuration loading failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML is malformed or has unknown values
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
