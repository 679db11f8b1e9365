//! Error types for graph access
//!
//! - [`AccessError`]: the storage boundary could not answer a read or write
//! - [`DocumentError`]: a graph document could not be loaded

use rollup_model::{RecordError, RecordId, TrackerId};

/// Storage-level failure
///
/// Propagated unchanged through resolution; never retried internally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// Record does not exist
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    /// Record already exists
    #[error("record already exists: {0}")]
    DuplicateRecord(RecordId),

    /// Record's tracker has no field with that name
    #[error("record {record} has no field named '{name}'")]
    FieldNotFound {
        /// Record that was read
        record: RecordId,
        /// Requested field name
        name: String,
    },

    /// Tracker does not exist
    #[error("tracker not found: {0}")]
    TrackerNotFound(TrackerId),

    /// Changeset rejected by the record history
    #[error("history error: {0}")]
    History(#[from] RecordError),

    /// Backend failure
    #[error("storage error: {0}")]
    Storage(String),
}

impl AccessError {
    /// Create a backend failure
    #[inline]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

/// Errors while loading a graph document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// YAML syntax or shape error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON syntax or shape error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Record references a tracker that is not declared
    #[error("record {record} references unknown tracker {tracker}")]
    UnknownTracker {
        /// Declaring record
        record: RecordId,
        /// Missing tracker
        tracker: TrackerId,
    },

    /// Changeset sets a field its tracker does not declare
    #[error("record {record} sets unknown field '{field}'")]
    UnknownField {
        /// Declaring record
        record: RecordId,
        /// Field name as written
        field: String,
    },

    /// Value does not fit the field kind
    #[error("record {record}: invalid value for field '{field}': {reason}")]
    InvalidValue {
        /// Declaring record
        record: RecordId,
        /// Field name as written
        field: String,
        /// What is wrong with the value
        reason: String,
    },

    /// Store rejected the document content
    #[error("access error: {0}")]
    Access(#[from] AccessError),
}
