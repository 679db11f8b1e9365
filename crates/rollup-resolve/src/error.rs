//! Resolution errors
//!
//! Only hard failures surface here. Missing values, hidden records and
//! cycles are part of normal aggregation and never become errors.

use rollup_graph::AccessError;

/// Resolution failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The link graph could not be read
    #[error("graph access failed: {0}")]
    Access(#[from] AccessError),

    /// Caller-imposed depth guard tripped
    #[error("resolution exceeded depth limit of {limit}")]
    DepthExceeded {
        /// Configured limit
        limit: usize,
    },
}

impl ResolveError {
    /// Whether the failure came from storage
    #[inline]
    #[must_use]
    pub fn is_access(&self) -> bool {
        matches!(self, Self::Access(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_model::RecordId;

    #[test]
    fn access_errors_convert() {
        let err: ResolveError = AccessError::RecordNotFound(RecordId(3)).into();
        assert!(err.is_access());
        assert_eq!(err.to_string(), "graph access failed: record not found: 3");
    }

    #[test]
    fn depth_display() {
        let err = ResolveError::DepthExceeded { limit: 8 };
        assert!(!err.is_access());
        assert_eq!(err.to_string(), "resolution exceeded depth limit of 8");
    }
}
