//! Visited-set tracking
//!
//! One [`VisitedSet`] lives for exactly one top-level resolution. It is the
//! only thing standing between a cyclic link graph and non-termination, so
//! it never forgets an id once marked.

use rollup_model::RecordId;
use std::collections::HashSet;

/// Records already counted (or being counted) in one aggregation
#[derive(Debug, Clone, Default)]
pub struct VisitedSet {
    seen: HashSet<RecordId>,
}

impl VisitedSet {
    /// Empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id`; `true` if it was not seen before
    #[inline]
    pub fn mark_seen(&mut self, id: RecordId) -> bool {
        self.seen.insert(id)
    }

    /// Whether `id` was already registered
    #[inline]
    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.seen.contains(&id)
    }

    /// Number of registered ids
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing was registered yet
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_seen_reports_first_visit_only() {
        let mut visited = VisitedSet::new();
        assert!(visited.is_empty());
        assert!(visited.mark_seen(RecordId(1)));
        assert!(!visited.mark_seen(RecordId(1)));
        assert!(visited.contains(RecordId(1)));
        assert!(!visited.contains(RecordId(2)));
        assert_eq!(visited.len(), 1);
    }
}
