//! Precise (recursive) resolver
//!
//! Walks the link graph depth-first, one record at a time. Every linked
//! record is checked against the [`PermissionOracle`] each time it is met;
//! hidden records are skipped as if the link did not exist.

use crate::error::ResolveError;
use crate::resolver::{accumulate, ResolveMode, ResolveRequest, Resolver};
use crate::visited::VisitedSet;
use rollup_graph::{LinkGraphAccessor, PermissionOracle};
use rollup_model::{FieldDef, RecordId, RowValue, Timestamp, UserId};
use std::fmt;
use std::sync::Arc;

/// Nesting limit of a new [`RecursiveResolver`]
///
/// Keeps long chains well inside a 2 MiB thread stack.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Permission-aware depth-first resolver
#[derive(Clone)]
pub struct RecursiveResolver {
    accessor: Arc<dyn LinkGraphAccessor>,
    permissions: Arc<dyn PermissionOracle>,
    max_depth: Option<usize>,
}

impl fmt::Debug for RecursiveResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecursiveResolver")
            .field("accessor", &self.accessor)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl RecursiveResolver {
    /// Create resolver limited to [`DEFAULT_MAX_DEPTH`] nested records
    #[must_use]
    pub fn new(accessor: Arc<dyn LinkGraphAccessor>, permissions: Arc<dyn PermissionOracle>) -> Self {
        Self {
            accessor,
            permissions,
            max_depth: Some(DEFAULT_MAX_DEPTH),
        }
    }

    /// Fail with [`ResolveError::DepthExceeded`] beyond `limit` nested records
    ///
    /// `None` removes the limit; recursion then runs on the native stack.
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, limit: Option<usize>) -> Self {
        self.max_depth = limit;
        self
    }

    /// Resolve `field` on `record`, threading a caller-owned visited set
    ///
    /// Returns `None` right away when `record` is already in `visited`.
    ///
    /// # Errors
    /// Accessor failures, and the depth guard when configured.
    pub fn resolve_with(
        &self,
        record: RecordId,
        field: &FieldDef,
        at: Option<Timestamp>,
        user: UserId,
        visited: &mut VisitedSet,
    ) -> Result<Option<f64>, ResolveError> {
        self.descend(record, field, at, user, visited, 0)
    }

    fn descend(
        &self,
        record: RecordId,
        field: &FieldDef,
        at: Option<Timestamp>,
        user: UserId,
        visited: &mut VisitedSet,
        depth: usize,
    ) -> Result<Option<f64>, ResolveError> {
        if let Some(limit) = self.max_depth {
            if depth > limit {
                tracing::warn!(record = %record, limit, "recursion depth guard tripped");
                return Err(ResolveError::DepthExceeded { limit });
            }
        }

        if !visited.mark_seen(record) {
            tracing::trace!(record = %record, "already counted, skipping");
            return Ok(None);
        }

        if let Some(manual) = self.accessor.manual_override(record, field.id, at)? {
            return Ok(Some(manual));
        }

        let target = field.target_field_name();
        let rows = self.accessor.linked_rows_of(record, target, at)?;

        let mut sum = None;
        for row in rows {
            if !self.permissions.can_view(user, row.id) {
                tracing::trace!(record = %row.id, user = %user, "linked record hidden");
                continue;
            }
            if visited.contains(row.id) {
                continue;
            }

            let contribution = match row.value {
                RowValue::ComputedPending => match self.accessor.field_by_name(row.id, target)? {
                    Some(child_field) => {
                        self.descend(row.id, &child_field, at, user, visited, depth + 1)?
                    }
                    None => {
                        visited.mark_seen(row.id);
                        None
                    }
                },
                RowValue::Manual(v) | RowValue::TypedValue(_, v) => {
                    visited.mark_seen(row.id);
                    Some(v)
                }
                RowValue::Empty => {
                    visited.mark_seen(row.id);
                    None
                }
            };
            accumulate(&mut sum, contribution);
        }

        Ok(sum)
    }
}

impl Resolver for RecursiveResolver {
    fn resolve(&self, request: &ResolveRequest) -> Result<Option<f64>, ResolveError> {
        tracing::debug!(
            record = %request.record,
            field = %request.field.id,
            user = %request.user,
            "resolving computed value (precise)"
        );
        let mut visited = VisitedSet::new();
        self.resolve_with(request.record, &request.field, request.at, request.user, &mut visited)
    }

    fn mode(&self) -> ResolveMode {
        ResolveMode::Precise
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_graph::AllowAll;
    use rollup_model::UserId;
    use rollup_test_utils::GraphFixture;

    fn resolver(fixture: &GraphFixture) -> RecursiveResolver {
        RecursiveResolver::new(fixture.accessor(), Arc::new(AllowAll))
    }

    #[test]
    fn sums_direct_children() {
        let fixture = GraphFixture::new();
        fixture.epic(1, &[2, 3]);
        fixture.task(2, Some(3));
        fixture.task(3, Some(4));

        let req = ResolveRequest::new(RecordId(1), fixture.epic_field());
        assert_eq!(resolver(&fixture).resolve(&req).unwrap(), Some(7.0));
    }

    #[test]
    fn manual_value_on_root_wins() {
        let fixture = GraphFixture::new();
        fixture.epic(1, &[2]);
        fixture.task(2, Some(10));
        fixture.set_manual(1, 5.0);

        let req = ResolveRequest::new(RecordId(1), fixture.epic_field());
        assert_eq!(resolver(&fixture).resolve(&req).unwrap(), Some(5.0));
    }

    #[test]
    fn manual_child_is_not_descended() {
        let fixture = GraphFixture::new();
        fixture.epic(1, &[2]);
        fixture.epic(2, &[3]);
        fixture.task(3, Some(100));
        fixture.set_manual(2, 1.0);

        let req = ResolveRequest::new(RecordId(1), fixture.epic_field());
        assert_eq!(resolver(&fixture).resolve(&req).unwrap(), Some(1.0));
    }

    #[test]
    fn hidden_children_are_skipped() {
        let fixture = GraphFixture::new();
        fixture.epic(1, &[2, 3]);
        fixture.task(2, Some(3));
        fixture.task(3, Some(4));

        let hide_three = |_user: UserId, record: RecordId| record != RecordId(3);
        let resolver = RecursiveResolver::new(fixture.accessor(), Arc::new(hide_three));
        let req = ResolveRequest::new(RecordId(1), fixture.epic_field());
        assert_eq!(resolver.resolve(&req).unwrap(), Some(3.0));
    }

    #[test]
    fn threaded_visited_set_is_respected() {
        let fixture = GraphFixture::new();
        fixture.epic(1, &[2]);
        fixture.task(2, Some(3));

        let mut visited = VisitedSet::new();
        visited.mark_seen(RecordId(2));
        let value = resolver(&fixture)
            .resolve_with(RecordId(1), &fixture.epic_field(), None, UserId(0), &mut visited)
            .unwrap();
        assert_eq!(value, None);
        assert!(visited.contains(RecordId(1)));
    }

    #[test]
    fn depth_guard() {
        let fixture = GraphFixture::new();
        fixture.epic(1, &[2]);
        fixture.epic(2, &[3]);
        fixture.epic(3, &[4]);
        fixture.task(4, Some(1));

        let req = ResolveRequest::new(RecordId(1), fixture.epic_field());
        let guarded = resolver(&fixture).with_max_depth(Some(1));
        assert_eq!(guarded.resolve(&req), Err(ResolveError::DepthExceeded { limit: 1 }));

        let relaxed = resolver(&fixture).with_max_depth(Some(2));
        assert_eq!(relaxed.resolve(&req).unwrap(), Some(1.0));
    }

    fn chain(fixture: &GraphFixture, epics: u64) {
        for id in 1..=epics {
            fixture.epic(id, &[id + 1]);
        }
        fixture.task(epics + 1, Some(1));
    }

    #[test]
    fn deep_chain_stops_at_default_limit() {
        let fixture = GraphFixture::new();
        chain(&fixture, 400);

        let req = ResolveRequest::new(RecordId(1), fixture.epic_field());
        assert_eq!(
            resolver(&fixture).resolve(&req),
            Err(ResolveError::DepthExceeded { limit: DEFAULT_MAX_DEPTH })
        );

        let fast = crate::FastResolver::new(fixture.accessor());
        assert_eq!(fast.resolve(&req).unwrap(), Some(1.0));
    }

    #[test]
    fn chain_within_default_limit_resolves() {
        let fixture = GraphFixture::new();
        chain(&fixture, 200);

        let req = ResolveRequest::new(RecordId(1), fixture.epic_field());
        assert_eq!(resolver(&fixture).resolve(&req).unwrap(), Some(1.0));
    }

    #[test]
    fn missing_root_is_an_error() {
        let fixture = GraphFixture::new();
        let req = ResolveRequest::new(RecordId(42), fixture.epic_field());
        assert!(resolver(&fixture).resolve(&req).unwrap_err().is_access());
    }
}
