//! Fast (batched) resolver
//!
//! Breadth-first: every round fetches the linked rows of the whole frontier
//! with one accessor call. Permissions are not consulted, and the root
//! field's target name is used at every level.
//!
//! Rows are grouped explicitly by parent before they are processed, keeping
//! the first row of each `(parent, child)` pair. The accessor is therefore
//! free to return rows in any order.

use crate::error::ResolveError;
use crate::resolver::{accumulate, ResolveMode, ResolveRequest, Resolver};
use crate::visited::VisitedSet;
use indexmap::IndexMap;
use rollup_graph::LinkGraphAccessor;
use rollup_model::{FieldDef, FieldRow, RecordId, RowValue, Timestamp};
use std::sync::Arc;

type RowsByParent = IndexMap<RecordId, IndexMap<RecordId, RowValue>>;

/// Batched breadth-first resolver
#[derive(Debug, Clone)]
pub struct FastResolver {
    accessor: Arc<dyn LinkGraphAccessor>,
    max_rounds: Option<usize>,
}

impl FastResolver {
    /// Create resolver without round limit
    #[must_use]
    pub fn new(accessor: Arc<dyn LinkGraphAccessor>) -> Self {
        Self {
            accessor,
            max_rounds: None,
        }
    }

    /// Fail with [`ResolveError::DepthExceeded`] when a frontier deeper than
    /// `limit` levels below the root still needs expanding
    #[inline]
    #[must_use]
    pub fn with_max_rounds(mut self, limit: Option<usize>) -> Self {
        self.max_rounds = limit;
        self
    }

    /// Resolve `field` on `root` level by level
    ///
    /// With `stop_on_manual_value` a manual override (on the root or on a
    /// linked computed record) is taken as that record's value. Without it,
    /// manual overrides are ignored and computed records are always expanded.
    ///
    /// # Errors
    /// Accessor failures, and the round guard when configured.
    pub fn resolve_fast(
        &self,
        root: RecordId,
        field: &FieldDef,
        at: Option<Timestamp>,
        stop_on_manual_value: bool,
    ) -> Result<Option<f64>, ResolveError> {
        if stop_on_manual_value {
            if let Some(manual) = self.accessor.manual_override(root, field.id, at)? {
                return Ok(Some(manual));
            }
        }

        let target = field.target_field_name();
        let mut seen = VisitedSet::new();
        let mut frontier = vec![root];
        let mut sum = None;
        let mut round = 0usize;

        while !frontier.is_empty() {
            if let Some(limit) = self.max_rounds {
                if round > limit {
                    tracing::warn!(root = %root, limit, "fast resolution round guard tripped");
                    return Err(ResolveError::DepthExceeded { limit });
                }
            }

            // The whole frontier counts as seen before its rows are read, so
            // links back into the current level are never followed.
            for &id in &frontier {
                seen.mark_seen(id);
            }

            let rows = self.accessor.linked_rows(&frontier, target, at)?;
            tracing::trace!(round, frontier = frontier.len(), rows = rows.len(), "fast round");

            let mut queued = VisitedSet::new();
            let mut next = Vec::new();
            for (_, children) in group_by_parent(rows) {
                for (child, value) in children {
                    if seen.contains(child) {
                        continue;
                    }
                    match value {
                        RowValue::TypedValue(_, v) => {
                            seen.mark_seen(child);
                            accumulate(&mut sum, Some(v));
                        }
                        RowValue::Manual(v) if stop_on_manual_value => {
                            seen.mark_seen(child);
                            accumulate(&mut sum, Some(v));
                        }
                        RowValue::Manual(_) | RowValue::ComputedPending => {
                            if queued.mark_seen(child) {
                                next.push(child);
                            }
                        }
                        RowValue::Empty => {
                            seen.mark_seen(child);
                        }
                    }
                }
            }

            frontier = next;
            round += 1;
        }

        Ok(sum)
    }
}

fn group_by_parent(rows: Vec<FieldRow>) -> RowsByParent {
    let mut grouped = RowsByParent::new();
    for row in rows {
        grouped
            .entry(row.parent_id)
            .or_default()
            .entry(row.id)
            .or_insert(row.value);
    }
    grouped
}

impl Resolver for FastResolver {
    fn resolve(&self, request: &ResolveRequest) -> Result<Option<f64>, ResolveError> {
        tracing::debug!(
            record = %request.record,
            field = %request.field.id,
            stop = request.stop_on_manual_value,
            "resolving computed value (fast)"
        );
        self.resolve_fast(
            request.record,
            &request.field,
            request.at,
            request.stop_on_manual_value,
        )
    }

    fn mode(&self) -> ResolveMode {
        ResolveMode::Fast
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_model::NumericType;
    use rollup_test_utils::GraphFixture;

    fn resolver(fixture: &GraphFixture) -> FastResolver {
        FastResolver::new(fixture.accessor())
    }

    #[test]
    fn grouping_keeps_first_row_per_pair() {
        let rows = vec![
            FieldRow::new(RecordId(1), RecordId(2), RowValue::TypedValue(NumericType::Int, 1.0)),
            FieldRow::new(RecordId(3), RecordId(4), RowValue::Empty),
            FieldRow::new(RecordId(1), RecordId(2), RowValue::TypedValue(NumericType::Int, 9.0)),
        ];
        let grouped = group_by_parent(rows);
        assert_eq!(grouped.len(), 2);
        assert_eq!(
            grouped[&RecordId(1)][&RecordId(2)],
            RowValue::TypedValue(NumericType::Int, 1.0)
        );
    }

    #[test]
    fn sums_across_levels() {
        let fixture = GraphFixture::new();
        fixture.epic(1, &[2, 3]);
        fixture.epic(2, &[4, 5]);
        fixture.task(3, Some(1));
        fixture.task(4, Some(2));
        fixture.task(5, Some(3));

        let value = resolver(&fixture)
            .resolve_fast(RecordId(1), &fixture.epic_field(), None, true)
            .unwrap();
        assert_eq!(value, Some(6.0));
    }

    #[test]
    fn stop_flag_controls_manual_values() {
        let fixture = GraphFixture::new();
        fixture.epic(1, &[2]);
        fixture.epic(2, &[3]);
        fixture.task(3, Some(10));
        fixture.set_manual(2, 4.0);

        let fast = resolver(&fixture);
        let field = fixture.epic_field();
        assert_eq!(fast.resolve_fast(RecordId(1), &field, None, true).unwrap(), Some(4.0));
        assert_eq!(fast.resolve_fast(RecordId(1), &field, None, false).unwrap(), Some(10.0));

        fixture.set_manual(1, 7.0);
        assert_eq!(fast.resolve_fast(RecordId(1), &field, None, true).unwrap(), Some(7.0));
        assert_eq!(fast.resolve_fast(RecordId(1), &field, None, false).unwrap(), Some(10.0));
    }

    #[test]
    fn shared_child_counted_once() {
        let fixture = GraphFixture::new();
        fixture.epic(1, &[2, 3]);
        fixture.epic(2, &[4]);
        fixture.epic(3, &[4]);
        fixture.task(4, Some(5));

        let value = resolver(&fixture)
            .resolve_fast(RecordId(1), &fixture.epic_field(), None, true)
            .unwrap();
        assert_eq!(value, Some(5.0));
    }

    #[test]
    fn round_guard() {
        let fixture = GraphFixture::new();
        fixture.epic(1, &[2]);
        fixture.epic(2, &[3]);
        fixture.task(3, Some(1));

        let field = fixture.epic_field();
        let guarded = resolver(&fixture).with_max_rounds(Some(0));
        assert_eq!(
            guarded.resolve_fast(RecordId(1), &field, None, true),
            Err(ResolveError::DepthExceeded { limit: 0 })
        );
        let relaxed = resolver(&fixture).with_max_rounds(Some(1));
        assert_eq!(relaxed.resolve_fast(RecordId(1), &field, None, true).unwrap(), Some(1.0));
    }
}
