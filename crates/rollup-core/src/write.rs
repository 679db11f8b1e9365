//! Write path for the in-memory store
//!
//! Commits new record versions and tells the engine which cached values
//! they may have changed.

use crate::engine::ComputedFieldEngine;
use crate::error::{EngineError, EngineResult};
use rollup_graph::{AccessError, InMemoryGraph, LinkGraphAccessor};
use rollup_model::{has_changes, FieldId, FieldValue, RecordId, SubmittedValue, Timestamp};
use std::collections::{BTreeMap, BTreeSet};

/// Commit `values` (and optionally new `links`) on `record`, then invalidate
/// every cached value depending on them
///
/// Changed field names are invalidated on the record and its ancestors;
/// new links invalidate the record's computed fields.
///
/// # Errors
/// Unknown records and storage failures.
pub fn commit_changes(
    graph: &InMemoryGraph,
    engine: &ComputedFieldEngine,
    record: RecordId,
    values: BTreeMap<FieldId, FieldValue>,
    links: Option<Vec<RecordId>>,
) -> EngineResult<Timestamp> {
    let tracker = graph
        .record(record)
        .and_then(|r| graph.tracker(r.tracker_id()))
        .ok_or(AccessError::RecordNotFound(record))?;

    let mut touched: BTreeSet<String> = values
        .keys()
        .filter_map(|id| tracker.field_by_id(*id))
        .map(|field| field.name.clone())
        .collect();
    if links.is_some() {
        touched.extend(
            tracker
                .fields()
                .filter(|field| field.is_computed())
                .map(|field| field.name.clone()),
        );
    }

    let timestamp = graph.commit(record, values, links)?;
    for name in &touched {
        engine.record_changed(record, name)?;
    }
    Ok(timestamp)
}

/// Apply a submitted computed value
///
/// Returns the commit timestamp, or `None` when the submission does not
/// change the stored override.
///
/// # Errors
/// Invalid submissions, unknown or non-computed fields, storage failures.
pub fn submit_computed_value(
    graph: &InMemoryGraph,
    engine: &ComputedFieldEngine,
    record: RecordId,
    field_name: &str,
    submission: SubmittedValue,
) -> EngineResult<Option<Timestamp>> {
    let field = graph
        .field_by_name(record, field_name)?
        .ok_or_else(|| EngineError::UnknownField {
            record,
            field: field_name.to_string(),
        })?;
    if !field.is_computed() {
        return Err(EngineError::NotComputed {
            field: field_name.to_string(),
        });
    }

    let raw = if submission.is_autocomputed == Some(true) {
        String::new()
    } else {
        submission.manual_value.clone().unwrap_or_default()
    };
    let manual = submission.into_manual_override()?;
    let current = graph.manual_override(record, field.id, None)?;
    if !has_changes(current, &raw) {
        tracing::debug!(record = %record, field = field_name, "submission leaves value unchanged");
        return Ok(None);
    }

    let value = FieldValue::Computed { manual };
    commit_changes(graph, engine, record, BTreeMap::from([(field.id, value)]), None).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use rollup_graph::{AllowAll, Tracker};
    use rollup_model::{FieldDef, NumericType, SubmissionError, TrackerId};
    use rollup_test_utils::{GraphFixture, EFFORT, EFFORT_NAME, POINTS};
    use std::sync::Arc;

    fn setup() -> (GraphFixture, ComputedFieldEngine) {
        let fixture = GraphFixture::new();
        fixture.epic(1, &[2]);
        fixture.epic(2, &[3]);
        fixture.task(3, Some(4));
        let engine = ComputedFieldEngine::new(fixture.accessor(), Arc::new(AllowAll), EngineConfig::default());
        (fixture, engine)
    }

    fn displayed(engine: &ComputedFieldEngine, record: u64) -> Option<f64> {
        engine
            .computed_value(RecordId(record), EFFORT_NAME, None, rollup_model::UserId(0))
            .unwrap()
    }

    #[test]
    fn committing_a_leaf_refreshes_ancestors() {
        let (fixture, engine) = setup();
        assert_eq!(displayed(&engine, 1), Some(4.0));
        assert_eq!(displayed(&engine, 2), Some(4.0));

        fixture.set_time(200);
        commit_changes(
            &fixture.graph(),
            &engine,
            RecordId(3),
            BTreeMap::from([(POINTS, FieldValue::Int(9))]),
            None,
        )
        .unwrap();

        assert_eq!(displayed(&engine, 1), Some(9.0));
        assert_eq!(displayed(&engine, 2), Some(9.0));
    }

    #[test]
    fn relinking_refreshes_the_record() {
        let (fixture, engine) = setup();
        fixture.task(4, Some(1));
        assert_eq!(displayed(&engine, 2), Some(4.0));

        commit_changes(&fixture.graph(), &engine, RecordId(2), BTreeMap::new(), Some(vec![RecordId(4)])).unwrap();
        assert_eq!(displayed(&engine, 2), Some(1.0));
        assert_eq!(displayed(&engine, 1), Some(1.0));
    }

    #[test]
    fn manual_submission_round_trip() {
        let (fixture, engine) = setup();
        let graph = fixture.graph();
        assert_eq!(displayed(&engine, 1), Some(4.0));

        let at = submit_computed_value(&graph, &engine, RecordId(2), EFFORT_NAME, SubmittedValue::manual("2.5"))
            .unwrap();
        assert!(at.is_some());
        assert_eq!(displayed(&engine, 2), Some(2.5));
        assert_eq!(displayed(&engine, 1), Some(2.5));

        // same value again is not a change
        let again = submit_computed_value(&graph, &engine, RecordId(2), EFFORT_NAME, SubmittedValue::manual("2.50"))
            .unwrap();
        assert_eq!(again, None);

        let back = submit_computed_value(&graph, &engine, RecordId(2), EFFORT_NAME, SubmittedValue::autocomputed())
            .unwrap();
        assert!(back.is_some());
        assert_eq!(graph.manual_override(RecordId(2), EFFORT, None).unwrap(), None);
        assert_eq!(displayed(&engine, 1), Some(4.0));
    }

    #[test]
    fn rejected_submissions() {
        let (fixture, engine) = setup();
        let graph = fixture.graph();

        let err = submit_computed_value(&graph, &engine, RecordId(1), EFFORT_NAME, SubmittedValue::manual("lots"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Submission(SubmissionError::InvalidNumber(_))));

        let err = submit_computed_value(&graph, &engine, RecordId(3), EFFORT_NAME, SubmittedValue::manual("1"))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotComputed { .. }));

        let err = submit_computed_value(&graph, &engine, RecordId(1), "remaining", SubmittedValue::manual("1"))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownField { .. }));
    }

    #[test]
    fn hours_change_refreshes_sprint_and_epic() {
        let (fixture, engine) = setup();
        let graph = fixture.graph();
        graph.add_tracker(
            Tracker::new(TrackerId(9), "sprints")
                .with_field(FieldDef::computed(FieldId(90), EFFORT_NAME).with_target_field_name("hours")),
        );
        graph.add_tracker(
            Tracker::new(TrackerId(10), "timesheets")
                .with_field(FieldDef::numeric(FieldId(100), "hours", NumericType::Int)),
        );
        graph.create_record(RecordId(20), TrackerId(9)).unwrap();
        graph.create_record(RecordId(21), TrackerId(10)).unwrap();
        graph
            .commit(RecordId(21), BTreeMap::from([(FieldId(100), FieldValue::Int(8))]), None)
            .unwrap();
        graph.commit(RecordId(20), BTreeMap::new(), Some(vec![RecordId(21)])).unwrap();
        fixture.relink(1, &[2, 20]);

        assert_eq!(displayed(&engine, 20), Some(8.0));
        assert_eq!(displayed(&engine, 1), Some(12.0));

        commit_changes(
            &graph,
            &engine,
            RecordId(21),
            BTreeMap::from([(FieldId(100), FieldValue::Int(30))]),
            None,
        )
        .unwrap();

        assert_eq!(displayed(&engine, 20), Some(30.0));
        assert_eq!(displayed(&engine, 1), Some(34.0));
    }
}
