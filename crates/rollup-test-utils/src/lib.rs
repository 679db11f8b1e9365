//! Testing utilities for the rollup workspace
//!
//! Shared graph fixtures with a controllable commit clock.

#![allow(missing_docs)]

use rollup_graph::{AccessError, InMemoryGraph, LinkGraphAccessor, Tracker};
use rollup_model::{FieldDef, FieldId, FieldValue, NumericType, RecordId, Timestamp, TrackerId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Tracker whose `effort` field is computed
pub const EPICS: TrackerId = TrackerId(1);
/// Tracker whose `effort` field is an integer
pub const TASKS: TrackerId = TrackerId(2);
/// Tracker whose `effort` field is a float
pub const ESTIMATES: TrackerId = TrackerId(3);
/// Tracker without an `effort` field
pub const NOTES: TrackerId = TrackerId(4);

pub const EFFORT: FieldId = FieldId(1);
pub const POINTS: FieldId = FieldId(2);
pub const ESTIMATE: FieldId = FieldId(3);
pub const TITLE: FieldId = FieldId(4);

/// Name shared by every `effort` field
pub const EFFORT_NAME: &str = "effort";

/// Commit time of a fresh fixture
pub const START: Timestamp = Timestamp(100);

/// Computed `effort` definition used on epics
pub fn effort_field() -> FieldDef {
    FieldDef::computed(EFFORT, EFFORT_NAME).with_label("Effort")
}

/// In-memory graph with the four fixture trackers
///
/// Every helper commits a new changeset at the current fixture time.
#[derive(Debug, Clone)]
pub struct GraphFixture {
    graph: Arc<InMemoryGraph>,
    clock: Arc<AtomicI64>,
}

impl Default for GraphFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphFixture {
    pub fn new() -> Self {
        let clock = Arc::new(AtomicI64::new(START.as_secs()));
        let ticks = Arc::clone(&clock);
        let graph = InMemoryGraph::new().with_clock(move || Timestamp(ticks.load(Ordering::SeqCst)));

        graph.add_tracker(Tracker::new(EPICS, "epics").with_field(effort_field()));
        graph.add_tracker(
            Tracker::new(TASKS, "tasks").with_field(FieldDef::numeric(POINTS, EFFORT_NAME, NumericType::Int)),
        );
        graph.add_tracker(
            Tracker::new(ESTIMATES, "estimates")
                .with_field(FieldDef::numeric(ESTIMATE, EFFORT_NAME, NumericType::Float)),
        );
        graph.add_tracker(
            Tracker::new(NOTES, "notes").with_field(FieldDef::numeric(TITLE, "title", NumericType::Int)),
        );

        Self {
            graph: Arc::new(graph),
            clock,
        }
    }

    pub fn graph(&self) -> Arc<InMemoryGraph> {
        Arc::clone(&self.graph)
    }

    pub fn accessor(&self) -> Arc<dyn LinkGraphAccessor> {
        self.graph()
    }

    pub fn epic_field(&self) -> FieldDef {
        effort_field()
    }

    /// Time stamped on the following commits
    pub fn set_time(&self, secs: i64) {
        self.clock.store(secs, Ordering::SeqCst);
    }

    pub fn now(&self) -> Timestamp {
        Timestamp(self.clock.load(Ordering::SeqCst))
    }

    /// Epic (computed effort) linking to `links`
    pub fn epic(&self, id: u64, links: &[u64]) -> Timestamp {
        self.ensure(id, EPICS);
        self.commit(id, BTreeMap::new(), Some(ids(links)))
    }

    /// Task with an integer effort, or no value
    pub fn task(&self, id: u64, points: Option<i64>) -> Timestamp {
        self.ensure(id, TASKS);
        let values = points
            .map(|p| BTreeMap::from([(POINTS, FieldValue::Int(p))]))
            .unwrap_or_default();
        self.commit(id, values, None)
    }

    /// Record with a float effort
    pub fn estimate(&self, id: u64, value: Option<f64>) -> Timestamp {
        self.ensure(id, ESTIMATES);
        let values = value
            .map(|v| BTreeMap::from([(ESTIMATE, FieldValue::Float(v))]))
            .unwrap_or_default();
        self.commit(id, values, None)
    }

    /// Record without an effort field
    pub fn note(&self, id: u64) -> Timestamp {
        self.ensure(id, NOTES);
        self.commit(id, BTreeMap::new(), None)
    }

    /// Replace the links of an existing record
    pub fn relink(&self, id: u64, links: &[u64]) -> Timestamp {
        self.commit(id, BTreeMap::new(), Some(ids(links)))
    }

    /// Manual override on an epic's effort
    pub fn set_manual(&self, id: u64, value: f64) -> Timestamp {
        self.commit(id, BTreeMap::from([(EFFORT, FieldValue::manual(value))]), None)
    }

    /// Switch an epic's effort back to auto-computed
    pub fn clear_manual(&self, id: u64) -> Timestamp {
        self.commit(id, BTreeMap::from([(EFFORT, FieldValue::autocomputed())]), None)
    }

    /// New integer effort on a task
    pub fn set_points(&self, id: u64, points: i64) -> Timestamp {
        self.commit(id, BTreeMap::from([(POINTS, FieldValue::Int(points))]), None)
    }

    fn ensure(&self, id: u64, tracker: TrackerId) {
        match self.graph.create_record(RecordId(id), tracker) {
            Ok(()) | Err(AccessError::DuplicateRecord(_)) => {}
            Err(err) => panic!("fixture record {id}: {err}"),
        }
    }

    fn commit(
        &self,
        id: u64,
        values: BTreeMap<FieldId, FieldValue>,
        links: Option<Vec<RecordId>>,
    ) -> Timestamp {
        self.graph
            .commit(RecordId(id), values, links)
            .unwrap_or_else(|err| panic!("fixture commit on {id}: {err}"))
    }
}

pub fn ids(raw: &[u64]) -> Vec<RecordId> {
    raw.iter().copied().map(RecordId).collect()
}

/// Sample document used by loader and CLI tests
///
/// Epic 1 links tasks 2 and 3 and epic 4; epic 4 links task 5 and back to 1.
/// Task 3 is visible to user 7 only.
pub const SAMPLE_DOCUMENT: &str = r"
trackers:
  - id: 1
    name: epics
    fields:
      - { id: 1, name: effort, label: Effort, type: computed }
  - id: 2
    name: tasks
    fields:
      - { id: 2, name: effort, type: int }
records:
  - id: 1
    tracker: 1
    changesets:
      - { at: 100, values: { effort: auto }, links: [2, 3, 4] }
  - id: 2
    tracker: 2
    changesets:
      - { at: 100, values: { effort: 3 } }
  - id: 3
    tracker: 2
    viewers: [7]
    changesets:
      - { at: 100, values: { effort: 4 } }
      - { at: 300, values: { effort: 6 } }
  - id: 4
    tracker: 1
    changesets:
      - { at: 100, links: [5, 1] }
  - id: 5
    tracker: 2
    changesets:
      - { at: 200, values: { effort: 10 } }
";
