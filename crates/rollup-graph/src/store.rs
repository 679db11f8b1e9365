//! In-memory versioned record store
//!
//! [`InMemoryGraph`] keeps trackers and records in concurrent maps and
//! implements [`LinkGraphAccessor`]. It is the reference backend for tests,
//! the CLI, and embedders without a database.

use crate::accessor::LinkGraphAccessor;
use crate::error::AccessError;
use indexmap::IndexMap;
use rollup_model::{
    Changeset, FieldDef, FieldId, FieldRow, FieldValue, Record, RecordId, RowValue, Timestamp,
    TrackerId,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Record schema: fields keyed by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracker {
    /// Tracker id
    pub id: TrackerId,

    /// Display name
    pub name: String,

    fields: IndexMap<String, FieldDef>,
}

impl Tracker {
    /// Tracker without fields
    #[must_use]
    pub fn new(id: TrackerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    /// Add a field, replacing any field with the same name
    #[must_use]
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    /// Field by name
    #[inline]
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    /// Field by id
    #[must_use]
    pub fn field_by_id(&self, id: FieldId) -> Option<&FieldDef> {
        self.fields.values().find(|f| f.id == id)
    }

    /// Fields in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.values()
    }
}

type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

/// Concurrent in-memory store of trackers and versioned records
///
/// A reverse index of the latest links answers `parents_of` without
/// scanning the records.
pub struct InMemoryGraph {
    trackers: DashMap<TrackerId, Tracker>,
    records: DashMap<RecordId, Record>,
    parents: DashMap<RecordId, BTreeSet<RecordId>>,
    clock: Clock,
}

impl fmt::Debug for InMemoryGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryGraph")
            .field("trackers", &self.trackers.len())
            .field("records", &self.records.len())
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGraph {
    /// Empty store stamping commits with the wall clock
    #[must_use]
    pub fn new() -> Self {
        Self {
            trackers: DashMap::new(),
            records: DashMap::new(),
            parents: DashMap::new(),
            clock: Arc::new(Timestamp::now),
        }
    }

    /// Replace the commit clock
    #[must_use]
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> Timestamp + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Register or replace a tracker
    pub fn add_tracker(&self, tracker: Tracker) {
        self.trackers.insert(tracker.id, tracker);
    }

    /// Tracker by id
    #[must_use]
    pub fn tracker(&self, id: TrackerId) -> Option<Tracker> {
        self.trackers.get(&id).map(|t| t.clone())
    }

    /// Create a record with no history
    ///
    /// # Errors
    /// [`AccessError::TrackerNotFound`] for unknown trackers,
    /// [`AccessError::DuplicateRecord`] when the id is taken.
    pub fn create_record(&self, id: RecordId, tracker: TrackerId) -> Result<(), AccessError> {
        if !self.trackers.contains_key(&tracker) {
            return Err(AccessError::TrackerNotFound(tracker));
        }
        match self.records.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(AccessError::DuplicateRecord(id)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Record::new(id, tracker));
                Ok(())
            }
        }
    }

    /// Append a changeset with an explicit timestamp
    ///
    /// # Errors
    /// [`AccessError::RecordNotFound`], or [`AccessError::History`] when the
    /// changeset is older than the record's latest one.
    pub fn append_changeset(&self, record: RecordId, changeset: Changeset) -> Result<(), AccessError> {
        let mut entry = self
            .records
            .get_mut(&record)
            .ok_or(AccessError::RecordNotFound(record))?;
        let previous = entry.links_at(None).to_vec();
        let links = changeset.links.clone();
        entry.push_changeset(changeset)?;
        drop(entry);

        self.reindex_links(record, &previous, &links);
        Ok(())
    }

    /// Create a new version of `record` stamped by the store clock
    ///
    /// The new changeset starts from the latest one: `values` are merged over
    /// the previous values and `links`, when given, replace the previous links.
    /// Returns the commit timestamp, never older than the previous changeset.
    ///
    /// # Errors
    /// [`AccessError::RecordNotFound`] for unknown records.
    pub fn commit(
        &self,
        record: RecordId,
        values: BTreeMap<FieldId, FieldValue>,
        links: Option<Vec<RecordId>>,
    ) -> Result<Timestamp, AccessError> {
        let now = (self.clock)();
        let mut entry = self
            .records
            .get_mut(&record)
            .ok_or(AccessError::RecordNotFound(record))?;

        let mut changeset = entry.latest().cloned().unwrap_or_default();
        let previous = changeset.links.clone();
        changeset.timestamp = changeset.timestamp.max(now);
        changeset.values.extend(values);
        if let Some(links) = links {
            changeset.links = links;
        }
        let timestamp = changeset.timestamp;
        let current = changeset.links.clone();
        entry.push_changeset(changeset)?;
        drop(entry);

        if previous != current {
            self.reindex_links(record, &previous, &current);
        }

        tracing::debug!(record = %record, at = timestamp.as_secs(), "committed changeset");
        Ok(timestamp)
    }

    /// Snapshot of a record
    #[must_use]
    pub fn record(&self, id: RecordId) -> Option<Record> {
        self.records.get(&id).map(|r| r.clone())
    }

    /// Number of records
    #[inline]
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Ids of all records, sorted
    #[must_use]
    pub fn record_ids(&self) -> Vec<RecordId> {
        let mut ids: Vec<RecordId> = self.records.iter().map(|r| *r.key()).collect();
        ids.sort_unstable();
        ids
    }

    fn parents(&self, child: RecordId) -> Vec<RecordId> {
        self.parents
            .get(&child)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    fn reindex_links(&self, parent: RecordId, previous: &[RecordId], current: &[RecordId]) {
        for child in previous.iter().filter(|child| !current.contains(child)) {
            if let Some(mut set) = self.parents.get_mut(child) {
                set.remove(&parent);
            }
        }
        for &child in current {
            self.parents.entry(child).or_default().insert(parent);
        }
    }

    fn field_of(&self, record: &Record, name: &str) -> Option<FieldDef> {
        self.trackers
            .get(&record.tracker_id())
            .and_then(|t| t.field(name).cloned())
    }

    fn row_for(&self, parent: RecordId, child: RecordId, name: &str, at: Option<Timestamp>) -> Option<FieldRow> {
        let record = self.records.get(&child)?;
        let changeset = record.changeset_at(at)?;
        let field = self.field_of(&record, name)?;
        let value = RowValue::decode(&field.kind, changeset.value(field.id));
        Some(FieldRow::new(parent, child, value))
    }
}

impl LinkGraphAccessor for InMemoryGraph {
    fn field_by_name(&self, record: RecordId, name: &str) -> Result<Option<FieldDef>, AccessError> {
        let entry = self
            .records
            .get(&record)
            .ok_or(AccessError::RecordNotFound(record))?;
        Ok(self.field_of(&entry, name))
    }

    fn computed_fields(&self, record: RecordId) -> Result<Vec<FieldDef>, AccessError> {
        let tracker = self
            .records
            .get(&record)
            .ok_or(AccessError::RecordNotFound(record))?
            .tracker_id();
        Ok(self
            .trackers
            .get(&tracker)
            .map(|t| t.fields().filter(|f| f.is_computed()).cloned().collect())
            .unwrap_or_default())
    }

    fn linked_rows(
        &self,
        parents: &[RecordId],
        target_field_name: &str,
        at: Option<Timestamp>,
    ) -> Result<Vec<FieldRow>, AccessError> {
        let mut rows = Vec::new();
        for &parent in parents {
            // Copy links out so no map guard is held while reading children.
            let links: Vec<RecordId> = self
                .records
                .get(&parent)
                .ok_or(AccessError::RecordNotFound(parent))?
                .links_at(at)
                .to_vec();
            rows.extend(
                links
                    .into_iter()
                    .filter_map(|child| self.row_for(parent, child, target_field_name, at)),
            );
        }
        tracing::trace!(parents = parents.len(), rows = rows.len(), "fetched linked rows");
        Ok(rows)
    }

    fn direct_value(
        &self,
        record: RecordId,
        target_field_name: &str,
        at: Option<Timestamp>,
    ) -> Result<RowValue, AccessError> {
        let entry = self
            .records
            .get(&record)
            .ok_or(AccessError::RecordNotFound(record))?;
        let field = self
            .field_of(&entry, target_field_name)
            .ok_or_else(|| AccessError::FieldNotFound {
                record,
                name: target_field_name.to_string(),
            })?;
        Ok(entry
            .changeset_at(at)
            .map_or(RowValue::Empty, |cs| RowValue::decode(&field.kind, cs.value(field.id))))
    }

    fn manual_override(
        &self,
        record: RecordId,
        field: FieldId,
        at: Option<Timestamp>,
    ) -> Result<Option<f64>, AccessError> {
        let entry = self
            .records
            .get(&record)
            .ok_or(AccessError::RecordNotFound(record))?;
        Ok(entry
            .value_at(field, at)
            .and_then(FieldValue::manual_override))
    }

    fn parents_of(&self, record: RecordId) -> Result<Vec<RecordId>, AccessError> {
        Ok(self.parents(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rollup_model::NumericType;

    const EFFORT: FieldId = FieldId(1);
    const POINTS: FieldId = FieldId(2);

    fn store() -> InMemoryGraph {
        let graph = InMemoryGraph::new().with_clock(|| Timestamp(1_000));
        graph.add_tracker(
            Tracker::new(TrackerId(1), "epics").with_field(FieldDef::computed(EFFORT, "effort")),
        );
        graph.add_tracker(
            Tracker::new(TrackerId(2), "tasks")
                .with_field(FieldDef::numeric(POINTS, "effort", NumericType::Int)),
        );
        graph
    }

    #[test]
    fn linked_rows_decode_child_values() {
        let graph = store();
        graph.create_record(RecordId(1), TrackerId(1)).unwrap();
        graph.create_record(RecordId(2), TrackerId(2)).unwrap();
        graph.create_record(RecordId(3), TrackerId(1)).unwrap();
        graph
            .append_changeset(
                RecordId(1),
                Changeset::new(Timestamp(10)).with_links([RecordId(2), RecordId(3), RecordId(99)]),
            )
            .unwrap();
        graph
            .append_changeset(RecordId(2), Changeset::new(Timestamp(10)).with_value(POINTS, FieldValue::Int(4)))
            .unwrap();
        graph
            .append_changeset(RecordId(3), Changeset::new(Timestamp(10)))
            .unwrap();

        let rows = graph.linked_rows_of(RecordId(1), "effort", None).unwrap();
        assert_eq!(
            rows,
            vec![
                FieldRow::new(RecordId(1), RecordId(2), RowValue::TypedValue(NumericType::Int, 4.0)),
                FieldRow::new(RecordId(1), RecordId(3), RowValue::ComputedPending),
            ]
        );
    }

    #[test]
    fn children_created_later_are_invisible_in_the_past() {
        let graph = store();
        graph.create_record(RecordId(1), TrackerId(1)).unwrap();
        graph.create_record(RecordId(2), TrackerId(2)).unwrap();
        graph
            .append_changeset(RecordId(1), Changeset::new(Timestamp(10)).with_link(RecordId(2)))
            .unwrap();
        graph
            .append_changeset(RecordId(2), Changeset::new(Timestamp(20)).with_value(POINTS, FieldValue::Int(4)))
            .unwrap();

        assert!(graph.linked_rows_of(RecordId(1), "effort", Some(Timestamp(15))).unwrap().is_empty());
        assert_eq!(graph.linked_rows_of(RecordId(1), "effort", Some(Timestamp(20))).unwrap().len(), 1);
    }

    #[test]
    fn commit_merges_over_latest_changeset() {
        let graph = store();
        graph.create_record(RecordId(1), TrackerId(1)).unwrap();
        graph
            .append_changeset(RecordId(1), Changeset::new(Timestamp(10)).with_link(RecordId(2)))
            .unwrap();

        let at = graph
            .commit(RecordId(1), BTreeMap::from([(EFFORT, FieldValue::manual(5.0))]), None)
            .unwrap();
        assert_eq!(at, Timestamp(1_000));
        assert_eq!(graph.manual_override(RecordId(1), EFFORT, None).unwrap(), Some(5.0));
        assert_eq!(graph.manual_override(RecordId(1), EFFORT, Some(Timestamp(10))).unwrap(), None);
        assert_eq!(graph.record(RecordId(1)).unwrap().links_at(None), &[RecordId(2)]);
    }

    #[test]
    fn commit_never_goes_back_in_time() {
        let graph = store();
        graph.create_record(RecordId(1), TrackerId(1)).unwrap();
        graph
            .append_changeset(RecordId(1), Changeset::new(Timestamp(5_000)))
            .unwrap();
        let at = graph.commit(RecordId(1), BTreeMap::new(), Some(vec![])).unwrap();
        assert_eq!(at, Timestamp(5_000));
    }

    #[test]
    fn unknown_records_are_errors() {
        let graph = store();
        assert_eq!(
            graph.linked_rows_of(RecordId(7), "effort", None),
            Err(AccessError::RecordNotFound(RecordId(7)))
        );
        assert_eq!(
            graph.create_record(RecordId(7), TrackerId(9)),
            Err(AccessError::TrackerNotFound(TrackerId(9)))
        );
    }

    #[test]
    fn direct_value_reads_own_field() {
        let graph = store();
        graph.create_record(RecordId(2), TrackerId(2)).unwrap();
        graph
            .append_changeset(RecordId(2), Changeset::new(Timestamp(10)).with_value(POINTS, FieldValue::Int(4)))
            .unwrap();

        assert_eq!(
            graph.direct_value(RecordId(2), "effort", None).unwrap(),
            RowValue::TypedValue(NumericType::Int, 4.0)
        );
        assert_eq!(graph.direct_value(RecordId(2), "effort", Some(Timestamp(5))).unwrap(), RowValue::Empty);
        assert!(matches!(
            graph.direct_value(RecordId(2), "remaining", None),
            Err(AccessError::FieldNotFound { .. })
        ));
        assert_eq!(
            graph.manual_overrides(&[RecordId(2)], EFFORT, None).unwrap(),
            vec![(RecordId(2), None)]
        );
    }

    #[test]
    fn parents_follow_latest_links() {
        let graph = store();
        for id in 1..=4 {
            graph.create_record(RecordId(id), TrackerId(1)).unwrap();
        }
        // 1 -> 2 -> 3, 4 -> 3, 3 -> 1 (cycle)
        graph.append_changeset(RecordId(1), Changeset::new(Timestamp(1)).with_link(RecordId(2))).unwrap();
        graph.append_changeset(RecordId(2), Changeset::new(Timestamp(1)).with_link(RecordId(3))).unwrap();
        graph.append_changeset(RecordId(4), Changeset::new(Timestamp(1)).with_link(RecordId(3))).unwrap();
        graph.append_changeset(RecordId(3), Changeset::new(Timestamp(1)).with_link(RecordId(1))).unwrap();

        assert_eq!(graph.parents_of(RecordId(3)).unwrap(), vec![RecordId(2), RecordId(4)]);
        assert_eq!(graph.parents_of(RecordId(1)).unwrap(), vec![RecordId(3)]);

        graph.commit(RecordId(4), BTreeMap::new(), Some(vec![])).unwrap();
        assert_eq!(graph.parents_of(RecordId(3)).unwrap(), vec![RecordId(2)]);
    }

    #[test]
    fn parent_index_tracks_relinks_from_both_write_paths() {
        let graph = store();
        for id in 1..=3 {
            graph.create_record(RecordId(id), TrackerId(1)).unwrap();
        }
        graph
            .append_changeset(RecordId(1), Changeset::new(Timestamp(1)).with_links([RecordId(2), RecordId(3)]))
            .unwrap();
        graph.commit(RecordId(2), BTreeMap::new(), Some(vec![RecordId(3), RecordId(3)])).unwrap();
        assert_eq!(graph.parents_of(RecordId(3)).unwrap(), vec![RecordId(1), RecordId(2)]);

        // a later explicit changeset replaces the links
        graph
            .append_changeset(RecordId(1), Changeset::new(Timestamp(2_000)).with_link(RecordId(2)))
            .unwrap();
        assert_eq!(graph.parents_of(RecordId(3)).unwrap(), vec![RecordId(2)]);
        assert_eq!(graph.parents_of(RecordId(2)).unwrap(), vec![RecordId(1)]);

        // values-only commits keep the links
        graph.commit(RecordId(1), BTreeMap::new(), None).unwrap();
        assert_eq!(graph.parents_of(RecordId(2)).unwrap(), vec![RecordId(1)]);
        assert!(graph.parents_of(RecordId(1)).unwrap().is_empty());
    }

    #[test]
    fn computed_fields_of_record() {
        let graph = store();
        graph.create_record(RecordId(1), TrackerId(1)).unwrap();
        graph.create_record(RecordId(2), TrackerId(2)).unwrap();

        let fields = graph.computed_fields(RecordId(1)).unwrap();
        assert_eq!(fields.iter().map(|f| f.id).collect::<Vec<_>>(), vec![EFFORT]);
        assert!(graph.computed_fields(RecordId(2)).unwrap().is_empty());
        assert!(matches!(
            graph.computed_fields(RecordId(9)),
            Err(AccessError::RecordNotFound(RecordId(9)))
        ));
    }
}
