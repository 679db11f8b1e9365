//! Records and their changesets
//!
//! A [`Record`] never changes in place: every edit appends a [`Changeset`]
//! holding the full field values and outgoing links at that version.

use crate::ids::{FieldId, RecordId, Timestamp, TrackerId};
use crate::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Errors while building record history
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Changeset older than the record's current one
    #[error("changeset at {attempted} precedes latest changeset at {latest} on record {record}")]
    OutOfOrder {
        /// Record whose history was appended to
        record: RecordId,
        /// Timestamp of the record's latest changeset
        latest: Timestamp,
        /// Timestamp of the rejected changeset
        attempted: Timestamp,
    },
}

/// Time-stamped snapshot of a record's field values and links
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Changeset {
    /// Creation time
    pub timestamp: Timestamp,

    /// Field values at this version
    #[serde(default)]
    pub values: BTreeMap<FieldId, FieldValue>,

    /// Linked (child) records at this version
    #[serde(default)]
    pub links: Vec<RecordId>,
}

impl Changeset {
    /// Empty changeset at `timestamp`
    #[inline]
    #[must_use]
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            values: BTreeMap::new(),
            links: Vec::new(),
        }
    }

    /// Set a field value
    #[inline]
    #[must_use]
    pub fn with_value(mut self, field: FieldId, value: FieldValue) -> Self {
        self.values.insert(field, value);
        self
    }

    /// Add an outgoing link
    #[inline]
    #[must_use]
    pub fn with_link(mut self, child: RecordId) -> Self {
        self.links.push(child);
        self
    }

    /// Replace the outgoing links
    #[inline]
    #[must_use]
    pub fn with_links(mut self, links: impl IntoIterator<Item = RecordId>) -> Self {
        self.links = links.into_iter().collect();
        self
    }

    /// Stored value of a field
    #[inline]
    #[must_use]
    pub fn value(&self, field: FieldId) -> Option<&FieldValue> {
        self.values.get(&field)
    }
}

/// Versioned record belonging to a tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: RecordId,
    tracker_id: TrackerId,
    changesets: Vec<Changeset>,
}

impl Record {
    /// Record with no history yet
    #[inline]
    #[must_use]
    pub fn new(id: RecordId, tracker_id: TrackerId) -> Self {
        Self {
            id,
            tracker_id,
            changesets: Vec::new(),
        }
    }

    /// Record id
    #[inline]
    #[must_use]
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Owning tracker
    #[inline]
    #[must_use]
    pub fn tracker_id(&self) -> TrackerId {
        self.tracker_id
    }

    /// All changesets, oldest first
    #[inline]
    #[must_use]
    pub fn changesets(&self) -> &[Changeset] {
        &self.changesets
    }

    /// Append a changeset
    ///
    /// # Errors
    /// Returns [`RecordError::OutOfOrder`] when `changeset` is older than the
    /// current last changeset. Equal timestamps are accepted; the later one
    /// wins for "as of" lookups.
    pub fn push_changeset(&mut self, changeset: Changeset) -> Result<(), RecordError> {
        if let Some(last) = self.changesets.last() {
            if changeset.timestamp < last.timestamp {
                return Err(RecordError::OutOfOrder {
                    record: self.id,
                    latest: last.timestamp,
                    attempted: changeset.timestamp,
                });
            }
        }
        self.changesets.push(changeset);
        Ok(())
    }

    /// Most recent changeset
    #[inline]
    #[must_use]
    pub fn latest(&self) -> Option<&Changeset> {
        self.changesets.last()
    }

    /// Changeset governing the record at `at`
    ///
    /// `None` selects the latest changeset. Otherwise the last changeset with
    /// a timestamp lower than or equal to `at`; `None` if the record did not
    /// exist yet.
    #[must_use]
    pub fn changeset_at(&self, at: Option<Timestamp>) -> Option<&Changeset> {
        match at {
            None => self.latest(),
            Some(ts) => {
                let idx = self.changesets.partition_point(|c| c.timestamp <= ts);
                idx.checked_sub(1).map(|i| &self.changesets[i])
            }
        }
    }

    /// Field value at `at`
    #[inline]
    #[must_use]
    pub fn value_at(&self, field: FieldId, at: Option<Timestamp>) -> Option<&FieldValue> {
        self.changeset_at(at).and_then(|c| c.value(field))
    }

    /// Outgoing links at `at`
    #[inline]
    #[must_use]
    pub fn links_at(&self, at: Option<Timestamp>) -> &[RecordId] {
        self.changeset_at(at).map_or(&[], |c| c.links.as_slice())
    }
}
