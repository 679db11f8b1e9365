//! Graph documents
//!
//! YAML or JSON description of trackers, records and their history, loaded
//! into an [`InMemoryGraph`] plus [`VisibilityRules`]. Values are written by
//! field name; each changeset carries forward the previous values and links
//! unless it overrides them.
//!
//! ```yaml
//! trackers:
//!   - id: 1
//!     name: epics
//!     fields:
//!       - { id: 10, name: effort, type: computed }
//! records:
//!   - id: 1
//!     tracker: 1
//!     viewers: [1, 2]
//!     changesets:
//!       - at: 100
//!         values: { effort: auto }
//!         links: [2, 3]
//! ```

use crate::accessor::VisibilityRules;
use crate::error::DocumentError;
use crate::store::{InMemoryGraph, Tracker};
use rollup_model::{
    Changeset, FieldDef, FieldKind, FieldValue, RecordId, Timestamp, TrackerId, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whole document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Tracker schemas
    #[serde(default)]
    pub trackers: Vec<TrackerDoc>,

    /// Records with history
    #[serde(default)]
    pub records: Vec<RecordDoc>,
}

/// Tracker declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerDoc {
    /// Tracker id
    pub id: TrackerId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Field definitions
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

/// Record declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDoc {
    /// Record id
    pub id: RecordId,
    /// Owning tracker
    pub tracker: TrackerId,
    /// Users allowed to see the record; everyone when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewers: Option<Vec<UserId>>,
    /// History, oldest first
    #[serde(default)]
    pub changesets: Vec<ChangesetDoc>,
}

/// One version of a record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesetDoc {
    /// Changeset timestamp
    pub at: Timestamp,
    /// Values by field name, merged over the previous changeset
    #[serde(default)]
    pub values: BTreeMap<String, DocValue>,
    /// Replaces the previous links when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<RecordId>>,
}

/// Value as written in a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocValue {
    /// Plain number; a manual override on computed fields
    Number(f64),
    /// Explicit manual override
    Manual {
        /// Override value
        manual: f64,
    },
    /// `auto` for auto-computed fields
    Keyword(String),
}

/// Store and visibility rules built from a document
#[derive(Debug)]
pub struct LoadedGraph {
    /// Loaded records
    pub graph: InMemoryGraph,
    /// Viewer restrictions declared by the document
    pub visibility: VisibilityRules,
}

impl GraphDocument {
    /// Parse a YAML document
    ///
    /// # Errors
    /// [`DocumentError::Yaml`] on malformed input.
    pub fn from_yaml_str(input: &str) -> Result<Self, DocumentError> {
        Ok(serde_yaml::from_str(input)?)
    }

    /// Parse a JSON document
    ///
    /// # Errors
    /// [`DocumentError::Json`] on malformed input.
    pub fn from_json_str(input: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Build a store from this document
    ///
    /// # Errors
    /// Unknown trackers or fields, values not matching their field kind,
    /// duplicate records, and out-of-order changesets.
    pub fn load(self) -> Result<LoadedGraph, DocumentError> {
        self.load_into(InMemoryGraph::new())
    }

    /// Load into an existing (possibly clock-configured) store
    ///
    /// # Errors
    /// Same as [`GraphDocument::load`].
    pub fn load_into(self, graph: InMemoryGraph) -> Result<LoadedGraph, DocumentError> {
        let visibility = VisibilityRules::new();

        for doc in self.trackers {
            let tracker = doc
                .fields
                .into_iter()
                .fold(Tracker::new(doc.id, doc.name), Tracker::with_field);
            graph.add_tracker(tracker);
        }

        for doc in self.records {
            let tracker = graph.tracker(doc.tracker).ok_or(DocumentError::UnknownTracker {
                record: doc.id,
                tracker: doc.tracker,
            })?;
            graph.create_record(doc.id, doc.tracker)?;
            if let Some(viewers) = doc.viewers {
                visibility.restrict(doc.id, viewers);
            }

            let mut current = Changeset::default();
            for cs in doc.changesets {
                current.timestamp = cs.at;
                for (name, value) in cs.values {
                    let field = tracker.field(&name).ok_or_else(|| DocumentError::UnknownField {
                        record: doc.id,
                        field: name.clone(),
                    })?;
                    let value = convert(doc.id, field, &value)?;
                    current.values.insert(field.id, value);
                }
                if let Some(links) = cs.links {
                    current.links = links;
                }
                graph.append_changeset(doc.id, current.clone())?;
            }
        }

        tracing::debug!(records = graph.record_count(), "loaded graph document");
        Ok(LoadedGraph { graph, visibility })
    }
}

#[allow(clippy::cast_possible_truncation)]
fn convert(record: RecordId, field: &FieldDef, value: &DocValue) -> Result<FieldValue, DocumentError> {
    let invalid = |reason: &str| DocumentError::InvalidValue {
        record,
        field: field.name.clone(),
        reason: reason.to_string(),
    };

    match (&field.kind, value) {
        (FieldKind::Int, DocValue::Number(n)) if n.fract() == 0.0 => Ok(FieldValue::Int(*n as i64)),
        (FieldKind::Int, DocValue::Number(_)) => Err(invalid("expected an integer")),
        (FieldKind::Float, DocValue::Number(n)) => Ok(FieldValue::Float(*n)),
        (FieldKind::Int | FieldKind::Float, _) => Err(invalid("expected a number")),
        (FieldKind::Computed(_), DocValue::Number(n) | DocValue::Manual { manual: n }) => {
            Ok(FieldValue::manual(*n))
        }
        (FieldKind::Computed(_), DocValue::Keyword(k)) if k == "auto" => Ok(FieldValue::autocomputed()),
        (FieldKind::Computed(_), DocValue::Keyword(_)) => {
            Err(invalid("expected a number, {manual: n} or 'auto'"))
        }
    }
}
