//! Rollup Model
//!
//! Versioned records and typed field values for computed-field rollups.
//!
//! # Core Concepts
//!
//! - [`Record`]: versioned item (artifact) owning an ordered list of [`Changeset`]s
//! - [`FieldDef`]: field declaration, plain numeric or computed
//! - [`FieldValue`]: value stored on a changeset
//! - [`RowValue`]: value decoded at the storage boundary for the resolvers
//! - [`SubmittedValue`]: edit of a computed field (manual or auto-computed)
//!
//! # Example
//!
//! ```rust
//! use rollup_model::{Changeset, FieldId, FieldValue, Record, RecordId, Timestamp, TrackerId};
//!
//! let mut record = Record::new(RecordId(1), TrackerId(1));
//! record
//!     .push_changeset(Changeset::new(Timestamp(10)).with_value(FieldId(1), FieldValue::Int(3)))
//!     .unwrap();
//!
//! assert_eq!(record.value_at(FieldId(1), Some(Timestamp(5))), None);
//! assert_eq!(record.value_at(FieldId(1), None), Some(&FieldValue::Int(3)));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod field;
mod ids;
mod record;
mod submission;
mod value;

pub use field::{ComputedProperties, FieldDef, FieldKind, NumericType};
pub use ids::{FieldId, RecordId, Timestamp, TrackerId, UserId};
pub use record::{Changeset, Record, RecordError};
pub use submission::{has_changes, SubmissionError, SubmittedValue};
pub use value::{FieldRow, FieldValue, RowValue};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
