//! Rollup Graph
//!
//! The storage boundary of the rollup engine.
//!
//! # Overview
//!
//! - **LinkGraphAccessor**: batched reads of links and decoded field rows
//! - **PermissionOracle**: per-record visibility, consulted by the precise resolver
//! - **InMemoryGraph**: concurrent, versioned reference store
//! - **GraphDocument**: YAML/JSON fixtures loaded into an `InMemoryGraph`
//!
//! # Example
//!
//! ```rust
//! use rollup_graph::{InMemoryGraph, LinkGraphAccessor, Tracker};
//! use rollup_model::{Changeset, FieldDef, FieldId, RecordId, Timestamp, TrackerId};
//!
//! let graph = InMemoryGraph::new();
//! graph.add_tracker(Tracker::new(TrackerId(1), "epics").with_field(FieldDef::computed(FieldId(1), "effort")));
//! graph.create_record(RecordId(1), TrackerId(1)).unwrap();
//! graph.append_changeset(RecordId(1), Changeset::new(Timestamp(1))).unwrap();
//!
//! assert!(graph.linked_rows_of(RecordId(1), "effort", None).unwrap().is_empty());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod accessor;
pub mod document;
pub mod error;
pub mod store;

// Re-exports
pub use accessor::{AllowAll, LinkGraphAccessor, PermissionOracle, VisibilityRules};
pub use document::{GraphDocument, LoadedGraph};
pub use error::{AccessError, DocumentError};
pub use store::{InMemoryGraph, Tracker};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for graph access
    pub use crate::{AccessError, InMemoryGraph, LinkGraphAccessor, PermissionOracle, Tracker};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
