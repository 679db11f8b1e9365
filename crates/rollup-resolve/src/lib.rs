//! Rollup Resolve
//!
//! Computed-field resolution over cyclic, versioned link graphs.
//!
//! # Strategies
//!
//! - **Precise** ([`RecursiveResolver`]): depth-first, checks the viewing
//!   user's permission on every linked record, reads each child's own field
//!   definition, always stops at manual overrides
//! - **Fast** ([`FastResolver`]): breadth-first with one batched read per
//!   level, ignores permissions, optionally looks through manual overrides
//!
//! Both sum the contributions of reachable records, count every record at
//! most once, and return `None` when nothing contributed.
//!
//! # Example
//!
//! ```rust
//! use rollup_graph::{AllowAll, InMemoryGraph, Tracker};
//! use rollup_model::{Changeset, FieldDef, FieldId, FieldValue, NumericType, RecordId, Timestamp, TrackerId};
//! use rollup_resolve::{RecursiveResolver, ResolveRequest, Resolver};
//! use std::sync::Arc;
//!
//! let graph = InMemoryGraph::new();
//! let effort = FieldDef::computed(FieldId(1), "effort");
//! graph.add_tracker(Tracker::new(TrackerId(1), "epics").with_field(effort.clone()));
//! graph.add_tracker(
//!     Tracker::new(TrackerId(2), "tasks").with_field(FieldDef::numeric(FieldId(2), "effort", NumericType::Int)),
//! );
//! graph.create_record(RecordId(1), TrackerId(1)).unwrap();
//! graph.create_record(RecordId(2), TrackerId(2)).unwrap();
//! graph.append_changeset(RecordId(1), Changeset::new(Timestamp(1)).with_link(RecordId(2))).unwrap();
//! graph
//!     .append_changeset(RecordId(2), Changeset::new(Timestamp(1)).with_value(FieldId(2), FieldValue::Int(3)))
//!     .unwrap();
//!
//! let resolver = RecursiveResolver::new(Arc::new(graph), Arc::new(AllowAll));
//! let value = resolver.resolve(&ResolveRequest::new(RecordId(1), effort)).unwrap();
//! assert_eq!(value, Some(3.0));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod fast;
pub mod recursive;
pub mod resolver;
pub mod visited;

// Re-exports
pub use error::ResolveError;
pub use fast::FastResolver;
pub use recursive::{RecursiveResolver, DEFAULT_MAX_DEPTH};
pub use resolver::{ResolveMode, ResolveRequest, Resolver};
pub use visited::VisitedSet;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for resolution
    pub use crate::{
        FastResolver, RecursiveResolver, ResolveError, ResolveMode, ResolveRequest, Resolver,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
