//! Rollup Core
//!
//! Computed field engine: cached, point-in-time resolution of computed
//! fields over a cyclic link graph, with write-path invalidation.
//!
//! # Core Concepts
//!
//! - [`ComputedFieldEngine`]: facade over the precise and fast resolvers and
//!   the injected value cache
//! - [`EngineConfig`]: cache sizing, guards and default mode, loaded from TOML
//! - [`ComputedValueSnapshot`]: manual and aggregated state for display
//! - [`write`]: commit helpers keeping the cache coherent
//!
//! # Example
//!
//! ```rust
//! use rollup_core::{ComputedFieldEngine, EngineConfig};
//! use rollup_graph::{AllowAll, GraphDocument};
//! use rollup_model::{RecordId, UserId};
//! use std::sync::Arc;
//!
//! let doc = r"
//! trackers:
//!   - { id: 1, name: epics, fields: [{ id: 1, name: effort, type: computed }] }
//!   - { id: 2, name: tasks, fields: [{ id: 2, name: effort, type: int }] }
//! records:
//!   - { id: 1, tracker: 1, changesets: [{ at: 1, links: [2, 3] }] }
//!   - { id: 2, tracker: 2, changesets: [{ at: 1, values: { effort: 3 } }] }
//!   - { id: 3, tracker: 2, changesets: [{ at: 1, values: { effort: 4 } }] }
//! ";
//! let loaded = GraphDocument::from_yaml_str(doc).unwrap().load().unwrap();
//! let engine = ComputedFieldEngine::new(Arc::new(loaded.graph), Arc::new(AllowAll), EngineConfig::default());
//!
//! let value = engine.computed_value(RecordId(1), "effort", None, UserId(0)).unwrap();
//! assert_eq!(value, Some(7.0));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod snapshot;
pub mod write;

// Re-exports
pub use config::EngineConfig;
pub use engine::ComputedFieldEngine;
pub use error::{ConfigError, EngineError, EngineResult};
pub use logging::{init_logging, LogFormat};
pub use snapshot::ComputedValueSnapshot;
pub use write::{commit_changes, submit_computed_value};

pub use rollup_resolve::{ResolveMode, ResolveRequest};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for engine users
    pub use crate::{
        ComputedFieldEngine, ComputedValueSnapshot, EngineConfig, EngineError, EngineResult,
        ResolveMode, ResolveRequest,
    };
    pub use rollup_graph::{AllowAll, LinkGraphAccessor, PermissionOracle};
    pub use rollup_model::{FieldDef, FieldId, RecordId, Timestamp, UserId};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
