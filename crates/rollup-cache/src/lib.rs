//! Rollup Cache
//!
//! Concurrent cache of computed field values with coherent invalidation.
//!
//! # Core Concepts
//!
//! - **CacheKey**: `(record, field, timestamp)`, `None` timestamp for latest
//! - **Generations**: every `(record, field)` pair carries a counter bumped by
//!   [`ValueCache::invalidate`]; entries from older generations are unreadable
//! - **Tickets**: taken before resolving, so a value computed across an
//!   invalidation is dropped instead of stored
//!
//! # Example
//!
//! ```rust
//! use rollup_cache::ValueCache;
//! use rollup_model::{FieldId, RecordId};
//!
//! let cache = ValueCache::new(1_000);
//! let value = cache
//!     .get_or_resolve(RecordId(1), FieldId(1), None, || Ok::<_, ()>(Some(7.0)))
//!     .unwrap();
//! assert_eq!(value, Some(7.0));
//!
//! cache.invalidate(RecordId(1), FieldId(1));
//! assert_eq!(cache.get(RecordId(1), FieldId(1), None), None);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cache;

pub use cache::{CacheKey, CacheStats, CacheTicket, ValueCache};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
