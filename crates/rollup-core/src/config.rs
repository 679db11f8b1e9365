//! Engine configuration
//!
//! ```toml
//! cache_capacity = 50000
//! cache_ttl_secs = 600
//! max_depth = 64
//! default_mode = "fast"
//! parallel_batch = true
//! ```

use crate::error::ConfigError;
use rollup_cache::ValueCache;
use rollup_resolve::{ResolveMode, DEFAULT_MAX_DEPTH};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Computed field engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum number of cached values
    pub cache_capacity: u64,
    /// Cached values expire after this many seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_ttl_secs: Option<u64>,
    /// Depth guard of the precise resolver, [`DEFAULT_MAX_DEPTH`] unless set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    /// Round guard of the fast resolver
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<usize>,
    /// Mode for fields without the `fast_compute` property
    pub default_mode: ResolveMode,
    /// Resolve batches on the rayon pool
    pub parallel_batch: bool,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML
    ///
    /// # Errors
    /// [`ConfigError::Parse`] on malformed TOML or unknown keys.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Load a TOML file
    ///
    /// # Errors
    /// [`ConfigError::Io`] when the file cannot be read, else as
    /// [`EngineConfig::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&input)?;
        tracing::debug!(path = %path.display(), "loaded engine configuration");
        Ok(config)
    }

    /// With cache capacity
    #[inline]
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// With cache time-to-live
    #[inline]
    #[must_use]
    pub fn with_cache_ttl_secs(mut self, secs: u64) -> Self {
        self.cache_ttl_secs = Some(secs);
        self
    }

    /// With precise-mode depth guard
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// With fast-mode round guard
    #[inline]
    #[must_use]
    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = Some(rounds);
        self
    }

    /// With default mode
    #[inline]
    #[must_use]
    pub fn with_default_mode(mut self, mode: ResolveMode) -> Self {
        self.default_mode = mode;
        self
    }

    /// With or without parallel batches
    #[inline]
    #[must_use]
    pub fn with_parallel_batch(mut self, parallel: bool) -> Self {
        self.parallel_batch = parallel;
        self
    }

    /// Cache time-to-live
    #[must_use]
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }

    /// Build the value cache described by this configuration
    #[must_use]
    pub fn build_cache(&self) -> ValueCache {
        match self.cache_ttl() {
            Some(ttl) => ValueCache::with_ttl(self.cache_capacity, ttl),
            None => ValueCache::new(self.cache_capacity),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 10_000,
            cache_ttl_secs: None,
            max_depth: Some(DEFAULT_MAX_DEPTH),
            max_rounds: None,
            default_mode: ResolveMode::Precise,
            parallel_batch: true,
        }
    }
}
