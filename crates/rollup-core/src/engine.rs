//! Computed field engine
//!
//! [`ComputedFieldEngine`] is the entry point used by display, export and
//! report callers. It owns both resolvers and an injected [`ValueCache`],
//! and exposes the invalidation hook used by the write path.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::snapshot::ComputedValueSnapshot;
use rayon::prelude::*;
use rollup_cache::ValueCache;
use rollup_graph::{LinkGraphAccessor, PermissionOracle};
use rollup_model::{FieldDef, FieldId, RecordId, Timestamp, UserId};
use rollup_resolve::{FastResolver, RecursiveResolver, ResolveMode, ResolveRequest, Resolver};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Resolution and caching facade
///
/// # Modes
/// - `resolve`: precise, permission aware, uncached
/// - `resolve_fast`: batched, permission unaware, uncached
/// - `get_cached_or_resolve` / `computed_value`: displayed value (manual
///   overrides win), cached, mode picked from the field
#[derive(Debug, Clone)]
pub struct ComputedFieldEngine {
    accessor: Arc<dyn LinkGraphAccessor>,
    precise: RecursiveResolver,
    fast: FastResolver,
    cache: ValueCache,
    config: EngineConfig,
}

impl ComputedFieldEngine {
    /// Create engine with a cache built from `config`
    #[must_use]
    pub fn new(
        accessor: Arc<dyn LinkGraphAccessor>,
        permissions: Arc<dyn PermissionOracle>,
        config: EngineConfig,
    ) -> Self {
        let precise = RecursiveResolver::new(Arc::clone(&accessor), permissions)
            .with_max_depth(config.max_depth);
        let fast = FastResolver::new(Arc::clone(&accessor)).with_max_rounds(config.max_rounds);
        let cache = config.build_cache();

        tracing::debug!(
            mode = %config.default_mode,
            cache_capacity = config.cache_capacity,
            "computed field engine ready"
        );

        Self {
            accessor,
            precise,
            fast,
            cache,
            config,
        }
    }

    /// Use a cache shared with other engines
    #[must_use]
    pub fn with_cache(mut self, cache: ValueCache) -> Self {
        self.cache = cache;
        self
    }

    /// Engine configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Value cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &ValueCache {
        &self.cache
    }

    /// Underlying graph accessor
    #[inline]
    #[must_use]
    pub fn accessor(&self) -> &Arc<dyn LinkGraphAccessor> {
        &self.accessor
    }

    /// Resolver implementing `mode`
    #[must_use]
    pub fn resolver(&self, mode: ResolveMode) -> &dyn Resolver {
        match mode {
            ResolveMode::Precise => &self.precise,
            ResolveMode::Fast => &self.fast,
        }
    }

    /// Mode used for the displayed value of `field`
    #[must_use]
    pub fn mode_for(&self, field: &FieldDef) -> ResolveMode {
        if field.uses_fast_compute() {
            ResolveMode::Fast
        } else {
            self.config.default_mode
        }
    }

    /// Field of `record` named `name`
    ///
    /// # Errors
    /// [`EngineError::UnknownField`], or a storage failure.
    pub fn field(&self, record: RecordId, name: &str) -> EngineResult<FieldDef> {
        self.accessor
            .field_by_name(record, name)?
            .ok_or_else(|| EngineError::UnknownField {
                record,
                field: name.to_string(),
            })
    }

    /// Computed field of `record` named `name`
    ///
    /// # Errors
    /// As [`ComputedFieldEngine::field`], plus [`EngineError::NotComputed`].
    pub fn computed_field(&self, record: RecordId, name: &str) -> EngineResult<FieldDef> {
        let field = self.field(record, name)?;
        if field.is_computed() {
            Ok(field)
        } else {
            Err(EngineError::NotComputed {
                field: name.to_string(),
            })
        }
    }

    /// Precise, permission-aware resolution
    ///
    /// # Errors
    /// Storage failures and the depth guard.
    pub fn resolve(&self, request: &ResolveRequest) -> EngineResult<Option<f64>> {
        Ok(self.precise.resolve(request)?)
    }

    /// Batched resolution ignoring permissions
    ///
    /// # Errors
    /// Storage failures and the round guard.
    pub fn resolve_fast(
        &self,
        record: RecordId,
        field: &FieldDef,
        at: Option<Timestamp>,
        stop_on_manual_value: bool,
    ) -> EngineResult<Option<f64>> {
        Ok(self.fast.resolve_fast(record, field, at, stop_on_manual_value)?)
    }

    /// Uncached resolution with an explicit mode
    ///
    /// # Errors
    /// Same as the chosen resolver.
    pub fn resolve_with_mode(&self, request: &ResolveRequest, mode: ResolveMode) -> EngineResult<Option<f64>> {
        Ok(self.resolver(mode).resolve(request)?)
    }

    /// Displayed value, from the cache when possible
    ///
    /// Manual overrides always win here, whatever the request says.
    ///
    /// Cache keys carry no user: in precise mode the value cached for the
    /// first caller is served to every user, including users who cannot see
    /// some of the linked records. Callers needing per-user correctness use
    /// fast mode (which never filters by user) or the uncached
    /// [`ComputedFieldEngine::resolve`].
    ///
    /// # Errors
    /// Resolution failures; these are never cached.
    pub fn get_cached_or_resolve(&self, request: &ResolveRequest) -> EngineResult<Option<f64>> {
        let mode = self.mode_for(&request.field);
        let display = ResolveRequest {
            stop_on_manual_value: true,
            ..request.clone()
        };
        let value = self
            .cache
            .get_or_resolve(display.record, display.field.id, display.at, || {
                self.resolver(mode).resolve(&display)
            })?;
        Ok(value)
    }

    /// Displayed value of the computed field `field_name` on `record`
    ///
    /// # Errors
    /// Unknown or non-computed fields, and resolution failures.
    pub fn computed_value(
        &self,
        record: RecordId,
        field_name: &str,
        at: Option<Timestamp>,
        user: UserId,
    ) -> EngineResult<Option<f64>> {
        let field = self.computed_field(record, field_name)?;
        self.get_cached_or_resolve(&ResolveRequest::new(record, field).at(at).as_user(user))
    }

    /// Value of any numeric field: stored for plain fields, displayed for
    /// computed ones
    ///
    /// # Errors
    /// Unknown fields, and storage or resolution failures.
    pub fn field_value(
        &self,
        record: RecordId,
        field_name: &str,
        at: Option<Timestamp>,
        user: UserId,
    ) -> EngineResult<Option<f64>> {
        let field = self.field(record, field_name)?;
        if field.is_computed() {
            return self.get_cached_or_resolve(&ResolveRequest::new(record, field).at(at).as_user(user));
        }
        Ok(self.accessor.direct_value(record, field_name, at)?.direct_value())
    }

    /// Manual and aggregated state of a computed field
    ///
    /// # Errors
    /// Unknown or non-computed fields, and resolution failures.
    pub fn snapshot(
        &self,
        record: RecordId,
        field_name: &str,
        at: Option<Timestamp>,
    ) -> EngineResult<ComputedValueSnapshot> {
        let field = self.computed_field(record, field_name)?;
        let manual = self.accessor.manual_override(record, field.id, at)?;
        self.build_snapshot(record, &field, at, manual)
    }

    /// Snapshots of the same field on many records (one tracker)
    ///
    /// # Errors
    /// The first failure encountered.
    pub fn snapshots(
        &self,
        records: &[RecordId],
        field: &FieldDef,
        at: Option<Timestamp>,
    ) -> EngineResult<Vec<ComputedValueSnapshot>> {
        let overrides = self.accessor.manual_overrides(records, field.id, at)?;
        let build = |(record, manual): (RecordId, Option<f64>)| self.build_snapshot(record, field, at, manual);
        if self.config.parallel_batch {
            overrides.into_par_iter().map(build).collect()
        } else {
            overrides.into_iter().map(build).collect()
        }
    }

    fn build_snapshot(
        &self,
        record: RecordId,
        field: &FieldDef,
        at: Option<Timestamp>,
        manual: Option<f64>,
    ) -> EngineResult<ComputedValueSnapshot> {
        Ok(ComputedValueSnapshot {
            record,
            field_id: field.id,
            label: field.label.clone(),
            is_autocomputed: manual.is_none(),
            computed_value: self.resolve_fast(record, field, at, false)?,
            manual_value: manual,
        })
    }

    /// Resolve many requests, each with its own visited set
    ///
    /// Results keep the order of `requests`.
    ///
    /// # Errors
    /// The first failure encountered.
    pub fn resolve_batch(&self, requests: &[ResolveRequest], mode: ResolveMode) -> EngineResult<Vec<Option<f64>>> {
        let resolver = self.resolver(mode);
        let resolve = |request: &ResolveRequest| resolver.resolve(request).map_err(EngineError::from);
        let values = if self.config.parallel_batch {
            requests.par_iter().map(resolve).collect::<EngineResult<Vec<_>>>()?
        } else {
            requests.iter().map(resolve).collect::<EngineResult<Vec<_>>>()?
        };
        tracing::debug!(count = values.len(), mode = %mode, "resolved batch");
        Ok(values)
    }

    /// Drop cached values of `(record, field)`
    pub fn invalidate(&self, record: RecordId, field: FieldId) {
        self.cache.invalidate(record, field);
    }

    /// Invalidate every computed value that may depend on `field_name` of
    /// `record`
    ///
    /// Clears the record's own computed field of that name, then walks
    /// reverse links upward. On each parent, a computed field is cleared when
    /// it aggregates the changed name (its target field name) or carries the
    /// same name; its own name is what changed for the next level up.
    ///
    /// Returns the number of computed fields invalidated.
    ///
    /// # Errors
    /// Storage failures.
    pub fn record_changed(&self, record: RecordId, field_name: &str) -> EngineResult<usize> {
        let mut cleared: HashSet<(RecordId, FieldId)> = HashSet::new();
        let mut queue = VecDeque::from([(record, field_name.to_string())]);

        for field in self.accessor.computed_fields(record)? {
            if field.name == field_name && cleared.insert((record, field.id)) {
                self.cache.invalidate(record, field.id);
            }
        }

        while let Some((child, name)) = queue.pop_front() {
            for parent in self.accessor.parents_of(child)? {
                for field in self.accessor.computed_fields(parent)? {
                    let depends = field.target_field_name() == name || field.name == name;
                    if depends && cleared.insert((parent, field.id)) {
                        self.cache.invalidate(parent, field.id);
                        queue.push_back((parent, field.name));
                    }
                }
            }
        }

        tracing::debug!(record = %record, field = field_name, invalidated = cleared.len(), "record changed");
        Ok(cleared.len())
    }
}
