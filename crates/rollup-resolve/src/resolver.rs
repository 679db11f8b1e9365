//! Resolver trait and request types
//!
//! Provides the [`Resolver`] trait shared by the precise and fast
//! strategies, so callers and tests can treat them interchangeably.

use crate::error::ResolveError;
use rollup_model::{FieldDef, RecordId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Computed-field resolution strategy
///
/// # Contract
/// - `Ok(None)` means nothing was found to sum, distinct from `Some(0.0)`
/// - every record contributes at most once per call, cycles included
/// - storage failures propagate as [`ResolveError::Access`]
pub trait Resolver: Send + Sync + fmt::Debug {
    /// Resolve the value of `request.field` on `request.record`
    ///
    /// # Errors
    /// Storage failures and tripped depth guards.
    fn resolve(&self, request: &ResolveRequest) -> Result<Option<f64>, ResolveError>;

    /// Strategy implemented by this resolver
    fn mode(&self) -> ResolveMode;

    /// Strategy name (for logging)
    fn name(&self) -> &'static str {
        self.mode().as_str()
    }
}

/// Traversal strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveMode {
    /// Recursive, permission aware
    #[default]
    Precise,
    /// Batched per graph level, permission unaware
    Fast,
}

impl ResolveMode {
    /// Lowercase name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Precise => "precise",
            Self::Fast => "fast",
        }
    }
}

impl fmt::Display for ResolveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "precise" | "recursive" => Ok(Self::Precise),
            "fast" | "batched" => Ok(Self::Fast),
            other => Err(format!("unknown resolve mode: {other}")),
        }
    }
}

/// One top-level resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveRequest {
    /// Record whose field is resolved
    pub record: RecordId,

    /// Computed field definition on that record
    pub field: FieldDef,

    /// Point in time, `None` for latest
    pub at: Option<Timestamp>,

    /// User whose visibility applies (precise mode)
    pub user: UserId,

    /// Treat manual overrides as terminal (fast mode; precise always stops)
    pub stop_on_manual_value: bool,
}

impl ResolveRequest {
    /// Latest value, anonymous user, stopping on manual values
    #[inline]
    #[must_use]
    pub fn new(record: RecordId, field: FieldDef) -> Self {
        Self {
            record,
            field,
            at: None,
            user: UserId(0),
            stop_on_manual_value: true,
        }
    }

    /// Resolve as of `at`
    #[inline]
    #[must_use]
    pub fn at(mut self, at: Option<Timestamp>) -> Self {
        self.at = at;
        self
    }

    /// Resolve for `user`
    #[inline]
    #[must_use]
    pub fn as_user(mut self, user: UserId) -> Self {
        self.user = user;
        self
    }

    /// Set whether manual overrides stop the traversal
    #[inline]
    #[must_use]
    pub fn stop_on_manual_value(mut self, stop: bool) -> Self {
        self.stop_on_manual_value = stop;
        self
    }
}

/// Add a contribution; a sum stays `None` until something contributes
#[inline]
pub(crate) fn accumulate(sum: &mut Option<f64>, value: Option<f64>) {
    if let Some(v) = value {
        *sum = Some(sum.unwrap_or(0.0) + v);
    }
}
