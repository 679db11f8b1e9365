//! Read boundary of the resolution engine
//!
//! Provides the [`LinkGraphAccessor`] trait through which resolvers read
//! links and field values, and the [`PermissionOracle`] consulted by the
//! precise resolver for per-record visibility.

use crate::error::AccessError;
use parking_lot::RwLock;
use rollup_model::{FieldDef, FieldId, FieldRow, RecordId, RowValue, Timestamp, UserId};
use std::collections::{HashMap, HashSet};

/// Read access to the link graph
///
/// All reads take an optional timestamp; `None` reads the latest changeset.
///
/// # Contract
/// - `linked_rows` returns one row per qualifying link of every requested
///   parent, in an accessor-defined but deterministic order
/// - rows are decoded into [`rollup_model::RowValue`] here, never later
/// - failures are reported, not retried
pub trait LinkGraphAccessor: Send + Sync + std::fmt::Debug {
    /// Field of `record`'s tracker named `name`
    ///
    /// # Errors
    /// [`AccessError::RecordNotFound`] when the record does not exist.
    fn field_by_name(&self, record: RecordId, name: &str) -> Result<Option<FieldDef>, AccessError>;

    /// Computed fields of `record`'s tracker, in declaration order
    ///
    /// # Errors
    /// [`AccessError::RecordNotFound`] when the record does not exist.
    fn computed_fields(&self, record: RecordId) -> Result<Vec<FieldDef>, AccessError>;

    /// Linked records of every parent, with their `target_field_name` value
    ///
    /// Children that do not exist at `at`, or whose tracker has no such
    /// field, produce no row.
    ///
    /// # Errors
    /// [`AccessError::RecordNotFound`] when a parent does not exist.
    fn linked_rows(
        &self,
        parents: &[RecordId],
        target_field_name: &str,
        at: Option<Timestamp>,
    ) -> Result<Vec<FieldRow>, AccessError>;

    /// Decoded value of `record`'s own `target_field_name` at `at`
    ///
    /// A record that does not exist yet at `at` reads as [`RowValue::Empty`].
    ///
    /// # Errors
    /// [`AccessError::RecordNotFound`], or [`AccessError::FieldNotFound`]
    /// when the record's tracker has no such field.
    fn direct_value(
        &self,
        record: RecordId,
        target_field_name: &str,
        at: Option<Timestamp>,
    ) -> Result<RowValue, AccessError>;

    /// Manual override stored on `record` for `field` at `at`
    ///
    /// # Errors
    /// [`AccessError::RecordNotFound`] when the record does not exist.
    fn manual_override(
        &self,
        record: RecordId,
        field: FieldId,
        at: Option<Timestamp>,
    ) -> Result<Option<f64>, AccessError>;

    /// Records currently linking to `record`
    ///
    /// Used by the write path to find cache entries to invalidate.
    ///
    /// # Errors
    /// Backend failures only.
    fn parents_of(&self, record: RecordId) -> Result<Vec<RecordId>, AccessError>;

    /// Manual overrides of several records, in request order
    ///
    /// # Errors
    /// Same as [`LinkGraphAccessor::manual_override`].
    fn manual_overrides(
        &self,
        records: &[RecordId],
        field: FieldId,
        at: Option<Timestamp>,
    ) -> Result<Vec<(RecordId, Option<f64>)>, AccessError> {
        records
            .iter()
            .map(|&record| Ok((record, self.manual_override(record, field, at)?)))
            .collect()
    }

    /// Linked rows of a single parent
    ///
    /// # Errors
    /// Same as [`LinkGraphAccessor::linked_rows`].
    fn linked_rows_of(
        &self,
        parent: RecordId,
        target_field_name: &str,
        at: Option<Timestamp>,
    ) -> Result<Vec<FieldRow>, AccessError> {
        self.linked_rows(&[parent], target_field_name, at)
    }
}

/// Per-record visibility check
pub trait PermissionOracle: Send + Sync {
    /// Whether `user` may see `record`
    fn can_view(&self, user: UserId, record: RecordId) -> bool;
}

/// Oracle granting every user access to every record
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionOracle for AllowAll {
    #[inline]
    fn can_view(&self, _user: UserId, _record: RecordId) -> bool {
        true
    }
}

impl<F> PermissionOracle for F
where
    F: Fn(UserId, RecordId) -> bool + Send + Sync,
{
    #[inline]
    fn can_view(&self, user: UserId, record: RecordId) -> bool {
        self(user, record)
    }
}

/// Restriction lists per record
///
/// Records without a list are visible to everyone. A restricted record is
/// visible only to the users on its list.
#[derive(Debug, Default)]
pub struct VisibilityRules {
    restricted: RwLock<HashMap<RecordId, HashSet<UserId>>>,
}

impl VisibilityRules {
    /// Rules with no restriction
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict `record` to `viewers`
    pub fn restrict(&self, record: RecordId, viewers: impl IntoIterator<Item = UserId>) {
        self.restricted
            .write()
            .insert(record, viewers.into_iter().collect());
    }

    /// Allow `user` on an already restricted `record`
    pub fn grant(&self, record: RecordId, user: UserId) {
        if let Some(viewers) = self.restricted.write().get_mut(&record) {
            viewers.insert(user);
        }
    }

    /// Remove any restriction on `record`
    pub fn lift(&self, record: RecordId) {
        self.restricted.write().remove(&record);
    }

    /// Number of restricted records
    #[must_use]
    pub fn restricted_count(&self) -> usize {
        self.restricted.read().len()
    }
}

impl PermissionOracle for VisibilityRules {
    fn can_view(&self, user: UserId, record: RecordId) -> bool {
        self.restricted
            .read()
            .get(&record)
            .map_or(true, |viewers| viewers.contains(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_all_allows() {
        assert!(AllowAll.can_view(UserId(1), RecordId(1)));
    }

    #[test]
    fn closures_are_oracles() {
        let only_even = |_user: UserId, record: RecordId| record.0 % 2 == 0;
        assert!(only_even.can_view(UserId(1), RecordId(2)));
        assert!(!only_even.can_view(UserId(1), RecordId(3)));
    }

    #[test]
    fn visibility_rules() {
        let rules = VisibilityRules::new();
        assert!(rules.can_view(UserId(1), RecordId(10)));

        rules.restrict(RecordId(10), [UserId(2)]);
        assert!(!rules.can_view(UserId(1), RecordId(10)));
        assert!(rules.can_view(UserId(2), RecordId(10)));

        rules.grant(RecordId(10), UserId(1));
        assert!(rules.can_view(UserId(1), RecordId(10)));

        rules.lift(RecordId(10));
        assert_eq!(rules.restricted_count(), 0);
    }
}
