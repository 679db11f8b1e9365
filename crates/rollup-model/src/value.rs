//! Stored field values and decoded rows
//!
//! [`FieldValue`] is what a changeset stores. [`RowValue`] is the shape the
//! resolvers consume: it is decoded once, at the storage boundary, from the
//! field kind and the stored value so no resolver ever inspects raw storage.

use crate::field::{FieldKind, NumericType};
use crate::ids::RecordId;
use serde::{Deserialize, Serialize};

/// Value stored for a field on a changeset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Computed field: manual override, or `None` when auto-computed
    Computed {
        /// Manual override
        manual: Option<f64>,
    },
}

impl FieldValue {
    /// Auto-computed marker
    #[inline]
    #[must_use]
    pub const fn autocomputed() -> Self {
        Self::Computed { manual: None }
    }

    /// Manual override on a computed field
    #[inline]
    #[must_use]
    pub const fn manual(value: f64) -> Self {
        Self::Computed {
            manual: Some(value),
        }
    }

    /// Plain numeric content, `None` for computed values
    #[allow(clippy::cast_precision_loss)]
    #[inline]
    #[must_use]
    pub fn numeric(&self) -> Option<f64> {
        match *self {
            Self::Int(v) => Some(v as f64),
            Self::Float(v) => Some(v),
            Self::Computed { .. } => None,
        }
    }

    /// Manual override carried by a computed value
    #[inline]
    #[must_use]
    pub fn manual_override(&self) -> Option<f64> {
        match *self {
            Self::Computed { manual } => manual,
            _ => None,
        }
    }
}

/// Decoded value of a linked record's target field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowValue {
    /// Computed field with a manual override
    Manual(f64),
    /// Computed field without override; must be aggregated itself
    ComputedPending,
    /// Plain numeric field with a value
    TypedValue(NumericType, f64),
    /// No usable value
    Empty,
}

impl RowValue {
    /// Decode a stored value according to the field kind
    ///
    /// A computed field with nothing stored is auto-computed.
    #[must_use]
    pub fn decode(kind: &FieldKind, stored: Option<&FieldValue>) -> Self {
        match kind {
            FieldKind::Computed(_) => match stored.and_then(FieldValue::manual_override) {
                Some(v) => Self::Manual(v),
                None => Self::ComputedPending,
            },
            FieldKind::Int | FieldKind::Float => {
                let ty = kind.numeric_type().unwrap_or(NumericType::Float);
                match stored.and_then(FieldValue::numeric) {
                    Some(v) => Self::TypedValue(ty, v),
                    None => Self::Empty,
                }
            }
        }
    }

    /// Numeric value carried directly by the row, if any
    #[inline]
    #[must_use]
    pub fn direct_value(&self) -> Option<f64> {
        match *self {
            Self::Manual(v) | Self::TypedValue(_, v) => Some(v),
            Self::ComputedPending | Self::Empty => None,
        }
    }

    /// Whether the row points at a computed field
    #[inline]
    #[must_use]
    pub fn is_computed(&self) -> bool {
        matches!(self, Self::Manual(_) | Self::ComputedPending)
    }
}

/// One linked record as seen from its parent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRow {
    /// Linked (child) record
    pub id: RecordId,
    /// Record the link was followed from
    pub parent_id: RecordId,
    /// Decoded target field value of the child
    pub value: RowValue,
}

impl FieldRow {
    /// Create a row
    #[inline]
    #[must_use]
    pub const fn new(parent_id: RecordId, id: RecordId, value: RowValue) -> Self {
        Self {
            id,
            parent_id,
            value,
        }
    }
}
