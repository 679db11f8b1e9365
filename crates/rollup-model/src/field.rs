//! Field definitions
//!
//! A tracker declares its fields by name. Computed fields carry the
//! properties that drive aggregation: which same-named field to read on
//! linked records, and whether the fast batched strategy is enabled.

use crate::ids::FieldId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric storage type of a plain (non-computed) field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericType {
    /// Integer field
    Int,
    /// Floating point field
    Float,
}

impl NumericType {
    /// Storage type name, as used by row decoders
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
        }
    }
}

impl fmt::Display for NumericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Properties specific to computed fields
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComputedProperties {
    /// Name of the field summed on linked records; defaults to the field name
    #[serde(default)]
    pub target_field_name: Option<String>,

    /// Use the batched, permission-unaware strategy
    #[serde(default)]
    pub fast_compute: bool,
}

/// Field kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Integer field
    Int,
    /// Floating point field
    Float,
    /// Computed (aggregated) field
    Computed(ComputedProperties),
}

impl FieldKind {
    /// Numeric storage type for plain fields, `None` for computed ones
    #[inline]
    #[must_use]
    pub fn numeric_type(&self) -> Option<NumericType> {
        match self {
            Self::Int => Some(NumericType::Int),
            Self::Float => Some(NumericType::Float),
            Self::Computed(_) => None,
        }
    }
}

/// Field definition within a tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field id
    pub id: FieldId,

    /// Short name, unique within the tracker
    pub name: String,

    /// Human readable label
    #[serde(default)]
    pub label: String,

    /// Kind and kind-specific properties
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldDef {
    /// Create a plain numeric field
    #[must_use]
    pub fn numeric(id: FieldId, name: impl Into<String>, ty: NumericType) -> Self {
        let name = name.into();
        Self {
            id,
            label: name.clone(),
            name,
            kind: match ty {
                NumericType::Int => FieldKind::Int,
                NumericType::Float => FieldKind::Float,
            },
        }
    }

    /// Create a computed field with default properties
    #[must_use]
    pub fn computed(id: FieldId, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            label: name.clone(),
            name,
            kind: FieldKind::Computed(ComputedProperties::default()),
        }
    }

    /// Set the label
    #[inline]
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Enable fast compute (no-op on plain fields)
    #[inline]
    #[must_use]
    pub fn with_fast_compute(mut self, enabled: bool) -> Self {
        if let FieldKind::Computed(props) = &mut self.kind {
            props.fast_compute = enabled;
        }
        self
    }

    /// Override the target field name (no-op on plain fields)
    #[inline]
    #[must_use]
    pub fn with_target_field_name(mut self, target: impl Into<String>) -> Self {
        if let FieldKind::Computed(props) = &mut self.kind {
            props.target_field_name = Some(target.into());
        }
        self
    }

    /// Whether this field is computed
    #[inline]
    #[must_use]
    pub fn is_computed(&self) -> bool {
        matches!(self.kind, FieldKind::Computed(_))
    }

    /// Computed properties, if any
    #[inline]
    #[must_use]
    pub fn computed_properties(&self) -> Option<&ComputedProperties> {
        match &self.kind {
            FieldKind::Computed(props) => Some(props),
            _ => None,
        }
    }

    /// Name of the field aggregated on linked records
    ///
    /// Falls back to the field's own name when no target is configured.
    #[must_use]
    pub fn target_field_name(&self) -> &str {
        self.computed_properties()
            .and_then(|p| p.target_field_name.as_deref())
            .unwrap_or(&self.name)
    }

    /// Whether the batched strategy should be used for this field
    #[inline]
    #[must_use]
    pub fn uses_fast_compute(&self) -> bool {
        self.computed_properties().is_some_and(|p| p.fast_compute)
    }
}
