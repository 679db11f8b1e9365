//! Serializable view of a computed field on one record

use rollup_model::{FieldId, RecordId};
use serde::{Deserialize, Serialize};

/// Computed field state as shown to display and export collaborators
///
/// `computed_value` is always the aggregate of the linked records, looking
/// through manual overrides; `manual_value` is the override, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedValueSnapshot {
    /// Record the field belongs to
    pub record: RecordId,
    /// Field id
    pub field_id: FieldId,
    /// Field label
    pub label: String,
    /// Whether the displayed value is the aggregate
    pub is_autocomputed: bool,
    /// Aggregate of the linked records
    pub computed_value: Option<f64>,
    /// Manual override
    pub manual_value: Option<f64>,
}

impl ComputedValueSnapshot {
    /// Value to display: the manual override, else the aggregate
    #[inline]
    #[must_use]
    pub fn displayed_value(&self) -> Option<f64> {
        self.manual_value.or(self.computed_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displayed_value_prefers_manual() {
        let mut snapshot = ComputedValueSnapshot {
            record: RecordId(1),
            field_id: FieldId(2),
            label: "Effort".to_string(),
            is_autocomputed: false,
            computed_value: Some(10.0),
            manual_value: Some(5.0),
        };
        assert_eq!(snapshot.displayed_value(), Some(5.0));

        snapshot.manual_value = None;
        snapshot.is_autocomputed = true;
        assert_eq!(snapshot.displayed_value(), Some(10.0));
    }

    #[test]
    fn serializes_flat() {
        let snapshot = ComputedValueSnapshot {
            record: RecordId(1),
            field_id: FieldId(2),
            label: "Effort".to_string(),
            is_autocomputed: true,
            computed_value: None,
            manual_value: None,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "record": 1,
                "field_id": 2,
                "label": "Effort",
                "is_autocomputed": true,
                "computed_value": null,
                "manual_value": null,
            })
        );
    }
}
