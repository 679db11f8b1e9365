//! Submitted values for computed fields
//!
//! Edits to a computed field either set a manual override or switch the
//! field back to auto-computation. The write path validates the submission,
//! derives the override to store, and asks [`has_changes`] whether a new
//! changeset value is needed at all.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static FLOAT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").expect("float pattern is a valid regex")
});

/// Rejected submission
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    /// Neither a manual value nor the auto-computed flag was given
    #[error("expected a manual value or the auto-computed flag")]
    MissingValue,

    /// Auto-computation disabled without providing a manual value
    #[error("auto-computation disabled but no manual value provided")]
    MissingManualValue,

    /// Manual value given while asking for auto-computation
    #[error("manual value '{0}' conflicts with auto-computation")]
    Conflicting(String),

    /// Manual value is not a number
    #[error("manual value '{0}' is not a valid number")]
    InvalidNumber(String),
}

/// Value submitted for a computed field
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubmittedValue {
    /// Manual override, as typed by the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_value: Option<String>,

    /// Whether the field should be auto-computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_autocomputed: Option<bool>,
}

impl SubmittedValue {
    /// Submission setting a manual override
    #[must_use]
    pub fn manual(value: impl Into<String>) -> Self {
        Self {
            manual_value: Some(value.into()),
            is_autocomputed: None,
        }
    }

    /// Submission switching back to auto-computation
    #[must_use]
    pub fn autocomputed() -> Self {
        Self {
            manual_value: None,
            is_autocomputed: Some(true),
        }
    }

    /// Check the submission is well formed
    ///
    /// # Errors
    /// See [`SubmissionError`] for the rejected shapes.
    pub fn validate(&self) -> Result<(), SubmissionError> {
        match (&self.manual_value, self.is_autocomputed) {
            (None, None) => Err(SubmissionError::MissingValue),
            (None, Some(false)) => Err(SubmissionError::MissingManualValue),
            (None, Some(true)) => Ok(()),
            (Some(manual), Some(true)) => {
                if manual.is_empty() {
                    Ok(())
                } else {
                    Err(SubmissionError::Conflicting(manual.clone()))
                }
            }
            (Some(manual), _) => {
                if FLOAT_PATTERN.is_match(manual.trim()) {
                    Ok(())
                } else {
                    Err(SubmissionError::InvalidNumber(manual.clone()))
                }
            }
        }
    }

    /// Manual override to store, `None` for auto-computation
    ///
    /// # Errors
    /// Returns the validation error for malformed submissions.
    pub fn into_manual_override(self) -> Result<Option<f64>, SubmissionError> {
        self.validate()?;
        if self.is_autocomputed == Some(true) {
            return Ok(None);
        }
        match self.manual_value {
            Some(manual) => manual
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| SubmissionError::InvalidNumber(manual)),
            None => Ok(None),
        }
    }
}

/// Whether a submitted manual value differs from the stored override
///
/// Clearing a stored `0` counts as a change even though both read as
/// "nothing" in a form.
#[must_use]
pub fn has_changes(old: Option<f64>, new: &str) -> bool {
    let new = new.trim();
    if new.is_empty() {
        return old.is_some();
    }
    match new.parse::<f64>() {
        Ok(parsed) => old.map_or(true, |o| (o - parsed).abs() > f64::EPSILON),
        Err(_) => true,
    }
}
