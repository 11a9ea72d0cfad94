//! Strategy parameters and the definitions of their searchable ranges.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Named scalar parameters handed to every rule.
pub type Parameters = BTreeMap<String, f64>;

/// Tolerance applied when counting steps so that float rounding never drops
/// the inclusive upper bound.
const STEP_EPSILON: f64 = 1e-9;

/// Errors from parameter definition validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("parameter '{name}': start, end and step must be finite")]
    NonFinite { name: String },
    #[error("parameter '{name}': step size must be positive, got {step}")]
    NonPositiveStep { name: String, step: f64 },
    #[error("parameter '{name}': start {start} is greater than end {end}")]
    InvertedRange { name: String, start: f64, end: f64 },
    #[error("parameter '{name}' is defined more than once")]
    Duplicate { name: String },
}

/// Inclusive range `[start, end]` walked in increments of `step`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl ParameterDef {
    pub fn new(name: impl Into<String>, start: f64, end: f64, step: f64) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            step,
        }
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        if !(self.start.is_finite() && self.end.is_finite() && self.step.is_finite()) {
            return Err(ParameterError::NonFinite {
                name: self.name.clone(),
            });
        }
        if self.step <= 0.0 {
            return Err(ParameterError::NonPositiveStep {
                name: self.name.clone(),
                step: self.step,
            });
        }
        if self.start > self.end {
            return Err(ParameterError::InvertedRange {
                name: self.name.clone(),
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// Number of grid points in the range, bounds included.
    ///
    /// Counted by division rather than repeated addition so the end value is
    /// never skipped through accumulated rounding.
    pub fn num_steps(&self) -> usize {
        ((self.end - self.start) / self.step + STEP_EPSILON).floor() as usize + 1
    }

    /// Largest valid grid index.
    pub fn max_index(&self) -> usize {
        self.num_steps() - 1
    }

    /// Value at grid index `index`, clamped to the range end.
    pub fn value_at(&self, index: usize) -> f64 {
        (self.start + index as f64 * self.step).min(self.end)
    }

    /// Every grid value, in ascending order.
    pub fn values(&self) -> Vec<f64> {
        (0..self.num_steps()).map(|i| self.value_at(i)).collect()
    }
}

/// Validate a list of definitions, including name uniqueness.
pub fn validate_defs(defs: &[ParameterDef]) -> Result<(), ParameterError> {
    let mut seen = HashSet::with_capacity(defs.len());
    for def in defs {
        def.validate()?;
        if !seen.insert(def.name.as_str()) {
            return Err(ParameterError::Duplicate {
                name: def.name.clone(),
            });
        }
    }
    Ok(())
}
