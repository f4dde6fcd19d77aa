//! Task families and their time budgets.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

fn default_weight() -> f64 {
    1.0
}

/// A grouping of tasks that share a time budget (e.g. "study", "health").
///
/// Serialized in the `TaskFamily` wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Family {
    pub key: String,
    pub name: String,
    /// Relative priority multiplier.
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub min_daily_minutes: Option<u32>,
    #[serde(default)]
    pub weekly_target_minutes: Option<u32>,
    /// Hard cap on minutes per calendar day.
    #[serde(default)]
    pub max_daily_minutes: Option<u32>,
}

impl Family {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            weight: default_weight(),
            min_daily_minutes: None,
            weekly_target_minutes: None,
            max_daily_minutes: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_weekly_target(mut self, minutes: u32) -> Self {
        self.weekly_target_minutes = Some(minutes);
        self
    }

    pub fn with_daily_limits(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.min_daily_minutes = min;
        self.max_daily_minutes = max;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.key.trim().is_empty() {
            return Err(ValidationError::invalid("key", "must not be empty"));
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(ValidationError::invalid(
                "weight",
                format!("family '{}' weight must be positive, got {}", self.key, self.weight),
            ));
        }
        if let (Some(min), Some(max)) = (self.min_daily_minutes, self.max_daily_minutes) {
            if min > max {
                return Err(ValidationError::invalid(
                    "min_daily_minutes",
                    format!("{min} exceeds max_daily_minutes {max}"),
                ));
            }
        }
        Ok(())
    }
}
