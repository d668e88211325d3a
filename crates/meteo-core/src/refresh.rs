//! Refresh decision: whether newly fetched data replaces a polygon's state

use crate::pipeline::DecisionOutcome;
use crate::series::{reduce_values, Reduction};

/// Default significance threshold, in the data source's unit
pub const DEFAULT_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    #[error("Significance threshold must be a positive number, got {0}")]
    InvalidThreshold(f64),
}

/// What to do with a polygon's stored series after a refresh
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshDecision {
    /// Adopt the new series and average, then recompute the color
    Replace { series: Vec<f64>, average: f64 },
    /// Keep the stored series; only the color may be recomputed
    NoChange,
    /// Drop stored data and show the neutral color
    ClearToNoData,
}

impl RefreshDecision {
    pub fn kind(&self) -> &'static str {
        match self {
            RefreshDecision::Replace { .. } => "replace",
            RefreshDecision::NoChange => "no_change",
            RefreshDecision::ClearToNoData => "clear",
        }
    }
}

/// Deterministic significance rule on the average delta
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    threshold: f64,
}

impl ThresholdPolicy {
    pub fn new(threshold: f64) -> Result<Self, PolicyError> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(PolicyError::InvalidThreshold(threshold));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Decide from the stored average and the reduced new series
    pub fn decide(&self, previous_average: Option<f64>, new: &Reduction) -> RefreshDecision {
        if let Some(decision) = self.decide_baseline(previous_average, new) {
            return decision;
        }
        match (previous_average, new.average) {
            (Some(previous), Some(average)) if (average - previous).abs() >= self.threshold => {
                RefreshDecision::Replace {
                    series: new.filtered.clone(),
                    average,
                }
            }
            _ => RefreshDecision::NoChange,
        }
    }

    /// Cases no pluggable decision maker may override
    ///
    /// An empty new series always clears, and the first valid series a
    /// polygon sees is always adopted. `None` means the remaining
    /// significance question is open.
    pub fn decide_baseline(
        &self,
        previous_average: Option<f64>,
        new: &Reduction,
    ) -> Option<RefreshDecision> {
        let average = match new.average {
            None => return Some(RefreshDecision::ClearToNoData),
            Some(average) => average,
        };
        if previous_average.is_none() {
            return Some(RefreshDecision::Replace {
                series: new.filtered.clone(),
                average,
            });
        }
        None
    }

    /// Interpret a decision maker's answer
    ///
    /// Returns `None` when the answer is unusable (a "significant" update
    /// with no valid samples), in which case the caller falls back to
    /// [`ThresholdPolicy::decide`].
    pub fn accept_outcome(&self, outcome: &DecisionOutcome) -> Option<RefreshDecision> {
        if !outcome.significant_changes {
            return Some(RefreshDecision::NoChange);
        }
        let updated = reduce_values(&outcome.updated_data);
        updated.average.map(|average| RefreshDecision::Replace {
            series: updated.filtered,
            average,
        })
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Decision when the weather source failed this cycle
///
/// Prior data survives a failed fetch; a polygon that never had data
/// degrades to the neutral state.
pub fn decide_after_fetch_failure(previous_average: Option<f64>) -> RefreshDecision {
    match previous_average {
        Some(_) => RefreshDecision::NoChange,
        None => RefreshDecision::ClearToNoData,
    }
}
