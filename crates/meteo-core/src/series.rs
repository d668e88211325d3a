//! Reduction of raw hourly series to a representative average

use crate::types::Sample;
use serde::{Deserialize, Serialize};

/// Accumulator for the mean of valid samples
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    observations: Vec<f64>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sample; missing and non-finite samples are skipped
    pub fn add(&mut self, sample: Sample) -> bool {
        match sample {
            Some(value) if value.is_finite() => {
                self.observations.push(value);
                true
            }
            _ => false,
        }
    }

    pub fn result(&self) -> Option<f64> {
        if self.observations.is_empty() {
            return None;
        }
        let sum: f64 = self.observations.iter().sum();
        Some(sum / self.observations.len() as f64)
    }

    pub fn count(&self) -> usize {
        self.observations.len()
    }

    pub fn finish(self) -> Reduction {
        let average = self.result();
        Reduction {
            filtered: self.observations,
            average,
        }
    }
}

/// Filtered samples and their mean
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reduction {
    pub filtered: Vec<f64>,
    pub average: Option<f64>,
}

impl Reduction {
    /// At least one valid sample survived filtering
    pub fn is_valid(&self) -> bool {
        self.average.is_some()
    }
}

/// Drop missing samples and average the rest
pub fn reduce(series: &[Sample]) -> Reduction {
    let mut acc = Accumulator::new();
    for sample in series {
        acc.add(*sample);
    }
    acc.finish()
}

/// Reduce plain values (non-finite ones are still dropped)
pub fn reduce_values(values: &[f64]) -> Reduction {
    let mut acc = Accumulator::new();
    for value in values {
        acc.add(Some(*value));
    }
    acc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_filters_missing() {
        let r = reduce(&[Some(10.0), Some(12.0), Some(f64::NAN), None, Some(14.0)]);
        assert_eq!(r.filtered, vec![10.0, 12.0, 14.0]);
        assert_eq!(r.average, Some(12.0));
        assert!(r.is_valid());
    }

    #[test]
    fn test_reduce_all_missing() {
        let r = reduce(&[None, Some(f64::NAN), None]);
        assert!(r.filtered.is_empty());
        assert_eq!(r.average, None);
        assert!(!r.is_valid());

        assert!(!reduce(&[]).is_valid());
    }

    #[test]
    fn test_reduce_is_idempotent() {
        let series = vec![Some(1.5), None, Some(-3.0), Some(f64::INFINITY), Some(7.25)];
        let once = reduce(&series);
        let again = reduce(&once.filtered.iter().copied().map(Some).collect::<Vec<_>>());
        assert_eq!(once, again);
        assert_eq!(reduce_values(&once.filtered), once);
    }

    #[test]
    fn test_accumulator_count() {
        let mut acc = Accumulator::new();
        assert!(acc.add(Some(1.0)));
        assert!(!acc.add(None));
        assert!(!acc.add(Some(f64::NAN)));
        assert_eq!(acc.count(), 1);
        assert_eq!(acc.result(), Some(1.0));
    }
}
