//! Significance decision with an optional decision maker in front

use meteo_core::{
    DataSource, DecisionError, DecisionMaker, DecisionRequest, PolygonId, RefreshDecision,
    Reduction, ThresholdPolicy,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_DECISION_TIMEOUT: Duration = Duration::from_secs(2);

/// Threshold policy per data source, with a default
#[derive(Debug, Clone, Default)]
pub struct SignificanceThresholds {
    default: ThresholdPolicy,
    per_source: HashMap<String, ThresholdPolicy>,
}

impl SignificanceThresholds {
    pub fn new(default: ThresholdPolicy) -> Self {
        Self {
            default,
            per_source: HashMap::new(),
        }
    }

    pub fn with_override(mut self, source: impl Into<String>, policy: ThresholdPolicy) -> Self {
        self.per_source.insert(source.into(), policy);
        self
    }

    pub fn for_source(&self, source: &DataSource) -> ThresholdPolicy {
        self.per_source
            .get(source.as_str())
            .copied()
            .unwrap_or(self.default)
    }
}

/// Previous state of the polygon being refreshed
#[derive(Debug, Clone, Copy)]
pub struct PriorState<'a> {
    pub polygon_id: &'a PolygonId,
    pub series: Option<&'a [f64]>,
    pub average: Option<f64>,
}

/// Deterministic threshold rule, optionally preceded by a decision maker
///
/// The decision maker is only asked the open question (is a change from
/// an existing average significant); its failure or timeout falls back
/// to the threshold rule without surfacing an error.
#[derive(Clone, Default)]
pub struct LayeredDecision {
    maker: Option<Arc<dyn DecisionMaker>>,
    timeout: Duration,
}

impl LayeredDecision {
    pub fn deterministic() -> Self {
        Self {
            maker: None,
            timeout: DEFAULT_DECISION_TIMEOUT,
        }
    }

    pub fn with_maker(maker: Arc<dyn DecisionMaker>, timeout: Duration) -> Self {
        Self {
            maker: Some(maker),
            timeout,
        }
    }

    pub fn maker_name(&self) -> Option<&str> {
        self.maker.as_deref().map(|m| m.name())
    }

    pub async fn decide(
        &self,
        policy: ThresholdPolicy,
        prior: PriorState<'_>,
        new: &Reduction,
    ) -> RefreshDecision {
        if let Some(decision) = policy.decide_baseline(prior.average, new) {
            return decision;
        }
        let Some(maker) = &self.maker else {
            return policy.decide(prior.average, new);
        };

        let request = DecisionRequest {
            polygon_id: prior.polygon_id.clone(),
            current_data: prior.series.map(<[f64]>::to_vec).unwrap_or_default(),
            new_data: new.filtered.clone(),
            threshold: policy.threshold(),
        };
        let outcome = match tokio::time::timeout(self.timeout, maker.evaluate(&request)).await {
            Ok(result) => result,
            Err(_) => Err(DecisionError::Timeout),
        };

        match outcome {
            Ok(outcome) => match policy.accept_outcome(&outcome) {
                Some(decision) => {
                    debug!(
                        polygon = %prior.polygon_id,
                        maker = maker.name(),
                        decision = decision.kind(),
                        "decision maker answered"
                    );
                    decision
                }
                None => {
                    warn!(polygon = %prior.polygon_id, "decision maker returned no usable data, using threshold rule");
                    policy.decide(prior.average, new)
                }
            },
            Err(e) => {
                warn!(polygon = %prior.polygon_id, error = %e, "decision maker failed, using threshold rule");
                policy.decide(prior.average, new)
            }
        }
    }
}
