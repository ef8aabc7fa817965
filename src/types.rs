//! Core domain types for blend fraction estimation.
//!
//! Unit convention: fractions cross the external boundary on a 0–100
//! percent scale (matching the oracle wire contract) and are normalized
//! to 0–1 internally for the simplex math. Functions in this crate state
//! which scale they use; boundary structs always carry percent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A blendable fuel component.
///
/// The property vector has the same fixed length for every component in
/// a run (validated before the search starts). `fraction` is the only
/// field the engine overwrites between trials; everything else is
/// immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    /// Component identity, used to key fraction breakdowns in reports.
    pub name: String,
    /// Current fraction on the 0–100 percent scale.
    #[serde(default)]
    pub fraction: f64,
    /// Fixed-length physical property vector.
    pub properties: Vec<f64>,
    /// Unit cost. Components with unknown cost blend at cost zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl Component {
    /// Unit cost with the default-to-zero fallback applied.
    pub fn unit_cost(&self) -> f64 {
        self.cost.unwrap_or(0.0)
    }
}

/// The property profile a search is trying to match.
///
/// `target_cost` never enters the objective; it only feeds the savings
/// percentage in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSpec {
    pub properties: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_cost: Option<f64>,
}

/// A full search request at the external boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimationRequest {
    /// Target property vector, same length as every component's.
    pub target_properties: Vec<f64>,
    /// Candidate components with properties and optional costs.
    pub components: Vec<Component>,
    /// Reference cost of the target blend, for savings reporting only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_cost: Option<f64>,
    /// Fixed trial budget. Must be positive; requests that omit it get
    /// the configured default applied by the caller before validation.
    #[serde(default)]
    pub n_trials: usize,
}

impl EstimationRequest {
    pub fn target_spec(&self) -> TargetSpec {
        TargetSpec {
            properties: self.target_properties.clone(),
            target_cost: self.target_cost,
        }
    }
}

/// Outcome of scoring one candidate composition.
#[derive(Debug, Clone)]
pub enum TrialOutcome {
    /// Oracle answered; objectives computed. `mape` is a percentage.
    Scored { mape: f64, cost: f64 },
    /// Oracle invocation failed; excluded from best-trial selection.
    Failed { reason: String },
}

/// Record of one search iteration. Immutable once appended to the
/// run-scoped trial history.
#[derive(Debug, Clone)]
pub struct Trial {
    /// 1-based trial number within the run.
    pub number: usize,
    /// Evaluated composition on the internal 0–1 scale.
    pub fractions: Vec<f64>,
    pub outcome: TrialOutcome,
    pub evaluated_at: DateTime<Utc>,
}

impl Trial {
    /// `(mape_percent, blend_cost)` for successful trials, `None` for
    /// failed ones. This is the key the lexicographic selector scans.
    pub fn score(&self) -> Option<(f64, f64)> {
        match self.outcome {
            TrialOutcome::Scored { mape, cost } => Some((mape, cost)),
            TrialOutcome::Failed { .. } => None,
        }
    }
}

/// Name plus fraction on the 0–100 percent scale, as reported to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FractionEstimate {
    pub name: String,
    pub fraction: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_cost_defaults_to_zero() {
        let c = Component {
            name: "HeavyNaphtha".to_string(),
            fraction: 0.0,
            properties: vec![1.0, 2.0],
            cost: None,
        };
        assert_eq!(c.unit_cost(), 0.0);

        let priced = Component { cost: Some(3.5), ..c };
        assert_eq!(priced.unit_cost(), 3.5);
    }

    #[test]
    fn failed_trial_has_no_score() {
        let trial = Trial {
            number: 1,
            fractions: vec![1.0],
            outcome: TrialOutcome::Failed {
                reason: "oracle died".to_string(),
            },
            evaluated_at: Utc::now(),
        };
        assert!(trial.score().is_none());
    }

    #[test]
    fn request_deserializes_boundary_contract() {
        let json = r#"{
            "target_properties": [10.0, 20.0],
            "components": [
                {"name": "A", "fraction": 50.0, "properties": [10.0, 20.0], "cost": 1.2},
                {"name": "B", "fraction": 50.0, "properties": [12.0, 18.0]}
            ],
            "target_cost": 2.0,
            "n_trials": 100
        }"#;
        let req: EstimationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.components.len(), 2);
        assert_eq!(req.components[1].unit_cost(), 0.0);
        assert_eq!(req.n_trials, 100);
        assert_eq!(req.target_spec().target_cost, Some(2.0));
    }
}
