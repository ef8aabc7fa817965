//! The fraction estimation engine.
//!
//! State machine per run:
//! `INIT → (SAMPLE → EVALUATE → RECORD → REPORT)* → SELECT → DONE`.
//!
//! Trials are strictly sequential — the oracle is the only suspension
//! point and is never called concurrently within a run. The trial
//! history is run-scoped and owned by the loop; best-so-far is a
//! functional min-scan, never hidden callback state. Multiple runs may
//! execute in parallel as long as each has its own oracle instance.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::selection::best_trial;
use crate::config::EngineConfig;
use crate::objective::{blend_cost, mape_percent, savings_percent};
use crate::oracle::{
    drive_invocation, BlendOracle, OracleComponent, OracleError, OracleRequest,
};
use crate::report::{BestSnapshot, ChannelSink, EstimationResult, ProgressEvent, ProgressSink};
use crate::sampler::SimplexSampler;
use crate::types::{
    Component, EstimationRequest, FractionEstimate, TargetSpec, Trial, TrialOutcome,
};

/// Search run failures.
///
/// Configuration variants surface before the loop starts and are never
/// retried. `NoSuccessfulTrials` is the one way a started run fails.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("no components supplied")]
    NoComponents,

    #[error("target property vector is empty")]
    EmptyTarget,

    #[error("property vector length mismatch: target has {expected}, component '{name}' has {found}")]
    PropertyLengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("trial budget must be positive")]
    NonPositiveBudget,

    #[error("no successful trials in a budget of {attempted}")]
    NoSuccessfulTrials { attempted: usize },

    #[error("run cancelled after {completed} of {budget} trials")]
    Cancelled { completed: usize, budget: usize },
}

/// Multi-objective fraction estimation engine.
///
/// Holds the injected oracle for the lifetime of the worker and is
/// reused across runs; each `estimate` call owns its own sampler and
/// trial history.
pub struct EstimationEngine {
    oracle: Arc<dyn BlendOracle>,
    config: EngineConfig,
    sampler_seed: Option<u64>,
}

impl EstimationEngine {
    pub fn new(oracle: Arc<dyn BlendOracle>, config: EngineConfig) -> Self {
        Self {
            oracle,
            config,
            sampler_seed: None,
        }
    }

    /// Fix the sampler seed for reproducible runs.
    #[must_use]
    pub fn with_sampler_seed(mut self, seed: u64) -> Self {
        self.sampler_seed = Some(seed);
        self
    }

    /// Progress channel sized from the engine config, for callers that
    /// poll events from a job system.
    pub fn progress_channel(&self) -> (ChannelSink, mpsc::Receiver<ProgressEvent>) {
        ChannelSink::new(self.config.progress_channel_buffer)
    }

    /// One-shot blend prediction: invoke the oracle for a fixed,
    /// caller-supplied composition (percent fractions) without any
    /// search. Intra-call oracle progress is discarded.
    pub async fn predict_blend(&self, components: &[Component]) -> Result<Vec<f64>, OracleError> {
        let request = OracleRequest {
            components: components
                .iter()
                .map(|c| OracleComponent {
                    name: c.name.clone(),
                    fraction: c.fraction,
                    properties: c.properties.clone(),
                })
                .collect(),
        };
        let rx = self.oracle.invoke(request).await;
        drive_invocation(rx, |_| {}).await
    }

    /// Run a full fraction search.
    ///
    /// Emits at least one progress event per trial on `sink` (more when
    /// the oracle streams sub-progress) and returns the
    /// lexicographically best trial as the final result. `cancel` is
    /// checked between trials only — oracle calls are atomic.
    pub async fn estimate(
        &self,
        request: &EstimationRequest,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<EstimationResult, SearchError> {
        Self::validate(request)?;

        let target = request.target_spec();
        let n = request.components.len();
        let budget = request.n_trials;

        let mut sampler = match self.sampler_seed {
            Some(seed) => SimplexSampler::seeded(seed),
            None => SimplexSampler::new(),
        };
        let mut history: Vec<Trial> = Vec::with_capacity(budget);
        let mut failed = 0usize;

        info!(
            components = n,
            budget,
            oracle = self.oracle.oracle_name(),
            "Starting fraction search"
        );

        for number in 1..=budget {
            if cancel.is_cancelled() {
                info!(completed = number - 1, budget, "Search cancelled between trials");
                return Err(SearchError::Cancelled {
                    completed: number - 1,
                    budget,
                });
            }

            let fractions = sampler.sample(n);
            debug_assert!(
                (fractions.iter().sum::<f64>() - 1.0).abs() <= self.config.simplex_sum_tolerance
            );

            let oracle_request = compose_request(&request.components, &fractions);
            let rx = self.oracle.invoke(oracle_request).await;

            // Sub-progress events carry the best snapshot from *before*
            // this trial; the trial's own outcome lands in the per-trial
            // event below.
            let pre_trial = snapshot(&history, &request.components, &target);
            let trials_completed = number - 1;
            let invocation = drive_invocation(rx, |value| {
                sink.report(ProgressEvent {
                    progress: progress_percent(trials_completed, value / 100.0, budget),
                    result: pre_trial.clone(),
                });
            })
            .await;

            let outcome = match invocation {
                Ok(predicted) if predicted.len() == target.properties.len() => {
                    let mape = mape_percent(&target.properties, &predicted);
                    let cost = blend_cost(&fractions, &request.components);
                    debug!(trial = number, mape, cost, "Trial scored");
                    TrialOutcome::Scored { mape, cost }
                }
                Ok(predicted) => {
                    failed += 1;
                    warn!(
                        trial = number,
                        got = predicted.len(),
                        expected = target.properties.len(),
                        "Oracle returned a malformed property vector, trial excluded"
                    );
                    TrialOutcome::Failed {
                        reason: format!(
                            "oracle returned {} properties, expected {}",
                            predicted.len(),
                            target.properties.len()
                        ),
                    }
                }
                Err(e) => {
                    failed += 1;
                    warn!(trial = number, error = %e, "Oracle invocation failed, trial excluded");
                    TrialOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };

            history.push(Trial {
                number,
                fractions,
                outcome,
                evaluated_at: Utc::now(),
            });

            sink.report(ProgressEvent {
                progress: progress_percent(number, 0.0, budget),
                result: snapshot(&history, &request.components, &target),
            });
        }

        let Some(winner) = best_trial(&history) else {
            return Err(SearchError::NoSuccessfulTrials { attempted: budget });
        };
        let Some((mape, cost)) = winner.score() else {
            // best_trial only returns scored trials.
            return Err(SearchError::NoSuccessfulTrials { attempted: budget });
        };

        info!(
            winning_trial = winner.number,
            mape,
            cost,
            failed_trials = failed,
            "Search complete"
        );

        Ok(EstimationResult {
            estimated_fractions: fraction_breakdown(&request.components, &winner.fractions),
            mape_score: mape / 100.0,
            blend_cost: cost,
            savings_percent: savings_percent(target.target_cost, cost),
            completed_at: Utc::now(),
        })
    }

    /// Reject configurations the loop cannot run with. Fatal, never
    /// retried, raised before the first sample.
    fn validate(request: &EstimationRequest) -> Result<(), SearchError> {
        if request.components.is_empty() {
            return Err(SearchError::NoComponents);
        }
        if request.target_properties.is_empty() {
            return Err(SearchError::EmptyTarget);
        }
        let expected = request.target_properties.len();
        for component in &request.components {
            if component.properties.len() != expected {
                return Err(SearchError::PropertyLengthMismatch {
                    name: component.name.clone(),
                    expected,
                    found: component.properties.len(),
                });
            }
        }
        if request.n_trials == 0 {
            return Err(SearchError::NonPositiveBudget);
        }
        Ok(())
    }
}

/// Overall run progress in 0–100. Clamped: oracle sub-progress racing
/// trial completion must not overshoot the final trial.
fn progress_percent(trials_completed: usize, sub_progress: f64, budget: usize) -> f64 {
    ((trials_completed as f64 + sub_progress) / budget as f64 * 100.0).clamp(0.0, 100.0)
}

/// Build the oracle request for one candidate composition (converting
/// internal 0–1 fractions to the wire's percent scale).
fn compose_request(components: &[Component], fractions: &[f64]) -> OracleRequest {
    OracleRequest {
        components: components
            .iter()
            .zip(fractions)
            .map(|(c, f)| OracleComponent {
                name: c.name.clone(),
                fraction: f * 100.0,
                properties: c.properties.clone(),
            })
            .collect(),
    }
}

/// Best-so-far snapshot for progress events, via min-scan of history.
fn snapshot(history: &[Trial], components: &[Component], target: &TargetSpec) -> BestSnapshot {
    let Some(trial) = best_trial(history) else {
        return BestSnapshot::empty();
    };
    let Some((mape, cost)) = trial.score() else {
        return BestSnapshot::empty();
    };
    BestSnapshot {
        mape_score: Some(mape / 100.0),
        blend_cost: Some(cost),
        estimated_fractions: fraction_breakdown(components, &trial.fractions),
        savings_percent: savings_percent(target.target_cost, cost),
    }
}

/// Per-component fraction breakdown on the percent scale, keyed by name.
fn fraction_breakdown(components: &[Component], fractions: &[f64]) -> Vec<FractionEstimate> {
    components
        .iter()
        .zip(fractions)
        .map(|(c, f)| FractionEstimate {
            name: c.name.clone(),
            fraction: f * 100.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::LinearBlendOracle;
    use crate::report::NullSink;

    fn component(name: &str, properties: Vec<f64>, cost: Option<f64>) -> Component {
        Component {
            name: name.to_string(),
            fraction: 0.0,
            properties,
            cost,
        }
    }

    fn engine() -> EstimationEngine {
        EstimationEngine::new(Arc::new(LinearBlendOracle), EngineConfig::default())
            .with_sampler_seed(1234)
    }

    #[tokio::test]
    async fn zero_components_rejected_before_the_loop() {
        let request = EstimationRequest {
            target_properties: vec![1.0],
            components: vec![],
            target_cost: None,
            n_trials: 10,
        };
        let err = engine()
            .estimate(&request, &NullSink, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::NoComponents));
    }

    #[tokio::test]
    async fn mismatched_property_lengths_rejected() {
        let request = EstimationRequest {
            target_properties: vec![1.0, 2.0],
            components: vec![
                component("A", vec![1.0, 2.0], None),
                component("B", vec![1.0], None),
            ],
            target_cost: None,
            n_trials: 10,
        };
        let err = engine()
            .estimate(&request, &NullSink, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SearchError::PropertyLengthMismatch { ref name, .. } if name == "B"
        ));
    }

    #[tokio::test]
    async fn zero_budget_rejected() {
        let request = EstimationRequest {
            target_properties: vec![1.0],
            components: vec![component("A", vec![1.0], None)],
            target_cost: None,
            n_trials: 0,
        };
        let err = engine()
            .estimate(&request, &NullSink, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::NonPositiveBudget));
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_first_trial() {
        let request = EstimationRequest {
            target_properties: vec![1.0],
            components: vec![component("A", vec![1.0], None)],
            target_cost: None,
            n_trials: 5,
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = engine()
            .estimate(&request, &NullSink, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Cancelled { completed: 0, budget: 5 }));
    }

    #[tokio::test]
    async fn single_component_matches_its_own_target_exactly() {
        let request = EstimationRequest {
            target_properties: vec![10.0, 20.0, 30.0],
            components: vec![component("Only", vec![10.0, 20.0, 30.0], Some(2.0))],
            target_cost: None,
            n_trials: 7,
        };
        let result = engine()
            .estimate(&request, &NullSink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.mape_score, 0.0);
        assert_eq!(result.estimated_fractions.len(), 1);
        assert!((result.estimated_fractions[0].fraction - 100.0).abs() < 1e-9);
        assert!((result.blend_cost - 2.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn predict_blend_returns_weighted_mean() {
        let components = vec![
            Component {
                name: "A".to_string(),
                fraction: 50.0,
                properties: vec![0.0],
                cost: None,
            },
            Component {
                name: "B".to_string(),
                fraction: 50.0,
                properties: vec![10.0],
                cost: None,
            },
        ];
        let blended = engine().predict_blend(&components).await.unwrap();
        assert_eq!(blended, vec![5.0]);
    }

    #[test]
    fn progress_is_clamped_at_the_last_trial() {
        // Sub-progress racing trial completion on the final trial.
        let p = progress_percent(20, 0.5, 20);
        assert_eq!(p, 100.0);
        assert_eq!(progress_percent(10, 0.5, 20), 52.5);
    }
}
