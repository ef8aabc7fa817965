//! Objective evaluator: prediction error and blend cost.
//!
//! Error is mean absolute percentage error against the target property
//! vector, expressed as a percentage (`100 × MAPE`). Cost is the
//! fraction-weighted sum of per-component unit costs. Savings is a
//! reporting-only derived figure and never enters the objective.

use crate::types::Component;

/// Lower clamp on |target| so MAPE stays total when a target element is
/// zero. Same convention as sklearn's `mean_absolute_percentage_error`.
const MAPE_TARGET_FLOOR: f64 = f64::EPSILON;

/// `100 × MAPE` between `target` and `predicted`.
///
/// Callers must have validated equal lengths before the search starts;
/// a mismatch here is a programming error, not a per-trial failure.
pub fn mape_percent(target: &[f64], predicted: &[f64]) -> f64 {
    debug_assert_eq!(
        target.len(),
        predicted.len(),
        "property vector lengths must be validated before scoring"
    );
    if target.is_empty() {
        return 0.0;
    }
    let total: f64 = target
        .iter()
        .zip(predicted)
        .map(|(t, p)| (t - p).abs() / t.abs().max(MAPE_TARGET_FLOOR))
        .sum();
    total / target.len() as f64 * 100.0
}

/// Fraction-weighted blend cost, `Σ p_i × cost_i`.
///
/// `fractions` is on the internal 0–1 scale. Components without an
/// explicit cost contribute at 0.0.
pub fn blend_cost(fractions: &[f64], components: &[Component]) -> f64 {
    fractions
        .iter()
        .zip(components)
        .map(|(p, c)| p * c.unit_cost())
        .sum()
}

/// Savings of the blend relative to a reference target cost, as a
/// percentage. `None` when no meaningful target cost was supplied.
pub fn savings_percent(target_cost: Option<f64>, blend_cost: f64) -> Option<f64> {
    match target_cost {
        Some(t) if t != 0.0 => Some((t - blend_cost) / t * 100.0),
        _ => None,
    }
}
