//! Lexicographic best-trial selection.
//!
//! Exploration may use any heuristic; selection is this one
//! deterministic reduction applied to the trial history: minimize error
//! first, break ties on cost. Failed trials never participate.

use std::cmp::Ordering;

use crate::types::Trial;

/// Min-scan the history for the lexicographically smallest
/// `(mape, cost)` pair among successful trials.
///
/// Ties on both objectives keep the earliest trial. Trials with
/// non-finite scores are skipped outright.
pub(crate) fn best_trial(history: &[Trial]) -> Option<&Trial> {
    let mut best: Option<(&Trial, (f64, f64))> = None;
    for trial in history {
        let Some(score) = trial.score() else { continue };
        if !score.0.is_finite() || !score.1.is_finite() {
            continue;
        }
        match best {
            Some((_, incumbent)) if !lex_less(score, incumbent) => {}
            _ => best = Some((trial, score)),
        }
    }
    best.map(|(trial, _)| trial)
}

/// Strict lexicographic less-than on `(error, cost)`.
fn lex_less(a: (f64, f64), b: (f64, f64)) -> bool {
    match a.0.partial_cmp(&b.0) {
        Some(Ordering::Less) => true,
        Some(Ordering::Equal) => matches!(a.1.partial_cmp(&b.1), Some(Ordering::Less)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrialOutcome;
    use chrono::Utc;

    fn scored(number: usize, mape: f64, cost: f64) -> Trial {
        Trial {
            number,
            fractions: vec![1.0],
            outcome: TrialOutcome::Scored { mape, cost },
            evaluated_at: Utc::now(),
        }
    }

    fn failed(number: usize) -> Trial {
        Trial {
            number,
            fractions: vec![1.0],
            outcome: TrialOutcome::Failed {
                reason: "oracle error".to_string(),
            },
            evaluated_at: Utc::now(),
        }
    }

    #[test]
    fn lower_error_wins_regardless_of_cost() {
        let history = vec![scored(1, 2.0, 1.0), scored(2, 1.0, 100.0)];
        assert_eq!(best_trial(&history).map(|t| t.number), Some(2));
    }

    #[test]
    fn equal_error_breaks_tie_on_cost() {
        let history = vec![scored(1, 5.0, 10.0), scored(2, 5.0, 3.0)];
        assert_eq!(best_trial(&history).map(|t| t.number), Some(2));
    }

    #[test]
    fn identical_scores_keep_the_earliest_trial() {
        let history = vec![scored(1, 5.0, 3.0), scored(2, 5.0, 3.0)];
        assert_eq!(best_trial(&history).map(|t| t.number), Some(1));
    }

    #[test]
    fn failed_trials_are_excluded() {
        let history = vec![failed(1), scored(2, 9.0, 1.0), failed(3)];
        assert_eq!(best_trial(&history).map(|t| t.number), Some(2));
    }

    #[test]
    fn all_failed_selects_nothing() {
        let history = vec![failed(1), failed(2)];
        assert!(best_trial(&history).is_none());
    }

    #[test]
    fn non_finite_scores_never_win() {
        let history = vec![scored(1, f64::NAN, 0.0), scored(2, 5.0, 1.0)];
        assert_eq!(best_trial(&history).map(|t| t.number), Some(2));

        let history = vec![scored(1, 5.0, 1.0), scored(2, f64::NAN, 0.0)];
        assert_eq!(best_trial(&history).map(|t| t.number), Some(1));
    }
}
