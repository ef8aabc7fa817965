//! Progress and result reporting.
//!
//! The search loop emits one [`ProgressEvent`] per trial (plus optional
//! intra-trial events when the oracle streams its own sub-progress).
//! Events and the final [`EstimationResult`] follow the external
//! boundary contract: fractions on the percent scale, `mape_score` as a
//! fraction (error/100).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::types::FractionEstimate;

/// Best-so-far snapshot carried by every progress event.
///
/// `mape_score` and `blend_cost` are `None` until the first successful
/// trial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestSnapshot {
    /// Best error so far, as a fraction (percent MAPE / 100).
    pub mape_score: Option<f64>,
    pub blend_cost: Option<f64>,
    pub estimated_fractions: Vec<FractionEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub savings_percent: Option<f64>,
}

impl BestSnapshot {
    pub fn empty() -> Self {
        Self {
            mape_score: None,
            blend_cost: None,
            estimated_fractions: Vec::new(),
            savings_percent: None,
        }
    }
}

/// One incremental progress report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Overall run progress, 0–100. Clamped so oracle sub-progress
    /// racing trial completion can never push it past 100.
    pub progress: f64,
    pub result: BestSnapshot,
}

/// Final outcome of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimationResult {
    pub estimated_fractions: Vec<FractionEstimate>,
    /// Winning error as a fraction (percent MAPE / 100).
    pub mape_score: f64,
    pub blend_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub savings_percent: Option<f64>,
    pub completed_at: DateTime<Utc>,
}

/// Consumer of incremental progress.
///
/// Implementations must be cheap and non-blocking; the search loop
/// calls them inline between oracle invocations.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Forwards events to an external job system over an mpsc channel.
///
/// A full channel drops the event with a warning rather than stalling
/// the search: progress is advisory, the final result is not.
pub struct ChannelSink {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver the job system polls.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn report(&self, event: ProgressEvent) {
        if let Err(e) = self.tx.try_send(event) {
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    warn!("Progress channel full, dropping event");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    warn!("Progress receiver dropped, event discarded");
                }
            }
        }
    }
}

/// Logs each snapshot through `tracing`. Used by the CLI runner.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn report(&self, event: ProgressEvent) {
        info!(
            progress = format_args!("{:.1}%", event.progress),
            best_mape = ?event.result.mape_score,
            best_cost = ?event.result.blend_cost,
            "Search progress"
        );
    }
}

/// Discards all events. Handy for callers that only want the final result.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _event: ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_delivers_events() {
        let (sink, mut rx) = ChannelSink::new(4);
        sink.report(ProgressEvent {
            progress: 50.0,
            result: BestSnapshot::empty(),
        });
        let event = rx.try_recv().unwrap();
        assert_eq!(event.progress, 50.0);
        assert!(event.result.mape_score.is_none());
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (sink, mut rx) = ChannelSink::new(1);
        for i in 0..3 {
            sink.report(ProgressEvent {
                progress: f64::from(i) * 10.0,
                result: BestSnapshot::empty(),
            });
        }
        // Only the first event fit.
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn snapshot_serializes_savings_only_when_present() {
        let without = serde_json::to_string(&BestSnapshot::empty()).unwrap();
        assert!(!without.contains("savings_percent"));

        let with = serde_json::to_string(&BestSnapshot {
            savings_percent: Some(12.5),
            ..BestSnapshot::empty()
        })
        .unwrap();
        assert!(with.contains("savings_percent"));
    }
}
