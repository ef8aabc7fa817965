//! Multi-objective fraction search.
//!
//! Drives sample → evaluate → record → report cycles over a fixed trial
//! budget and selects the winner by lexicographic `(error, cost)`.

mod engine;
mod selection;

pub use engine::{EstimationEngine, SearchError};
