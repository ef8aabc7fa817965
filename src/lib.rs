//! FuelBlend Engine: multi-objective blend fraction estimation.
//!
//! Searches the component simplex for compositions whose oracle-predicted
//! properties match a target profile, minimizing prediction error (MAPE)
//! first and blend cost second, while streaming best-so-far progress.
//!
//! ## Architecture
//!
//! - **Simplex Sampler**: uniform candidate compositions via normalized
//!   Exponential(1) draws
//! - **Oracle Channel**: opaque property-prediction boundary (in-process,
//!   subprocess, or anything message-shaped)
//! - **Objective Evaluator**: MAPE against the target plus
//!   fraction-weighted blend cost
//! - **Search Loop**: fixed-budget sequential trials with lexicographic
//!   `(error, cost)` selection and per-trial progress events

pub mod config;
pub mod objective;
pub mod oracle;
pub mod report;
pub mod sampler;
pub mod search;
pub mod types;

// Re-export configuration
pub use config::{ConfigError, EngineConfig};

// Re-export commonly used types
pub use types::{Component, EstimationRequest, FractionEstimate, TargetSpec, Trial, TrialOutcome};

// Re-export the oracle boundary
pub use oracle::{
    BlendOracle, LinearBlendOracle, OracleError, OracleMessage, OracleReply, OracleRequest,
    SubprocessOracle,
};

// Re-export the engine and reporting surface
pub use report::{
    BestSnapshot, ChannelSink, EstimationResult, LogSink, NullSink, ProgressEvent, ProgressSink,
};
pub use sampler::SimplexSampler;
pub use search::{EstimationEngine, SearchError};
