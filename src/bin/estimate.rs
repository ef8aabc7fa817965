//! Blend estimation CLI runner.
//!
//! Reads an estimation request from a JSON file, runs the fraction
//! search against the chosen oracle, and prints the final result as
//! JSON on stdout. Progress goes to the log by default, or to stdout as
//! JSON lines with `--json-progress` (for driving from a job system).
//!
//! ```bash
//! # In-process linear oracle, reproducible run
//! estimate request.json --seed 42
//!
//! # External oracle process speaking line-delimited JSON
//! estimate request.json --oracle-cmd ./predict_worker --json-progress
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use fuelblend_engine::{
    BlendOracle, EngineConfig, EstimationEngine, EstimationRequest, LinearBlendOracle, LogSink,
    ProgressEvent, ProgressSink, SubprocessOracle,
};

#[derive(Parser, Debug)]
#[command(
    name = "estimate",
    about = "Search component fractions matching a target property profile"
)]
struct Args {
    /// Path to a JSON estimation request
    request: PathBuf,

    /// Spawn this command as the oracle (line-delimited JSON protocol).
    /// Defaults to the in-process linear oracle.
    #[arg(long)]
    oracle_cmd: Option<String>,

    /// Extra argument for the oracle command (repeatable)
    #[arg(long = "oracle-arg")]
    oracle_args: Vec<String>,

    /// Fixed sampler seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Emit progress events as JSON lines on stdout
    #[arg(long)]
    json_progress: bool,
}

/// Prints each progress event as one JSON object per stdout line.
struct JsonLineSink;

impl ProgressSink for JsonLineSink {
    fn report(&self, event: ProgressEvent) {
        if let Ok(line) = serde_json::to_string(&event) {
            println!("{line}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = EngineConfig::load();

    let raw = std::fs::read_to_string(&args.request)
        .with_context(|| format!("failed to read request file {}", args.request.display()))?;
    let mut request: EstimationRequest =
        serde_json::from_str(&raw).context("request file is not a valid estimation request")?;
    if request.n_trials == 0 {
        request.n_trials = config.default_trials;
    }

    let oracle: Arc<dyn BlendOracle> = match &args.oracle_cmd {
        Some(cmd) => Arc::new(
            SubprocessOracle::new(cmd)
                .with_args(args.oracle_args.clone())
                .with_channel_buffer(config.oracle_channel_buffer),
        ),
        None => Arc::new(LinearBlendOracle),
    };
    info!(oracle = oracle.oracle_name(), trials = request.n_trials, "Oracle ready");

    let mut engine = EstimationEngine::new(oracle, config);
    if let Some(seed) = args.seed {
        engine = engine.with_sampler_seed(seed);
    }

    // Ctrl-C aborts cleanly between trials.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let sink: Box<dyn ProgressSink> = if args.json_progress {
        Box::new(JsonLineSink)
    } else {
        Box::new(LogSink)
    };

    let result = engine
        .estimate(&request, sink.as_ref(), &cancel)
        .await
        .context("fraction search failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
