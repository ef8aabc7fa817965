//! Oracle channel — the property-prediction boundary.
//!
//! The engine treats the prediction model as an opaque oracle reached
//! through a typed message channel: send one request, receive a
//! sequence of `progress` messages terminated by exactly one `result`
//! or `error`. Whether the real oracle is an in-process function, a
//! subprocess streaming line-delimited JSON, or a network call is an
//! implementation detail behind [`BlendOracle`].
//!
//! Oracle instances may be expensive to initialize (model weights,
//! process spawn); callers construct one per worker and reuse it across
//! runs via `Arc<dyn BlendOracle>` — never a hidden global.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

mod linear;
mod subprocess;

pub use linear::LinearBlendOracle;
pub use subprocess::SubprocessOracle;

/// One component as the oracle sees it. `fraction` is on the 0–100
/// percent scale per the wire contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleComponent {
    pub name: String,
    pub fraction: f64,
    pub properties: Vec<f64>,
}

/// A single prediction request: one candidate composition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleRequest {
    pub components: Vec<OracleComponent>,
}

/// Successful oracle payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleReply {
    pub blended_properties: Vec<f64>,
}

/// Typed messages streamed back from one oracle invocation.
///
/// The serialized form is the subprocess wire protocol: one JSON object
/// per line, discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OracleMessage {
    /// Intra-call progress, 0–100 (e.g. per fold of an ensemble).
    Progress { value: f64 },
    /// Terminal: prediction succeeded.
    Result { data: OracleReply },
    /// Terminal: prediction failed.
    Error { message: String },
}

/// Per-invocation oracle failures. Non-fatal to a run unless every
/// trial in the budget fails.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle reported failure: {0}")]
    Reported(String),

    #[error("oracle channel closed before a terminal message")]
    ChannelClosed,

    #[error("oracle process error: {0}")]
    Process(String),

    #[error("malformed oracle message: {0}")]
    Malformed(String),
}

/// An opaque property-prediction oracle.
///
/// Calls are expensive and potentially slow; the search loop invokes
/// them one at a time and never holds a lock across the call.
#[async_trait]
pub trait BlendOracle: Send + Sync {
    /// Start one prediction. Messages for this invocation arrive on the
    /// returned receiver; the stream ends with a `Result` or `Error`.
    async fn invoke(&self, request: OracleRequest) -> mpsc::Receiver<OracleMessage>;

    /// Oracle name for logging.
    fn oracle_name(&self) -> &'static str;
}

/// Drive one invocation's message stream to completion.
///
/// `on_progress` fires for each intra-call progress message with a
/// value in 0–100. Returns the blended property vector, or the error
/// the oracle reported. A stream that ends without a terminal message
/// counts as [`OracleError::ChannelClosed`].
pub async fn drive_invocation<F>(
    mut rx: mpsc::Receiver<OracleMessage>,
    mut on_progress: F,
) -> Result<Vec<f64>, OracleError>
where
    F: FnMut(f64),
{
    while let Some(message) = rx.recv().await {
        match message {
            OracleMessage::Progress { value } => on_progress(value.clamp(0.0, 100.0)),
            OracleMessage::Result { data } => return Ok(data.blended_properties),
            OracleMessage::Error { message } => return Err(OracleError::Reported(message)),
        }
    }
    Err(OracleError::ChannelClosed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_wire_protocol() {
        let progress: OracleMessage =
            serde_json::from_str(r#"{"type": "progress", "value": 40}"#).unwrap();
        assert!(matches!(progress, OracleMessage::Progress { value } if value == 40.0));

        let result: OracleMessage = serde_json::from_str(
            r#"{"type": "result", "data": {"blended_properties": [1.0, 2.0]}}"#,
        )
        .unwrap();
        match result {
            OracleMessage::Result { data } => assert_eq!(data.blended_properties, vec![1.0, 2.0]),
            other => panic!("unexpected message: {other:?}"),
        }

        let error: OracleMessage =
            serde_json::from_str(r#"{"type": "error", "message": "no GPUs found"}"#).unwrap();
        assert!(matches!(error, OracleMessage::Error { .. }));
    }

    #[tokio::test]
    async fn drive_invocation_collects_progress_then_result() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(OracleMessage::Progress { value: 20.0 }).await.unwrap();
        tx.send(OracleMessage::Progress { value: 120.0 }).await.unwrap();
        tx.send(OracleMessage::Result {
            data: OracleReply {
                blended_properties: vec![3.0],
            },
        })
        .await
        .unwrap();
        drop(tx);

        let mut seen = Vec::new();
        let out = drive_invocation(rx, |v| seen.push(v)).await.unwrap();
        assert_eq!(out, vec![3.0]);
        // Out-of-range progress is clamped, not propagated.
        assert_eq!(seen, vec![20.0, 100.0]);
    }

    #[tokio::test]
    async fn closed_channel_without_terminal_is_an_error() {
        let (tx, rx) = mpsc::channel::<OracleMessage>(1);
        drop(tx);
        let err = drive_invocation(rx, |_| {}).await.unwrap_err();
        assert!(matches!(err, OracleError::ChannelClosed));
    }
}
