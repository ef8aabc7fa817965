//! Subprocess oracle speaking line-delimited JSON.
//!
//! Protocol: the request is written to the child's stdin as a single
//! JSON document, and the child emits one JSON object per stdout line —
//! any number of `{"type": "progress", "value": N}` lines followed by a
//! terminal `{"type": "result", ...}` or `{"type": "error", ...}`.
//! Non-JSON stdout lines (model banners, download notices) are skipped.
//!
//! Timeouts are the transport's responsibility; this adapter only maps
//! the child's lifecycle onto the oracle message channel.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{BlendOracle, OracleMessage, OracleRequest};

/// Oracle backed by a child process spawned per invocation.
///
/// The `SubprocessOracle` itself is cheap and reusable; the expensive
/// part is each spawn, which is why the search loop treats every
/// invocation as slow.
pub struct SubprocessOracle {
    program: PathBuf,
    args: Vec<String>,
    channel_buffer: usize,
}

impl SubprocessOracle {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            channel_buffer: 16,
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_channel_buffer(mut self, buffer: usize) -> Self {
        self.channel_buffer = buffer.max(1);
        self
    }
}

#[async_trait]
impl BlendOracle for SubprocessOracle {
    async fn invoke(&self, request: OracleRequest) -> mpsc::Receiver<OracleMessage> {
        let (tx, rx) = mpsc::channel(self.channel_buffer);
        let program = self.program.clone();
        let args = self.args.clone();
        tokio::spawn(run_invocation(program, args, request, tx));
        rx
    }

    fn oracle_name(&self) -> &'static str {
        "subprocess"
    }
}

async fn run_invocation(
    program: PathBuf,
    args: Vec<String>,
    request: OracleRequest,
    tx: mpsc::Sender<OracleMessage>,
) {
    let mut child = match Command::new(&program)
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            let _ = tx
                .send(OracleMessage::Error {
                    message: format!("failed to spawn {}: {e}", program.display()),
                })
                .await;
            return;
        }
    };

    // Requests are small (one composition), so a sequential write
    // before reading cannot fill both pipes. Dropping stdin closes it,
    // signalling end-of-input to the child.
    if let Some(mut stdin) = child.stdin.take() {
        match serde_json::to_vec(&request) {
            Ok(mut payload) => {
                payload.push(b'\n');
                if let Err(e) = stdin.write_all(&payload).await {
                    // Some oracles never read stdin; keep listening.
                    warn!(error = %e, "Oracle child did not accept request on stdin");
                }
            }
            Err(e) => {
                let _ = tx
                    .send(OracleMessage::Error {
                        message: format!("failed to serialize oracle request: {e}"),
                    })
                    .await;
                let _ = child.kill().await;
                return;
            }
        }
    }

    let Some(stdout) = child.stdout.take() else {
        let _ = tx
            .send(OracleMessage::Error {
                message: "oracle child stdout was not captured".to_string(),
            })
            .await;
        let _ = child.kill().await;
        return;
    };

    let mut lines = BufReader::new(stdout).lines();
    let mut terminal_seen = false;

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<OracleMessage>(line) {
                    Ok(message) => {
                        let terminal = matches!(
                            message,
                            OracleMessage::Result { .. } | OracleMessage::Error { .. }
                        );
                        if tx.send(message).await.is_err() {
                            debug!("Oracle message receiver dropped, abandoning invocation");
                            break;
                        }
                        if terminal {
                            terminal_seen = true;
                            break;
                        }
                    }
                    Err(e) => {
                        // Model banners and download notices land on
                        // stdout too; only JSON lines are protocol.
                        debug!(error = %e, line, "Skipping non-protocol oracle output");
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                let _ = tx
                    .send(OracleMessage::Error {
                        message: format!("failed reading oracle stdout: {e}"),
                    })
                    .await;
                terminal_seen = true;
                break;
            }
        }
    }

    if !terminal_seen {
        let _ = tx
            .send(OracleMessage::Error {
                message: "oracle exited without a terminal message".to_string(),
            })
            .await;
    }

    match child.wait().await {
        Ok(status) if !status.success() => {
            warn!(%status, "Oracle child exited with non-zero status");
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Failed to reap oracle child"),
    }
}
