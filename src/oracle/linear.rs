//! In-process reference oracle.
//!
//! Predicts blended properties as the fraction-weighted mean of the
//! component property vectors. Real blending is not linear for every
//! property, but the weighted mean is the canonical first-order model
//! and makes this oracle a cheap stand-in for development and tests.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{BlendOracle, OracleMessage, OracleReply, OracleRequest};

/// Fraction-weighted mean oracle.
pub struct LinearBlendOracle;

impl LinearBlendOracle {
    fn blend(request: &OracleRequest) -> Result<Vec<f64>, String> {
        let Some(first) = request.components.first() else {
            return Err("request contains no components".to_string());
        };
        let k = first.properties.len();

        let mut blended = vec![0.0; k];
        for component in &request.components {
            if component.properties.len() != k {
                return Err(format!(
                    "component '{}' has {} properties, expected {}",
                    component.name,
                    component.properties.len(),
                    k
                ));
            }
            // Wire fractions are percent.
            let weight = component.fraction / 100.0;
            for (acc, value) in blended.iter_mut().zip(&component.properties) {
                *acc += weight * value;
            }
        }
        Ok(blended)
    }
}

#[async_trait]
impl BlendOracle for LinearBlendOracle {
    async fn invoke(&self, request: OracleRequest) -> mpsc::Receiver<OracleMessage> {
        let (tx, rx) = mpsc::channel(4);
        let message = match Self::blend(&request) {
            Ok(blended_properties) => OracleMessage::Result {
                data: OracleReply { blended_properties },
            },
            Err(message) => OracleMessage::Error { message },
        };
        // Receiver dropped early just means the caller gave up on the
        // invocation; nothing to do.
        let _ = tx.send(message).await;
        rx
    }

    fn oracle_name(&self) -> &'static str {
        "linear"
    }
}
