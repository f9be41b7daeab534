use crate::constants::CONNECTION_PROBE_PROMPT;
use crate::model::{value_as_text, Generator, ResponseFormat};
use serde::{Deserialize, Serialize};

/// Result of a model connectivity probe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCheck {
    pub success: bool,
    /// The model's reply on success, the error text on failure.
    pub message: String,
}

/// Connectivity check for the generative model.
///
/// Sends a fixed acknowledgement prompt in text mode; any reply counts as success.
pub struct ModelHealth;

impl ModelHealth {
    pub async fn check(generator: &dyn Generator) -> ConnectionCheck {
        tracing::info!("testing model connectivity");
        match generator
            .generate(CONNECTION_PROBE_PROMPT, &ResponseFormat::Text)
            .await
        {
            Ok(reply) => {
                let message = value_as_text(&reply);
                tracing::info!(response = %message, "model connection verified");
                ConnectionCheck {
                    success: true,
                    message,
                }
            }
            Err(e) => {
                tracing::error!("model connection failed: {e}");
                ConnectionCheck {
                    success: false,
                    message: e.to_string(),
                }
            }
        }
    }
}
