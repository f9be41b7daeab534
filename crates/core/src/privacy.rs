//! PII screening of free text before it is stored or sent onward.
//!
//! Detection is delegated to the generative model. The report is advisory: a failed call is
//! indistinguishable from "no PII found", so callers that need a hard guarantee must not rely
//! on it alone.

use crate::constants::REDACTION_MARKER;
use crate::model::{Generator, ResponseFormat};
use crate::CoreResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PiiReport {
    #[serde(rename = "containsPII")]
    pub contains_pii: bool,
    pub redacted_text: String,
    pub identified_types: Vec<String>,
}

impl PiiReport {
    /// Report for text that was not screened.
    pub fn unscreened(text: &str) -> Self {
        Self {
            contains_pii: false,
            redacted_text: text.to_string(),
            identified_types: Vec::new(),
        }
    }
}

pub fn build_pii_prompt(text: &str) -> String {
    format!(
        "Analyze the following text for Personally Identifiable Information (PII) according to HIPAA guidelines.\n\
         Text: \"{text}\"\n\n\
         Identify if it contains specific names, phone numbers, SSNs, or addresses.\n\
         Return JSON: {{ \"containsPII\": boolean, \"redactedText\": string (replace PII with {REDACTION_MARKER}), \"identifiedTypes\": string[] }}\n"
    )
}

/// Reads the model's report. Missing fields fall back to the unscreened values for `text`.
fn read_report(value: &Value, text: &str) -> PiiReport {
    let contains_pii = value
        .get("containsPII")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let redacted_text = value
        .get("redactedText")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| text.to_string());
    let identified_types = value
        .get("identifiedTypes")
        .and_then(Value::as_array)
        .map(|types| {
            types
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    PiiReport {
        contains_pii,
        redacted_text,
        identified_types,
    }
}

#[derive(Clone)]
pub struct PrivacyScreen {
    generator: Arc<dyn Generator>,
}

impl PrivacyScreen {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Screens `text` for personal identifiers.
    ///
    /// On any failure the text is returned unchanged and reported as PII-free.
    pub async fn detect_pii(&self, text: &str) -> PiiReport {
        match self.try_detect_pii(text).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("PII detection failed: {e}");
                PiiReport::unscreened(text)
            }
        }
    }

    /// # Errors
    ///
    /// Returns the generator's error when the call fails.
    pub async fn try_detect_pii(&self, text: &str) -> CoreResult<PiiReport> {
        let value = self
            .generator
            .generate(&build_pii_prompt(text), &ResponseFormat::Json)
            .await?;
        let report = read_report(&value, text);
        if report.contains_pii {
            tracing::info!(types = ?report.identified_types, "PII detected");
        }
        Ok(report)
    }
}
