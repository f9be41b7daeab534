//! Diagnostic synthesis.
//!
//! Builds a prompt from vitals, symptoms and optional retrieved context, asks the generative
//! model for a schema-constrained answer, and turns whatever comes back into a fully populated
//! [`DiagnosticAnalysis`].
//!
//! The generator hands back parsed JSON; [`validate_analysis`] checks it field by field and
//! produces an [`AnalysisOutcome`]: either `Valid`, or `Malformed` carrying the analysis with
//! defaults substituted plus the list of repaired fields. Only hard call failures (transport,
//! unparseable JSON) produce the fixed fallback analysis.

use crate::constants::{
    FALLBACK_RATIONALE, FALLBACK_SUGGESTIONS, FALLBACK_TREATMENT_NOTE, MAX_DIAGNOSIS_SUGGESTIONS,
    MISSING_RATIONALE,
};
use crate::model::{Generator, ResponseFormat};
use crate::CoreResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

/// Clinical measurements as typed into the consultation form.
///
/// Values are free text; nothing upstream validates them and any field may be empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Vitals {
    pub temperature: String,
    pub pulse: String,
    pub spo2: String,
    pub bp_systolic: String,
    pub bp_diastolic: String,
    pub weight: String,
    pub height: String,
    pub sugar: String,
}

impl Vitals {
    /// Unremarkable adult vitals used to isolate the effect of symptom text.
    pub fn standard_baseline() -> Self {
        Self {
            temperature: "37.0".into(),
            pulse: "72".into(),
            spo2: "98".into(),
            bp_systolic: "120".into(),
            bp_diastolic: "80".into(),
            weight: "70".into(),
            height: "175".into(),
            sugar: "100".into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticAnalysis {
    /// Up to three suggestions, most probable first.
    pub diagnosis_suggestions: Vec<String>,
    pub rationale: String,
    pub suggested_treatment_note: String,
}

impl DiagnosticAnalysis {
    /// Safe placeholder used when the model cannot be reached.
    pub fn fallback() -> Self {
        Self {
            diagnosis_suggestions: FALLBACK_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
            rationale: FALLBACK_RATIONALE.into(),
            suggested_treatment_note: FALLBACK_TREATMENT_NOTE.into(),
        }
    }

    pub fn top_suggestion(&self) -> Option<&str> {
        self.diagnosis_suggestions.first().map(String::as_str)
    }
}

/// A field that had to be repaired while validating model output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldIssue {
    /// The response was not a JSON object at all.
    NotAnObject,
    Missing(&'static str),
    WrongType(&'static str),
    /// Some suggestions were blank or not strings and were dropped.
    DroppedSuggestions(usize),
    /// More suggestions than allowed; the tail was discarded.
    TruncatedSuggestions(usize),
}

impl std::fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "response is not a JSON object"),
            Self::Missing(field) => write!(f, "{field} missing"),
            Self::WrongType(field) => write!(f, "{field} has the wrong type"),
            Self::DroppedSuggestions(n) => write!(f, "{n} unusable suggestion(s) dropped"),
            Self::TruncatedSuggestions(n) => write!(f, "{n} extra suggestion(s) truncated"),
        }
    }
}

/// Result of validating the model's JSON.
#[derive(Clone, Debug, PartialEq)]
pub enum AnalysisOutcome {
    Valid(DiagnosticAnalysis),
    Malformed {
        repaired: DiagnosticAnalysis,
        issues: Vec<FieldIssue>,
    },
}

impl AnalysisOutcome {
    pub fn into_analysis(self) -> DiagnosticAnalysis {
        match self {
            Self::Valid(analysis) => analysis,
            Self::Malformed { repaired, .. } => repaired,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// Validates a model response against the analysis schema.
///
/// Defaults: suggestions become empty unless an array, rationale becomes a placeholder when
/// absent or blank, the treatment note becomes empty.
pub fn validate_analysis(value: &Value) -> AnalysisOutcome {
    let mut issues = Vec::new();

    let Some(object) = value.as_object() else {
        return AnalysisOutcome::Malformed {
            repaired: DiagnosticAnalysis {
                diagnosis_suggestions: Vec::new(),
                rationale: MISSING_RATIONALE.into(),
                suggested_treatment_note: String::new(),
            },
            issues: vec![FieldIssue::NotAnObject],
        };
    };

    let diagnosis_suggestions = match object.get("diagnosisSuggestions") {
        Some(Value::Array(items)) => {
            let mut kept: Vec<String> = items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if kept.len() < items.len() {
                issues.push(FieldIssue::DroppedSuggestions(items.len() - kept.len()));
            }
            if kept.len() > MAX_DIAGNOSIS_SUGGESTIONS {
                issues.push(FieldIssue::TruncatedSuggestions(
                    kept.len() - MAX_DIAGNOSIS_SUGGESTIONS,
                ));
                kept.truncate(MAX_DIAGNOSIS_SUGGESTIONS);
            }
            kept
        }
        Some(_) => {
            issues.push(FieldIssue::WrongType("diagnosisSuggestions"));
            Vec::new()
        }
        None => {
            issues.push(FieldIssue::Missing("diagnosisSuggestions"));
            Vec::new()
        }
    };

    let rationale = match object.get("rationale") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::String(_)) | None => {
            issues.push(FieldIssue::Missing("rationale"));
            MISSING_RATIONALE.into()
        }
        Some(_) => {
            issues.push(FieldIssue::WrongType("rationale"));
            MISSING_RATIONALE.into()
        }
    };

    // An empty treatment note is acceptable; the clinician writes their own.
    let suggested_treatment_note = match object.get("suggestedTreatmentNote") {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => String::new(),
        Some(_) => {
            issues.push(FieldIssue::WrongType("suggestedTreatmentNote"));
            String::new()
        }
    };

    let analysis = DiagnosticAnalysis {
        diagnosis_suggestions,
        rationale,
        suggested_treatment_note,
    };

    if issues.is_empty() {
        AnalysisOutcome::Valid(analysis)
    } else {
        AnalysisOutcome::Malformed {
            repaired: analysis,
            issues,
        }
    }
}

/// Response schema sent with every analysis request.
pub fn analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "diagnosisSuggestions": { "type": "ARRAY", "items": { "type": "STRING" } },
            "rationale": { "type": "STRING" },
            "suggestedTreatmentNote": { "type": "STRING" }
        }
    })
}

fn or_unrecorded(value: &str) -> &str {
    if value.trim().is_empty() {
        "not recorded"
    } else {
        value.trim()
    }
}

/// Builds the diagnostic prompt. Blank context is treated as absent.
pub fn build_analysis_prompt(symptoms: &str, vitals: &Vitals, context: Option<&str>) -> String {
    let mut prompt = String::from("Act as a senior clinical diagnostic AI assistant.\n\n");

    prompt.push_str("Patient Vitals:\n");
    prompt.push_str(&format!(
        "- Temperature: {}°C\n",
        or_unrecorded(&vitals.temperature)
    ));
    prompt.push_str(&format!("- Pulse: {} bpm\n", or_unrecorded(&vitals.pulse)));
    prompt.push_str(&format!("- SpO2: {}%\n", or_unrecorded(&vitals.spo2)));
    prompt.push_str(&format!(
        "- BP: {}/{} mmHg\n",
        or_unrecorded(&vitals.bp_systolic),
        or_unrecorded(&vitals.bp_diastolic)
    ));
    for (label, value, unit) in [
        ("Weight", &vitals.weight, "kg"),
        ("Height", &vitals.height, "cm"),
        ("Blood sugar", &vitals.sugar, "mg/dL"),
    ] {
        if !value.trim().is_empty() {
            prompt.push_str(&format!("- {label}: {} {unit}\n", value.trim()));
        }
    }

    prompt.push_str(&format!("\nPatient Symptoms: \"{}\"\n", symptoms.trim()));

    if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str("\nRelevant Medical Records / Guidelines (RAG Context):\n");
        prompt.push_str(context);
        prompt.push_str(
            "\n\nInstructions: Use the provided context to refine your diagnosis if relevant.\n",
        );
    }

    prompt.push_str(
        "\nProvide a JSON response with:\n\
         1. A list of 3 potential diagnosis suggestions (ranked by probability).\n\
         2. A clinical rationale explaining why these match the symptoms and vitals.\n\
         3. A suggested \"Treatment Note\" summarizing the therapeutic strategy.\n\n\
         Return ONLY valid JSON.\n",
    );
    prompt
}

/// Turns symptoms and vitals into ranked diagnosis suggestions.
#[derive(Clone)]
pub struct DiagnosticSynthesizer {
    generator: Arc<dyn Generator>,
}

impl DiagnosticSynthesizer {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Analyses symptoms. Always returns a fully populated analysis.
    pub async fn analyze(
        &self,
        symptoms: &str,
        vitals: &Vitals,
        context: Option<&str>,
    ) -> DiagnosticAnalysis {
        match self.try_analyze(symptoms, vitals, context).await {
            Ok(outcome) => outcome.into_analysis(),
            Err(e) => {
                tracing::error!("symptom analysis failed: {e}");
                DiagnosticAnalysis::fallback()
            }
        }
    }

    /// Runs the model call and validation, surfacing hard failures.
    ///
    /// # Errors
    ///
    /// Returns the generator's error when the call itself fails.
    pub async fn try_analyze(
        &self,
        symptoms: &str,
        vitals: &Vitals,
        context: Option<&str>,
    ) -> CoreResult<AnalysisOutcome> {
        tracing::info!(
            symptoms_len = symptoms.len(),
            with_context = context.is_some_and(|c| !c.trim().is_empty()),
            "starting symptom analysis"
        );

        let started = Instant::now();
        let prompt = build_analysis_prompt(symptoms, vitals, context);
        let value = self
            .generator
            .generate(&prompt, &ResponseFormat::Schema(analysis_schema()))
            .await?;
        tracing::info!(
            "analysis generated in {}ms",
            started.elapsed().as_millis()
        );

        let outcome = validate_analysis(&value);
        if let AnalysisOutcome::Malformed { issues, .. } = &outcome {
            let issues: Vec<String> = issues.iter().map(ToString::to_string).collect();
            tracing::warn!("analysis response repaired: {}", issues.join("; "));
        }
        Ok(outcome)
    }
}
