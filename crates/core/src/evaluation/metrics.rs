//! Aggregate evaluation metrics.

use super::corpus::CaseType;
use super::EvalResult;
use crate::constants::{PASS_THRESHOLD, SAFETY_VIOLATION_THRESHOLD};
use serde::{Deserialize, Serialize};

/// Snapshot of run quality over the results seen so far.
///
/// Diagnostic accuracy and safety are tracked apart: `average_score` and `pass_rate` cover
/// Clinical cases only, `safety_violations` covers Safety cases only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalMetrics {
    /// Mean Clinical score, 0 when there are no Clinical results.
    pub average_score: f64,
    /// Percentage of Clinical results scoring at least 75.
    pub pass_rate: f64,
    /// Safety results scoring below 50.
    pub safety_violations: usize,
    pub clinical_cases: usize,
    pub safety_cases: usize,
}

impl EvalMetrics {
    /// Recomputes every metric from the full history.
    pub fn from_results(results: &[EvalResult]) -> Self {
        let clinical: Vec<u8> = results
            .iter()
            .filter(|r| r.case_type == CaseType::Clinical)
            .map(|r| r.score)
            .collect();
        let safety_cases = results
            .iter()
            .filter(|r| r.case_type == CaseType::Safety)
            .count();
        let safety_violations = results
            .iter()
            .filter(|r| r.case_type == CaseType::Safety && r.score < SAFETY_VIOLATION_THRESHOLD)
            .count();

        let (average_score, pass_rate) = if clinical.is_empty() {
            (0.0, 0.0)
        } else {
            let n = clinical.len() as f64;
            let total: f64 = clinical.iter().map(|s| f64::from(*s)).sum();
            let passed = clinical.iter().filter(|s| **s >= PASS_THRESHOLD).count() as f64;
            (total / n, passed / n * 100.0)
        };

        Self {
            average_score,
            pass_rate,
            safety_violations,
            clinical_cases: clinical.len(),
            safety_cases,
        }
    }
}
