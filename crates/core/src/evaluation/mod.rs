//! Evaluation harness.
//!
//! Runs the diagnostic synthesizer over a corpus of cases and grades each prediction with an
//! independent judge. Cases run strictly one after another with a fixed wait between model
//! calls, so a run against a rate-limited API stays under quota.
//!
//! A run can be driven one case at a time through [`EvaluationRun::next`], or to completion with
//! [`EvaluationHarness::run_evaluation_suite`] and a progress callback.

mod corpus;
mod judge;
mod metrics;

pub use corpus::{CaseType, TestCase, TestCorpus};
pub use judge::{build_judge_prompt, parse_judgement, Judge, Judgement};
pub use metrics::EvalMetrics;

use crate::config::CoreConfig;
use crate::constants::{MISSING_RATIONALE, NO_OUTPUT_SENTINEL};
use crate::diagnosis::{DiagnosticAnalysis, DiagnosticSynthesizer, Vitals};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Clinician sign-off on a judged result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HumanReview {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// Outcome of one evaluated case.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalResult {
    pub case_id: u32,
    pub symptoms: String,
    pub expected: String,
    pub predicted: String,
    pub score: u8,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_flag: Option<bool>,
    #[serde(rename = "type")]
    pub case_type: CaseType,
    #[serde(default)]
    pub human_review: HumanReview,
}

/// A finished run with its metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<EvalResult>,
    pub metrics: EvalMetrics,
}

/// The text judged for a case: the top suggestion, else a usable rationale, else a sentinel.
pub fn predicted_text(analysis: &DiagnosticAnalysis) -> String {
    if let Some(top) = analysis.top_suggestion() {
        return top.to_string();
    }
    let rationale = analysis.rationale.trim();
    if !rationale.is_empty() && rationale != MISSING_RATIONALE {
        return rationale.to_string();
    }
    NO_OUTPUT_SENTINEL.to_string()
}

pub struct EvaluationHarness {
    synthesizer: DiagnosticSynthesizer,
    judge: Judge,
    corpus: TestCorpus,
    vitals: Vitals,
    delay: Duration,
}

impl EvaluationHarness {
    pub fn new(
        synthesizer: DiagnosticSynthesizer,
        judge: Judge,
        corpus: TestCorpus,
        cfg: &CoreConfig,
    ) -> Self {
        Self {
            synthesizer,
            judge,
            corpus,
            vitals: Vitals::standard_baseline(),
            delay: cfg.evaluation_delay(),
        }
    }

    pub fn corpus(&self) -> &TestCorpus {
        &self.corpus
    }

    /// Starts a run. Nothing is called until the first [`EvaluationRun::next`].
    pub fn run(&self) -> EvaluationRun<'_> {
        EvaluationRun {
            harness: self,
            next_index: 0,
            results: Vec::with_capacity(self.corpus.len()),
        }
    }

    /// Runs every case in order, reporting `(current, total, result)` after each one.
    ///
    /// `current` is 1-based. Individual case failures are recorded as results, never raised.
    pub async fn run_evaluation_suite<F>(&self, mut on_progress: F) -> Vec<EvalResult>
    where
        F: FnMut(usize, usize, &EvalResult),
    {
        let mut run = self.run();
        let total = self.corpus.len();
        while let Some(result) = run.next().await {
            on_progress(run.progress().0, total, &result);
        }
        run.into_results()
    }

    /// Runs every case and wraps the results with an id and timestamps.
    ///
    /// Running metrics are logged after each case; the report carries the final ones.
    pub async fn run_report(&self) -> EvaluationReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(%run_id, cases = self.corpus.len(), "evaluation run started");

        let mut run = self.run();
        while let Some(result) = run.next().await {
            let (current, total) = run.progress();
            let running = run.metrics();
            tracing::info!(
                case_id = result.case_id,
                score = result.score,
                average_score = running.average_score,
                pass_rate = running.pass_rate,
                safety_violations = running.safety_violations,
                "evaluated case {current}/{total}"
            );
        }

        let metrics = run.metrics();
        let results = run.into_results();
        tracing::info!(
            %run_id,
            average_score = metrics.average_score,
            pass_rate = metrics.pass_rate,
            safety_violations = metrics.safety_violations,
            "evaluation run finished"
        );

        EvaluationReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            results,
            metrics,
        }
    }

    async fn evaluate_case(&self, case: &TestCase) -> EvalResult {
        let analysis = self.synthesizer.analyze(&case.symptoms, &self.vitals, None).await;
        let predicted = predicted_text(&analysis);
        let judgement = self
            .judge
            .judge(&case.expected, &predicted, case.case_type)
            .await;

        EvalResult {
            case_id: case.id,
            symptoms: case.symptoms.clone(),
            expected: case.expected.clone(),
            predicted,
            score: judgement.score,
            reasoning: judgement.reasoning,
            safety_flag: judgement.safety_flag,
            case_type: case.case_type,
            human_review: HumanReview::Pending,
        }
    }
}

/// An in-progress evaluation run.
pub struct EvaluationRun<'a> {
    harness: &'a EvaluationHarness,
    next_index: usize,
    results: Vec<EvalResult>,
}

impl EvaluationRun<'_> {
    /// Evaluates the next case, or returns `None` once the corpus is exhausted.
    ///
    /// Waits the configured delay before every case except the first.
    pub async fn next(&mut self) -> Option<EvalResult> {
        let case = self.harness.corpus.cases().get(self.next_index)?;

        if self.next_index > 0 && !self.harness.delay.is_zero() {
            tokio::time::sleep(self.harness.delay).await;
        }

        let result = self.harness.evaluate_case(case).await;
        self.next_index += 1;
        self.results.push(result.clone());
        Some(result)
    }

    /// Results so far, in corpus order.
    pub fn results(&self) -> &[EvalResult] {
        &self.results
    }

    pub fn metrics(&self) -> EvalMetrics {
        EvalMetrics::from_results(&self.results)
    }

    /// `(completed, total)`.
    pub fn progress(&self) -> (usize, usize) {
        (self.results.len(), self.harness.corpus.len())
    }

    pub fn is_finished(&self) -> bool {
        self.next_index >= self.harness.corpus.len()
    }

    pub fn into_results(self) -> Vec<EvalResult> {
        self.results
    }
}
