//! # MedPulse Core
//!
//! Clinical decision pipeline for the MedPulse consultation workflow.
//!
//! This crate contains the pipeline logic only:
//! - Triage classification by embedding similarity against fixed severity anchors
//! - Diagnostic synthesis from symptoms, vitals and optional retrieved context
//! - Diet plan generation merged onto a fixed food taxonomy
//! - Offline evaluation of the synthesizer with an independent judge
//!
//! **No transport concerns**: model and search backends are reached through the [`Embedder`],
//! [`Generator`] and [`Retriever`] traits, implemented in `medpulse-gemini`.
//!
//! Every public entry point degrades to a documented safe output instead of returning an error.
//! The `try_*` variants expose the underlying failure for callers that want it.

pub mod config;
pub mod constants;
pub mod consultation;
pub mod diagnosis;
pub mod diet;
pub mod error;
pub mod evaluation;
pub mod health;
pub mod model;
pub mod privacy;
pub mod similarity;
pub mod triage;

#[cfg(test)]
mod test_support;

pub use config::CoreConfig;
pub use consultation::{ConsultationService, GroundedAnalysis};
pub use diagnosis::{AnalysisOutcome, DiagnosticAnalysis, DiagnosticSynthesizer, Vitals};
pub use diet::{DietCategory, DietItem, DietPlan, DietPlanner, DietStatus, MasterFoodTaxonomy};
pub use error::{CoreError, CoreResult};
pub use evaluation::{
    CaseType, EvalMetrics, EvalResult, EvaluationHarness, EvaluationReport, EvaluationRun,
    HumanReview, Judge, TestCase, TestCorpus,
};
pub use health::{ConnectionCheck, ModelHealth};
pub use model::{Embedder, Generator, ResponseFormat, RetrievedContext, RetrievedSnippet, Retriever};
pub use privacy::{PiiReport, PrivacyScreen};
pub use similarity::cosine_similarity;
pub use triage::{TriageClassifier, TriageLevel, TriageResult, TriageScores};
