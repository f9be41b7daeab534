//! Consultation workflow facade.
//!
//! Owns one instance of each pipeline service for the lifetime of the process, so the triage
//! anchor cache is shared across consultations. Every entry point degrades instead of failing.

use crate::config::CoreConfig;
use crate::diagnosis::{DiagnosticAnalysis, DiagnosticSynthesizer, Vitals};
use crate::diet::DietPlan;
use crate::diet::DietPlanner;
use crate::health::{ConnectionCheck, ModelHealth};
use crate::model::{Embedder, Generator, RetrievedContext, Retriever};
use crate::privacy::{PiiReport, PrivacyScreen};
use crate::triage::{TriageClassifier, TriageResult};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// A diagnostic analysis together with the context it was grounded on.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroundedAnalysis {
    pub context: RetrievedContext,
    pub analysis: DiagnosticAnalysis,
}

pub struct ConsultationService {
    generator: Arc<dyn Generator>,
    triage: TriageClassifier,
    synthesizer: DiagnosticSynthesizer,
    diet: DietPlanner,
    privacy: PrivacyScreen,
    retriever: Option<Arc<dyn Retriever>>,
}

impl ConsultationService {
    pub fn new(embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>, cfg: &CoreConfig) -> Self {
        Self {
            triage: TriageClassifier::new(embedder, cfg),
            synthesizer: DiagnosticSynthesizer::new(generator.clone()),
            diet: DietPlanner::new(generator.clone()),
            privacy: PrivacyScreen::new(generator.clone()),
            generator,
            retriever: None,
        }
    }

    /// Enables knowledge-base retrieval for [`analyze_with_retrieval`](Self::analyze_with_retrieval).
    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn triage_classifier(&self) -> &TriageClassifier {
        &self.triage
    }

    /// Drops the cached triage anchors.
    pub fn reset_triage(&mut self) {
        self.triage.reset();
    }

    pub async fn triage(&self, symptoms: &str) -> TriageResult {
        self.triage.classify(symptoms).await
    }

    pub async fn analyze(
        &self,
        symptoms: &str,
        vitals: &Vitals,
        context: Option<&str>,
    ) -> DiagnosticAnalysis {
        self.synthesizer.analyze(symptoms, vitals, context).await
    }

    pub async fn diet_plan(&self, diagnosis: &str) -> DietPlan {
        self.diet.generate(diagnosis).await
    }

    pub async fn detect_pii(&self, text: &str) -> PiiReport {
        self.privacy.detect_pii(text).await
    }

    pub async fn check_connection(&self) -> ConnectionCheck {
        ModelHealth::check(self.generator.as_ref()).await
    }

    /// Searches the knowledge base for `symptoms`.
    ///
    /// Returns an empty context when no retriever is configured, the symptoms are blank, or the
    /// search fails.
    pub async fn retrieve_context(&self, symptoms: &str) -> RetrievedContext {
        let Some(retriever) = &self.retriever else {
            return RetrievedContext::default();
        };
        if symptoms.trim().is_empty() {
            return RetrievedContext::default();
        }

        let started = Instant::now();
        match retriever.retrieve(symptoms.trim()).await {
            Ok(snippets) => {
                tracing::info!(
                    results = snippets.len(),
                    "retrieval completed in {}ms",
                    started.elapsed().as_millis()
                );
                RetrievedContext::new(snippets)
            }
            Err(e) => {
                tracing::warn!("retrieval failed, continuing without context: {e}");
                RetrievedContext::default()
            }
        }
    }

    /// Retrieves supporting material and analyses the symptoms against it.
    pub async fn analyze_with_retrieval(&self, symptoms: &str, vitals: &Vitals) -> GroundedAnalysis {
        let context = self.retrieve_context(symptoms).await;
        let rendered = context.render();
        let context_text = (!rendered.is_empty()).then_some(rendered.as_str());
        let analysis = self.synthesizer.analyze(symptoms, vitals, context_text).await;
        GroundedAnalysis { context, analysis }
    }
}
