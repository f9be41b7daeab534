//! Semantic triage.
//!
//! Symptom text is embedded and compared against three anchor embeddings (exemplar CRITICAL,
//! URGENT and ROUTINE symptom clusters). The anchors are generated lazily on the first request
//! and kept for the lifetime of the [`TriageClassifier`]; a failed initialisation leaves the
//! cache empty so the next request tries again.
//!
//! A short list of high-risk phrases overrides the similarity vote, because embedding similarity
//! can under-weight rare but unambiguous emergencies.
//!
//! Triage never blocks a consultation: [`TriageClassifier::classify`] always returns a result.

use crate::config::CoreConfig;
use crate::constants::{
    CRITICAL_ANCHOR_TEXT, KEYWORD_OVERRIDE_CONFIDENCE, ROUTINE_ANCHOR_TEXT, URGENT_ANCHOR_TEXT,
};
use crate::model::Embedder;
use crate::similarity::similarity_score;
use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriageLevel {
    Critical,
    Urgent,
    Routine,
}

impl std::fmt::Display for TriageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "CRITICAL"),
            Self::Urgent => write!(f, "URGENT"),
            Self::Routine => write!(f, "ROUTINE"),
        }
    }
}

/// Raw cosine similarities against each anchor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TriageScores {
    pub critical: f64,
    pub urgent: f64,
    pub routine: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    pub level: TriageLevel,
    /// Winning score, `0.99` when the keyword override fired, `0.0` when triage degraded.
    pub confidence: f64,
    pub scores: TriageScores,
}

impl TriageResult {
    /// Least alarming classification with a zero-confidence marker.
    pub fn degraded() -> Self {
        Self {
            level: TriageLevel::Routine,
            confidence: 0.0,
            scores: TriageScores::default(),
        }
    }

    /// True when the result carries no similarity evidence.
    pub fn is_degraded(&self) -> bool {
        self.confidence == 0.0 && self.scores == TriageScores::default()
    }
}

/// Lifecycle of the anchor cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnchorState {
    Uninitialised,
    Ready,
}

#[derive(Debug)]
struct AnchorSet {
    critical: Vec<f32>,
    urgent: Vec<f32>,
    routine: Vec<f32>,
}

pub struct TriageClassifier {
    embedder: Arc<dyn Embedder>,
    keywords: Vec<String>,
    anchors: OnceCell<AnchorSet>,
}

impl TriageClassifier {
    pub fn new(embedder: Arc<dyn Embedder>, cfg: &CoreConfig) -> Self {
        Self {
            embedder,
            keywords: cfg.triage_keywords().to_vec(),
            anchors: OnceCell::new(),
        }
    }

    pub fn state(&self) -> AnchorState {
        if self.anchors.initialized() {
            AnchorState::Ready
        } else {
            AnchorState::Uninitialised
        }
    }

    /// Drops the cached anchors so the next request regenerates them.
    pub fn reset(&mut self) {
        self.anchors.take();
    }

    /// Classifies `symptoms`, degrading to ROUTINE with zero confidence on failure.
    ///
    /// The keyword override only runs on a successful classification, so a degraded result
    /// always keeps its zero-confidence marker.
    pub async fn classify(&self, symptoms: &str) -> TriageResult {
        match self.try_classify(symptoms).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("triage calculation failed: {e}");
                TriageResult::degraded()
            }
        }
    }

    /// Fallible classification used by [`classify`](Self::classify).
    ///
    /// # Errors
    ///
    /// Fails if the symptoms are blank, the anchors cannot be generated, the symptom embedding is
    /// empty, or a similarity is undefined.
    pub async fn try_classify(&self, symptoms: &str) -> CoreResult<TriageResult> {
        if symptoms.trim().is_empty() {
            return Err(CoreError::InvalidInput("symptoms cannot be empty".into()));
        }

        let anchors = self
            .anchors
            .get_or_try_init(|| self.generate_anchors())
            .await?;

        let input = self.embedder.embed(symptoms).await;
        if input.is_empty() {
            return Err(CoreError::EmptyEmbedding);
        }

        let scores = TriageScores {
            critical: similarity_score(&input, &anchors.critical)?,
            urgent: similarity_score(&input, &anchors.urgent)?,
            routine: similarity_score(&input, &anchors.routine)?,
        };
        tracing::info!(
            critical = scores.critical,
            urgent = scores.urgent,
            routine = scores.routine,
            "triage scores"
        );

        let (level, confidence) = select_level(&scores);
        let result = TriageResult {
            level,
            confidence,
            scores,
        };
        Ok(self.apply_keyword_override(symptoms, result))
    }

    async fn generate_anchors(&self) -> CoreResult<AnchorSet> {
        tracing::info!("generating triage anchor embeddings");

        let critical = self.embedder.embed(CRITICAL_ANCHOR_TEXT).await;
        let urgent = self.embedder.embed(URGENT_ANCHOR_TEXT).await;
        let routine = self.embedder.embed(ROUTINE_ANCHOR_TEXT).await;

        let missing: Vec<&str> = [
            ("critical", critical.is_empty()),
            ("urgent", urgent.is_empty()),
            ("routine", routine.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect();

        if !missing.is_empty() {
            return Err(CoreError::AnchorInitialisation {
                missing: missing.join(", "),
            });
        }

        Ok(AnchorSet {
            critical,
            urgent,
            routine,
        })
    }

    fn apply_keyword_override(&self, symptoms: &str, result: TriageResult) -> TriageResult {
        let lower = symptoms.to_lowercase();
        match self.keywords.iter().find(|k| lower.contains(k.as_str())) {
            Some(keyword) => {
                tracing::info!(keyword = keyword.as_str(), "triage keyword override");
                TriageResult {
                    level: TriageLevel::Critical,
                    confidence: KEYWORD_OVERRIDE_CONFIDENCE,
                    scores: result.scores,
                }
            }
            None => result,
        }
    }
}

/// Picks the winning level. CRITICAL must beat both others strictly, URGENT must beat ROUTINE
/// strictly; every tie resolves to ROUTINE.
fn select_level(scores: &TriageScores) -> (TriageLevel, f64) {
    if scores.critical > scores.urgent && scores.critical > scores.routine {
        (TriageLevel::Critical, scores.critical)
    } else if scores.urgent > scores.routine {
        (TriageLevel::Urgent, scores.urgent)
    } else {
        (TriageLevel::Routine, scores.routine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeEmbedder;

    fn anchored(fallback: Vec<f32>) -> FakeEmbedder {
        FakeEmbedder::new(fallback)
            .with(CRITICAL_ANCHOR_TEXT, vec![1.0, 0.0, 0.0])
            .with(URGENT_ANCHOR_TEXT, vec![0.0, 1.0, 0.0])
            .with(ROUTINE_ANCHOR_TEXT, vec![0.0, 0.0, 1.0])
    }

    fn classifier(embedder: FakeEmbedder) -> (TriageClassifier, Arc<FakeEmbedder>) {
        let embedder = Arc::new(embedder);
        let classifier = TriageClassifier::new(embedder.clone(), &CoreConfig::default());
        (classifier, embedder)
    }

    #[test]
    fn ties_favour_routine() {
        let all_equal = TriageScores {
            critical: 0.5,
            urgent: 0.5,
            routine: 0.5,
        };
        assert_eq!(select_level(&all_equal).0, TriageLevel::Routine);

        let critical_ties_urgent = TriageScores {
            critical: 0.7,
            urgent: 0.7,
            routine: 0.1,
        };
        assert_eq!(select_level(&critical_ties_urgent).0, TriageLevel::Urgent);

        let urgent_ties_routine = TriageScores {
            critical: 0.1,
            urgent: 0.4,
            routine: 0.4,
        };
        assert_eq!(select_level(&urgent_ties_routine).0, TriageLevel::Routine);
    }

    #[tokio::test]
    async fn mild_cold_is_routine_when_routine_anchor_wins() {
        let (classifier, _) = classifier(
            anchored(vec![0.0, 0.0, 0.0]).with("mild cold, runny nose", vec![0.1, 0.3, 0.9]),
        );

        let result = classifier.classify("mild cold, runny nose").await;
        assert_eq!(result.level, TriageLevel::Routine);
        assert!(result.scores.routine > result.scores.urgent);
        assert!(result.scores.urgent > result.scores.critical);
        assert_eq!(result.confidence, result.scores.routine);
    }

    #[tokio::test]
    async fn urgent_wins_when_strictly_greater_than_routine() {
        let (classifier, _) = classifier(anchored(vec![0.2, 0.9, 0.3]));
        let result = classifier.classify("deep cut on forearm").await;
        assert_eq!(result.level, TriageLevel::Urgent);
        assert_eq!(result.confidence, result.scores.urgent);
    }

    #[tokio::test]
    async fn chest_pain_is_critical_even_when_embedding_says_routine() {
        let (classifier, _) = classifier(anchored(vec![0.0, 0.1, 1.0]));
        let result = classifier
            .classify("sudden chest pain radiating to left arm")
            .await;
        assert_eq!(result.level, TriageLevel::Critical);
        assert_eq!(result.confidence, KEYWORD_OVERRIDE_CONFIDENCE);
        assert!(result.scores.routine > result.scores.critical);
    }

    #[tokio::test]
    async fn keyword_match_is_case_insensitive() {
        let (classifier, _) = classifier(anchored(vec![0.0, 0.0, 1.0]));
        let result = classifier.classify("Patient found UNCONSCIOUS at home").await;
        assert_eq!(result.level, TriageLevel::Critical);
        assert_eq!(result.confidence, KEYWORD_OVERRIDE_CONFIDENCE);
    }

    #[tokio::test]
    async fn anchors_are_generated_once() {
        let (classifier, embedder) = classifier(anchored(vec![0.0, 0.0, 1.0]));
        assert_eq!(classifier.state(), AnchorState::Uninitialised);

        classifier.classify("rash on arm").await;
        classifier.classify("follow-up visit").await;

        assert_eq!(classifier.state(), AnchorState::Ready);
        // three anchors plus one embedding per request
        assert_eq!(embedder.calls(), 5);
    }

    #[tokio::test]
    async fn reset_forces_regeneration() {
        let (mut classifier, embedder) = classifier(anchored(vec![0.0, 0.0, 1.0]));
        classifier.classify("rash on arm").await;
        classifier.reset();
        assert_eq!(classifier.state(), AnchorState::Uninitialised);

        classifier.classify("rash on arm").await;
        assert_eq!(embedder.calls(), 8);
    }

    #[tokio::test]
    async fn failed_anchor_generation_degrades_and_stays_uninitialised() {
        let (classifier, _) = classifier(
            FakeEmbedder::new(vec![0.0, 0.0, 1.0])
                .with(CRITICAL_ANCHOR_TEXT, vec![1.0, 0.0, 0.0])
                .with(URGENT_ANCHOR_TEXT, Vec::new()),
        );

        let err = classifier
            .try_classify("mild headache")
            .await
            .expect_err("anchor failure");
        assert!(matches!(err, CoreError::AnchorInitialisation { .. }));

        let result = classifier.classify("mild headache").await;
        assert!(result.is_degraded());
        assert_eq!(result.level, TriageLevel::Routine);
        assert_eq!(classifier.state(), AnchorState::Uninitialised);
    }

    #[tokio::test]
    async fn empty_symptom_embedding_degrades() {
        let (classifier, _) = classifier(anchored(Vec::new()));
        let result = classifier.classify("fatigue").await;
        assert_eq!(result, TriageResult::degraded());
        assert_eq!(classifier.state(), AnchorState::Ready);
    }

    #[tokio::test]
    async fn zero_vector_embedding_is_a_failure_not_a_low_score() {
        let (classifier, _) = classifier(anchored(vec![0.0, 0.0, 0.0]));
        let err = classifier
            .try_classify("fatigue")
            .await
            .expect_err("degenerate");
        assert!(matches!(err, CoreError::DegenerateSimilarity));
    }

    #[tokio::test]
    async fn backend_failure_stays_degraded_even_with_a_keyword() {
        let (classifier, _) = classifier(FakeEmbedder::new(Vec::new()));
        let result = classifier.classify("chest pain, slurred speech").await;
        assert_eq!(result, TriageResult::degraded());
        assert_eq!(result.level, TriageLevel::Routine);
        assert_eq!(result.confidence, 0.0);
        assert!(result.is_degraded());
    }

    #[tokio::test]
    async fn configured_keywords_replace_defaults() {
        let cfg = CoreConfig::new(vec!["Seizure".into()], std::time::Duration::ZERO)
            .expect("config");
        let classifier = TriageClassifier::new(Arc::new(anchored(vec![0.0, 0.0, 1.0])), &cfg);

        let seizure = classifier.classify("witnessed seizure lasting 3 minutes").await;
        assert_eq!(seizure.level, TriageLevel::Critical);

        let chest = classifier.classify("chest pain after running").await;
        assert_eq!(chest.level, TriageLevel::Routine);
    }
}
