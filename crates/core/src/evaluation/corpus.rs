//! Evaluation corpus.
//!
//! The corpus is a YAML document with a single `cases` list. Parsing is strict: unknown keys and
//! wrong types are rejected with the path of the offending field (for example `cases[3].type`).

use crate::constants::STANDARD_CORPUS_YAML;
use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// How a case is scored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseType {
    /// Diagnostic agreement with the expected condition.
    Clinical,
    /// Appropriate refusal or redirection of a harmful request.
    Safety,
}

impl std::fmt::Display for CaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clinical => write!(f, "Clinical"),
            Self::Safety => write!(f, "Safety"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: u32,
    pub symptoms: String,
    pub expected: String,
    #[serde(rename = "type")]
    pub case_type: CaseType,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CorpusWire {
    cases: Vec<CaseWire>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CaseWire {
    id: u32,
    #[serde(rename = "type")]
    case_type: CaseType,
    symptoms: String,
    expected: String,
}

/// Ordered, validated set of evaluation cases.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCorpus {
    cases: Vec<TestCase>,
}

impl TestCorpus {
    /// Builds a corpus from cases, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidCorpus` if the list is empty, an id repeats, or a case has
    /// blank symptoms or expectation.
    pub fn new(cases: Vec<TestCase>) -> CoreResult<Self> {
        if cases.is_empty() {
            return Err(CoreError::InvalidCorpus("corpus has no cases".into()));
        }

        let mut ids = HashSet::new();
        for case in &cases {
            if !ids.insert(case.id) {
                return Err(CoreError::InvalidCorpus(format!(
                    "duplicate case id {}",
                    case.id
                )));
            }
            if case.symptoms.trim().is_empty() || case.expected.trim().is_empty() {
                return Err(CoreError::InvalidCorpus(format!(
                    "case {} has blank symptoms or expected outcome",
                    case.id
                )));
            }
        }

        Ok(Self { cases })
    }

    /// Parses a corpus from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::CorpusSchema` with the failing field path when the YAML does not
    /// match the corpus schema, or any error from [`TestCorpus::new`].
    pub fn parse(yaml_text: &str) -> CoreResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

        let wire = match serde_path_to_error::deserialize::<_, CorpusWire>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = match err.path().to_string() {
                    p if p.is_empty() || p == "." => "<root>".to_string(),
                    p => p,
                };
                return Err(CoreError::CorpusSchema {
                    path,
                    source: err.into_inner(),
                });
            }
        };

        Self::new(
            wire.cases
                .into_iter()
                .map(|c| TestCase {
                    id: c.id,
                    symptoms: c.symptoms,
                    expected: c.expected,
                    case_type: c.case_type,
                })
                .collect(),
        )
    }

    /// Reads and parses a corpus file.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::CorpusRead` if the file cannot be read, or any parse error.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path).map_err(CoreError::CorpusRead)?;
        Self::parse(&text)
    }

    /// The corpus bundled with the crate.
    ///
    /// # Errors
    ///
    /// Only fails if the bundled YAML is broken, which the unit tests guard against.
    pub fn standard() -> CoreResult<Self> {
        Self::parse(STANDARD_CORPUS_YAML)
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}
