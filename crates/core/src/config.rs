//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Services never read process-wide environment variables while
//! handling a consultation or an evaluation run.

use crate::constants::{DEFAULT_EVALUATION_DELAY, DEFAULT_TRIAGE_KEYWORDS};
use crate::{CoreError, CoreResult};
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    triage_keywords: Vec<String>,
    evaluation_delay: Duration,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// Keywords are matched against lower-cased symptom text, so they are stored lower-cased.
    /// An empty keyword list is rejected: it would silently disable the emergency override.
    pub fn new(triage_keywords: Vec<String>, evaluation_delay: Duration) -> CoreResult<Self> {
        let triage_keywords: Vec<String> = triage_keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        if triage_keywords.is_empty() {
            return Err(CoreError::InvalidInput(
                "triage keyword list cannot be empty".into(),
            ));
        }

        Ok(Self {
            triage_keywords,
            evaluation_delay,
        })
    }

    pub fn triage_keywords(&self) -> &[String] {
        &self.triage_keywords
    }

    pub fn evaluation_delay(&self) -> Duration {
        self.evaluation_delay
    }

    /// Returns a copy of this configuration with a different inter-case delay.
    pub fn with_evaluation_delay(mut self, delay: Duration) -> Self {
        self.evaluation_delay = delay;
        self
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            triage_keywords: DEFAULT_TRIAGE_KEYWORDS
                .iter()
                .map(|k| (*k).to_string())
                .collect(),
            evaluation_delay: DEFAULT_EVALUATION_DELAY,
        }
    }
}

/// Parse the evaluation delay (milliseconds) from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default delay.
pub fn evaluation_delay_from_env_value(value: Option<String>) -> CoreResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_EVALUATION_DELAY),
        Some(v) => v.parse::<u64>().map(Duration::from_millis).map_err(|_| {
            CoreError::InvalidInput(format!(
                "evaluation delay must be a whole number of milliseconds, got {v:?}"
            ))
        }),
    }
}

/// Parse the triage keyword list from an optional comma-separated value.
///
/// If `value` is `None` or contains no usable keywords, returns the built-in list.
pub fn triage_keywords_from_env_value(value: Option<String>) -> Vec<String> {
    let parsed: Vec<String> = value
        .unwrap_or_default()
        .split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    if parsed.is_empty() {
        DEFAULT_TRIAGE_KEYWORDS
            .iter()
            .map(|k| (*k).to_string())
            .collect()
    } else {
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_defaults_when_unset_or_blank() {
        assert_eq!(
            evaluation_delay_from_env_value(None).expect("default"),
            DEFAULT_EVALUATION_DELAY
        );
        assert_eq!(
            evaluation_delay_from_env_value(Some("   ".into())).expect("blank"),
            DEFAULT_EVALUATION_DELAY
        );
    }

    #[test]
    fn delay_parses_milliseconds() {
        let delay = evaluation_delay_from_env_value(Some(" 1000 ".into())).expect("parse");
        assert_eq!(delay, Duration::from_secs(1));
    }

    #[test]
    fn delay_rejects_non_numeric_values() {
        let err = evaluation_delay_from_env_value(Some("fast".into())).expect_err("reject");
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn keywords_are_lowercased_and_trimmed() {
        let keywords = triage_keywords_from_env_value(Some("Chest Pain, ,SEIZURE ".into()));
        assert_eq!(keywords, vec!["chest pain".to_string(), "seizure".to_string()]);
    }

    #[test]
    fn keywords_fall_back_to_builtin_list() {
        let keywords = triage_keywords_from_env_value(Some(" , ".into()));
        assert_eq!(keywords.len(), DEFAULT_TRIAGE_KEYWORDS.len());
        assert!(keywords.iter().any(|k| k == "stroke"));
    }

    #[test]
    fn config_rejects_empty_keyword_list() {
        let err = CoreConfig::new(vec!["  ".into()], Duration::ZERO).expect_err("reject");
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }
}
