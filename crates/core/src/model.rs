//! Collaborator contracts for the generative model and the search backend.
//!
//! The pipeline never talks HTTP itself. It consumes three capabilities:
//! - [`Embedder`]: text to vector, empty vector on failure (never an error)
//! - [`Generator`]: prompt to JSON, may fail on transport or parse errors and may return JSON
//!   that ignores the requested schema
//! - [`Retriever`]: query to snippets, an empty result is not an error
//!
//! Implementations are shared between services as `Arc<dyn _>`.

use crate::CoreResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shape requested from the generative model.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseFormat {
    /// Free text. Implementations return it as a JSON string value.
    Text,
    /// Any JSON document.
    Json,
    /// JSON constrained by the given response schema.
    Schema(Value),
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds `text`. Returns an empty vector when the backend fails.
    async fn embed(&self, text: &str) -> Vec<f32>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Runs a single generation call.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or when the response is not parseable JSON.
    async fn generate(&self, prompt: &str, format: &ResponseFormat) -> CoreResult<Value>;
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Searches the knowledge base for material relevant to `query`.
    async fn retrieve(&self, query: &str) -> CoreResult<Vec<RetrievedSnippet>>;
}

/// One search hit from the knowledge base.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievedSnippet {
    pub id: String,
    pub title: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

/// Ordered retrieval results used to ground a diagnostic prompt.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    snippets: Vec<RetrievedSnippet>,
}

impl RetrievedContext {
    pub fn new(snippets: Vec<RetrievedSnippet>) -> Self {
        Self { snippets }
    }

    pub fn snippets(&self) -> &[RetrievedSnippet] {
        &self.snippets
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Renders the context as prompt text.
    ///
    /// Each snippet becomes a `Source:`/`Content:` block; blocks are separated by a blank line.
    /// An empty context renders to an empty string.
    pub fn render(&self) -> String {
        self.snippets
            .iter()
            .map(|s| format!("Source: {}\nContent: {}", s.title, s.snippet))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Extracts a string from a JSON value produced in [`ResponseFormat::Text`] mode.
pub(crate) fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
