//! Knowledge-base search over a discovery-engine serving config.

use crate::client::send_with_retry;
use crate::config::SearchConfig;
use crate::error::{GeminiError, GeminiResult};
use async_trait::async_trait;
use medpulse_core::{CoreResult, RetrievedSnippet, Retriever};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
    total_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    #[serde(default)]
    id: String,
    document: Option<Document>,
    relevance_score: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    derived_struct_data: Option<Value>,
    struct_data: Option<Value>,
}

pub(crate) fn search_request_body(cfg: &SearchConfig, query: &str) -> Value {
    json!({
        "query": query,
        "pageSize": cfg.page_size,
        "queryExpansionSpec": { "condition": "AUTO" },
        "spellCorrectionSpec": { "mode": "AUTO" },
        "languageCode": cfg.language_code,
        "contentSearchSpec": { "snippetSpec": { "returnSnippet": true } },
        "userInfo": { "timeZone": cfg.time_zone }
    })
}

fn string_at<'a>(value: Option<&'a Value>, pointer: &str) -> Option<&'a str> {
    value
        .and_then(|v| v.pointer(pointer))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Maps one search hit onto a snippet.
///
/// Derived (crawled) data wins over structured data. A hit without a title is labelled
/// `Medical Record`, and one without a link gets a URI under the configured storage prefix.
fn to_snippet(result: SearchResult, fallback_uri_prefix: &str) -> RetrievedSnippet {
    let document = result.document.unwrap_or_default();
    let derived = document.derived_struct_data.as_ref();
    let structured = document.struct_data.as_ref();

    let title = string_at(derived, "/title")
        .or_else(|| string_at(structured, "/title"))
        .unwrap_or("Medical Record")
        .to_string();
    let snippet = string_at(derived, "/snippets/0/snippet")
        .or_else(|| string_at(structured, "/snippet"))
        .unwrap_or_default()
        .to_string();
    let uri = string_at(derived, "/link")
        .map(str::to_string)
        .unwrap_or_else(|| format!("{fallback_uri_prefix}{}", result.id));

    RetrievedSnippet {
        id: result.id,
        title,
        snippet,
        uri: Some(uri),
        relevance_score: result.relevance_score,
    }
}

/// Retriever backed by a discovery-engine search endpoint.
#[derive(Clone)]
pub struct SearchClient {
    http: Client,
    cfg: SearchConfig,
}

impl SearchClient {
    /// # Errors
    ///
    /// Returns `GeminiError::ClientBuild` if the HTTP client cannot be constructed.
    pub fn new(cfg: SearchConfig) -> GeminiResult<Self> {
        let http = Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .map_err(GeminiError::ClientBuild)?;
        Ok(Self { http, cfg })
    }

    /// # Errors
    ///
    /// Fails on transport errors or a non-success response. No results is not an error.
    pub async fn search(&self, query: &str) -> GeminiResult<Vec<RetrievedSnippet>> {
        let endpoint = self.cfg.endpoint();
        let body = search_request_body(&self.cfg, query);
        tracing::info!(%endpoint, "initiating search for query: {query:?}");

        let started = Instant::now();
        let value = send_with_retry(|| {
            self.http
                .post(&endpoint)
                .bearer_auth(&self.cfg.access_token)
                .json(&body)
        })
        .await?;
        let response: SearchResponse = serde_json::from_value(value)?;

        tracing::info!(
            total_size = response.total_size,
            results = response.results.len(),
            "search completed in {}ms",
            started.elapsed().as_millis()
        );
        if response.results.is_empty() {
            tracing::warn!("no results returned from search");
        }

        Ok(response
            .results
            .into_iter()
            .map(|r| to_snippet(r, &self.cfg.fallback_uri_prefix))
            .collect())
    }
}

#[async_trait]
impl Retriever for SearchClient {
    async fn retrieve(&self, query: &str) -> CoreResult<Vec<RetrievedSnippet>> {
        Ok(self.search(query).await?)
    }
}
