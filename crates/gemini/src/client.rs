//! Generative-language API client.

use crate::config::GeminiConfig;
use crate::error::{GeminiError, GeminiResult};
use async_trait::async_trait;
use medpulse_core::{CoreResult, Embedder, Generator, ResponseFormat};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::time::sleep;

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Option<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

pub(crate) fn embed_request_body(model: &str, text: &str) -> Value {
    json!({
        "model": format!("models/{model}"),
        "content": { "parts": [{ "text": text }] }
    })
}

pub(crate) fn generate_request_body(prompt: &str, format: &ResponseFormat) -> Value {
    let mut body = json!({
        "contents": [{ "parts": [{ "text": prompt }] }]
    });
    match format {
        ResponseFormat::Text => {}
        ResponseFormat::Json => {
            body["generationConfig"] = json!({ "responseMimeType": "application/json" });
        }
        ResponseFormat::Schema(schema) => {
            body["generationConfig"] = json!({
                "responseMimeType": "application/json",
                "responseSchema": schema
            });
        }
    }
    body
}

/// Concatenated text of the first candidate.
fn candidate_text(response: GenerateResponse) -> GeminiResult<String> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(GeminiError::NoCandidates)?;
    Ok(candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<String>())
        .unwrap_or_default())
}

/// Interprets generated text according to the requested format.
///
/// Empty JSON output reads as `{}`.
pub(crate) fn parse_generated(text: &str, format: &ResponseFormat) -> GeminiResult<Value> {
    match format {
        ResponseFormat::Text => Ok(Value::String(text.to_string())),
        ResponseFormat::Json | ResponseFormat::Schema(_) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(json!({}));
            }
            Ok(serde_json::from_str(text)?)
        }
    }
}

/// Error message from an API error body, falling back to the status text.
pub(crate) fn api_error(status: StatusCode, body: &str) -> GeminiError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| "Unknown API Error".into());
    GeminiError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Sends a request, retrying transport errors and `429 Too Many Requests` with a linear backoff.
pub(crate) async fn send_with_retry<F>(build: F) -> GeminiResult<Value>
where
    F: Fn() -> RequestBuilder,
{
    let mut retries = 0;
    loop {
        match build().send().await {
            Ok(response) => {
                let status = response.status();
                if status == StatusCode::TOO_MANY_REQUESTS && retries < MAX_RETRIES {
                    retries += 1;
                    tracing::warn!("rate limited, retrying ({retries}/{MAX_RETRIES})");
                    sleep(Duration::from_millis(RETRY_DELAY_MS * u64::from(retries))).await;
                    continue;
                }
                let body = response.text().await?;
                if !status.is_success() {
                    return Err(api_error(status, &body));
                }
                return Ok(serde_json::from_str(&body)?);
            }
            Err(e) if retries < MAX_RETRIES && (e.is_timeout() || e.is_connect()) => {
                retries += 1;
                tracing::warn!("request failed, retrying ({retries}/{MAX_RETRIES}): {e}");
                sleep(Duration::from_millis(RETRY_DELAY_MS * u64::from(retries))).await;
            }
            Err(e) => return Err(GeminiError::Http(e)),
        }
    }
}

/// Client for the generative-language REST API.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    cfg: GeminiConfig,
}

impl GeminiClient {
    /// # Errors
    ///
    /// Returns `GeminiError::ClientBuild` if the HTTP client cannot be constructed.
    pub fn new(cfg: GeminiConfig) -> GeminiResult<Self> {
        let http = Client::builder()
            .timeout(cfg.timeout())
            .build()
            .map_err(GeminiError::ClientBuild)?;
        Ok(Self { http, cfg })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.cfg
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{model}:{method}", self.cfg.base_url())
    }

    async fn post(&self, url: &str, body: &Value) -> GeminiResult<Value> {
        send_with_retry(|| {
            self.http
                .post(url)
                .header("x-goog-api-key", self.cfg.api_key())
                .json(body)
        })
        .await
    }

    /// # Errors
    ///
    /// Fails on transport errors or a non-success response.
    pub async fn try_embed(&self, text: &str) -> GeminiResult<Vec<f32>> {
        let model = self.cfg.embedding_model();
        let url = self.model_url(model, "embedContent");
        let value = self.post(&url, &embed_request_body(model, text)).await?;
        let response: EmbedResponse = serde_json::from_value(value)?;
        Ok(response.embedding.map(|e| e.values).unwrap_or_default())
    }

    /// # Errors
    ///
    /// Fails on transport errors, a non-success response, an empty candidate list, or generated
    /// text that is not JSON when JSON was requested.
    pub async fn try_generate(&self, prompt: &str, format: &ResponseFormat) -> GeminiResult<Value> {
        let url = self.model_url(self.cfg.generation_model(), "generateContent");
        let started = Instant::now();
        let value = self.post(&url, &generate_request_body(prompt, format)).await?;
        tracing::debug!(
            "generation call completed in {}ms",
            started.elapsed().as_millis()
        );
        let response: GenerateResponse = serde_json::from_value(value)?;
        parse_generated(&candidate_text(response)?, format)
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed(&self, text: &str) -> Vec<f32> {
        match self.try_embed(text).await {
            Ok(values) => values,
            Err(e) => {
                tracing::error!("failed to get embedding: {e}");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, prompt: &str, format: &ResponseFormat) -> CoreResult<Value> {
        Ok(self.try_generate(prompt, format).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_body_names_the_model() {
        let body = embed_request_body("text-embedding-004", "mild cold");
        assert_eq!(body["model"], "models/text-embedding-004");
        assert_eq!(body["content"]["parts"][0]["text"], "mild cold");
    }

    #[test]
    fn generation_config_follows_response_format() {
        let text = generate_request_body("hi", &ResponseFormat::Text);
        assert!(text.get("generationConfig").is_none());

        let json_mode = generate_request_body("hi", &ResponseFormat::Json);
        assert_eq!(
            json_mode["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert!(json_mode["generationConfig"].get("responseSchema").is_none());

        let schema = json!({ "type": "OBJECT" });
        let schema_mode = generate_request_body("hi", &ResponseFormat::Schema(schema.clone()));
        assert_eq!(schema_mode["generationConfig"]["responseSchema"], schema);
        assert_eq!(schema_mode["contents"][0]["parts"][0]["text"], "hi");
    }

    #[test]
    fn candidate_parts_are_concatenated() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] } },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }))
        .expect("response");
        assert_eq!(candidate_text(response).expect("text"), "{\"a\":1}");
    }

    #[test]
    fn missing_candidates_is_an_error() {
        let response: GenerateResponse =
            serde_json::from_value(json!({})).expect("response");
        assert!(matches!(
            candidate_text(response),
            Err(GeminiError::NoCandidates)
        ));
    }

    #[test]
    fn generated_text_is_parsed_per_format() {
        assert_eq!(
            parse_generated("Connection Successful", &ResponseFormat::Text).expect("text"),
            Value::String("Connection Successful".into())
        );
        assert_eq!(
            parse_generated("  ", &ResponseFormat::Json).expect("empty"),
            json!({})
        );
        assert_eq!(
            parse_generated("{\"score\": 80}", &ResponseFormat::Json).expect("json"),
            json!({ "score": 80 })
        );
        assert!(matches!(
            parse_generated("not json", &ResponseFormat::Json),
            Err(GeminiError::MalformedJson(_))
        ));
    }

    #[test]
    fn api_error_prefers_body_message() {
        let err = api_error(
            StatusCode::FORBIDDEN,
            r#"{"error":{"code":403,"message":"API key not valid"}}"#,
        );
        match err {
            GeminiError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("expected Api, got {other:?}"),
        }

        let err = api_error(StatusCode::BAD_GATEWAY, "<html>");
        assert_eq!(err.to_string(), "API error (502): Bad Gateway");
    }

    #[test]
    fn embed_response_without_values_is_empty() {
        let response: EmbedResponse =
            serde_json::from_value(json!({ "embedding": {} })).expect("response");
        assert!(response.embedding.map(|e| e.values).unwrap_or_default().is_empty());
    }
}
