use crate::error::{GeminiError, GeminiResult};
use std::time::Duration;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
pub const DEFAULT_SEARCH_BASE_URL: &str = "https://discoveryengine.googleapis.com";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for the generative-language API.
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    api_key: String,
    base_url: String,
    generation_model: String,
    embedding_model: String,
    timeout: Duration,
}

impl GeminiConfig {
    /// # Errors
    ///
    /// Returns `GeminiError::InvalidConfig` if `api_key` is blank.
    pub fn new(api_key: impl Into<String>) -> GeminiResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GeminiError::InvalidConfig("API key is required".into()));
        }
        Ok(Self {
            api_key,
            base_url: DEFAULT_GEMINI_BASE_URL.into(),
            generation_model: DEFAULT_GENERATION_MODEL.into(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Overrides the API base URL. `None` or a blank value keeps the default.
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        if let Some(url) = base_url.map(|u| u.trim().trim_end_matches('/').to_string()) {
            if !url.is_empty() {
                self.base_url = url;
            }
        }
        self
    }

    pub fn with_models(
        mut self,
        generation_model: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Self {
        self.generation_model = generation_model.into();
        self.embedding_model = embedding_model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn generation_model(&self) -> &str {
        &self.generation_model
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Location of a discovery-engine serving config plus the bearer token used to call it.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub base_url: String,
    pub project_id: String,
    pub location: String,
    pub collection: String,
    pub engine_id: String,
    pub serving_config: String,
    pub access_token: String,
    pub page_size: u32,
    pub language_code: String,
    pub time_zone: String,
    /// Prefix for the URI of results that carry no link of their own.
    pub fallback_uri_prefix: String,
}

impl SearchConfig {
    /// Config with the default location, collection and serving config.
    ///
    /// # Errors
    ///
    /// Returns `GeminiError::InvalidConfig` if any argument is blank.
    pub fn new(
        project_id: impl Into<String>,
        engine_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> GeminiResult<Self> {
        let project_id = project_id.into();
        let engine_id = engine_id.into();
        let access_token = access_token.into();
        for (name, value) in [
            ("project id", &project_id),
            ("engine id", &engine_id),
            ("access token", &access_token),
        ] {
            if value.trim().is_empty() {
                return Err(GeminiError::InvalidConfig(format!("search {name} is required")));
            }
        }

        Ok(Self {
            base_url: DEFAULT_SEARCH_BASE_URL.into(),
            project_id,
            location: "global".into(),
            collection: "default_collection".into(),
            engine_id,
            serving_config: "default_search".into(),
            access_token,
            page_size: 10,
            language_code: "en-US".into(),
            time_zone: "Asia/Calcutta".into(),
            fallback_uri_prefix: "gs://medpulse-mvp-store/".into(),
        })
    }

    /// Full `:search` URL for this serving config.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1alpha/projects/{}/locations/{}/collections/{}/engines/{}/servingConfigs/{}:search",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            self.location,
            self.collection,
            self.engine_id,
            self.serving_config,
        )
    }
}
