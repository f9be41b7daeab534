use medpulse_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(reqwest::Error),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("response is not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error("response contained no candidates")]
    NoCandidates,
}

pub type GeminiResult<T> = std::result::Result<T, GeminiError>;

impl From<GeminiError> for CoreError {
    fn from(err: GeminiError) -> Self {
        CoreError::Model(Box::new(err))
    }
}
