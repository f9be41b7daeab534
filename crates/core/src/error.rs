#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("model call failed: {0}")]
    Model(Box<dyn std::error::Error + Send + Sync>),
    #[error("model returned an empty embedding")]
    EmptyEmbedding,
    #[error("failed to generate anchor embeddings (missing: {missing})")]
    AnchorInitialisation { missing: String },
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("similarity is undefined for a zero-magnitude embedding")]
    DegenerateSimilarity,
    #[error("model output is not valid JSON: {0}")]
    MalformedJson(serde_json::Error),

    #[error("failed to read corpus file: {0}")]
    CorpusRead(std::io::Error),
    #[error("corpus schema mismatch at {path}: {source}")]
    CorpusSchema {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid corpus: {0}")]
    InvalidCorpus(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
