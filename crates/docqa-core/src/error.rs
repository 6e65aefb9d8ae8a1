use thiserror::Error;

/// Errors surfaced by the docqa pipeline.
///
/// Variants follow the failure scope: configuration errors are fatal at
/// startup, extraction errors are per document, retrieval and generation
/// errors abort only the current question.
#[derive(Error, Debug)]
pub enum DocQaError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("Missing value for prompt placeholder '{{{0}}}'")]
    MissingPlaceholder(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DocQaError>;
