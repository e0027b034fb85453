use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("spreadsheet parse error: {0}")]
    SheetParse(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("embedding provider failed: {0}")]
    Embedding(String),

    #[error("document store error: {0}")]
    Store(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("retrieval query failed: {0}")]
    Retrieval(String),

    #[error("completion request failed: {0}")]
    Completion(String),

    #[error("store request failed: {0}")]
    Store(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
