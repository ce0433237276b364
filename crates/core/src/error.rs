use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt pdf document: {0}")]
    CorruptDocument(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl IngestError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, IngestError::NotFound(_))
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid response from {backend} ({status}): {details}")]
    BackendResponse {
        backend: String,
        status: u16,
        details: String,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("request failed: {0}")]
    Request(String),

    #[error("backend not available yet: {0}")]
    NotReady(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("chunk overlap {overlap} must be smaller than chunk size {chunk_size}")]
    ChunkOverlap { chunk_size: usize, overlap: usize },

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum RagError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("upstream service error: {0}")]
    Upstream(#[from] ServiceError),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("background task failed: {0}")]
    Task(String),
}

impl RagError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RagError::Ingest(error) if error.is_not_found())
    }
}
