use thiserror::Error;

pub type Result<T> = std::result::Result<T, PressError>;

#[derive(Error, Debug)]
pub enum PressError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Quota exceeded: {0}")]
    Quota(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl PressError {
    /// Whether the same call may succeed if issued again later
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PressError::Network(_) | PressError::Quota(_) | PressError::Timeout(_)
        )
    }
}

impl From<sqlx::Error> for PressError {
    #[inline]
    fn from(err: sqlx::Error) -> Self {
        PressError::Database(err.to_string())
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod generation;
mod http;
pub mod ingest;
pub mod retriever;
pub mod store;
