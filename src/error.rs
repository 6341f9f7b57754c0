//! Crate-wide error type.
use thiserror::Error;

use crate::embedder::EmbedderError;

/// Errors surfaced by the indexing, retrieval and generation pipeline.
#[derive(Error, Debug)]
pub enum RagError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("document error: {0}")]
    Document(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Anthropic API error ({status}) {kind}: {message}")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },

    #[error("Anthropic API key not found; set ANTHROPIC_API_KEY")]
    MissingApiKey,

    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Tool(String),
}

impl RagError {
    /// Whether this error means the configured API key was missing or rejected.
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        match self {
            Self::MissingApiKey => true,
            Self::Api { status, kind, .. } => {
                *status == 401 || *status == 403 || kind == "authentication_error"
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
