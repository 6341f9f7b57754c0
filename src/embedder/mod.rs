/// Embedder trait and shared types for text embedding.
///
/// [`onnx::OnnxEmbedder`] runs all-MiniLM-L6-v2 locally; [`mock::MockEmbedder`]
/// produces deterministic vectors for tests and offline runs.
pub mod download;
pub mod mock;
pub mod onnx;
pub mod tokenizer;

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{Config, EmbeddingBackend};

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Embed multiple text strings into vectors.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;
}

/// Build the embedder selected in `config`.
///
/// Downloads model files on first use. Blocking; call from
/// `spawn_blocking` inside an async runtime.
pub fn from_config(config: &Config) -> Result<Arc<dyn Embedder>, EmbedderError> {
    let dims = config.embedding.dimensions;
    match config.embedding.backend {
        EmbeddingBackend::Mock => {
            info!("Using mock embedder ({dims} dimensions)");
            Ok(Arc::new(mock::MockEmbedder::new(dims)))
        }
        EmbeddingBackend::Onnx => {
            let model_dir = config.model_dir();
            let loaded = download::download_model_files(&model_dir)
                .map_err(|e| EmbedderError::ModelLoadFailed(format!("{e:#}")))
                .and_then(|()| onnx::OnnxEmbedder::new(&model_dir, dims));

            match loaded {
                Ok(embedder) => Ok(Arc::new(embedder)),
                Err(e) if config.embedding.fallback_to_mock => {
                    warn!("ONNX embedder unavailable ({e}); falling back to mock embedder");
                    Ok(Arc::new(mock::MockEmbedder::new(dims)))
                }
                Err(e) => Err(e),
            }
        }
    }
}
