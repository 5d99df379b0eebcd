/// Embedder trait, shared error type, and the lazily-provisioned handle
/// passed by reference into the ingestion and query paths.
pub mod download;
pub mod mock;
pub mod onnx;
pub mod tokenizer;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::ModelConfig;
use onnx::OnnxEmbedder;

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),

    /// The configured dimensionality does not match the model's actual
    /// output length. Fatal configuration error, detected once at
    /// construction rather than per call.
    #[error("model produces {actual}-dimensional vectors, configuration expects {configured}")]
    DimensionMismatch { configured: usize, actual: usize },
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow concurrent use behind
/// `Arc`. An implementation may serialize in-flight calls internally; callers
/// must not assume parallel throughput from a single instance.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Embed multiple text strings into vectors.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;
}

/// Process-shared embedding provider, constructed on first use.
///
/// Model download and ONNX session construction are expensive, so nothing
/// happens until the first `get` call; concurrent first callers are funneled
/// through a single `OnceCell` initialization. A failed initialization is not
/// cached and the next call retries.
pub struct LazyEmbedder {
    cell: OnceCell<Arc<dyn Embedder>>,
    model: ModelConfig,
}

impl LazyEmbedder {
    #[must_use]
    pub fn new(model: ModelConfig) -> Self {
        Self {
            cell: OnceCell::new(),
            model,
        }
    }

    /// Wrap an already-constructed embedder (tests, model-less operation).
    #[must_use]
    pub fn preloaded(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            cell: OnceCell::new_with(Some(embedder)),
            model: ModelConfig::default(),
        }
    }

    /// Get the shared embedder, constructing it on first use.
    pub async fn get(&self) -> Result<Arc<dyn Embedder>, EmbedderError> {
        let embedder = self
            .cell
            .get_or_try_init(|| async {
                let model = self.model.clone();
                info!("Provisioning embedder for model {}", model.name);

                // reqwest::blocking and ONNX session construction must not
                // run on an async runtime thread.
                let built = tokio::task::spawn_blocking(
                    move || -> Result<Arc<dyn Embedder>, EmbedderError> {
                        let model_dir = model.model_dir();
                        download::download_model_files(&model_dir)
                            .map_err(|e| EmbedderError::ModelLoadFailed(e.to_string()))?;

                        let onnx = OnnxEmbedder::new(&model_dir)?;
                        if onnx.dimensions() != model.dimensions {
                            return Err(EmbedderError::DimensionMismatch {
                                configured: model.dimensions,
                                actual: onnx.dimensions(),
                            });
                        }
                        Ok(Arc::new(onnx) as Arc<dyn Embedder>)
                    },
                )
                .await
                .map_err(|e| {
                    EmbedderError::ModelLoadFailed(format!("initialization task failed: {e}"))
                })??;

                Ok::<_, EmbedderError>(built)
            })
            .await?;

        Ok(Arc::clone(embedder))
    }
}
