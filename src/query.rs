//! Query service: validated, domain-scoped nearest-neighbor search.
//!
//! Input bounds are checked before any embedding or index work happens; a
//! rejected query never initializes the lazy providers.
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::embedder::{EmbedderError, LazyEmbedder};
use crate::index::{IndexError, LazyVectorIndex};

/// Minimum query length in characters.
pub const MIN_QUERY_CHARS: usize = 2;
/// Result count bounds.
pub const MAX_RESULTS: usize = 50;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("invalid query: {0}")]
    InvalidInput(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedderError),

    /// Any vector index failure during search, surfaced once, not retried.
    #[error("search failed: {0}")]
    Search(#[from] IndexError),
}

/// A scored chunk returned to the caller. Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    /// File the chunk originated from.
    pub source: String,
    pub score: f64,
}

/// Read-only search over one domain at a time.
#[derive(Clone)]
pub struct QueryService {
    embedder: Arc<LazyEmbedder>,
    index: Arc<LazyVectorIndex>,
}

impl QueryService {
    #[must_use]
    pub fn new(embedder: Arc<LazyEmbedder>, index: Arc<LazyVectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Return up to `k` nearest chunks within a single domain.
    ///
    /// Hits preserve the index's similarity order; a domain with no ingested
    /// chunks yields an empty list, not an error.
    pub async fn search(
        &self,
        query: &str,
        domain: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, QueryError> {
        if query.chars().count() < MIN_QUERY_CHARS {
            return Err(QueryError::InvalidInput(format!(
                "query must be at least {MIN_QUERY_CHARS} characters"
            )));
        }
        if domain.is_empty() {
            return Err(QueryError::InvalidInput(
                "domain slug must not be empty".to_string(),
            ));
        }
        if k == 0 || k > MAX_RESULTS {
            return Err(QueryError::InvalidInput(format!(
                "result count must be between 1 and {MAX_RESULTS}, got {k}"
            )));
        }

        let embedder = self.embedder.get().await?;
        let query_vector = embedder.embed(query)?;

        let index = self.index.get().await?;
        let hits = index.lock().await.search(&query_vector, domain, k)?;

        Ok(hits
            .into_iter()
            .map(|hit| SearchHit {
                id: hit.id,
                text: hit.text,
                source: hit.source,
                score: hit.score,
            })
            .collect())
    }
}
