//! Ingestion orchestrator: one file + one domain slug in, both stores
//! updated or a single classified failure out.
//!
//! Write order is a deliberate two-phase saga: all metadata rows commit in
//! one transaction first, and only then are the vectors upserted under the
//! same identifiers. If the upsert fails, the rows stand orphaned until the
//! file is re-ingested; a vector can never exist without its row. Retry
//! granularity is the whole file, and every retry mints fresh identifiers.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex as TokioMutex;
use tracing::{error, info};
use uuid::Uuid;

use crate::chunker;
use crate::embedder::{EmbedderError, LazyEmbedder};
use crate::extract::{self, ExtractError};
use crate::index::{IndexError, LazyVectorIndex, Payload};
use crate::store::{MetadataStore, NewChunkRecord};

/// Ingestion failures, one variant per pipeline stage so callers can log
/// and retry meaningfully. All are scoped to a single file (or, for the
/// trigger variants, a single domain enumeration).
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("domain directory not found: {0}")]
    DomainNotFound(PathBuf),

    #[error("no files to ingest in {0}")]
    NoFiles(PathBuf),

    #[error("failed to list {path}: {source}")]
    ListDomain {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("metadata store write failed: {0}")]
    Metadata(#[source] rusqlite::Error),

    #[error("vector index error: {0}")]
    Index(#[from] IndexError),
}

/// Drives extract → chunk → embed → {metadata write, vector upsert} for
/// independent, concurrently-scheduled files. Cloning shares the underlying
/// stores and providers.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<TokioMutex<MetadataStore>>,
    embedder: Arc<LazyEmbedder>,
    index: Arc<LazyVectorIndex>,
    chunk_size: usize,
}

impl Ingestor {
    #[must_use]
    pub fn new(
        store: Arc<TokioMutex<MetadataStore>>,
        embedder: Arc<LazyEmbedder>,
        index: Arc<LazyVectorIndex>,
        chunk_size: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            index,
            chunk_size,
        }
    }

    /// Ingest one file into one domain. Returns the number of chunks written.
    ///
    /// A file that extracts to nothing is a successful no-op: zero chunks,
    /// zero rows, zero vectors, and the embedder is never initialized for it.
    pub async fn ingest_file(&self, path: &Path, domain: &str) -> Result<usize, IngestError> {
        let text = extract::extract_text(path)?;
        let normalized = chunker::normalize(&text);

        if normalized.is_empty() {
            info!(file = %path.display(), domain, "nothing to ingest");
            return Ok(0);
        }

        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let embedder = self.embedder.get().await?;
        let dimensions = embedder.dimensions();

        let mut ids: Vec<String> = Vec::new();
        let mut vectors: Vec<Vec<f32>> = Vec::new();
        let mut payloads: Vec<Payload> = Vec::new();

        for chunk in chunker::chunks(&normalized, self.chunk_size) {
            let vector = embedder.embed(chunk)?;
            ids.push(Uuid::new_v4().to_string());
            vectors.push(vector);
            payloads.push(Payload {
                text: chunk.to_string(),
                source: source.clone(),
                domain: domain.to_string(),
            });
        }

        // Phase one: metadata rows, one transaction for the whole file.
        {
            let records: Vec<NewChunkRecord<'_>> = ids
                .iter()
                .zip(&payloads)
                .map(|(id, payload)| NewChunkRecord {
                    id,
                    domain: &payload.domain,
                    source: &payload.source,
                    dimensions,
                })
                .collect();

            let mut store = self.store.lock().await;
            store
                .insert_records(&records)
                .map_err(IngestError::Metadata)?;
        }

        // Phase two: vectors, only after the metadata commit.
        {
            let index = self.index.get().await?;
            let mut index = index.lock().await;
            index.upsert(&ids, &vectors, &payloads)?;
        }

        info!(file = %path.display(), domain, chunks = ids.len(), "ingested");
        Ok(ids.len())
    }

    /// Trigger interface: enumerate the files in a domain's trusted directory
    /// (see [`Config::trusted_dir`](crate::config::Config::trusted_dir)) and
    /// queue one independent ingestion task per file.
    ///
    /// Reports back only the number of files queued; per-file outcomes are
    /// logged by the tasks themselves and failures leave sibling files
    /// unaffected.
    pub fn queue_domain(&self, trusted: &Path, slug: &str) -> Result<usize, IngestError> {
        if !trusted.is_dir() {
            return Err(IngestError::DomainNotFound(trusted.to_path_buf()));
        }
        let dir = trusted.to_path_buf();

        let entries = std::fs::read_dir(&dir).map_err(|source| IngestError::ListDomain {
            path: dir.clone(),
            source,
        })?;

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| IngestError::ListDomain {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }

        if files.is_empty() {
            return Err(IngestError::NoFiles(dir));
        }

        let queued = files.len();
        for file in files {
            let ingestor = self.clone();
            let domain = slug.to_string();
            tokio::spawn(async move {
                if let Err(e) = ingestor.ingest_file(&file, &domain).await {
                    error!(file = %file.display(), domain, "ingestion failed: {e}");
                }
            });
        }

        info!(domain = slug, queued, "queued domain for ingestion");
        Ok(queued)
    }
}
