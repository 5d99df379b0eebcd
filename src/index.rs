//! Vector index client over SQLite + sqlite-vec.
//!
//! Owns the collection lifecycle (create if absent, never altered or deleted)
//! and exposes id-keyed upsert plus domain-filtered cosine nearest-neighbor
//! search. Lives in its own database, separate from the metadata store: the
//! two are written by a deliberate two-phase sequence, not one transaction.
use std::path::{Path, PathBuf};
use std::sync::Once;

use rusqlite::{Connection, params};
use sqlite_vec::sqlite3_vec_init;
use thiserror::Error;
use tokio::sync::{Mutex as TokioMutex, OnceCell};
use tracing::info;

/// Similarity metric fixed at collection creation.
const METRIC: &str = "cosine";

#[derive(Error, Debug)]
pub enum IndexError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// Existing collection was created with a different dimensionality.
    /// Collection configuration is immutable, so this is fatal.
    #[error("collection {name} exists with {existing} dimensions, configuration expects {configured}")]
    DimensionMismatch {
        name: String,
        existing: usize,
        configured: usize,
    },

    #[error("collection {name} exists with metric {existing}, configuration expects cosine")]
    MetricMismatch { name: String, existing: String },

    #[error("vector has {actual} dimensions, collection expects {expected}")]
    VectorShape { expected: usize, actual: usize },

    #[error("batch length mismatch: {ids} ids, {vectors} vectors, {payloads} payloads")]
    BatchLengthMismatch {
        ids: usize,
        vectors: usize,
        payloads: usize,
    },
}

/// Payload stored alongside each vector entry.
#[derive(Debug, Clone)]
pub struct Payload {
    pub text: String,
    pub source: String,
    pub domain: String,
}

/// One scored entry returned by [`VectorIndex::search`].
#[derive(Debug, Clone)]
pub struct Hit {
    pub id: String,
    pub text: String,
    pub source: String,
    pub domain: String,
    /// Cosine similarity of the entry to the query vector.
    pub score: f64,
}

static INIT_VEC: Once = Once::new();

/// Initialize the sqlite-vec extension. Safe to call multiple times.
fn init_sqlite_vec() {
    INIT_VEC.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Handle to the vector database and its single named collection.
#[derive(Debug)]
pub struct VectorIndex {
    conn: Connection,
    collection: String,
    dimensions: usize,
}

impl VectorIndex {
    /// Open the index database and provision the collection if absent.
    pub fn open<P: AsRef<Path>>(
        path: P,
        collection: &str,
        dimensions: usize,
    ) -> Result<Self, IndexError> {
        let path = path.as_ref();
        info!("Opening vector index: {}", path.display());

        init_sqlite_vec();
        let conn = Connection::open(path)?;

        let vec_version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
        info!("sqlite-vec version: {}", vec_version);

        let index = Self {
            conn,
            collection: collection.to_string(),
            dimensions,
        };
        index.ensure_collection()?;
        Ok(index)
    }

    /// Open an in-memory index (useful for testing).
    pub fn open_in_memory(collection: &str, dimensions: usize) -> Result<Self, IndexError> {
        init_sqlite_vec();
        let conn = Connection::open_in_memory()?;
        let index = Self {
            conn,
            collection: collection.to_string(),
            dimensions,
        };
        index.ensure_collection()?;
        Ok(index)
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Create the collection if absent; verify its fixed configuration if not.
    ///
    /// Concurrent first-time callers may both attempt creation; the
    /// conflict-ignoring insert and `IF NOT EXISTS` tables make the second
    /// attempt a harmless no-op rather than an error.
    fn ensure_collection(&self) -> Result<(), IndexError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                dimensions INTEGER NOT NULL,
                metric TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        let created = self.conn.execute(
            "INSERT INTO collections (name, dimensions, metric) VALUES (?, ?, ?)
             ON CONFLICT(name) DO NOTHING",
            params![self.collection, self.dimensions as i64, METRIC],
        )?;

        // Read back whatever won; an existing collection's configuration is
        // authoritative and must match ours exactly.
        let (existing_dims, existing_metric): (i64, String) = self.conn.query_row(
            "SELECT dimensions, metric FROM collections WHERE name = ?",
            params![self.collection],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        if existing_dims as usize != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                name: self.collection.clone(),
                existing: existing_dims as usize,
                configured: self.dimensions,
            });
        }
        if existing_metric != METRIC {
            return Err(IndexError::MetricMismatch {
                name: self.collection.clone(),
                existing: existing_metric,
            });
        }

        self.conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS entries (
                id INTEGER PRIMARY KEY,
                point_id TEXT NOT NULL UNIQUE,
                text TEXT NOT NULL,
                source TEXT NOT NULL,
                domain TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_entries_domain ON entries(domain);

            CREATE VIRTUAL TABLE IF NOT EXISTS vec_entries USING vec0(
                embedding FLOAT[{}]
            );
            "#,
            self.dimensions
        ))?;

        if created > 0 {
            info!(
                "Created collection {} ({} dimensions, {METRIC})",
                self.collection, self.dimensions
            );
        }
        Ok(())
    }

    /// Insert or overwrite entries keyed by `ids`, all-or-nothing.
    ///
    /// A failure anywhere rolls back the whole batch; no partial chunks are
    /// left behind for the caller's file.
    pub fn upsert(
        &mut self,
        ids: &[String],
        vectors: &[Vec<f32>],
        payloads: &[Payload],
    ) -> Result<(), IndexError> {
        if ids.len() != vectors.len() || ids.len() != payloads.len() {
            return Err(IndexError::BatchLengthMismatch {
                ids: ids.len(),
                vectors: vectors.len(),
                payloads: payloads.len(),
            });
        }

        for vector in vectors {
            if vector.len() != self.dimensions {
                return Err(IndexError::VectorShape {
                    expected: self.dimensions,
                    actual: vector.len(),
                });
            }
        }

        let tx = self.conn.transaction()?;

        for ((id, vector), payload) in ids.iter().zip(vectors).zip(payloads) {
            let rowid: i64 = tx.query_row(
                r#"
                INSERT INTO entries (point_id, text, source, domain)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(point_id) DO UPDATE SET
                    text = excluded.text,
                    source = excluded.source,
                    domain = excluded.domain
                RETURNING id
                "#,
                params![id, payload.text, payload.source, payload.domain],
                |row| row.get(0),
            )?;

            // vec0 tables have no ON CONFLICT; replace by rowid
            tx.execute("DELETE FROM vec_entries WHERE rowid = ?", params![rowid])?;
            tx.execute(
                "INSERT INTO vec_entries (rowid, embedding) VALUES (?, ?)",
                params![rowid, serialize_vector(vector)],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Nearest entries to `query_vector` whose payload `domain` matches
    /// exactly, ordered by cosine distance, at most `limit` of them.
    pub fn search(
        &self,
        query_vector: &[f32],
        domain: &str,
        limit: usize,
    ) -> Result<Vec<Hit>, IndexError> {
        if query_vector.len() != self.dimensions {
            return Err(IndexError::VectorShape {
                expected: self.dimensions,
                actual: query_vector.len(),
            });
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                e.point_id,
                e.text,
                e.source,
                e.domain,
                vec_distance_cosine(v.embedding, ?) AS distance
            FROM vec_entries v
            JOIN entries e ON v.rowid = e.id
            WHERE e.domain = ?
            ORDER BY distance ASC
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map(
            params![serialize_vector(query_vector), domain, limit as i64],
            |row| {
                let distance: f64 = row.get(4)?;
                Ok(Hit {
                    id: row.get(0)?,
                    text: row.get(1)?,
                    source: row.get(2)?,
                    domain: row.get(3)?,
                    score: 1.0 - distance,
                })
            },
        )?;

        let mut hits = Vec::new();
        for row in rows {
            hits.push(row?);
        }
        Ok(hits)
    }

    /// Number of entries, optionally restricted to one domain.
    pub fn count(&self, domain: Option<&str>) -> Result<usize, IndexError> {
        let count: i64 = match domain {
            Some(d) => self.conn.query_row(
                "SELECT COUNT(*) FROM entries WHERE domain = ?",
                params![d],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?,
        };
        Ok(count as usize)
    }
}

/// Serialize a float32 vector into bytes for the vec0 virtual table.
pub fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Process-shared vector index, opened and provisioned on first use.
///
/// Same initialization-barrier pattern as the embed provider: nothing touches
/// the database until the first `get`, concurrent first callers converge on
/// one handle, and a failed open is retried on the next call.
pub struct LazyVectorIndex {
    cell: OnceCell<TokioMutex<VectorIndex>>,
    path: PathBuf,
    collection: String,
    dimensions: usize,
}

impl LazyVectorIndex {
    #[must_use]
    pub fn new(path: PathBuf, collection: String, dimensions: usize) -> Self {
        Self {
            cell: OnceCell::new(),
            path,
            collection,
            dimensions,
        }
    }

    /// Wrap an already-open index (tests).
    #[must_use]
    pub fn preopened(index: VectorIndex) -> Self {
        let collection = index.collection().to_string();
        let dimensions = index.dimensions();
        Self {
            cell: OnceCell::new_with(Some(TokioMutex::new(index))),
            path: PathBuf::new(),
            collection,
            dimensions,
        }
    }

    /// Get the shared index, opening and provisioning it on first use.
    pub async fn get(&self) -> Result<&TokioMutex<VectorIndex>, IndexError> {
        self.cell
            .get_or_try_init(|| async {
                let index = VectorIndex::open(&self.path, &self.collection, self.dimensions)?;
                Ok(TokioMutex::new(index))
            })
            .await
    }
}
