//! Metadata store: one durable row per chunk for provenance and audit.
//!
//! Vectors themselves live only in the vector index; this store records which
//! chunks exist, the domain and source file they came from, and their
//! embedding dimensionality. It is always written first: a row may transiently
//! exist without its vector, a vector never without its row.
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Result, params};
use tracing::info;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS chunk_records (
    id TEXT PRIMARY KEY,
    domain TEXT NOT NULL,
    source TEXT NOT NULL,
    dimensions INTEGER NOT NULL,
    created_at DATETIME NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunk_domain ON chunk_records(domain);
CREATE INDEX IF NOT EXISTS idx_chunk_source ON chunk_records(source);
"#;

/// A chunk row to be written (borrowed form, one per chunk).
#[derive(Debug, Clone)]
pub struct NewChunkRecord<'a> {
    pub id: &'a str,
    pub domain: &'a str,
    pub source: &'a str,
    pub dimensions: usize,
}

/// A chunk row read back from the store.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub domain: String,
    pub source: String,
    pub dimensions: usize,
    pub created_at: DateTime<Utc>,
}

/// Wrapper around the metadata SQLite connection.
pub struct MetadataStore {
    conn: Connection,
}

impl MetadataStore {
    /// Open the store at the given path and initialize the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening metadata store: {}", path.display());

        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    /// Open an in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    /// Insert all rows for one file in a single transaction.
    ///
    /// The transaction is the unit of atomicity for that file; it never spans
    /// other files.
    pub fn insert_records(&mut self, records: &[NewChunkRecord<'_>]) -> Result<()> {
        let now = Utc::now();
        let tx = self.conn.transaction()?;

        for record in records {
            tx.execute(
                "INSERT INTO chunk_records (id, domain, source, dimensions, created_at)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    record.id,
                    record.domain,
                    record.source,
                    record.dimensions as i64,
                    now
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Number of chunk rows recorded for a domain.
    pub fn count_for_domain(&self, domain: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM chunk_records WHERE domain = ?",
            params![domain],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// All chunk rows for a domain, newest first.
    pub fn list_for_domain(&self, domain: &str) -> Result<Vec<ChunkRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, domain, source, dimensions, created_at
             FROM chunk_records
             WHERE domain = ?
             ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map(params![domain], |row| {
            Ok(ChunkRecord {
                id: row.get(0)?,
                domain: row.get(1)?,
                source: row.get(2)?,
                dimensions: row.get::<_, i64>(3)? as usize,
                created_at: row.get(4)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_count() {
        let mut store = MetadataStore::open_in_memory().unwrap();

        let records = vec![
            NewChunkRecord {
                id: "id-1",
                domain: "stats",
                source: "notes.md",
                dimensions: 384,
            },
            NewChunkRecord {
                id: "id-2",
                domain: "stats",
                source: "notes.md",
                dimensions: 384,
            },
        ];
        store.insert_records(&records).unwrap();

        assert_eq!(store.count_for_domain("stats").unwrap(), 2);
        assert_eq!(store.count_for_domain("biology").unwrap(), 0);
    }

    #[test]
    fn test_list_for_domain() {
        let mut store = MetadataStore::open_in_memory().unwrap();

        store
            .insert_records(&[NewChunkRecord {
                id: "id-1",
                domain: "stats",
                source: "intro.pdf",
                dimensions: 384,
            }])
            .unwrap();

        let records = store.list_for_domain("stats").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "id-1");
        assert_eq!(records[0].source, "intro.pdf");
        assert_eq!(records[0].dimensions, 384);
        assert!(records[0].created_at <= Utc::now());
    }

    #[test]
    fn test_duplicate_id_rolls_back_whole_batch() {
        let mut store = MetadataStore::open_in_memory().unwrap();

        store
            .insert_records(&[NewChunkRecord {
                id: "id-1",
                domain: "stats",
                source: "a.md",
                dimensions: 384,
            }])
            .unwrap();

        // Second batch contains a fresh id followed by a colliding one; the
        // transaction must leave neither behind.
        let err = store.insert_records(&[
            NewChunkRecord {
                id: "id-2",
                domain: "stats",
                source: "b.md",
                dimensions: 384,
            },
            NewChunkRecord {
                id: "id-1",
                domain: "stats",
                source: "b.md",
                dimensions: 384,
            },
        ]);
        assert!(err.is_err());
        assert_eq!(store.count_for_domain("stats").unwrap(), 1);
    }
}
