/// End-to-end integration tests for the ingestion and retrieval pipeline.
///
/// Covers the full flow:
///   Config → Extract → Chunk → Embed → {Metadata Store, Vector Index} → Query
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as TokioMutex;

use ragline::chunker;
use ragline::config::Config;
use ragline::embedder::LazyEmbedder;
use ragline::embedder::mock::MockEmbedder;
use ragline::index::{LazyVectorIndex, VectorIndex};
use ragline::ingest::{IngestError, Ingestor};
use ragline::query::{QueryError, QueryService};
use ragline::store::MetadataStore;

struct Pipeline {
    store: Arc<TokioMutex<MetadataStore>>,
    index: Arc<LazyVectorIndex>,
    ingestor: Arc<Ingestor>,
    query: QueryService,
}

fn pipeline(chunk_size: usize) -> Pipeline {
    let store = Arc::new(TokioMutex::new(MetadataStore::open_in_memory().unwrap()));
    let embedder = Arc::new(LazyEmbedder::preloaded(Arc::new(MockEmbedder::default())));
    let index = Arc::new(LazyVectorIndex::preopened(
        VectorIndex::open_in_memory("doc_chunks", 384).unwrap(),
    ));
    let ingestor = Arc::new(Ingestor::new(
        store.clone(),
        embedder.clone(),
        index.clone(),
        chunk_size,
    ));
    let query = QueryService::new(embedder, index.clone());
    Pipeline {
        store,
        index,
        ingestor,
        query,
    }
}

async fn vector_count(p: &Pipeline, domain: &str) -> usize {
    let index = p.index.get().await.unwrap();
    let index = index.lock().await;
    index.count(Some(domain)).unwrap()
}

/// Scenario: a 1024-character markdown file with chunk size 512 yields
/// exactly 2 metadata rows and 2 vector entries, all tagged with the slug.
#[tokio::test]
async fn test_markdown_file_splits_into_two_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("long.md");
    fs::write(&file, "x".repeat(1024)).unwrap();

    let p = pipeline(512);
    let chunks = p.ingestor.ingest_file(&file, "stats").await.unwrap();
    assert_eq!(chunks, 2);

    assert_eq!(p.store.lock().await.count_for_domain("stats").unwrap(), 2);
    assert_eq!(vector_count(&p, "stats").await, 2);

    // Every row and every hit carries the right provenance
    let rows = p.store.lock().await.list_for_domain("stats").unwrap();
    for row in &rows {
        assert_eq!(row.domain, "stats");
        assert_eq!(row.source, "long.md");
        assert_eq!(row.dimensions, 384);
    }

    let hits = p.query.search("xx", "stats", 5).await.unwrap();
    assert_eq!(hits.len(), 2);
    for hit in &hits {
        assert_eq!(hit.source, "long.md");
    }
}

/// Scenario: a PDF whose pages extract to nothing produces 0 chunks, 0 rows,
/// 0 vectors, and no error.
#[tokio::test]
async fn test_blank_pdf_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("blank.pdf");
    write_blank_pdf(&file);

    let p = pipeline(512);
    let chunks = p.ingestor.ingest_file(&file, "stats").await.unwrap();

    assert_eq!(chunks, 0);
    assert_eq!(p.store.lock().await.count_for_domain("stats").unwrap(), 0);
    assert_eq!(vector_count(&p, "stats").await, 0);
}

/// Scenario: querying a domain with no ingested chunks yields an empty hit
/// list, not an error.
#[tokio::test]
async fn test_query_empty_domain() {
    let p = pipeline(512);
    let hits = p.query.search("anything", "untouched", 5).await.unwrap();
    assert!(hits.is_empty());
}

/// Scenario: a query below the minimum length is rejected up front.
#[tokio::test]
async fn test_query_too_short_rejected() {
    let p = pipeline(512);
    let err = p.query.search("a", "stats", 5).await.unwrap_err();
    assert!(matches!(err, QueryError::InvalidInput(_)));
}

/// Metadata row count and vector entry count stay equal for every
/// successfully ingested file.
#[tokio::test]
async fn test_dual_store_counts_match() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("sampling.md"),
        "# Sampling\n\nSimple random sampling assigns every member of the population an equal \
         chance of selection. Stratified designs partition the population first.",
    )
    .unwrap();
    fs::write(
        dir.path().join("inference.md"),
        "Confidence intervals quantify the uncertainty of a point estimate. ".repeat(30),
    )
    .unwrap();

    let p = pipeline(128);
    let mut total = 0;
    for name in ["sampling.md", "inference.md"] {
        total += p
            .ingestor
            .ingest_file(&dir.path().join(name), "stats")
            .await
            .unwrap();
    }

    assert!(total > 2, "expected multiple chunks, got {total}");
    assert_eq!(p.store.lock().await.count_for_domain("stats").unwrap(), total);
    assert_eq!(vector_count(&p, "stats").await, total);
}

/// Two domains with disjoint content never leak into each other's results.
#[tokio::test]
async fn test_domain_isolation() {
    let dir = tempfile::tempdir().unwrap();
    let stats_file = dir.path().join("stats-notes.md");
    let biology_file = dir.path().join("biology-notes.md");
    fs::write(&stats_file, "Bayesian priors and posterior distributions.").unwrap();
    fs::write(&biology_file, "Mitochondria and cellular respiration.").unwrap();

    let p = pipeline(512);
    p.ingestor.ingest_file(&stats_file, "stats").await.unwrap();
    p.ingestor
        .ingest_file(&biology_file, "biology")
        .await
        .unwrap();

    let hits = p.query.search("cellular respiration", "stats", 10).await.unwrap();
    for hit in &hits {
        assert_eq!(
            hit.source, "stats-notes.md",
            "domain 'stats' must never return biology chunks"
        );
    }

    let hits = p.query.search("posterior distributions", "biology", 10).await.unwrap();
    for hit in &hits {
        assert_eq!(hit.source, "biology-notes.md");
    }
}

/// Chunk content round-trips: the ingested chunks, concatenated in search
/// order of position, reconstruct the normalized source text.
#[tokio::test]
async fn test_ingested_chunks_cover_source_text() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("doc.md");
    let body = "alpha beta gamma delta ".repeat(40);
    fs::write(&file, &body).unwrap();

    let p = pipeline(100);
    let chunks = p.ingestor.ingest_file(&file, "stats").await.unwrap();

    let hits = p.query.search("alpha beta", "stats", 50).await.unwrap();
    assert_eq!(hits.len(), chunks);

    // Hits come back in similarity order, but the slices partition the
    // normalized text, so their combined length must cover it exactly.
    let normalized = chunker::normalize(&body);
    let covered: usize = hits.iter().map(|h| h.text.chars().count()).sum();
    assert_eq!(covered, normalized.chars().count());
}

/// Write order is metadata first, vectors second. When the vector upsert
/// fails, the already-committed rows stand as orphans until the file is
/// re-ingested; the failure surfaces as the index error variant and no
/// vectors exist.
#[tokio::test]
async fn test_failed_upsert_leaves_metadata_rows_standing() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("notes.md");
    fs::write(&file, "A short note about estimators.").unwrap();

    // Collection dimensionality deliberately disagrees with the embedder's,
    // so phase one commits and phase two is rejected.
    let store = Arc::new(TokioMutex::new(MetadataStore::open_in_memory().unwrap()));
    let embedder = Arc::new(LazyEmbedder::preloaded(Arc::new(MockEmbedder::default())));
    let index = Arc::new(LazyVectorIndex::preopened(
        VectorIndex::open_in_memory("doc_chunks", 8).unwrap(),
    ));
    let ingestor = Ingestor::new(store.clone(), embedder, index.clone(), 512);

    let err = ingestor.ingest_file(&file, "stats").await.unwrap_err();
    assert!(matches!(err, IngestError::Index(_)));

    assert_eq!(store.lock().await.count_for_domain("stats").unwrap(), 1);
    let vectors = {
        let index = index.get().await.unwrap();
        let index = index.lock().await;
        index.count(Some("stats")).unwrap()
    };
    assert_eq!(vectors, 0);
}

/// Trigger interface: every trusted file of the domain is queued and
/// eventually ingested; the call reports only the queued count.
#[tokio::test]
async fn test_queue_domain_ingests_all_files() {
    let dir = tempfile::tempdir().unwrap();
    let trusted = dir.path().join("stats/trusted");
    fs::create_dir_all(&trusted).unwrap();
    fs::write(trusted.join("a.md"), "First document about estimators.").unwrap();
    fs::write(trusted.join("b.md"), "Second document about variance.").unwrap();
    fs::write(trusted.join("c.md"), "Third document about bias.").unwrap();

    let p = pipeline(512);
    let queued = p.ingestor.queue_domain(&trusted, "stats").unwrap();
    assert_eq!(queued, 3);

    // Ingestion runs on detached tasks; poll until all files landed.
    let mut rows = 0;
    for _ in 0..100 {
        rows = p.store.lock().await.count_for_domain("stats").unwrap();
        if rows == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(rows, 3, "expected all queued files to be ingested");
    assert_eq!(vector_count(&p, "stats").await, 3);
}

/// A file that fails to ingest leaves sibling files unaffected.
#[tokio::test]
async fn test_failed_file_does_not_block_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let trusted = dir.path().join("stats/trusted");
    fs::create_dir_all(&trusted).unwrap();
    fs::write(trusted.join("good.md"), "A perfectly fine document.").unwrap();
    fs::write(trusted.join("broken.pdf"), "not actually a pdf").unwrap();

    let p = pipeline(512);
    let queued = p.ingestor.queue_domain(&trusted, "stats").unwrap();
    assert_eq!(queued, 2);

    let mut rows = 0;
    for _ in 0..100 {
        rows = p.store.lock().await.count_for_domain("stats").unwrap();
        if rows == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(rows, 1, "the good file must be ingested despite the bad one");
}

/// Config defaults line up with the pipeline's expectations.
#[test]
fn test_config_defaults_and_validation() {
    let config = Config::default();

    assert_eq!(config.chunk_size, 512);
    assert_eq!(config.search_top_k, 5);
    assert_eq!(config.collection, "doc_chunks");
    assert_eq!(config.model.dimensions, 384);
    assert!(config.validate().is_ok());

    let mut bad_config = Config::default();
    bad_config.chunk_size = 0;
    assert!(bad_config.validate().is_err());
}

/// Build a one-page PDF with an empty content stream.
fn write_blank_pdf(path: &Path) {
    use lopdf::{Dictionary, Document, Object, Stream, dictionary};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let content_id = doc.add_object(Object::Stream(Stream::new(Dictionary::new(), Vec::new())));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(path).unwrap();
}
