pub mod chunker;
pub mod config;
pub mod embedder;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod mcp;
pub mod query;
pub mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::Mutex as TokioMutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::embedder::LazyEmbedder;
use crate::index::LazyVectorIndex;
use crate::ingest::Ingestor;
use crate::mcp::server::{McpContext, McpServer};
use crate::query::QueryService;
use crate::store::MetadataStore;

#[derive(Parser)]
#[command(name = "ragline", version, about = "Domain-scoped ingestion and vector retrieval MCP server")]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP transport; all logging goes to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    info!("Starting ragline...");

    // 1. Load and validate config
    let config = Config::load(&args.config)?;
    config.validate().context("invalid configuration")?;
    let config = Arc::new(config);

    // 2. Open the metadata store eagerly; it is cheap and always needed
    let store = MetadataStore::open(&config.metadata_db_path)
        .context("failed to open metadata store")?;
    let store = Arc::new(TokioMutex::new(store));

    // 3. Embedder and vector index are provisioned on first use
    let embedder = Arc::new(LazyEmbedder::new(config.model.clone()));
    let index = Arc::new(LazyVectorIndex::new(
        PathBuf::from(&config.index_db_path),
        config.collection.clone(),
        config.model.dimensions,
    ));

    // 4. Pipeline services
    let ingestor = Arc::new(Ingestor::new(
        store.clone(),
        embedder.clone(),
        index.clone(),
        config.chunk_size,
    ));
    let query = QueryService::new(embedder, index.clone());

    // 5. Start server
    let ctx = McpContext {
        config,
        store,
        index,
        ingestor,
        query,
    };
    let server = McpServer::new(ctx);
    server.start().await?;

    Ok(())
}
