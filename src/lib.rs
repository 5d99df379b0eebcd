//! # ragline — Domain-scoped ingestion & vector retrieval
//!
//! Turns trusted domain documents (Markdown, PDF) into fixed-size text chunks,
//! keeps a metadata store and a vector index consistent with each other, and
//! answers domain-filtered nearest-neighbor queries via the Model Context
//! Protocol (stdio transport).
//!
//! ## Architecture
//!
//! - **[`config`]** — Configuration loading, validation, defaults
//! - **[`extract`]** — File → text (per-page PDF extraction, CommonMark rendering)
//! - **[`chunker`]** — Whitespace normalization and fixed-size chunk slicing
//! - **[`embedder`]** — Text embedding via ONNX Runtime (all-MiniLM-L6-v2), lazily provisioned
//! - **[`index`]** — SQLite + sqlite-vec vector index with collection lifecycle
//! - **[`store`]** — Chunk provenance rows (id, domain, source, dimensionality)
//! - **[`ingest`]** — Per-file ingestion orchestration and the domain trigger
//! - **[`query`]** — Validated, domain-scoped similarity search
//! - **[`mcp`]** — MCP server exposing search/ingest/status tools

pub mod chunker;
pub mod config;
pub mod embedder;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod mcp;
pub mod query;
pub mod store;
