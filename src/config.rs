/// Configuration module for ragline.
///
/// Handles loading, validating, and providing default configuration values.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ── Default value functions ──────────────────────────────────────────

fn default_domains_root() -> String {
    "./domains".to_string()
}

fn default_metadata_db_path() -> String {
    "./metadata.db".to_string()
}

fn default_index_db_path() -> String {
    "./vectors.db".to_string()
}

fn default_collection() -> String {
    "doc_chunks".to_string()
}

fn default_chunk_size() -> usize {
    crate::chunker::DEFAULT_CHUNK_SIZE
}

fn default_search_top_k() -> usize {
    5
}

fn default_model_name() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_dimensions() -> usize {
    384
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Root directory holding `<slug>/trusted/` document directories.
    #[serde(default = "default_domains_root")]
    pub domains_root: String,

    #[serde(default = "default_metadata_db_path")]
    pub metadata_db_path: String,

    #[serde(default = "default_index_db_path")]
    pub index_db_path: String,

    /// Name of the vector index collection shared by all domains.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Maximum chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,

    /// Expected embedding dimensionality. Must match both the model output
    /// and the vector index collection; a mismatch is a fatal configuration
    /// error detected at first use, not per call.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            domains_root: default_domains_root(),
            metadata_db_path: default_metadata_db_path(),
            index_db_path: default_index_db_path(),
            collection: default_collection(),
            chunk_size: default_chunk_size(),
            search_top_k: default_search_top_k(),
            model: ModelConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            dimensions: default_dimensions(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl ModelConfig {
    /// Local directory where model files live (downloaded on first use).
    #[must_use]
    pub fn model_dir(&self) -> PathBuf {
        PathBuf::from("models").join(&self.name)
    }
}

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and optionally
    /// generates a template file.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            // Generate template only for the default path
            if path == "config.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(self.search_top_k > 0, "search_top_k must be positive");
        anyhow::ensure!(
            self.model.dimensions > 0,
            "model.dimensions must be positive"
        );
        anyhow::ensure!(!self.collection.is_empty(), "collection must not be empty");
        anyhow::ensure!(
            !self.domains_root.is_empty(),
            "domains_root must not be empty"
        );
        Ok(())
    }

    /// Directory of trusted input files for one domain.
    #[must_use]
    pub fn trusted_dir(&self, slug: &str) -> PathBuf {
        Path::new(&self.domains_root).join(slug).join("trusted")
    }
}

// ── Tests ────────────────────────────────────────────────────────────
