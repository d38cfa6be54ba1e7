use std::collections::HashMap;
use std::time::Duration;

use keystone_index::batch::DEFAULT_BATCH_SIZE;
use keystone_index::walker::DEFAULT_EXCLUDED_DIRS;
use keystone_index::{ChunkerConfig, IndexerConfig, Lang, RetrievalConfig, WalkerConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub walker: WalkerSection,
    #[serde(default)]
    pub indexer: IndexerSection,
    #[serde(default)]
    pub retrieval: RetrievalSection,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
}

fn default_embedding_provider() -> String {
    "ollama".into()
}

fn default_embedding_base_url() -> String {
    "http://localhost:11434".into()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_collection() -> String {
    "legacy_code".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            qdrant_url: default_qdrant_url(),
            collection: default_collection(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WalkerSection {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_excluded_dirs")]
    pub excluded_dirs: Vec<String>,
    #[serde(default)]
    pub excluded_extensions: Vec<String>,
    /// Extension (without dot) to language id, e.g. `inc = "cobol"`.
    #[serde(default)]
    pub language_overrides: HashMap<String, Lang>,
    #[serde(default = "default_max_unit_size")]
    pub max_unit_size: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_excluded_dirs() -> Vec<String> {
    DEFAULT_EXCLUDED_DIRS.iter().map(ToString::to_string).collect()
}

fn default_max_unit_size() -> usize {
    ChunkerConfig::default().max_unit_size
}

impl Default for WalkerSection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            excluded_dirs: default_excluded_dirs(),
            excluded_extensions: Vec::new(),
            language_overrides: HashMap::new(),
            max_unit_size: default_max_unit_size(),
        }
    }
}

impl WalkerSection {
    #[must_use]
    pub fn to_walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            batch_size: self.batch_size,
            excluded_dirs: self.excluded_dirs.clone(),
            excluded_extensions: self.excluded_extensions.clone(),
            language_overrides: self.language_overrides.clone(),
            chunker: ChunkerConfig {
                max_unit_size: self.max_unit_size,
            },
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct IndexerSection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First retry delay; doubled on every further attempt.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Pause after each successful batch write.
    #[serde(default = "default_write_pause_ms")]
    pub write_pause_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_write_pause_ms() -> u64 {
    500
}

impl Default for IndexerSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            write_pause_ms: default_write_pause_ms(),
        }
    }
}

impl IndexerSection {
    #[must_use]
    pub fn to_indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            max_attempts: self.max_attempts,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
            write_pause: Duration::from_millis(self.write_pause_ms),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RetrievalSection {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_keyword_limit")]
    pub keyword_limit: u64,
    #[serde(default = "default_min_keyword_len")]
    pub min_keyword_len: usize,
}

fn default_top_k() -> usize {
    15
}

fn default_keyword_limit() -> u64 {
    5
}

fn default_min_keyword_len() -> usize {
    4
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            keyword_limit: default_keyword_limit(),
            min_keyword_len: default_min_keyword_len(),
        }
    }
}

impl RetrievalSection {
    #[must_use]
    pub fn to_retrieval_config(&self) -> RetrievalConfig {
        RetrievalConfig {
            top_k: self.top_k,
            keyword_limit: self.keyword_limit,
            min_keyword_len: self.min_keyword_len,
        }
    }
}
