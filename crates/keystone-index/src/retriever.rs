//! Hybrid retrieval: keyword-contains search merged ahead of semantic search.
//!
//! Keyword hits come first because a query naming an identifier wants the
//! chunk defining it at the top, whatever its embedding distance. Results are
//! deduplicated by exact text and cut to `floor(1.5 * k)`.

use std::collections::HashSet;
use std::fmt::Write;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use keystone_llm::EmbeddingProvider;
use keystone_memory::{Payload, VectorStore};

use crate::error::{IndexError, Result};
use crate::indexer::DOCUMENT_FIELD;

/// Returned when retrieval succeeded but nothing matched.
pub const NO_CONTEXT: &str = "# CONTEXT\nNo relevant context found.\n";
/// Returned when retrieval could not run at all.
pub const RETRIEVAL_FAILED: &str = "# CONTEXT RETRIEVAL FAILED\n";

const CONTEXT_HEADER: &str = "# CONTEXT FROM EXISTING APPLICATION\n\n---\n";
const UNKNOWN_PATH: &str = "Unknown Path";

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z_][a-zA-Z0-9_]*\b").unwrap());

/// Common query words that are never searched for literally. Compared lowercase.
const STOPWORDS: &[&str] = &[
    "what", "where", "when", "function", "code", "file", "does", "this", "help", "find", "show",
    "tell",
];

/// Retrieval configuration.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Semantic matches requested when the caller gives no `k` (default: 15).
    pub top_k: usize,
    /// Keyword matches fetched per keyword (default: 5).
    pub keyword_limit: u64,
    /// Shortest identifier treated as a keyword (default: 4).
    pub min_keyword_len: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 15,
            keyword_limit: 5,
            min_keyword_len: 4,
        }
    }
}

/// Which channel produced a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOrigin {
    Keyword,
    Semantic,
}

#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    /// Stored payload without the document text.
    pub metadata: Payload,
    pub origin: MatchOrigin,
    /// Similarity score, for semantic matches only.
    pub score: Option<f32>,
}

impl RetrievedChunk {
    #[must_use]
    pub fn file_path(&self) -> &str {
        self.metadata
            .get("file_path")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(UNKNOWN_PATH)
    }

    fn from_payload(id: String, mut payload: Payload, origin: MatchOrigin, score: Option<f32>) -> Self {
        let text = match payload.remove(DOCUMENT_FIELD) {
            Some(serde_json::Value::String(text)) => text,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        Self {
            id,
            text,
            metadata: payload,
            origin,
            score,
        }
    }
}

/// Result of one retrieval call.
#[derive(Debug, Default)]
pub struct RetrievedContext {
    /// Merged, deduplicated and truncated chunks, keyword matches first.
    pub chunks: Vec<RetrievedChunk>,
    pub keywords: Vec<String>,
    /// Keywords whose lookup failed.
    pub keyword_failures: usize,
    /// True when the semantic channel failed and only keyword matches were used.
    pub semantic_failed: bool,
}

/// Hybrid keyword + semantic retriever over one collection.
pub struct HybridRetriever<P: EmbeddingProvider> {
    store: Arc<dyn VectorStore>,
    provider: Arc<P>,
    collection: String,
    config: RetrievalConfig,
}

impl<P: EmbeddingProvider> HybridRetriever<P> {
    #[must_use]
    pub fn new(
        store: Arc<dyn VectorStore>,
        provider: Arc<P>,
        collection: impl Into<String>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            provider,
            collection: collection.into(),
            config,
        }
    }

    /// Retrieve up to `floor(1.5 * k)` chunks for `query`.
    ///
    /// A missing or empty collection yields an empty result. A failing
    /// keyword lookup is skipped; a failing semantic search is tolerated when
    /// at least one keyword lookup succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable, or if semantic search
    /// fails and no keyword lookup succeeded.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievedContext> {
        let mut result = RetrievedContext {
            keywords: extract_keywords(query, self.config.min_keyword_len),
            ..RetrievedContext::default()
        };

        if !self.store.collection_exists(&self.collection).await? {
            tracing::debug!(collection = %self.collection, "collection missing, no context");
            return Ok(result);
        }

        let semantic = match self.semantic_search(query, k).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!("semantic search failed: {e}");
                result.semantic_failed = true;
                Vec::new()
            }
        };

        let mut keyword_hits = Vec::new();
        for keyword in &result.keywords {
            match self
                .store
                .find_containing(
                    &self.collection,
                    DOCUMENT_FIELD,
                    keyword,
                    self.config.keyword_limit,
                )
                .await
            {
                Ok(points) => keyword_hits.extend(points.into_iter().map(|p| {
                    RetrievedChunk::from_payload(p.id, p.payload, MatchOrigin::Keyword, None)
                })),
                Err(e) => {
                    tracing::warn!(keyword = %keyword, "keyword search failed: {e}");
                    result.keyword_failures += 1;
                }
            }
        }

        let keyword_succeeded = result.keyword_failures < result.keywords.len();
        if result.semantic_failed && !keyword_succeeded {
            return Err(IndexError::Retrieval(
                "semantic search failed and no keyword search succeeded".into(),
            ));
        }

        result.chunks = merge(keyword_hits, semantic, k);
        tracing::debug!(
            chunks = result.chunks.len(),
            keywords = result.keywords.len(),
            "retrieved context"
        );
        Ok(result)
    }

    /// Rendered context block for prompt injection. Never fails: errors turn
    /// into the [`RETRIEVAL_FAILED`] sentinel, empty results into [`NO_CONTEXT`].
    pub async fn context_for(&self, query: &str, k: Option<usize>) -> String {
        let k = k.unwrap_or(self.config.top_k);
        match self.retrieve(query, k).await {
            Ok(result) => render_context(&result.chunks),
            Err(e) => {
                tracing::error!("context retrieval failed: {e}");
                RETRIEVAL_FAILED.to_string()
            }
        }
    }

    async fn semantic_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.provider.embed(query).await?;
        let limit = u64::try_from(k).unwrap_or(u64::MAX);
        let hits = self.store.search(&self.collection, vector, limit).await?;
        Ok(hits
            .into_iter()
            .map(|h| RetrievedChunk::from_payload(h.id, h.payload, MatchOrigin::Semantic, Some(h.score)))
            .collect())
    }
}

/// Identifier-like tokens of at least `min_len` characters, minus stopwords,
/// in first-occurrence order without repeats.
#[must_use]
pub fn extract_keywords(query: &str, min_len: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    IDENTIFIER_RE
        .find_iter(query)
        .map(|m| m.as_str())
        .filter(|word| word.len() >= min_len)
        .filter(|word| !STOPWORDS.contains(&word.to_lowercase().as_str()))
        .filter(|word| seen.insert(*word))
        .map(str::to_string)
        .collect()
}

/// Keyword matches first, then semantic ones, skipping any text already
/// present, cut to `floor(1.5 * k)`.
fn merge(keyword: Vec<RetrievedChunk>, semantic: Vec<RetrievedChunk>, k: usize) -> Vec<RetrievedChunk> {
    let limit = k.saturating_mul(3) / 2;
    let mut seen: HashSet<String> = HashSet::new();
    keyword
        .into_iter()
        .chain(semantic)
        .filter(|chunk| seen.insert(chunk.text.clone()))
        .take(limit)
        .collect()
}

/// Render chunks as the prompt context block, or [`NO_CONTEXT`] when empty.
#[must_use]
pub fn render_context(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return NO_CONTEXT.to_string();
    }

    let mut out = String::from(CONTEXT_HEADER);
    for chunk in chunks {
        let _ = write!(
            out,
            "### FILE: {}\n```\n{}\n```\n---\n",
            chunk.file_path(),
            chunk.text
        );
    }
    out
}
