//! Embedding index write path: batch → embed → upsert with retry.
//!
//! Ids come from the caller's counter and are never derived from content.
//! Running the same corpus twice against a collection that was not cleared
//! therefore stores every chunk twice under different ids. Use
//! [`CodeIndexer::prepare`] with `fresh = true` to start from an empty collection.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use keystone_llm::EmbeddingProvider;
use keystone_memory::document::DocumentLoader;
use keystone_memory::{Payload, VectorPoint, VectorStore};

use crate::batch::{Batch, BatchBuilder};
use crate::documents::{document_chunks, document_paths};
use crate::error::{IndexError, Result};
use crate::walker::{CorpusWalker, SkipReason, SkippedFile, WalkSummary};

/// Payload field holding the chunk text.
pub const DOCUMENT_FIELD: &str = "document";

/// Indexer configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Upsert attempts per batch before the batch is dropped (default: 3).
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry (default: 1s).
    pub retry_base_delay: Duration,
    /// Pause after every successful write (default: 500ms).
    pub write_pause: Duration,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(1000),
            write_pause: Duration::from_millis(500),
        }
    }
}

/// Result of writing one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Written { chunks: usize },
    Failed { chunks: usize, reason: String },
}

/// Summary of an indexing run.
#[derive(Debug, Default)]
pub struct IndexReport {
    pub batches_written: usize,
    pub batches_failed: usize,
    pub chunks_written: usize,
    pub chunks_failed: usize,
    /// Reasons of dropped batches, in run order.
    pub failures: Vec<String>,
    pub walk: WalkSummary,
    /// Counter value to start the next run from.
    pub next_id: u64,
    pub duration_ms: u64,
}

impl IndexReport {
    fn record(&mut self, outcome: BatchOutcome) {
        match outcome {
            BatchOutcome::Written { chunks } => {
                self.batches_written += 1;
                self.chunks_written += chunks;
            }
            BatchOutcome::Failed { chunks, reason } => {
                self.batches_failed += 1;
                self.chunks_failed += chunks;
                self.failures.push(reason);
            }
        }
    }
}

/// Writes batches of chunks into one vector store collection.
pub struct CodeIndexer<P: EmbeddingProvider> {
    store: Arc<dyn VectorStore>,
    provider: Arc<P>,
    collection: String,
    config: IndexerConfig,
}

impl<P: EmbeddingProvider> CodeIndexer<P> {
    #[must_use]
    pub fn new(
        store: Arc<dyn VectorStore>,
        provider: Arc<P>,
        collection: impl Into<String>,
        config: IndexerConfig,
    ) -> Self {
        Self {
            store,
            provider,
            collection: collection.into(),
            config,
        }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Probe the embedding size and create the collection if needed.
    /// With `fresh`, an existing collection is deleted first.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding probe or collection setup fails.
    pub async fn prepare(&self, fresh: bool) -> Result<u64> {
        let probe = self.provider.embed("probe").await?;
        let vector_size =
            u64::try_from(probe.len()).map_err(|e| IndexError::Other(e.to_string()))?;

        if fresh && self.store.collection_exists(&self.collection).await? {
            self.store.delete_collection(&self.collection).await?;
            tracing::info!(collection = %self.collection, "deleted collection for fresh index");
        }
        self.store
            .ensure_collection(&self.collection, vector_size)
            .await?;
        Ok(vector_size)
    }

    /// Embed and store one batch. Never fails the run: errors become
    /// [`BatchOutcome::Failed`].
    pub async fn index_batch(&self, batch: &Batch) -> BatchOutcome {
        match self.write_batch(batch).await {
            Ok(()) => BatchOutcome::Written {
                chunks: batch.len(),
            },
            Err(e) => {
                tracing::error!(
                    chunks = batch.len(),
                    first_id = batch.ids.first().map_or("", String::as_str),
                    "dropping batch: {e}"
                );
                BatchOutcome::Failed {
                    chunks: batch.len(),
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Embed and store one batch, retrying the upsert with doubling backoff.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch is misaligned, embedding fails, or every
    /// upsert attempt fails.
    pub async fn write_batch(&self, batch: &Batch) -> Result<()> {
        if !batch.is_aligned() {
            return Err(IndexError::MisalignedBatch {
                texts: batch.texts.len(),
                metadatas: batch.metadatas.len(),
                ids: batch.ids.len(),
            });
        }
        if batch.is_empty() {
            return Ok(());
        }

        let vectors = self.provider.embed_batch(&batch.texts).await?;
        if vectors.len() != batch.len() {
            return Err(IndexError::Other(format!(
                "embedding returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }

        let mut points = Vec::with_capacity(batch.len());
        for (((id, text), metadata), vector) in batch
            .ids
            .iter()
            .zip(&batch.texts)
            .zip(&batch.metadatas)
            .zip(vectors)
        {
            let mut payload: Payload = match serde_json::to_value(metadata)? {
                serde_json::Value::Object(map) => map.into_iter().collect(),
                _ => Payload::new(),
            };
            payload.insert(
                DOCUMENT_FIELD.into(),
                serde_json::Value::String(text.clone()),
            );
            points.push(VectorPoint {
                id: id.clone(),
                vector,
                payload,
            });
        }

        self.upsert_with_retry(points).await
    }

    async fn upsert_with_retry(&self, points: Vec<VectorPoint>) -> Result<()> {
        let attempts = self.config.max_attempts.max(1);
        let mut delay = self.config.retry_base_delay;

        for attempt in 1..=attempts {
            match self.store.upsert(&self.collection, points.clone()).await {
                Ok(()) => {
                    tracing::debug!(points = points.len(), attempt, "batch stored");
                    if !self.config.write_pause.is_zero() {
                        tokio::time::sleep(self.config.write_pause).await;
                    }
                    return Ok(());
                }
                Err(e) if attempt < attempts => {
                    tracing::warn!(attempt, delay = ?delay, "upsert failed, retrying: {e}");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(IndexError::Other("no upsert attempt made".into()))
    }

    /// Write every batch in order. Failed batches are counted, not fatal.
    pub async fn index_batches<I>(&self, batches: I) -> IndexReport
    where
        I: IntoIterator<Item = Batch>,
    {
        let start = Instant::now();
        let mut report = IndexReport::default();
        for (n, batch) in batches.into_iter().enumerate() {
            tracing::debug!(batch = n, chunks = batch.len(), "writing batch");
            let outcome = self.index_batch(&batch).await;
            report.record(outcome);
        }
        report.duration_ms = elapsed_ms(start);
        report
    }

    /// Stream a corpus walk into the collection.
    pub async fn index_corpus(&self, mut walker: CorpusWalker) -> IndexReport {
        let start = Instant::now();
        let mut report = self.index_batches(walker.by_ref()).await;
        report.next_id = walker.next_id();
        report.walk = walker.into_summary();
        report.duration_ms = elapsed_ms(start);

        tracing::info!(
            files = report.walk.files_seen,
            chunks = report.chunks_written,
            skipped = report.walk.skipped.len(),
            failed_batches = report.batches_failed,
            "indexing finished"
        );
        report
    }

    /// Load prose documents under `root`, split them into paragraphs and write
    /// them through the same path as code.
    pub async fn index_documents(
        &self,
        root: &Path,
        loader: &dyn DocumentLoader,
        excluded_dirs: &[String],
        start_id: u64,
        batch_size: usize,
    ) -> IndexReport {
        let start = Instant::now();
        let mut report = IndexReport::default();
        let mut builder = BatchBuilder::new(start_id, batch_size);

        for path in document_paths(root, loader, excluded_dirs) {
            report.walk.files_seen += 1;
            let docs = match loader.load(&path).await {
                Ok(docs) => docs,
                Err(e) => {
                    tracing::warn!(file = %path.display(), "skipping document: {e}");
                    report.walk.skipped.push(SkippedFile {
                        path: path.display().to_string(),
                        reason: SkipReason::Unreadable(e.to_string()),
                    });
                    continue;
                }
            };

            let chunks: Vec<_> = docs.iter().flat_map(document_chunks).collect();
            if chunks.is_empty() {
                report.walk.files_empty += 1;
                continue;
            }
            report.walk.files_chunked += 1;
            report.walk.chunks += chunks.len();
            builder.extend(chunks);

            while let Some(batch) = builder.take_full() {
                let outcome = self.index_batch(&batch).await;
                report.record(outcome);
            }
        }
        if let Some(batch) = builder.take_rest() {
            let outcome = self.index_batch(&batch).await;
            report.record(outcome);
        }

        report.next_id = builder.next_id();
        report.duration_ms = elapsed_ms(start);
        tracing::info!(
            documents = report.walk.files_seen,
            chunks = report.chunks_written,
            failed_batches = report.batches_failed,
            "document ingestion finished"
        );
        report
    }

    /// Index a code corpus, then the documents under `docs`, with document ids
    /// continuing from the counter the code run ended on.
    pub async fn index_code_and_documents(
        &self,
        walker: CorpusWalker,
        docs: &Path,
        loader: &dyn DocumentLoader,
        excluded_dirs: &[String],
        batch_size: usize,
    ) -> (IndexReport, IndexReport) {
        let code = self.index_corpus(walker).await;
        let documents = self
            .index_documents(docs, loader, excluded_dirs, code.next_id, batch_size)
            .await;
        (code, documents)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis().try_into().unwrap_or(u64::MAX)
}
