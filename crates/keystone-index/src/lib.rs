//! Retrieval core: multi-strategy chunking, streaming corpus indexing and
//! hybrid retrieval.
//!
//! Files are cut into chunks by a language-specific strategy (tree-sitter for
//! general-purpose languages, structural scans for COBOL and Pro*C, paragraphs
//! for prose), streamed in bounded batches into a vector store, and retrieved
//! by merging keyword-contains hits ahead of nearest-neighbour hits.

pub mod batch;
pub mod chunker;
pub mod documents;
pub mod error;
pub mod indexer;
pub mod languages;
pub mod retriever;
pub mod walker;

pub use batch::{Batch, BatchBuilder};
pub use chunker::{Chunk, ChunkMetadata, ChunkerConfig, chunk_file};
pub use error::{IndexError, Result};
pub use indexer::{BatchOutcome, CodeIndexer, IndexReport, IndexerConfig};
pub use languages::{Lang, detect_language};
pub use retriever::{HybridRetriever, RetrievalConfig, RetrievedContext};
pub use walker::{CorpusWalker, SkipReason, WalkSummary, WalkerConfig};
