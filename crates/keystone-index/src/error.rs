//! Error types for keystone-index.

/// Errors that can occur while indexing or retrieving.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading the corpus.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding provider error.
    #[error("LLM error: {0}")]
    Llm(#[from] keystone_llm::LlmError),

    /// Vector store error.
    #[error("vector store error: {0}")]
    Store(#[from] keystone_memory::VectorStoreError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Texts, metadatas and ids of a batch differ in length.
    #[error("misaligned batch: {texts} texts, {metadatas} metadatas, {ids} ids")]
    MisalignedBatch {
        texts: usize,
        metadatas: usize,
        ids: usize,
    },

    /// Both retrieval channels failed.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// Generic catch-all error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
