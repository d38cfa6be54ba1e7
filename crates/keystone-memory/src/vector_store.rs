use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("collection error: {0}")]
    Collection(String),
    #[error("upsert error: {0}")]
    Upsert(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("scroll error: {0}")]
    Scroll(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Payload attached to every stored point: chunk metadata plus the document text.
pub type Payload = HashMap<String, serde_json::Value>;

/// One record to write: caller-assigned id, embedding, payload.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// A nearest-neighbour match, closest first when returned from [`VectorStore::search`].
#[derive(Debug, Clone)]
pub struct ScoredVectorPoint {
    pub id: String,
    pub score: f32,
    pub payload: Payload,
}

/// A point returned by a payload scan, without a similarity score.
#[derive(Debug, Clone)]
pub struct StoredVectorPoint {
    pub id: String,
    pub payload: Payload,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opaque persistent store holding one embedding record per chunk id.
///
/// Writers upsert, readers query. Callers must serialize writers per collection.
pub trait VectorStore: Send + Sync {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>>;

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>>;

    /// Points whose string payload `field` contains `needle` as a case-sensitive
    /// substring, at most `limit` of them.
    fn find_containing(
        &self,
        collection: &str,
        field: &str,
        needle: &str,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<StoredVectorPoint>, VectorStoreError>>;
}
