//! Qdrant backend for the [`VectorStore`] contract.

use std::collections::HashMap;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter, PointId, PointStruct,
    ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
    point_id::PointIdOptions, value::Kind,
};
use uuid::Uuid;

use crate::vector_store::{
    Payload, ScoredVectorPoint, StoredVectorPoint, VectorPoint, VectorStore, VectorStoreError,
};

type QdrantResult<T> = Result<T, Box<qdrant_client::QdrantError>>;
type BoxFuture<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Payload key carrying the caller-assigned chunk id. Qdrant only accepts
/// integer or UUID point ids, so the string id lives in the payload and the
/// point id is derived from it.
pub const CHUNK_ID_FIELD: &str = "chunk_id";

/// Thin wrapper over [`Qdrant`] client encapsulating common collection operations.
#[derive(Clone)]
pub struct QdrantOps {
    client: Qdrant,
}

impl std::fmt::Debug for QdrantOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantOps").finish_non_exhaustive()
    }
}

impl QdrantOps {
    /// Create a new `QdrantOps` connected to the given URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the Qdrant client cannot be created.
    pub fn new(url: &str) -> QdrantResult<Self> {
        let client = Qdrant::from_url(url).build().map_err(Box::new)?;
        Ok(Self { client })
    }

    /// Ensure a collection exists with cosine distance vectors.
    ///
    /// Idempotent: no-op if the collection already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if Qdrant cannot be reached or collection creation fails.
    pub async fn ensure_collection(&self, collection: &str, vector_size: u64) -> QdrantResult<()> {
        if self
            .client
            .collection_exists(collection)
            .await
            .map_err(Box::new)?
        {
            return Ok(());
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
            )
            .await
            .map_err(Box::new)?;
        tracing::info!(collection, vector_size, "created Qdrant collection");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if Qdrant cannot be reached.
    pub async fn collection_exists(&self, collection: &str) -> QdrantResult<bool> {
        self.client
            .collection_exists(collection)
            .await
            .map_err(Box::new)
    }

    /// # Errors
    ///
    /// Returns an error if the collection cannot be deleted.
    pub async fn delete_collection(&self, collection: &str) -> QdrantResult<()> {
        self.client
            .delete_collection(collection)
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    /// Upsert points and wait until they are searchable.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub async fn upsert(&self, collection: &str, points: Vec<PointStruct>) -> QdrantResult<()> {
        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> QdrantResult<Vec<ScoredVectorPoint>> {
        let builder = SearchPointsBuilder::new(collection, vector, limit).with_payload(true);
        let results = self.client.search_points(builder).await.map_err(Box::new)?;
        Ok(results
            .result
            .into_iter()
            .map(|point| {
                let payload = payload_to_json(point.payload);
                ScoredVectorPoint {
                    id: resolve_id(point.id, &payload),
                    score: point.score,
                    payload,
                }
            })
            .collect())
    }

    /// Scroll points whose text `field` matches `needle`.
    ///
    /// Without a full-text index on `field`, Qdrant evaluates the text match
    /// as an exact substring test, which is what keyword lookup relies on.
    ///
    /// # Errors
    ///
    /// Returns an error if the scroll fails.
    pub async fn find_containing(
        &self,
        collection: &str,
        field: &str,
        needle: &str,
        limit: u32,
    ) -> QdrantResult<Vec<StoredVectorPoint>> {
        let builder = ScrollPointsBuilder::new(collection)
            .filter(Filter::must([Condition::matches_text(field, needle)]))
            .limit(limit)
            .with_payload(true)
            .with_vectors(false);
        let response = self.client.scroll(builder).await.map_err(Box::new)?;
        Ok(response
            .result
            .into_iter()
            .map(|point| {
                let payload = payload_to_json(point.payload);
                StoredVectorPoint {
                    id: resolve_id(point.id, &payload),
                    payload,
                }
            })
            .collect())
    }
}

impl VectorStore for QdrantOps {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.ensure_collection(&collection, vector_size)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.collection_exists(&collection)
                .await
                .map_err(|e| VectorStoreError::Connection(e.to_string()))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.delete_collection(&collection)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let qdrant_points = points
                .into_iter()
                .map(to_point_struct)
                .collect::<Result<Vec<_>, _>>()?;
            self.upsert(&collection, qdrant_points)
                .await
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.search(&collection, vector, limit)
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))
        })
    }

    fn find_containing(
        &self,
        collection: &str,
        field: &str,
        needle: &str,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<StoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        let field = field.to_owned();
        let needle = needle.to_owned();
        Box::pin(async move {
            let limit = u32::try_from(limit).unwrap_or(u32::MAX);
            self.find_containing(&collection, &field, &needle, limit)
                .await
                .map_err(|e| VectorStoreError::Scroll(e.to_string()))
        })
    }
}

/// Deterministic UUID for a caller-assigned chunk id.
#[must_use]
pub fn point_uuid(chunk_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes()).to_string()
}

fn to_point_struct(point: VectorPoint) -> Result<PointStruct, VectorStoreError> {
    let mut payload = point.payload;
    payload.insert(
        CHUNK_ID_FIELD.to_owned(),
        serde_json::Value::String(point.id.clone()),
    );
    let payload: HashMap<String, qdrant_client::qdrant::Value> =
        serde_json::from_value(serde_json::Value::Object(payload.into_iter().collect()))
            .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
    Ok(PointStruct::new(point_uuid(&point.id), point.vector, payload))
}

fn resolve_id(point_id: Option<PointId>, payload: &Payload) -> String {
    if let Some(id) = payload.get(CHUNK_ID_FIELD).and_then(serde_json::Value::as_str) {
        return id.to_owned();
    }
    match point_id.and_then(|pid| pid.point_id_options) {
        Some(PointIdOptions::Uuid(u)) => u,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}

fn payload_to_json(payload: HashMap<String, qdrant_client::qdrant::Value>) -> Payload {
    payload
        .into_iter()
        .filter_map(|(k, v)| {
            let json_val = match v.kind? {
                Kind::StringValue(s) => serde_json::Value::String(s),
                Kind::IntegerValue(i) => serde_json::Value::Number(i.into()),
                Kind::DoubleValue(d) => {
                    serde_json::Number::from_f64(d).map(serde_json::Value::Number)?
                }
                Kind::BoolValue(b) => serde_json::Value::Bool(b),
                _ => return None,
            };
            Some((k, json_val))
        })
        .collect()
}
