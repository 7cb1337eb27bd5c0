use crate::error::StoreError;
use crate::models::{IndexRecord, RecordMetadata, ScoredMatch};
use crate::traits::VectorStore;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info};
use uuid::Uuid;

const BACKEND: &str = "qdrant";

/// Qdrant collection used as a namespaced index.
///
/// Namespaces live in the `namespace` payload field and every search filters on
/// it. Record ids are strings, which Qdrant does not accept as point ids, so each
/// point id is a UUIDv5 of `namespace/record_id`.
pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    collection_ready: OnceCell<usize>,
}

impl QdrantStore {
    pub fn new(endpoint: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            client: Client::new(),
            collection_ready: OnceCell::new(),
        }
    }

    /// Creates the collection with `vector_size` dimensions and cosine distance
    /// unless it already exists.
    pub async fn ensure_collection(&self, vector_size: usize) -> Result<(), StoreError> {
        let ready = *self
            .collection_ready
            .get_or_try_init(|| self.describe_or_create(vector_size))
            .await?;

        if ready != vector_size {
            return Err(StoreError::write(
                BACKEND,
                format!(
                    "collection vector size {} does not match record size {}",
                    ready, vector_size
                ),
            ));
        }
        Ok(())
    }

    async fn describe_or_create(&self, vector_size: usize) -> Result<usize, StoreError> {
        let url = format!("{}/collections/{}", self.endpoint, self.collection);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|error| StoreError::write(BACKEND, error))?;

        if response.status() == StatusCode::OK {
            let described: Value = response
                .json()
                .await
                .map_err(|error| StoreError::write(BACKEND, error))?;
            return Ok(configured_size(&described).unwrap_or(vector_size));
        }

        if response.status() != StatusCode::NOT_FOUND {
            return Err(StoreError::write(BACKEND, response.status()));
        }

        let response = self
            .client
            .put(&url)
            .json(&json!({
                "vectors": {"size": vector_size, "distance": "Cosine"}
            }))
            .send()
            .await
            .map_err(|error| StoreError::write(BACKEND, error))?;

        if !response.status().is_success() {
            return Err(StoreError::write(
                BACKEND,
                format!("collection setup failed with {}", response.status()),
            ));
        }

        info!(collection = %self.collection, vector_size, "created qdrant collection");
        Ok(vector_size)
    }
}

fn configured_size(described: &Value) -> Option<usize> {
    described
        .pointer("/result/config/params/vectors/size")
        .and_then(Value::as_u64)
        .map(|size| size as usize)
}

pub fn point_id(namespace: &str, record_id: &str) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{namespace}/{record_id}").as_bytes(),
    )
}

fn point(namespace: &str, record: &IndexRecord) -> Value {
    json!({
        "id": point_id(namespace, &record.id),
        "vector": record.values,
        "payload": {
            "namespace": namespace,
            "record_id": record.id,
            "chunk": record.metadata.chunk,
            "file_name": record.metadata.file_name,
            "chunk_index": record.metadata.chunk_index,
        },
    })
}

fn search_body(namespace: &str, vector: &[f32], top_k: usize, include_metadata: bool) -> Value {
    json!({
        "vector": vector,
        "limit": top_k,
        "with_payload": include_metadata,
        "filter": {
            "must": [{"key": "namespace", "match": {"value": namespace}}]
        },
    })
}

fn parse_hits(parsed: &Value) -> Vec<ScoredMatch> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    hits.iter()
        .map(|hit| {
            let id = hit
                .pointer("/payload/record_id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| hit.pointer("/id").map(|id| id.to_string()))
                .unwrap_or_default();
            let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);
            let metadata = hit.pointer("/payload").and_then(RecordMetadata::from_json);

            ScoredMatch {
                id,
                score,
                metadata,
            }
        })
        .collect()
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn upsert(&self, namespace: &str, records: &[IndexRecord]) -> Result<(), StoreError> {
        let Some(first) = records.first() else {
            return Ok(());
        };

        let vector_size = first.values.len();
        if let Some(bad) = records.iter().find(|record| record.values.len() != vector_size) {
            return Err(StoreError::write(
                BACKEND,
                format!(
                    "record {} has dimension {} but the batch uses {}",
                    bad.id,
                    bad.values.len(),
                    vector_size
                ),
            ));
        }
        self.ensure_collection(vector_size).await?;

        let points = records
            .iter()
            .map(|record| point(namespace, record))
            .collect::<Vec<_>>();

        let response = self
            .client
            .put(format!(
                "{}/collections/{}/points?wait=true",
                self.endpoint, self.collection
            ))
            .json(&json!({ "points": points }))
            .send()
            .await
            .map_err(|error| StoreError::write(BACKEND, error))?;

        if !response.status().is_success() {
            return Err(StoreError::write(BACKEND, response.status()));
        }

        debug!(namespace, count = records.len(), "qdrant upsert complete");
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<ScoredMatch>, StoreError> {
        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/search",
                self.endpoint, self.collection
            ))
            .json(&search_body(namespace, vector, top_k, include_metadata))
            .send()
            .await
            .map_err(|error| StoreError::read(BACKEND, error))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        if !response.status().is_success() {
            return Err(StoreError::read(BACKEND, response.status()));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|error| StoreError::read(BACKEND, error))?;
        Ok(parse_hits(&parsed))
    }

    fn backend(&self) -> &str {
        BACKEND
    }
}
