use crate::error::StoreError;
use crate::models::{IndexRecord, RecordMetadata, ScoredMatch};
use crate::traits::VectorStore;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

const BACKEND: &str = "pinecone";
const CONTROL_PLANE: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";

/// Client for a Pinecone serverless index, talking to its REST data plane.
pub struct PineconeStore {
    client: Client,
    api_key: String,
    index_name: String,
    control_plane: String,
    host: OnceCell<Url>,
}

impl PineconeStore {
    pub fn new(api_key: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            index_name: index_name.into(),
            control_plane: CONTROL_PLANE.to_string(),
            host: OnceCell::new(),
        }
    }

    /// Uses a known data-plane host instead of resolving it from the index name.
    pub fn with_host(self, host: &str) -> Result<Self, StoreError> {
        let url = normalize_host(host)?;
        Ok(Self {
            host: OnceCell::new_with(Some(url)),
            ..self
        })
    }

    async fn host(&self) -> Result<&Url, StoreError> {
        self.host.get_or_try_init(|| self.resolve_host()).await
    }

    async fn resolve_host(&self) -> Result<Url, StoreError> {
        let response = self
            .client
            .get(format!("{}/indexes/{}", self.control_plane, self.index_name))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
            .map_err(|error| StoreError::Config(error.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Config(format!(
                "describing index {} returned {}",
                self.index_name,
                response.status()
            )));
        }

        let described: Value = response
            .json()
            .await
            .map_err(|error| StoreError::Config(error.to_string()))?;
        let host = described
            .pointer("/host")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Config(format!("index {} has no host", self.index_name)))?;

        debug!(index = %self.index_name, host, "resolved pinecone index host");
        normalize_host(host)
    }
}

fn normalize_host(host: &str) -> Result<Url, StoreError> {
    let trimmed = host.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(StoreError::Config("pinecone host is empty".to_string()));
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(Url::parse(trimmed)?)
    } else {
        Ok(Url::parse(&format!("https://{trimmed}"))?)
    }
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [IndexRecord],
    namespace: &'a str,
}

fn query_body(namespace: &str, vector: &[f32], top_k: usize, include_metadata: bool) -> Value {
    json!({
        "namespace": namespace,
        "vector": vector,
        "topK": top_k,
        "includeValues": false,
        "includeMetadata": include_metadata,
    })
}

fn parse_matches(body: &Value) -> Vec<ScoredMatch> {
    body.pointer("/matches")
        .and_then(Value::as_array)
        .map(|matches| {
            matches
                .iter()
                .map(|hit| ScoredMatch {
                    id: hit
                        .pointer("/id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0),
                    metadata: hit.pointer("/metadata").and_then(RecordMetadata::from_json),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn upsert(&self, namespace: &str, records: &[IndexRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let host = self
            .host()
            .await
            .map_err(|error| StoreError::write(BACKEND, error))?;
        let response = self
            .client
            .post(host.join("vectors/upsert")?)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&UpsertRequest {
                vectors: records,
                namespace,
            })
            .send()
            .await
            .map_err(|error| StoreError::write(BACKEND, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::write(BACKEND, format!("{status}: {body}")));
        }

        debug!(namespace, count = records.len(), "pinecone upsert complete");
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<ScoredMatch>, StoreError> {
        let host = self
            .host()
            .await
            .map_err(|error| StoreError::read(BACKEND, error))?;
        let response = self
            .client
            .post(host.join("query")?)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&query_body(namespace, vector, top_k, include_metadata))
            .send()
            .await
            .map_err(|error| StoreError::read(BACKEND, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::read(BACKEND, format!("{status}: {body}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|error| StoreError::read(BACKEND, error))?;
        Ok(parse_matches(&body))
    }

    fn backend(&self) -> &str {
        BACKEND
    }
}
