use crate::error::{GenerationError, StoreError};
use crate::models::{IndexRecord, ScoredMatch};
use async_trait::async_trait;

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Writes `records` into `namespace`, overwriting records with the same id.
    ///
    /// A failed call may have applied part of the batch.
    async fn upsert(&self, namespace: &str, records: &[IndexRecord]) -> Result<(), StoreError>;

    /// Nearest records to `vector` in the store's own order. An empty or
    /// unknown namespace yields an empty list.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<ScoredMatch>, StoreError>;

    fn backend(&self) -> &str;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    fn model(&self) -> &str;
}
