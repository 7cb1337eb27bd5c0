//! In-memory stand-ins for the remote services, shared by unit tests.

use crate::embeddings::Embedder;
use crate::error::{EmbedError, GenerationError, IngestError, StoreError};
use crate::extractor::PdfExtractor;
use crate::models::{IndexRecord, ScoredMatch};
use crate::traits::{TextGenerator, VectorStore};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Default)]
pub struct RecordingStore {
    pub upserts: Mutex<Vec<(String, Vec<IndexRecord>)>>,
    pub queries: Mutex<Vec<(String, usize, bool)>>,
    pub matches: Vec<ScoredMatch>,
    pub fail_writes_for: Option<String>,
    pub fail_reads: bool,
}

impl RecordingStore {
    pub fn with_matches(matches: Vec<ScoredMatch>) -> Self {
        Self {
            matches,
            ..Self::default()
        }
    }

    pub fn upserted(&self) -> Vec<(String, Vec<IndexRecord>)> {
        self.upserts.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorStore for RecordingStore {
    async fn upsert(&self, namespace: &str, records: &[IndexRecord]) -> Result<(), StoreError> {
        if let Some(file_name) = &self.fail_writes_for {
            if records
                .iter()
                .any(|record| &record.metadata.file_name == file_name)
            {
                return Err(StoreError::write("fake", "connection reset"));
            }
        }
        self.upserts
            .lock()
            .unwrap()
            .push((namespace.to_string(), records.to_vec()));
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        _vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<ScoredMatch>, StoreError> {
        if self.fail_reads {
            return Err(StoreError::read("fake", "401 Unauthorized"));
        }
        self.queries
            .lock()
            .unwrap()
            .push((namespace.to_string(), top_k, include_metadata));
        Ok(self.matches.iter().take(top_k).cloned().collect())
    }

    fn backend(&self) -> &str {
        "fake"
    }
}

/// Describes each text by its word, character and line counts.
pub struct ShapeEmbedder;

impl ShapeEmbedder {
    fn shape(text: &str) -> Vec<f32> {
        vec![
            text.split_whitespace().count() as f32,
            text.chars().count() as f32,
            text.lines().count() as f32,
        ]
    }
}

#[async_trait]
impl Embedder for ShapeEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|text| Self::shape(text)).collect())
    }

    fn name(&self) -> &str {
        "shape"
    }
}

/// Like [`ShapeEmbedder`] but fails for any batch containing `poison`.
pub struct PickyEmbedder {
    pub poison: &'static str,
}

#[async_trait]
impl Embedder for PickyEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.iter().any(|text| text.contains(self.poison)) {
            return Err(EmbedError::Request {
                provider: "fake".to_string(),
                details: "503 Service Unavailable".to_string(),
            });
        }
        ShapeEmbedder.embed_batch(texts).await
    }

    fn name(&self) -> &str {
        "picky"
    }
}

/// Returns the same text for every document.
pub struct StaticExtractor(pub String);

impl PdfExtractor for StaticExtractor {
    fn extract_text(&self, _bytes: &[u8]) -> Result<String, IngestError> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
pub struct ScriptedGenerator {
    pub prompts: Mutex<Vec<String>>,
    pub fail: bool,
}

impl ScriptedGenerator {
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(GenerationError::Request {
                model: "scripted".to_string(),
                details: "429 Too Many Requests".to_string(),
            });
        }
        Ok("The pump runs at 4 bar.".to_string())
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
