use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEFAULT_NAMESPACE: &str = "ns1";

/// A PDF waiting to be ingested. Lives only for the duration of one ingestion call.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// Metadata persisted next to every vector. Field names are the contract with
/// anything else reading the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordMetadata {
    pub chunk: String,
    pub file_name: String,
    pub chunk_index: u64,
}

impl RecordMetadata {
    /// Reads metadata as stored by a vector backend. Missing fields fall back to
    /// empty values; numeric indices stored as floats are accepted.
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let text = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let chunk_index = object
            .get("chunk_index")
            .and_then(|index| {
                index
                    .as_u64()
                    .or_else(|| index.as_f64().map(|float| float as u64))
            })
            .unwrap_or_default();

        Some(Self {
            chunk: text("chunk"),
            file_name: text("file_name"),
            chunk_index,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredMatch {
    pub id: String,
    pub score: f64,
    pub metadata: Option<RecordMetadata>,
}

impl ScoredMatch {
    pub fn chunk_text(&self) -> &str {
        self.metadata
            .as_ref()
            .map(|metadata| metadata.chunk.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub max_chunk_size: usize,
    pub chunk_overlap: usize,
    pub upsert_batch_size: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: 512,
            chunk_overlap: 0,
            upsert_batch_size: 32,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnswerOptions {
    pub namespace: String,
    pub top_k: usize,
    pub score_threshold: f64,
}

impl Default for AnswerOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            top_k: 5,
            score_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileOutcome {
    pub filename: String,
    pub status: FileStatus,
    pub chunks: usize,
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn success(filename: impl Into<String>, chunks: usize) -> Self {
        Self {
            filename: filename.into(),
            status: FileStatus::Success,
            chunks,
            error: None,
        }
    }

    pub fn failure(filename: impl Into<String>, error: impl ToString) -> Self {
        Self {
            filename: filename.into(),
            status: FileStatus::Error,
            chunks: 0,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FileStatus::Success
    }

    /// One human-readable status line, e.g. `✓ report.pdf: 12 chunks processed`.
    pub fn status_line(&self) -> String {
        match self.status {
            FileStatus::Success => format!("✓ {}: {} chunks processed", self.filename, self.chunks),
            FileStatus::Error => format!(
                "✗ {}: {}",
                self.filename,
                self.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IngestionReport {
    pub files: Vec<FileOutcome>,
    pub total_chunks: usize,
}

impl IngestionReport {
    pub fn push(&mut self, outcome: FileOutcome) {
        if outcome.is_success() {
            self.total_chunks += outcome.chunks;
        }
        self.files.push(outcome);
    }

    pub fn extend(&mut self, other: IngestionReport) {
        for outcome in other.files {
            self.push(outcome);
        }
    }

    /// Chunk count per file name, 0 for failed files. Files sharing a name (the
    /// same name in two folders, say) collapse into one entry holding their sum;
    /// `files` keeps them apart.
    pub fn chunk_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for outcome in &self.files {
            *counts.entry(outcome.filename.clone()).or_insert(0) += outcome.chunks;
        }
        counts
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Total: {} chunks processed from {} files",
            self.total_chunks,
            self.files.len()
        )
    }
}
