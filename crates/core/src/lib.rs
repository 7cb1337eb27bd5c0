pub mod chunking;
pub mod corpus;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod stores;
pub mod traits;
pub mod upload;

#[cfg(test)]
pub(crate) mod fakes;

pub use chunking::{chunk_spans, split_text, ChunkingConfig};
pub use embeddings::Embedder;
pub use error::{AnswerError, EmbedError, GenerationError, IngestError, StoreError, TransferError};
pub use extractor::{extract_text, LopdfExtractor, PdfExtractor};
pub use ingest::{discover_pdf_files, safe_filename, IngestionPipeline};
pub use models::{
    AnswerOptions, FileOutcome, FileStatus, IndexRecord, IngestionOptions, IngestionReport,
    RecordMetadata, ScoredMatch, SourceDocument, DEFAULT_NAMESPACE,
};
pub use orchestrator::{render_reply, Answer, ChatCoordinator};
pub use providers::{GeminiGenerator, HubEmbedder};
pub use stores::{PineconeStore, QdrantStore};
pub use traits::{TextGenerator, VectorStore};
pub use upload::{ingest_uploads, UploadedFile};
