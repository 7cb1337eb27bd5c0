//! Command-line and environment configuration, and construction of the remote
//! clients from it. Every option can be given as a flag or read from the
//! environment; `.env` is loaded before parsing.

use anyhow::Context;
use clap::{Args, ValueEnum};
use pdf_rag_core::providers::gemini::DEFAULT_GEMINI_MODEL;
use pdf_rag_core::providers::huggingface::DEFAULT_INFERENCE_ENDPOINT;
use pdf_rag_core::{
    AnswerOptions, ChatCoordinator, Embedder, GeminiGenerator, HubEmbedder,
    IngestionOptions, IngestionPipeline, PineconeStore, QdrantStore, TextGenerator, VectorStore,
    DEFAULT_NAMESPACE,
};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VectorBackend {
    Pinecone,
    Qdrant,
}

/// Hosted transformer served by a Hugging Face feature-extraction endpoint.
#[derive(Debug, Clone, Args)]
pub struct EmbedderConfig {
    /// Pretrained model used for embeddings.
    #[arg(long, env = "MODEL_NAME", default_value = "sentence-transformers/all-MiniLM-L6-v2")]
    pub model_name: String,

    #[arg(long, env = "HF_API_TOKEN", hide_env_values = true)]
    pub hf_api_token: Option<String>,

    #[arg(long, env = "EMBEDDING_ENDPOINT", default_value = DEFAULT_INFERENCE_ENDPOINT)]
    pub embedding_endpoint: String,
}

impl EmbedderConfig {
    pub fn build(&self) -> Arc<dyn Embedder> {
        info!(model = %self.model_name, endpoint = %self.embedding_endpoint, "using hosted embedder");
        Arc::new(
            HubEmbedder::new(&self.model_name)
                .with_endpoint(&self.embedding_endpoint)
                .with_token(self.hf_api_token.clone()),
        )
    }
}

#[derive(Debug, Clone, Args)]
pub struct StoreConfig {
    #[arg(long, env = "VECTOR_BACKEND", value_enum, default_value_t = VectorBackend::Pinecone)]
    pub vector_backend: VectorBackend,

    #[arg(long, env = "PINECONE_API_KEY", hide_env_values = true)]
    pub pinecone_api_key: Option<String>,

    #[arg(long, env = "PINECONE_INDEX_NAME")]
    pub pinecone_index_name: Option<String>,

    /// Data-plane host; looked up from the index name when absent.
    #[arg(long, env = "PINECONE_INDEX_HOST")]
    pub pinecone_index_host: Option<String>,

    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    pub qdrant_url: String,

    #[arg(long, env = "QDRANT_COLLECTION", default_value = "pdf_chunks")]
    pub qdrant_collection: String,
}

impl StoreConfig {
    pub fn build(&self) -> anyhow::Result<Arc<dyn VectorStore>> {
        match self.vector_backend {
            VectorBackend::Pinecone => {
                let api_key = self
                    .pinecone_api_key
                    .as_deref()
                    .context("PINECONE_API_KEY is required for the pinecone backend")?;
                let index_name = self
                    .pinecone_index_name
                    .as_deref()
                    .context("PINECONE_INDEX_NAME is required for the pinecone backend")?;

                let mut store = PineconeStore::new(api_key, index_name);
                if let Some(host) = self.pinecone_index_host.as_deref() {
                    store = store
                        .with_host(host)
                        .with_context(|| format!("invalid PINECONE_INDEX_HOST {host}"))?;
                }
                info!(index = index_name, "using pinecone");
                Ok(Arc::new(store))
            }
            VectorBackend::Qdrant => {
                info!(url = %self.qdrant_url, collection = %self.qdrant_collection, "using qdrant");
                Ok(Arc::new(QdrantStore::new(
                    &self.qdrant_url,
                    &self.qdrant_collection,
                )))
            }
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct GeneratorConfig {
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_GEMINI_MODEL)]
    pub gemini_model: String,
}

impl GeneratorConfig {
    pub fn build(&self) -> anyhow::Result<Arc<dyn TextGenerator>> {
        let api_key = self
            .gemini_api_key
            .as_deref()
            .context("GEMINI_API_KEY is required to generate answers")?;
        Ok(Arc::new(
            GeminiGenerator::new(api_key).with_model(&self.gemini_model),
        ))
    }
}

/// Options shared by every command that touches the index.
#[derive(Debug, Clone, Args)]
pub struct IndexConfig {
    #[command(flatten)]
    pub embedder: EmbedderConfig,

    #[command(flatten)]
    pub store: StoreConfig,

    #[arg(long, env = "NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,
}

/// Client handles built once at startup and shared by both pipelines.
pub struct Clients {
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
}

impl IndexConfig {
    pub fn clients(&self) -> anyhow::Result<Clients> {
        Ok(Clients {
            embedder: self.embedder.build(),
            store: self.store.build()?,
        })
    }
}

impl Clients {
    pub fn ingestion(&self) -> anyhow::Result<IngestionPipeline> {
        IngestionPipeline::new(
            self.embedder.clone(),
            self.store.clone(),
            &IngestionOptions::default(),
        )
        .context("invalid ingestion options")
    }

    pub fn chat(&self, generator: Arc<dyn TextGenerator>, namespace: &str) -> ChatCoordinator {
        ChatCoordinator::new(
            self.embedder.clone(),
            self.store.clone(),
            generator,
            AnswerOptions {
                namespace: namespace.to_string(),
                ..AnswerOptions::default()
            },
        )
    }
}
