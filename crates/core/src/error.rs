use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf extraction failed: {0}")]
    Extraction(String),

    #[error("invalid upload payload: {0}")]
    Decode(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Embedding(#[from] EmbedError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding request to {provider} failed: {details}")]
    Request { provider: String, details: String },

    #[error("unexpected embedding response from {provider}: {details}")]
    Response { provider: String, details: String },

    #[error("embedding dimension changed from {expected} to {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("vector store write to {backend} failed: {details}")]
    Write { backend: String, details: String },

    #[error("vector store read from {backend} failed: {details}")]
    Read { backend: String, details: String },

    #[error("invalid vector store configuration: {0}")]
    Config(String),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl StoreError {
    pub(crate) fn write(backend: &str, details: impl ToString) -> Self {
        Self::Write {
            backend: backend.to_string(),
            details: details.to_string(),
        }
    }

    pub(crate) fn read(backend: &str, details: impl ToString) -> Self {
        Self::Read {
            backend: backend.to_string(),
            details: details.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request to {model} failed: {details}")]
    Request { model: String, details: String },

    #[error("generation response from {model} had no text: {details}")]
    EmptyResponse { model: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("message is empty")]
    EmptyMessage,

    #[error(transparent)]
    Embedding(#[from] EmbedError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("unknown source {given}; choose from: {available}")]
    UnknownSource { given: String, available: String },

    #[error("ftp error on {context}: {details}")]
    Ftp { context: String, details: String },

    #[error("archive {path} could not be read: {details}")]
    Archive { path: String, details: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid directory pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
