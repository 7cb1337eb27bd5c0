pub mod pinecone;
pub mod qdrant;

pub use pinecone::PineconeStore;
pub use qdrant::QdrantStore;
