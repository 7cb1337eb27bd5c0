pub mod gemini;
pub mod huggingface;

pub use gemini::GeminiGenerator;
pub use huggingface::HubEmbedder;
