use crate::embeddings::Embedder;
use crate::error::AnswerError;
use crate::models::{AnswerOptions, ScoredMatch};
use crate::traits::{TextGenerator, VectorStore};
use std::sync::Arc;
use tracing::{debug, info};

pub const NO_CONTEXT_REPLY: &str =
    "I couldn't find any relevant information in the knowledge base.";

#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Generated(String),
    NoRelevantContext,
}

/// Retrieval-augmented answering: embed the question, pull the closest chunks
/// from the store, and ground the generator on the ones above the threshold.
pub struct ChatCoordinator {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn TextGenerator>,
    options: AnswerOptions,
}

impl ChatCoordinator {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn TextGenerator>,
        options: AnswerOptions,
    ) -> Self {
        Self {
            embedder,
            store,
            generator,
            options,
        }
    }

    pub fn options(&self) -> &AnswerOptions {
        &self.options
    }

    pub async fn answer(&self, message: &str) -> Result<Answer, AnswerError> {
        if message.trim().is_empty() {
            return Err(AnswerError::EmptyMessage);
        }

        let vector = self.embedder.embed(message).await?;
        let matches = self
            .store
            .query(&self.options.namespace, &vector, self.options.top_k, true)
            .await?;

        let chunks = filter_chunks(&matches, self.options.score_threshold);
        debug!(
            retrieved = matches.len(),
            kept = chunks.len(),
            "filtered retrieved chunks"
        );

        if chunks.is_empty() {
            return Ok(Answer::NoRelevantContext);
        }

        let prompt = build_prompt(&chunks.join("\n"), message);
        let text = self.generator.generate(&prompt).await?;
        info!(model = %self.generator.model(), context_chunks = chunks.len(), "answered");

        Ok(Answer::Generated(text))
    }

    /// Answers and renders the outcome as the text shown to the user.
    pub async fn reply(&self, message: &str) -> String {
        render_reply(&self.answer(message).await)
    }
}

/// Chunk texts of matches scoring strictly above `threshold`, in store order.
pub fn filter_chunks(matches: &[ScoredMatch], threshold: f64) -> Vec<String> {
    matches
        .iter()
        .filter(|candidate| candidate.score > threshold)
        .map(|candidate| candidate.chunk_text().to_string())
        .collect()
}

pub fn build_prompt(context: &str, message: &str) -> String {
    format!(
        "Based on the following context, please answer the question. \n\
         If the context doesn't contain relevant information, say so.\n\n\
         Context:\n{context}\n\n\
         Question: {message}\n\n\
         Answer:"
    )
}

pub fn render_reply(result: &Result<Answer, AnswerError>) -> String {
    match result {
        Ok(Answer::Generated(text)) => text.clone(),
        Ok(Answer::NoRelevantContext) => NO_CONTEXT_REPLY.to_string(),
        Err(error) => format!("I encountered an error while generating the response: {error}"),
    }
}
