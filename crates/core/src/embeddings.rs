use crate::error::EmbedError;
use async_trait::async_trait;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds `texts`, returning one vector per input in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| EmbedError::Response {
            provider: self.name().to_string(),
            details: "no vector returned for a single input".to_string(),
        })
    }

    fn name(&self) -> &str;
}

/// Averages token vectors over the sequence dimension.
///
/// Returns `None` for an empty sequence or when token vectors disagree on length.
pub fn mean_pool(tokens: &[Vec<f32>]) -> Option<Vec<f32>> {
    let width = tokens.first()?.len();
    if tokens.iter().any(|token| token.len() != width) {
        return None;
    }

    let mut pooled = vec![0f32; width];
    for token in tokens {
        for (sum, value) in pooled.iter_mut().zip(token) {
            *sum += value;
        }
    }

    let count = tokens.len() as f32;
    for value in &mut pooled {
        *value /= count;
    }

    Some(pooled)
}
