use crate::embeddings::{mean_pool, Embedder};
use crate::error::EmbedError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, error};

pub const DEFAULT_INFERENCE_ENDPOINT: &str = "https://router.huggingface.co/hf-inference/models";

const PROVIDER: &str = "huggingface";

/// Embeds text with a pretrained transformer served by a Hugging Face
/// feature-extraction endpoint.
///
/// The server truncates each input to the model's maximum sequence length
/// (512 tokens for BERT-family encoders) and runs inference without dropout.
/// Encoders that return per-token hidden states are mean-pooled here; models
/// that already pool are passed through.
pub struct HubEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    token: Option<String>,
    dimensions: OnceLock<usize>,
}

impl HubEmbedder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: DEFAULT_INFERENCE_ENDPOINT.to_string(),
            model: model.into(),
            token: None,
            dimensions: OnceLock::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|value| !value.trim().is_empty());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/{}/pipeline/feature-extraction", self.endpoint, self.model)
    }

    /// Checks that every vector has the dimension this process first observed.
    fn check_dimensions(&self, vectors: &[Vec<f32>]) -> Result<(), EmbedError> {
        for vector in vectors {
            let expected = *self.dimensions.get_or_init(|| vector.len());
            if vector.len() != expected {
                return Err(EmbedError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a [String],
    truncate: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureExtractionResponse {
    Pooled(Vec<Vec<f32>>),
    Tokens(Vec<Vec<Vec<f32>>>),
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

fn pooled_vectors(
    response: FeatureExtractionResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    let vectors = match response {
        FeatureExtractionResponse::Pooled(vectors) => vectors,
        FeatureExtractionResponse::Tokens(sequences) => sequences
            .iter()
            .enumerate()
            .map(|(index, tokens)| {
                mean_pool(tokens).ok_or_else(|| EmbedError::Response {
                    provider: PROVIDER.to_string(),
                    details: format!("input {index} returned no usable token vectors"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
    };

    if vectors.len() != expected {
        return Err(EmbedError::Response {
            provider: PROVIDER.to_string(),
            details: format!("expected {expected} vectors, got {}", vectors.len()),
        });
    }

    Ok(vectors)
}

#[async_trait]
impl Embedder for HubEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(model = %self.model, batch_size = texts.len(), "embedding batch");

        let mut request = self.client.post(self.url()).json(&FeatureExtractionRequest {
            inputs: texts,
            truncate: true,
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|error| {
            error!(model = %self.model, %error, "embedding request failed");
            EmbedError::Request {
                provider: PROVIDER.to_string(),
                details: error.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|parsed| parsed.error)
                .unwrap_or(body);
            error!(model = %self.model, %status, "embedding endpoint returned an error");
            return Err(EmbedError::Request {
                provider: PROVIDER.to_string(),
                details: format!("{status}: {detail}"),
            });
        }

        let parsed: FeatureExtractionResponse =
            response.json().await.map_err(|error| EmbedError::Response {
                provider: PROVIDER.to_string(),
                details: error.to_string(),
            })?;

        let vectors = pooled_vectors(parsed, texts.len())?;
        self.check_dimensions(&vectors)?;
        Ok(vectors)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
