use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::EmbeddingError;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";
pub const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com";

const EMBEDDING_TIMEOUT: Duration = Duration::from_secs(120);

#[async_trait]
pub trait EmbeddingProvider {
    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a batch of texts; the output is aligned with the input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI embeddings over HTTPS.
pub struct OpenAiEmbeddings {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddings {
    pub fn new(api_key: impl Into<String>) -> Result<Self, EmbeddingError> {
        Self::with_base_url(DEFAULT_OPENAI_API_URL, api_key, DEFAULT_EMBEDDING_MODEL)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, EmbeddingError> {
        let client = Client::builder().timeout(EMBEDDING_TIMEOUT).build()?;
        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::MalformedResponse("empty data array".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        debug!(model = %self.model, count = texts.len(), "requesting embeddings");

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: EmbeddingResponse = response.json().await?;

        // The API labels each item with its input index; order by that
        // rather than trusting response order.
        let mut embeddings = vec![Vec::new(); texts.len()];
        for item in parsed.data {
            if item.index >= embeddings.len() {
                return Err(EmbeddingError::MalformedResponse(format!(
                    "embedding index {} out of range for {} inputs",
                    item.index,
                    texts.len()
                )));
            }
            embeddings[item.index] = item.embedding;
        }

        if embeddings.iter().any(|embedding| embedding.is_empty()) {
            return Err(EmbeddingError::MalformedResponse(
                "response is missing embeddings for some inputs".to_string(),
            ));
        }

        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_strips_trailing_slash_from_base_url() {
        let provider =
            OpenAiEmbeddings::with_base_url("https://api.example.com/", "key", "model").unwrap();
        assert_eq!(provider.base_url, "https://api.example.com");
    }

    #[tokio::test]
    async fn empty_batch_short_circuits() {
        let provider = OpenAiEmbeddings::new("key").unwrap();
        let embeddings = provider.embed_batch(&[]).await.unwrap();
        assert!(embeddings.is_empty());
    }

    #[test]
    fn default_model_is_reported() {
        let provider = OpenAiEmbeddings::new("key").unwrap();
        assert_eq!(provider.model_name(), DEFAULT_EMBEDDING_MODEL);
    }
}
