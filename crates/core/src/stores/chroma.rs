//! Chroma HTTP API client.
//!
//! Endpoints used:
//!   POST /api/v1/collections              (get_or_create)
//!   POST /api/v1/collections/{id}/add
//!   POST /api/v1/collections/{id}/query
//!   GET  /api/v1/collections

use crate::error::StoreError;
use crate::models::{PageChunk, RetrievedChunk};
use crate::traits::VectorStore;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const STORE_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ChromaStore {
    client: Client,
    endpoint: String,
}

impl ChromaStore {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(STORE_TIMEOUT).build()?;
        let endpoint: String = endpoint.into();
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn collections_url(&self) -> String {
        format!("{}/api/v1/collections", self.endpoint)
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn create_or_get_collection(&self, name: &str) -> Result<String, StoreError> {
        let response = self
            .client
            .post(self.collections_url())
            .json(&json!({ "name": name, "get_or_create": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/id")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| StoreError::BackendResponse {
                backend: "chroma".to_string(),
                details: "collection response has no id".to_string(),
            })
    }

    async fn add_chunks(
        &self,
        collection_id: &str,
        chunks: &[PageChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), StoreError> {
        if chunks.len() != embeddings.len() {
            return Err(StoreError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        if chunks.is_empty() {
            return Ok(());
        }

        let ids: Vec<&str> = chunks.iter().map(|chunk| chunk.id.as_str()).collect();
        let documents: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        let metadatas: Vec<Value> = chunks
            .iter()
            .map(|chunk| json!({ "title": chunk.title, "page": chunk.page }))
            .collect();

        let response = self
            .client
            .post(format!("{}/{}/add", self.collections_url(), collection_id))
            .json(&json!({
                "ids": ids,
                "embeddings": embeddings,
                "documents": documents,
                "metadatas": metadatas,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn query(
        &self,
        collection_id: &str,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        let response = self
            .client
            .post(format!("{}/{}/query", self.collections_url(), collection_id))
            .json(&json!({
                "query_embeddings": [query_embedding],
                "n_results": k,
                "include": ["documents", "metadatas"],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parse_query_response(&parsed)
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let response = self.client.get(self.collections_url()).send().await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let collections = parsed
            .as_array()
            .ok_or_else(|| StoreError::BackendResponse {
                backend: "chroma".to_string(),
                details: "collection list is not an array".to_string(),
            })?;

        Ok(collections
            .iter()
            .filter_map(|collection| collection.pointer("/name").and_then(Value::as_str))
            .map(ToString::to_string)
            .collect())
    }
}

/// Chroma nests results one level per query embedding; we always send one.
fn parse_query_response(parsed: &Value) -> Result<Vec<RetrievedChunk>, StoreError> {
    let documents = parsed
        .pointer("/documents/0")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let metadatas = parsed
        .pointer("/metadatas/0")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut chunks = Vec::with_capacity(documents.len());
    for (index, document) in documents.iter().enumerate() {
        let text = document.as_str().unwrap_or_default().to_string();
        let metadata = metadatas.get(index);
        let title = metadata
            .and_then(|value| value.pointer("/title"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let page = metadata
            .and_then(|value| value.pointer("/page"))
            .and_then(Value::as_u64)
            .unwrap_or_default() as usize;

        chunks.push(RetrievedChunk { text, title, page });
    }

    Ok(chunks)
}
