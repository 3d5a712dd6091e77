use crate::error::StoreError;
use crate::models::{PageChunk, RetrievedChunk};
use async_trait::async_trait;

/// Vector-collection operations the pipeline and answer engine depend on.
/// The store computes nothing itself; embeddings arrive precomputed.
#[async_trait]
pub trait VectorStore {
    /// Resolve a collection by name, creating it if missing. Returns the
    /// handle the other operations take.
    async fn create_or_get_collection(&self, name: &str) -> Result<String, StoreError>;

    /// Add chunks with their embeddings. `chunks` and `embeddings` are
    /// parallel slices.
    async fn add_chunks(
        &self,
        collection_id: &str,
        chunks: &[PageChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), StoreError>;

    /// The `k` chunks closest to the query embedding, most relevant first.
    async fn query(
        &self,
        collection_id: &str,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError>;

    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;
}
