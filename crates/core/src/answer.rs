use chrono::Utc;
use tracing::{debug, warn};

use crate::completion::CompletionProvider;
use crate::embeddings::EmbeddingProvider;
use crate::error::QueryError;
use crate::models::{Answer, QaEntry, RetrievedChunk};
use crate::persist::JsonLog;
use crate::traits::VectorStore;

const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that answers questions based on scientific paper excerpts.";

/// Answer questions against an ingested collection: retrieve the closest
/// chunks, condition a completion on them, and log the exchange.
pub struct AnswerEngine<E, V, C> {
    embedder: E,
    store: V,
    completion: C,
    qa_log: JsonLog<QaEntry>,
}

impl<E, V, C> AnswerEngine<E, V, C>
where
    E: EmbeddingProvider + Send + Sync,
    V: VectorStore + Send + Sync,
    C: CompletionProvider + Send + Sync,
{
    pub fn new(embedder: E, store: V, completion: C, qa_log: JsonLog<QaEntry>) -> Self {
        Self {
            embedder,
            store,
            completion,
            qa_log,
        }
    }

    /// Names of the collections available for selection.
    pub async fn collections(&self) -> Result<Vec<String>, QueryError> {
        Ok(self.store.list_collections().await?)
    }

    pub async fn answer(
        &self,
        collection: &str,
        question: &str,
        k: usize,
    ) -> Result<Answer, QueryError> {
        if question.trim().is_empty() {
            return Err(QueryError::InvalidArgument("question is empty".to_string()));
        }
        if k == 0 {
            return Err(QueryError::InvalidArgument(
                "retrieval count must be positive".to_string(),
            ));
        }

        let collection_id = self.store.create_or_get_collection(collection).await?;
        let query_embedding = self.embedder.embed(question).await?;
        let sources = self
            .store
            .query(&collection_id, &query_embedding, k)
            .await?;
        debug!(collection, retrieved = sources.len(), "retrieved chunks");

        let prompt = build_prompt(question, &sources);
        let text = self.completion.complete(SYSTEM_PROMPT, &prompt).await?;

        // A broken history file should not take the loop down with it.
        let entry = QaEntry {
            question: question.to_string(),
            answer: text.clone(),
            asked_at: Utc::now(),
        };
        if let Err(error) = self.qa_log.append(&entry).await {
            warn!(%error, "failed to append q/a history entry");
        }

        Ok(Answer { text, sources })
    }
}

/// The question first, then every chunk labeled with its provenance.
fn build_prompt(question: &str, chunks: &[RetrievedChunk]) -> String {
    let mut prompt = format!(
        "Based on the following chunks of information from scientific papers, \
         please answer this question: {question}\n\n"
    );

    let labeled: Vec<String> = chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| {
            format!(
                "Chunk {} from {}, Page {}: {}",
                index + 1,
                chunk.title,
                chunk.page,
                chunk.text
            )
        })
        .collect();

    prompt.push_str(&labeled.join("\n\n"));
    prompt
}
