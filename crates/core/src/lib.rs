pub mod answer;
pub mod arxiv;
pub mod chunking;
pub mod collection;
pub mod completion;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod fetch;
pub mod ingest;
pub mod models;
pub mod persist;
pub mod stores;
pub mod traits;

pub use answer::AnswerEngine;
pub use arxiv::{ArxivClient, PaperSource};
pub use chunking::{build_chunks, overlap_chunks};
pub use collection::collection_name;
pub use completion::{CompletionProvider, OpenAiChat, DEFAULT_COMPLETION_MODEL};
pub use embeddings::{
    EmbeddingProvider, OpenAiEmbeddings, DEFAULT_EMBEDDING_MODEL, DEFAULT_OPENAI_API_URL,
};
pub use error::{
    CompletionError, EmbeddingError, IngestError, PersistError, QueryError, StoreError,
};
pub use extractor::{LopdfExtractor, PageText, PdfExtractor};
pub use fetch::{PdfFetch, PdfFetcher, DEFAULT_MAX_IN_FLIGHT};
pub use ingest::{IngestedPaper, IngestionOutcome, IngestionPipeline, SkippedPaper};
pub use models::{Answer, PageChunk, Paper, PaperRecord, QaEntry, RetrievedChunk, SortMode};
pub use persist::JsonLog;
pub use stores::ChromaStore;
pub use traits::VectorStore;
