use futures_util::future::join_all;
use tracing::{info, warn};

use crate::arxiv::PaperSource;
use crate::chunking::build_chunks;
use crate::collection::collection_name;
use crate::embeddings::EmbeddingProvider;
use crate::error::IngestError;
use crate::extractor::PdfExtractor;
use crate::fetch::PdfFetch;
use crate::models::{Paper, PaperRecord, SortMode};
use crate::persist::JsonLog;
use crate::traits::VectorStore;

/// One successfully processed paper.
#[derive(Debug, Clone)]
pub struct IngestedPaper {
    pub record: PaperRecord,
    pub pages: usize,
}

/// A paper dropped from the batch, with the reason it was dropped.
#[derive(Debug, Clone)]
pub struct SkippedPaper {
    pub title: String,
    pub url: String,
    pub reason: String,
}

/// Batch report for one search-and-ingest call. Partial success is the
/// normal case: skipped papers never abort their siblings.
#[derive(Debug, Clone)]
pub struct IngestionOutcome {
    /// Collection the chunks went into; `None` when the search returned
    /// nothing and no collection was created.
    pub collection: Option<String>,
    pub ingested: Vec<IngestedPaper>,
    pub skipped: Vec<SkippedPaper>,
}

/// Search arXiv, fetch the PDFs, and load chunk embeddings into a
/// per-query collection.
pub struct IngestionPipeline<S, F, X, E, V> {
    source: S,
    fetcher: F,
    extractor: X,
    embedder: E,
    store: V,
    catalog: JsonLog<PaperRecord>,
}

impl<S, F, X, E, V> IngestionPipeline<S, F, X, E, V>
where
    S: PaperSource + Send + Sync,
    F: PdfFetch + Send + Sync,
    X: PdfExtractor + Send + Sync,
    E: EmbeddingProvider + Send + Sync,
    V: VectorStore + Send + Sync,
{
    pub fn new(
        source: S,
        fetcher: F,
        extractor: X,
        embedder: E,
        store: V,
        catalog: JsonLog<PaperRecord>,
    ) -> Self {
        Self {
            source,
            fetcher,
            extractor,
            embedder,
            store,
            catalog,
        }
    }

    pub async fn run(
        &self,
        query: &str,
        mode: SortMode,
        max_results: usize,
    ) -> Result<IngestionOutcome, IngestError> {
        if max_results == 0 {
            return Err(IngestError::InvalidArgument(
                "result count must be positive".to_string(),
            ));
        }

        let papers = self.source.search(query, mode, max_results).await?;
        if papers.is_empty() {
            info!(query, "search returned no results, no collection created");
            return Ok(IngestionOutcome {
                collection: None,
                ingested: Vec::new(),
                skipped: Vec::new(),
            });
        }

        let name = collection_name(query)?;
        let collection_id = self.store.create_or_get_collection(&name).await?;
        info!(collection = %name, papers = papers.len(), "ingesting search results");

        let urls: Vec<String> = papers.iter().map(|paper| paper.pdf_url.clone()).collect();
        let fetched = self.fetcher.fetch_all(&urls).await;

        // Papers process concurrently; the report below is rebuilt in
        // search-result order, so chunk ids and catalog order stay
        // deterministic whatever the completion order was.
        let results = join_all(papers.iter().zip(fetched).enumerate().map(
            |(index, (paper, bytes))| {
                let collection_id = collection_id.as_str();
                async move {
                    self.process_paper(collection_id, index + 1, paper, bytes)
                        .await
                }
            },
        ))
        .await;

        let mut ingested = Vec::new();
        let mut skipped = Vec::new();

        for (paper, result) in papers.iter().zip(results) {
            match result {
                Ok(pages) => {
                    let record = PaperRecord::from_paper(paper);
                    if let Err(error) = self.catalog.append(&record).await {
                        warn!(title = %paper.title, %error, "failed to append catalog record");
                    }
                    info!(title = %paper.title, pages, "paper ingested");
                    ingested.push(IngestedPaper { record, pages });
                }
                Err(error) => {
                    warn!(title = %paper.title, url = %paper.pdf_url, %error, "skipping paper");
                    skipped.push(SkippedPaper {
                        title: paper.title.clone(),
                        url: paper.pdf_url.clone(),
                        reason: error.to_string(),
                    });
                }
            }
        }

        Ok(IngestionOutcome {
            collection: Some(name),
            ingested,
            skipped,
        })
    }

    /// Path to the paper catalog file.
    pub fn catalog_path(&self) -> &std::path::Path {
        self.catalog.path()
    }

    async fn process_paper(
        &self,
        collection_id: &str,
        ordinal: usize,
        paper: &Paper,
        fetched: Result<Vec<u8>, IngestError>,
    ) -> Result<usize, IngestError> {
        let bytes = fetched?;
        let pages = self.extractor.extract_pages(&bytes)?;
        let page_texts: Vec<String> = pages.into_iter().map(|page| page.text).collect();

        let chunks = build_chunks(ordinal, &paper.title, &page_texts);
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        self.store
            .add_chunks(collection_id, &chunks, &embeddings)
            .await?;

        Ok(chunks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmbeddingError, StoreError};
    use crate::extractor::PageText;
    use crate::models::{PageChunk, RetrievedChunk};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    struct FakeSource {
        papers: Vec<Paper>,
        fail: bool,
    }

    #[async_trait]
    impl PaperSource for FakeSource {
        async fn search(
            &self,
            _query: &str,
            _mode: SortMode,
            max_results: usize,
        ) -> Result<Vec<Paper>, IngestError> {
            if self.fail {
                return Err(IngestError::Search("upstream down".to_string()));
            }
            Ok(self.papers.iter().take(max_results).cloned().collect())
        }
    }

    /// Fails any URL containing "broken", hands back the URL as page text
    /// otherwise.
    struct FlakyFetcher;

    #[async_trait]
    impl PdfFetch for FlakyFetcher {
        async fn fetch_all(&self, urls: &[String]) -> Vec<Result<Vec<u8>, IngestError>> {
            urls.iter()
                .map(|url| {
                    if url.contains("broken") {
                        Err(IngestError::Fetch {
                            url: url.clone(),
                            reason: "connection reset".to_string(),
                        })
                    } else {
                        Ok(format!("first page of {url}\nsecond page of {url}").into_bytes())
                    }
                })
                .collect()
        }
    }

    /// One page per input line, standing in for a real PDF parse.
    struct LineExtractor;

    impl PdfExtractor for LineExtractor {
        fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, IngestError> {
            let text = String::from_utf8_lossy(bytes);
            Ok(text
                .lines()
                .enumerate()
                .map(|(page, line)| PageText {
                    page,
                    text: line.to_string(),
                })
                .collect())
        }
    }

    struct FakeEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        fn model_name(&self) -> &str {
            "fake-embedder"
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![0.0; 4])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![0.0; 4]).collect())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingStore {
        chunks: Arc<Mutex<Vec<PageChunk>>>,
        collections: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl VectorStore for RecordingStore {
        async fn create_or_get_collection(&self, name: &str) -> Result<String, StoreError> {
            self.collections.lock().unwrap().push(name.to_string());
            Ok(format!("id-{name}"))
        }

        async fn add_chunks(
            &self,
            _collection_id: &str,
            chunks: &[PageChunk],
            embeddings: &[Vec<f32>],
        ) -> Result<(), StoreError> {
            assert_eq!(chunks.len(), embeddings.len());
            self.chunks.lock().unwrap().extend_from_slice(chunks);
            Ok(())
        }

        async fn query(
            &self,
            _collection_id: &str,
            _query_embedding: &[f32],
            _k: usize,
        ) -> Result<Vec<RetrievedChunk>, StoreError> {
            Ok(Vec::new())
        }

        async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
            Ok(self.collections.lock().unwrap().clone())
        }
    }

    fn paper(title: &str, url: &str) -> Paper {
        Paper {
            title: title.to_string(),
            authors: vec!["An Author".to_string()],
            summary: "A summary.".to_string(),
            pdf_url: url.to_string(),
        }
    }

    fn pipeline_with(
        papers: Vec<Paper>,
        store: RecordingStore,
        catalog_path: std::path::PathBuf,
    ) -> IngestionPipeline<FakeSource, FlakyFetcher, LineExtractor, FakeEmbedder, RecordingStore>
    {
        IngestionPipeline::new(
            FakeSource {
                papers,
                fail: false,
            },
            FlakyFetcher,
            LineExtractor,
            FakeEmbedder,
            store,
            JsonLog::new(catalog_path),
        )
    }

    #[tokio::test]
    async fn one_failed_fetch_does_not_abort_the_batch() {
        let dir = tempdir().unwrap();
        let store = RecordingStore::default();
        let pipeline = pipeline_with(
            vec![
                paper("Paper One", "http://arxiv.org/pdf/1"),
                paper("Paper Two", "http://arxiv.org/pdf/broken"),
                paper("Paper Three", "http://arxiv.org/pdf/3"),
            ],
            store.clone(),
            dir.path().join("paper_metadata.json"),
        );

        let outcome = pipeline
            .run("quantum computing", SortMode::Relevance, 3)
            .await
            .unwrap();

        assert!(outcome.collection.is_some());
        assert_eq!(outcome.ingested.len(), 2);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].title, "Paper Two");

        // only papers 1 and 3 reached the store, under their original
        // ordinals
        let stored = store.chunks.lock().unwrap();
        assert!(stored.iter().any(|chunk| chunk.id == "paper_1_page_0"));
        assert!(stored.iter().any(|chunk| chunk.id == "paper_3_page_1"));
        assert!(stored.iter().all(|chunk| !chunk.id.starts_with("paper_2_")));
    }

    #[tokio::test]
    async fn catalog_gains_one_record_per_ingested_paper() {
        let dir = tempdir().unwrap();
        let catalog_path = dir.path().join("paper_metadata.json");
        let pipeline = pipeline_with(
            vec![
                paper("Paper One", "http://arxiv.org/pdf/1"),
                paper("Paper Two", "http://arxiv.org/pdf/broken"),
                paper("Paper Three", "http://arxiv.org/pdf/3"),
            ],
            RecordingStore::default(),
            catalog_path.clone(),
        );

        pipeline
            .run("quantum computing", SortMode::Relevance, 3)
            .await
            .unwrap();

        let catalog = JsonLog::<PaperRecord>::new(catalog_path);
        let records = catalog.load().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Paper One");
        assert_eq!(records[1].title, "Paper Three");
    }

    #[tokio::test]
    async fn chunk_count_matches_page_count() {
        let dir = tempdir().unwrap();
        let store = RecordingStore::default();
        let pipeline = pipeline_with(
            vec![paper("Paper One", "http://arxiv.org/pdf/1")],
            store.clone(),
            dir.path().join("paper_metadata.json"),
        );

        let outcome = pipeline
            .run("chunk counting", SortMode::Latest, 1)
            .await
            .unwrap();

        // the line extractor produces two pages per paper
        assert_eq!(outcome.ingested[0].pages, 2);
        assert_eq!(store.chunks.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn zero_results_creates_no_collection() {
        let dir = tempdir().unwrap();
        let store = RecordingStore::default();
        let pipeline = pipeline_with(
            Vec::new(),
            store.clone(),
            dir.path().join("paper_metadata.json"),
        );

        let outcome = pipeline
            .run("a query with no hits", SortMode::Relevance, 5)
            .await
            .unwrap();

        assert!(outcome.collection.is_none());
        assert!(store.collections.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_failure_fails_the_call() {
        let dir = tempdir().unwrap();
        let pipeline = IngestionPipeline::new(
            FakeSource {
                papers: Vec::new(),
                fail: true,
            },
            FlakyFetcher,
            LineExtractor,
            FakeEmbedder,
            RecordingStore::default(),
            JsonLog::new(dir.path().join("paper_metadata.json")),
        );

        let result = pipeline.run("anything", SortMode::Relevance, 3).await;
        assert!(matches!(result, Err(IngestError::Search(_))));
    }

    #[tokio::test]
    async fn zero_count_is_rejected() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline_with(
            Vec::new(),
            RecordingStore::default(),
            dir.path().join("paper_metadata.json"),
        );

        let result = pipeline.run("anything", SortMode::Relevance, 0).await;
        assert!(matches!(result, Err(IngestError::InvalidArgument(_))));
    }
}
