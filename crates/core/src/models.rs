use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Paper descriptor as returned by the search capability. Immutable once
/// fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Paper {
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
    pub pdf_url: String,
}

/// Result ordering for an arXiv search.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SortMode {
    Relevance,
    Latest,
}

impl SortMode {
    /// Value of the Atom API `sortBy` parameter.
    pub fn as_sort_by(&self) -> &'static str {
        match self {
            SortMode::Relevance => "relevance",
            SortMode::Latest => "lastUpdatedDate",
        }
    }
}

impl std::str::FromStr for SortMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "relevance" => Ok(SortMode::Relevance),
            "latest" => Ok(SortMode::Latest),
            other => Err(format!(
                "invalid search mode '{other}', expected 'relevance' or 'latest'"
            )),
        }
    }
}

/// One chunk of a paper's text, ready for the vector store. The id combines
/// the paper's 1-based ordinal in the search results with the 0-based page
/// index, so ids stay stable across a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageChunk {
    pub id: String,
    pub text: String,
    pub title: String,
    pub page: usize,
}

/// A chunk retrieved from the vector store at question time, with its
/// provenance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub text: String,
    pub title: String,
    pub page: usize,
}

/// Catalog entry persisted per ingested paper. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaperRecord {
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
    pub url: String,
    pub ingested_at: DateTime<Utc>,
}

impl PaperRecord {
    pub fn from_paper(paper: &Paper) -> Self {
        Self {
            title: paper.title.clone(),
            authors: paper.authors.clone(),
            summary: paper.summary.clone(),
            url: paper.pdf_url.clone(),
            ingested_at: Utc::now(),
        }
    }
}

/// Question/answer pair persisted after each answered question. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QaEntry {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

/// Generated answer plus the chunks it was conditioned on.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<RetrievedChunk>,
}
