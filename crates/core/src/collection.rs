use crate::error::IngestError;
use regex::Regex;
use sha2::{Digest, Sha256};

const NAME_PREFIX: &str = "arxiv_search_";
const MAX_BASE_CHARS: usize = 50;

/// Derive the collection name for a search query.
///
/// The query is lowercased, runs of anything outside `[a-z0-9]` become a
/// single `_`, and the prefixed result is capped at 50 characters. A short
/// hash of the full query is appended so two queries that truncate to the
/// same prefix still get distinct collections.
pub fn collection_name(query: &str) -> Result<String, IngestError> {
    let separators = Regex::new(r"[^a-z0-9]+")?;
    let lowered = query.trim().to_lowercase();
    let sanitized = separators.replace_all(&lowered, "_");
    let sanitized = sanitized.trim_matches('_');

    let base: String = format!("{NAME_PREFIX}{sanitized}")
        .chars()
        .take(MAX_BASE_CHARS)
        .collect();

    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    Ok(format!("{}-{}", base.trim_end_matches('_'), &digest[..8]))
}
