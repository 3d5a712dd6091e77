use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;
use url::Url;

use crate::error::IngestError;

/// Admission limit for simultaneous in-flight downloads.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 100;

const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
pub trait PdfFetch {
    /// Fetch every URL concurrently. The output vector is aligned with the
    /// input order regardless of completion order, one result per URL.
    async fn fetch_all(&self, urls: &[String]) -> Vec<Result<Vec<u8>, IngestError>>;
}

pub struct PdfFetcher {
    client: Client,
    semaphore: Arc<Semaphore>,
}

impl PdfFetcher {
    pub fn new() -> Result<Self, IngestError> {
        Self::with_limit(DEFAULT_MAX_IN_FLIGHT)
    }

    pub fn with_limit(max_in_flight: usize) -> Result<Self, IngestError> {
        let client = Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(max_in_flight.max(1))),
        })
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, IngestError> {
        Url::parse(url)?;

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|error| IngestError::Fetch {
                url: url.to_string(),
                reason: format!("semaphore closed: {error}"),
            })?;

        debug!(url, "fetching pdf");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| IngestError::Fetch {
                url: url.to_string(),
                reason: error.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(IngestError::Fetch {
                url: url.to_string(),
                reason: format!("status {}", response.status()),
            });
        }

        let bytes = response.bytes().await.map_err(|error| IngestError::Fetch {
            url: url.to_string(),
            reason: error.to_string(),
        })?;

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl PdfFetch for PdfFetcher {
    async fn fetch_all(&self, urls: &[String]) -> Vec<Result<Vec<u8>, IngestError>> {
        join_all(urls.iter().map(|url| self.fetch(url))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_url_fails_without_a_request() {
        let fetcher = PdfFetcher::new().unwrap();
        let results = fetcher.fetch_all(&["not a url".to_string()]).await;

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(IngestError::Url(_))));
    }

    #[tokio::test]
    async fn results_stay_aligned_with_input_order() {
        let fetcher = PdfFetcher::new().unwrap();
        let urls = vec!["::bad::".to_string(), "also bad".to_string()];
        let results = fetcher.fetch_all(&urls).await;

        assert_eq!(results.len(), urls.len());
        assert!(results.iter().all(|result| result.is_err()));
    }
}
