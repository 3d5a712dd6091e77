//! arXiv Atom API client.
//!
//! Endpoint: http://export.arxiv.org/api/query
//! Returns an Atom feed; each `<entry>` carries the title, authors, summary
//! and a `<link title="pdf">` pointing at the PDF.

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::IngestError;
use crate::models::{Paper, SortMode};

const EXPORT_API_URL: &str = "http://export.arxiv.org/api/query";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait PaperSource {
    async fn search(
        &self,
        query: &str,
        mode: SortMode,
        max_results: usize,
    ) -> Result<Vec<Paper>, IngestError>;
}

pub struct ArxivClient {
    client: Client,
    endpoint: String,
}

impl ArxivClient {
    pub fn new() -> Result<Self, IngestError> {
        Self::with_endpoint(EXPORT_API_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, IngestError> {
        let client = Client::builder().timeout(SEARCH_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl PaperSource for ArxivClient {
    async fn search(
        &self,
        query: &str,
        mode: SortMode,
        max_results: usize,
    ) -> Result<Vec<Paper>, IngestError> {
        if query.trim().is_empty() {
            return Err(IngestError::InvalidArgument("query is empty".to_string()));
        }

        let params = [
            ("search_query", format!("all:{query}")),
            ("start", "0".to_string()),
            ("max_results", max_results.to_string()),
            ("sortBy", mode.as_sort_by().to_string()),
            ("sortOrder", "descending".to_string()),
        ];

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|error| IngestError::Search(error.to_string()))?;

        if !response.status().is_success() {
            return Err(IngestError::Search(format!(
                "arxiv api returned {}",
                response.status()
            )));
        }

        let xml = response
            .text()
            .await
            .map_err(|error| IngestError::Search(error.to_string()))?;

        let papers = parse_atom_feed(&xml)?;
        debug!(count = papers.len(), query, "arxiv search returned papers");
        Ok(papers)
    }
}

/// Parse the Atom feed into Paper descriptors, preserving feed order.
/// Entries without a PDF link are skipped.
fn parse_atom_feed(xml: &str) -> Result<Vec<Paper>, IngestError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut papers = Vec::new();
    let mut current: Option<Paper> = None;
    let mut in_title = false;
    let mut in_summary = false;
    let mut in_author = false;
    let mut in_name = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"entry" => {
                    current = Some(Paper {
                        title: String::new(),
                        authors: Vec::new(),
                        summary: String::new(),
                        pdf_url: String::new(),
                    });
                }
                // the feed itself has a <title> outside any entry
                b"title" if current.is_some() => in_title = true,
                b"summary" => in_summary = true,
                b"author" => in_author = true,
                b"name" if in_author => in_name = true,
                b"link" => {
                    if let Some(ref mut paper) = current {
                        apply_link(paper, e);
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"link" {
                    if let Some(ref mut paper) = current {
                        apply_link(paper, e);
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default();
                if let Some(ref mut paper) = current {
                    if in_title {
                        push_fragment(&mut paper.title, &text);
                    } else if in_summary {
                        push_fragment(&mut paper.summary, &text);
                    } else if in_name {
                        paper.authors.push(text.trim().to_string());
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"title" => in_title = false,
                b"summary" => in_summary = false,
                b"name" => in_name = false,
                b"author" => in_author = false,
                b"entry" => {
                    if let Some(paper) = current.take() {
                        if paper.pdf_url.is_empty() {
                            warn!(title = %paper.title, "skipping entry without a pdf link");
                        } else {
                            papers.push(paper);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(error) => {
                return Err(IngestError::Search(format!("atom feed parse error: {error}")));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(papers)
}

/// Pick up the PDF href from a `<link>` element.
fn apply_link(paper: &mut Paper, element: &BytesStart<'_>) {
    let mut href = None;
    let mut is_pdf = false;

    for attribute in element.attributes().flatten() {
        match attribute.key.as_ref() {
            b"href" => {
                href = Some(attribute.unescape_value().unwrap_or_default().to_string());
            }
            b"title" if attribute.value.as_ref() == b"pdf" => is_pdf = true,
            b"type" if attribute.value.as_ref() == b"application/pdf" => is_pdf = true,
            _ => {}
        }
    }

    if is_pdf {
        if let Some(href) = href {
            paper.pdf_url = href;
        }
    }
}

/// Atom text nodes arrive line-wrapped; collapse runs of whitespace and
/// rejoin fragments with single spaces.
fn push_fragment(target: &mut String, fragment: &str) {
    let normalized = fragment.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return;
    }
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(&normalized);
}

#[cfg(test)]
mod tests {
    use super::parse_atom_feed;

    #[test]
    fn parses_a_minimal_feed() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query: search_query=all:electron</title>
  <entry>
    <title>Electron thermalization in metallic islands</title>
    <summary>Electron thermalization is studied in
      small metallic islands.</summary>
    <author><name>Andrei Glatz</name></author>
    <author><name>Igor Beloborodov</name></author>
    <link href="http://arxiv.org/abs/0901.0001v1" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/0901.0001v1" rel="related" type="application/pdf"/>
  </entry>
</feed>"#;

        let papers = parse_atom_feed(xml).unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "Electron thermalization in metallic islands");
        assert_eq!(
            papers[0].summary,
            "Electron thermalization is studied in small metallic islands."
        );
        assert_eq!(
            papers[0].authors,
            vec!["Andrei Glatz".to_string(), "Igor Beloborodov".to_string()]
        );
        assert_eq!(papers[0].pdf_url, "http://arxiv.org/pdf/0901.0001v1");
    }

    #[test]
    fn entries_without_a_pdf_link_are_skipped() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <title>No pdf here</title>
    <summary>Abstract only.</summary>
    <author><name>A. Author</name></author>
    <link href="http://arxiv.org/abs/0901.0002v1" rel="alternate" type="text/html"/>
  </entry>
  <entry>
    <title>Has a pdf</title>
    <summary>Abstract.</summary>
    <author><name>B. Author</name></author>
    <link title="pdf" href="http://arxiv.org/pdf/0901.0003v1" rel="related"/>
  </entry>
</feed>"#;

        let papers = parse_atom_feed(xml).unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "Has a pdf");
    }

    #[test]
    fn feed_order_is_preserved() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <title>First</title><summary>s</summary>
    <author><name>A</name></author>
    <link title="pdf" href="http://arxiv.org/pdf/1"/>
  </entry>
  <entry>
    <title>Second</title><summary>s</summary>
    <author><name>B</name></author>
    <link title="pdf" href="http://arxiv.org/pdf/2"/>
  </entry>
</feed>"#;

        let papers = parse_atom_feed(xml).unwrap();
        assert_eq!(papers[0].title, "First");
        assert_eq!(papers[1].title, "Second");
    }

    #[test]
    fn empty_feed_yields_no_papers() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>empty</title></feed>"#;
        assert!(parse_atom_feed(xml).unwrap().is_empty());
    }
}
