use crate::error::IngestError;
use lopdf::Document;

/// Plain text of one page, indexed by its 0-based position in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page: usize,
    pub text: String,
}

pub trait PdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load_mem(bytes).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (index, (page_no, _page_id)) in document.get_pages().into_iter().enumerate() {
            // Pages without a text layer (scanned figures, cover images)
            // extract as empty; they keep their slot so page indices and
            // chunk counts stay aligned with the document.
            let text = document.extract_text(&[page_no]).unwrap_or_default();
            pages.push(PageText { page: index, text });
        }

        Ok(pages)
    }
}
