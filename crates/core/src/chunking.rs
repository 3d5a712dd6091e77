use crate::models::PageChunk;

/// Turn per-page texts into overlapped chunk texts, one chunk per page.
///
/// Chunk 0 is page 0 verbatim. For every later page, the last third of the
/// previous page's text (by character count) is prepended, so context
/// survives a page boundary. The overlap is always taken from the original
/// previous page, never from an already-overlapped chunk, which keeps it
/// from compounding across more than two pages.
pub fn overlap_chunks(pages: &[String]) -> Vec<String> {
    let mut chunks = Vec::with_capacity(pages.len());

    for (index, page) in pages.iter().enumerate() {
        if index == 0 {
            chunks.push(page.clone());
            continue;
        }

        let previous: Vec<char> = pages[index - 1].chars().collect();
        let overlap = previous.len() / 3;

        let mut chunk = String::with_capacity(overlap + page.len());
        chunk.extend(&previous[previous.len() - overlap..]);
        chunk.push_str(page);
        chunks.push(chunk);
    }

    chunks
}

/// Build the store-ready chunks for one paper.
///
/// `ordinal` is the paper's 1-based position in the search results; page
/// indices are 0-based. Ids are `paper_{ordinal}_page_{page}`.
pub fn build_chunks(ordinal: usize, title: &str, pages: &[String]) -> Vec<PageChunk> {
    overlap_chunks(pages)
        .into_iter()
        .enumerate()
        .map(|(page, text)| PageChunk {
            id: format!("paper_{ordinal}_page_{page}"),
            text,
            title: title.to_string(),
            page,
        })
        .collect()
}
