//! PDF text extraction.
use crate::error::{Error, Result};
use crate::traits::TextExtractor;

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self { Self }
}

impl TextExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String> {
        // pdf-extract panics on some malformed inputs instead of returning Err.
        let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
            .map_err(|_| Error::Extraction("PDF parser aborted on malformed input".into()))?
            .map_err(|e| Error::Extraction(e.to_string()))?;
        let text = join_pages(pages.iter().map(String::as_str));
        tracing::debug!(pages = pages.len(), chars = text.len(), "extracted document text");
        Ok(text)
    }
}

/// Concatenate page texts, each followed by a newline. Blank pages contribute nothing.
pub fn join_pages<'a, I>(pages: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut text = String::new();
    for page in pages {
        if page.trim().is_empty() {
            continue;
        }
        text.push_str(page);
        text.push('\n');
    }
    text
}
