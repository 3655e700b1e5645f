//! Raw page text sources and per-document chunk extraction.

use std::path::Path;

use tracing::debug;

use crate::chunking::{Chunker, PageText};
use crate::cleaning::clean_page_text;
use crate::config::document_name;
use crate::document::Chunk;
use crate::error::{DocsiftError, Result};

/// Yields the raw text of each page of a document, in page order.
///
/// Page text is untrusted and is cleaned before chunking. Implementations
/// are called from blocking worker threads.
pub trait PageSource: Send + Sync {
    /// Read `path` and return one string per page.
    fn pages(&self, path: &Path) -> Result<Vec<String>>;
}

/// A [`PageSource`] backed by the `pdf-extract` crate.
///
/// Text is extracted page by page, so every page of the PDF yields exactly
/// one entry. A document with no text (for example a scanned image PDF)
/// yields pages that clean to nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfPageSource;

impl PageSource for PdfPageSource {
    fn pages(&self, path: &Path) -> Result<Vec<String>> {
        let document = document_name(path);
        if !path.exists() {
            return Err(DocsiftError::ExtractionError {
                document,
                message: format!("file not found: {}", path.display()),
            });
        }

        let pages = pdf_extract::extract_text_by_pages(path).map_err(|e| {
            DocsiftError::ExtractionError {
                document: document.clone(),
                message: format!("PDF extraction failed: {e}"),
            }
        })?;
        debug!(document = %document, page_count = pages.len(), "extracted PDF text");
        Ok(pages)
    }
}

/// Read, clean, and chunk one document.
///
/// Pages that clean to nothing contribute no chunks.
///
/// # Errors
///
/// Returns [`DocsiftError::ExtractionError`] if the source cannot read the
/// document.
pub fn extract_chunks(
    source: &dyn PageSource,
    chunker: &dyn Chunker,
    path: &Path,
) -> Result<Vec<Chunk>> {
    let document = document_name(path);
    let pages = source.pages(path)?;

    let mut chunks = Vec::new();
    for (page_index, raw) in pages.iter().enumerate() {
        let cleaned = clean_page_text(raw);
        if cleaned.is_empty() {
            debug!(document = %document, page = page_index + 1, "page has no usable text");
            continue;
        }
        let page = PageText { source: path, document: &document, page_index, text: &cleaned };
        chunks.extend(chunker.chunk(&page));
    }
    Ok(chunks)
}
