//! Page chunking.
//!
//! This module provides the [`Chunker`] trait and [`WordWindowChunker`], which
//! splits cleaned page text into overlapping fixed-size word windows.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::document::Chunk;
use crate::error::{DocsiftError, Result};

/// Number of leading characters of the chunk text mixed into its identifier.
const ID_PREFIX_CHARS: usize = 30;

/// One cleaned page handed to a [`Chunker`].
#[derive(Debug, Clone, Copy)]
pub struct PageText<'a> {
    /// Path the document was read from.
    pub source: &'a Path,
    /// Display name of the document.
    pub document: &'a str,
    /// 0-based page index.
    pub page_index: usize,
    /// Cleaned page text.
    pub text: &'a str,
}

/// A strategy for splitting a cleaned page into chunks.
pub trait Chunker: Send + Sync {
    /// Split a page into chunks.
    ///
    /// Returns an empty `Vec` if the page text is empty.
    fn chunk(&self, page: &PageText<'_>) -> Vec<Chunk>;
}

/// Splits text into windows of `chunk_size` words, consecutive windows sharing
/// `chunk_overlap` words.
///
/// The final window holds whatever words remain, so every word is covered and
/// the last window always ends at the last word.
///
/// # Example
///
/// ```rust,ignore
/// use docsift::WordWindowChunker;
///
/// let chunker = WordWindowChunker::new(250, 50)?;
/// let windows = chunker.split(&cleaned_text);
/// ```
#[derive(Debug, Clone)]
pub struct WordWindowChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl WordWindowChunker {
    /// Create a new `WordWindowChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::ConfigError`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`, since the window would never advance.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(DocsiftError::ConfigError("chunk_size must be greater than zero".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(DocsiftError::ConfigError(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into space-joined word windows.
    pub fn split(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut windows = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(words.len());
            windows.push(words[start..end].join(" "));
            if start + self.chunk_size >= words.len() {
                break;
            }
            start += step;
        }
        windows
    }
}

impl Chunker for WordWindowChunker {
    fn chunk(&self, page: &PageText<'_>) -> Vec<Chunk> {
        self.split(page.text)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| Chunk {
                document: page.document.to_string(),
                page_number: page.page_index + 1,
                chunk_id: chunk_id(page.source, page.page_index, chunk_index, &text),
                chunk_index,
                text,
            })
            .collect()
    }
}

/// Content-addressed chunk identifier.
///
/// SHA-256 over the source path, 0-based page index, chunk index within the
/// page, and the first 30 characters of the chunk text, hex encoded.
pub fn chunk_id(source: &Path, page_index: usize, chunk_index: usize, text: &str) -> String {
    let prefix: String = text.chars().take(ID_PREFIX_CHARS).collect();
    let mut hasher = Sha256::new();
    hasher.update(format!("{}-{page_index}-{chunk_index}-{prefix}", source.display()).as_bytes());
    format!("{:x}", hasher.finalize())
}
