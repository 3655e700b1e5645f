//! Error types for the `docsift` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while extracting and ranking document sections.
#[derive(Debug, Error)]
pub enum DocsiftError {
    /// A configuration or input validation error. Fatal, raised before processing.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Text extraction failed for a single document.
    #[error("Extraction error ({document}): {message}")]
    ExtractionError {
        /// The document that could not be read.
        document: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred while scoring candidates with a cross-encoder.
    #[error("Reranker error ({reranker}): {message}")]
    RerankerError {
        /// The scorer that produced the error.
        reranker: String,
        /// A description of the failure.
        message: String,
    },

    /// An error in the pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// The output record could not be persisted.
    #[error("Output error ({}): {message}", .path.display())]
    OutputError {
        /// The destination path.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DocsiftError {
    /// Returns `true` for errors that abort a whole run rather than a single document.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DocsiftError::ExtractionError { .. })
    }
}

/// A convenience result type for docsift operations.
pub type Result<T> = std::result::Result<T, DocsiftError>;
