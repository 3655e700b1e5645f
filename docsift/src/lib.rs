//! Persona-driven section extraction for batches of PDF documents.
//!
//! Given a persona and a task, `docsift` finds the document sections most
//! relevant to that task and summarizes them:
//!
//! - [`cleaning`]: strips page-number and header noise from page text
//! - [`chunking`]: overlapping word windows with content-addressed IDs
//! - [`embedding`]: the bi-encoder oracle trait and an offline provider
//! - [`retrieval`]: cosine-similarity candidate retrieval
//! - [`reranker`]: cross-encoder reranking with a per-document cap
//! - [`selection`]: query-aligned sentence selection for titles and excerpts
//! - [`pipeline`]: the orchestrator tying it all together
//!
//! Model backends are injected as [`EmbeddingProvider`] and [`CrossEncoder`]
//! trait objects. Enable the `tei` feature for oracles served by a Text
//! Embeddings Inference server.

pub mod chunking;
pub mod cleaning;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod reranker;
pub mod retrieval;
pub mod selection;
pub mod source;
#[cfg(feature = "tei")]
pub mod tei;

pub use chunking::{Chunker, PageText, WordWindowChunker, chunk_id};
pub use cleaning::clean_page_text;
pub use config::{InputSpec, RankConfig, RankConfigBuilder, RunRequest};
pub use document::{Chunk, Query, RankedSection, SectionInfo};
pub use embedding::{EmbeddingProvider, HashingEmbeddingProvider};
pub use error::{DocsiftError, Result};
pub use output::{ExtractedSection, OutputRecord, RunMetadata, SubsectionAnalysis};
pub use pipeline::{DocumentOutcome, ExtractionReport, Pipeline, PipelineBuilder};
pub use reranker::{CrossEncoder, CrossEncoderReranker, LexicalCrossEncoder, Reranker};
pub use retrieval::{cosine_similarity, retrieve_candidates};
pub use selection::SentenceSelector;
pub use source::{PageSource, PdfPageSource};
