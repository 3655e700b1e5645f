//! Section ranking pipeline orchestrator.
//!
//! The [`Pipeline`] coordinates the full run by composing a [`PageSource`],
//! an [`EmbeddingProvider`], and a [`CrossEncoder`]:
//!
//! 1. extract chunks from every document concurrently
//! 2. embed the persona/task query and every chunk
//! 3. retrieve the best candidates by cosine similarity
//! 4. rerank them with the cross-encoder under a per-document cap
//! 5. title each section and pick excerpts with the sentence selector
//!
//! # Example
//!
//! ```rust,ignore
//! use docsift::{HashingEmbeddingProvider, LexicalCrossEncoder, PdfPageSource, Pipeline, RankConfig};
//!
//! let pipeline = Pipeline::builder()
//!     .config(RankConfig::default())
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
//!     .cross_encoder(Arc::new(LexicalCrossEncoder::new()))
//!     .page_source(Arc::new(PdfPageSource))
//!     .build()?;
//!
//! let record = pipeline.run_to_file(&request, Path::new("out/result.json")).await?;
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::{error, info, warn};

use crate::chunking::{Chunker, WordWindowChunker};
use crate::config::{RankConfig, RunRequest, document_name};
use crate::document::{Chunk, Query, RankedSection, SectionInfo};
use crate::embedding::EmbeddingProvider;
use crate::error::{DocsiftError, Result};
use crate::output::{ExtractedSection, OutputRecord, RunMetadata, SubsectionAnalysis};
use crate::reranker::{CrossEncoder, CrossEncoderReranker, Reranker};
use crate::retrieval::retrieve_candidates;
use crate::selection::{SentenceSelector, fallback_excerpt};
use crate::source::{PageSource, extract_chunks};

/// The result of extracting one document.
#[derive(Debug)]
pub struct DocumentOutcome {
    /// Position of the document in the request.
    pub index: usize,
    pub document: String,
    pub result: Result<Vec<Chunk>>,
}

/// Extraction outcomes of a run, partitioned into usable chunks and failures.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Chunks of every successfully extracted document, ordered by request
    /// position, page, and position within the page.
    pub chunks: Vec<Chunk>,
    /// Documents that were read but produced no chunks.
    pub empty_documents: Vec<String>,
    /// Documents that could not be extracted, with the reason.
    pub failures: Vec<(String, DocsiftError)>,
}

impl ExtractionReport {
    /// Partition outcomes that arrived in completion order.
    pub fn from_outcomes(mut outcomes: Vec<DocumentOutcome>) -> Self {
        outcomes.sort_by_key(|outcome| outcome.index);

        let mut report = Self::default();
        for outcome in outcomes {
            match outcome.result {
                Ok(chunks) => {
                    let before = report.chunks.len();
                    report.chunks.extend(chunks.into_iter().filter(|c| !c.text.trim().is_empty()));
                    if report.chunks.len() == before {
                        report.empty_documents.push(outcome.document);
                    }
                }
                Err(e) => report.failures.push((outcome.document, e)),
            }
        }
        report
    }
}

/// The section ranking pipeline.
///
/// Construct one via [`Pipeline::builder()`]. All collaborators are shared
/// handles, so one pipeline can serve several runs.
pub struct Pipeline {
    config: RankConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    page_source: Arc<dyn PageSource>,
    chunker: Arc<dyn Chunker>,
    reranker: CrossEncoderReranker,
    selector: SentenceSelector,
}

impl Pipeline {
    /// Create a new [`PipelineBuilder`].
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RankConfig {
        &self.config
    }

    /// Extract chunks from every document concurrently.
    ///
    /// Runs one blocking task per document, at most `max_workers` at a time.
    /// A document that fails (or whose task panics) is recorded in
    /// [`ExtractionReport::failures`] and does not affect the others.
    pub async fn extract(&self, documents: &[PathBuf]) -> ExtractionReport {
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<Id, (usize, String)> = HashMap::new();
        let mut outcomes = Vec::with_capacity(documents.len());

        for (index, path) in documents.iter().cloned().enumerate() {
            let document = document_name(&path);
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    outcomes.push(DocumentOutcome {
                        index,
                        document: document.clone(),
                        result: Err(DocsiftError::ExtractionError {
                            document,
                            message: format!("worker pool closed: {e}"),
                        }),
                    });
                    continue;
                }
            };
            let source = Arc::clone(&self.page_source);
            let chunker = Arc::clone(&self.chunker);
            let handle = tasks.spawn_blocking(move || {
                let _permit = permit;
                extract_chunks(source.as_ref(), chunker.as_ref(), &path)
            });
            pending.insert(handle.id(), (index, document));
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, joined) = match joined {
                Ok((id, result)) => (id, Ok(result)),
                Err(e) => (e.id(), Err(e)),
            };
            let Some((index, document)) = pending.remove(&id) else {
                continue;
            };
            let result = match joined {
                Ok(result) => result,
                Err(e) => {
                    error!(document = %document, error = %e, "extraction task aborted");
                    Err(DocsiftError::ExtractionError {
                        document: document.clone(),
                        message: format!("extraction task failed: {e}"),
                    })
                }
            };
            if let Ok(chunks) = &result {
                info!(document = %document, chunk_count = chunks.len(), "extracted document");
            }
            outcomes.push(DocumentOutcome { index, document, result });
        }

        let report = ExtractionReport::from_outcomes(outcomes);
        for (document, e) in &report.failures {
            warn!(document = %document, error = %e, "skipping document that failed extraction");
        }
        for document in &report.empty_documents {
            warn!(document = %document, "document produced no extractable text");
        }
        report
    }

    /// Run the pipeline: extract → embed → retrieve → rerank → summarize.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::ConfigError`] for an invalid request, and
    /// embedding or reranker errors if an oracle fails. Per-document
    /// extraction failures are logged and skipped.
    pub async fn run(&self, request: &RunRequest) -> Result<OutputRecord> {
        request.validate()?;
        let started = Instant::now();

        let report = self.extract(&request.documents).await;
        info!(
            chunk_count = report.chunks.len(),
            failed = report.failures.len(),
            "extraction finished"
        );

        let query = Query::new(request.persona.as_str(), request.task.as_str());
        let query_embedding = self.embed_query(&query).await?;
        let ranked = self.rank(&query, &query_embedding, &report.chunks).await?;

        let mut extracted_sections = Vec::with_capacity(ranked.len());
        let mut subsection_analysis = Vec::new();
        for section in &ranked {
            let sentences = self
                .selector
                .select(&section.text, &query_embedding, self.config.title_candidates)
                .await?;
            let section_title = sentences
                .first()
                .filter(|title| !title.is_empty())
                .cloned()
                .unwrap_or_else(|| fallback_excerpt(&section.text));

            for sentence in sentences.iter().take(self.config.excerpts_per_section) {
                subsection_analysis.push(SubsectionAnalysis {
                    document: section.document.clone(),
                    refined_text: sentence.clone(),
                    page_number: section.page_number,
                });
            }
            extracted_sections.push(ExtractedSection {
                document: section.document.clone(),
                section_title,
                importance_rank: section.rank,
                page_number: section.page_number,
            });
        }

        let input_documents = request.document_names();
        log_coverage(&input_documents, &ranked);

        info!(
            sections = extracted_sections.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline completed"
        );

        Ok(OutputRecord {
            metadata: RunMetadata {
                input_documents,
                persona: request.persona.clone(),
                job_to_be_done: request.task.clone(),
                processing_timestamp: chrono::Local::now()
                    .format("%Y-%m-%dT%H:%M:%S%.6f")
                    .to_string(),
            },
            extracted_sections,
            subsection_analysis,
        })
    }

    /// Run the pipeline and persist the record at `output`.
    ///
    /// Nothing is written if the run fails.
    pub async fn run_to_file(&self, request: &RunRequest, output: &Path) -> Result<OutputRecord> {
        let record = self.run(request).await?;
        record.write_to(output).await?;
        Ok(record)
    }

    async fn embed_query(&self, query: &Query) -> Result<Vec<f32>> {
        self.embedding_provider.embed(query.text()).await.map_err(|e| {
            error!(provider = self.embedding_provider.name(), error = %e, "query embedding failed");
            e
        })
    }

    /// Embed `chunks`, retrieve candidates, and rerank them.
    async fn rank(
        &self,
        query: &Query,
        query_embedding: &[f32],
        chunks: &[Chunk],
    ) -> Result<Vec<RankedSection>> {
        if chunks.is_empty() {
            warn!("no chunks extracted from any document");
            return Ok(Vec::new());
        }

        let sections: Vec<SectionInfo> = chunks.iter().map(SectionInfo::from).collect();
        let texts: Vec<&str> = sections.iter().map(|s| s.text.as_str()).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
            error!(provider = self.embedding_provider.name(), error = %e, "chunk embedding failed");
            e
        })?;
        if embeddings.len() != sections.len() {
            return Err(DocsiftError::EmbeddingError {
                provider: self.embedding_provider.name().to_string(),
                message: format!(
                    "returned {} embeddings for {} chunks",
                    embeddings.len(),
                    sections.len()
                ),
            });
        }
        let vectors: Vec<Option<Vec<f32>>> = embeddings.into_iter().map(Some).collect();

        let candidates =
            retrieve_candidates(query_embedding, &vectors, &sections, self.config.candidate_pool)?;
        info!(candidate_count = candidates.len(), "retrieved candidates for reranking");

        let ranked = self.reranker.rerank(query, candidates).await?;
        info!(section_count = ranked.len(), "reranked sections");
        Ok(ranked)
    }
}

fn log_coverage(input_documents: &[String], ranked: &[RankedSection]) {
    let covered: HashSet<&str> = ranked.iter().map(|s| s.document.as_str()).collect();
    let missing: Vec<&str> =
        input_documents.iter().map(String::as_str).filter(|d| !covered.contains(d)).collect();
    if missing.is_empty() {
        info!("every input document contributed a section");
    } else {
        warn!(missing = ?missing, "documents without a ranked section");
    }
}

/// Builder for constructing a [`Pipeline`].
///
/// All fields are required. Call [`build()`](PipelineBuilder::build) to
/// validate and produce the pipeline.
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<RankConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    cross_encoder: Option<Arc<dyn CrossEncoder>>,
    page_source: Option<Arc<dyn PageSource>>,
}

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RankConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the bi-encoder used for retrieval and sentence selection.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the joint scorer used for reranking.
    pub fn cross_encoder(mut self, encoder: Arc<dyn CrossEncoder>) -> Self {
        self.cross_encoder = Some(encoder);
        self
    }

    /// Set the source of raw page text.
    pub fn page_source(mut self, source: Arc<dyn PageSource>) -> Self {
        self.page_source = Some(source);
        self
    }

    /// Build the [`Pipeline`], validating the configuration and that all
    /// required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::ConfigError`] if a field is missing or the
    /// configuration is inconsistent.
    pub fn build(self) -> Result<Pipeline> {
        let config =
            self.config.ok_or_else(|| DocsiftError::ConfigError("config is required".into()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| DocsiftError::ConfigError("embedding_provider is required".into()))?;
        let cross_encoder = self
            .cross_encoder
            .ok_or_else(|| DocsiftError::ConfigError("cross_encoder is required".into()))?;
        let page_source = self
            .page_source
            .ok_or_else(|| DocsiftError::ConfigError("page_source is required".into()))?;

        let chunker = Arc::new(WordWindowChunker::new(config.chunk_size, config.chunk_overlap)?);
        let reranker = CrossEncoderReranker::new(cross_encoder, config.top_k, config.max_per_doc);
        let selector = SentenceSelector::new(Arc::clone(&embedding_provider));

        Ok(Pipeline { config, embedding_provider, page_source, chunker, reranker, selector })
    }
}
