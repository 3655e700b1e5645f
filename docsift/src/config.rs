//! Configuration for the ranking pipeline and the run input contract.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocsiftError, Result};

/// Tuning knobs for chunking, retrieval, reranking, and summarization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankConfig {
    /// Chunk window size in words.
    pub chunk_size: usize,
    /// Number of words shared by consecutive chunks of one page.
    pub chunk_overlap: usize,
    /// Number of bi-encoder candidates handed to the reranker.
    pub candidate_pool: usize,
    /// Number of sections in the final ranking.
    pub top_k: usize,
    /// Maximum number of final sections from any single document.
    pub max_per_doc: usize,
    /// Number of sentences requested from the sentence selector per section.
    pub title_candidates: usize,
    /// Number of selected sentences emitted as subsection excerpts per section.
    pub excerpts_per_section: usize,
    /// Maximum number of documents extracted concurrently.
    pub max_workers: usize,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            chunk_size: 250,
            chunk_overlap: 50,
            candidate_pool: 50,
            top_k: 5,
            max_per_doc: 2,
            title_candidates: 3,
            excerpts_per_section: 2,
            max_workers: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

impl RankConfig {
    /// Create a new builder for constructing a [`RankConfig`].
    pub fn builder() -> RankConfigBuilder {
        RankConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::ConfigError`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - any of `candidate_pool`, `top_k`, `max_per_doc`, `title_candidates`,
    ///   `max_workers` is zero
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(DocsiftError::ConfigError("chunk_size must be greater than zero".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(DocsiftError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        let positive = [
            ("candidate_pool", self.candidate_pool),
            ("top_k", self.top_k),
            ("max_per_doc", self.max_per_doc),
            ("title_candidates", self.title_candidates),
            ("max_workers", self.max_workers),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(DocsiftError::ConfigError(format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RankConfig`].
#[derive(Debug, Clone, Default)]
pub struct RankConfigBuilder {
    config: RankConfig,
}

impl RankConfigBuilder {
    /// Set the chunk window size in words.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in words.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of retrieval candidates passed to the reranker.
    pub fn candidate_pool(mut self, size: usize) -> Self {
        self.config.candidate_pool = size;
        self
    }

    /// Set the number of final ranked sections.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the per-document cap on final sections.
    pub fn max_per_doc(mut self, max: usize) -> Self {
        self.config.max_per_doc = max;
        self
    }

    /// Set how many sentences the selector returns per section.
    pub fn title_candidates(mut self, n: usize) -> Self {
        self.config.title_candidates = n;
        self
    }

    /// Set how many selected sentences become subsection excerpts.
    pub fn excerpts_per_section(mut self, n: usize) -> Self {
        self.config.excerpts_per_section = n;
        self
    }

    /// Set the extraction worker count.
    pub fn max_workers(mut self, n: usize) -> Self {
        self.config.max_workers = n;
        self
    }

    /// Build the [`RankConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RankConfig::validate`].
    pub fn build(self) -> Result<RankConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// One run's worth of input: who is asking, what they need, and which files to read.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub persona: String,
    pub task: String,
    pub documents: Vec<PathBuf>,
}

impl RunRequest {
    pub fn new(
        persona: impl Into<String>,
        task: impl Into<String>,
        documents: Vec<PathBuf>,
    ) -> Self {
        Self { persona: persona.into(), task: task.into(), documents }
    }

    /// Reject requests with an empty persona, task, or document list.
    pub fn validate(&self) -> Result<()> {
        if self.persona.trim().is_empty() {
            return Err(DocsiftError::ConfigError("persona role must not be empty".into()));
        }
        if self.task.trim().is_empty() {
            return Err(DocsiftError::ConfigError("task description must not be empty".into()));
        }
        if self.documents.is_empty() {
            return Err(DocsiftError::ConfigError("at least one input document is required".into()));
        }
        Ok(())
    }

    /// File names of the requested documents, in request order.
    pub fn document_names(&self) -> Vec<String> {
        self.documents.iter().map(|p| document_name(p)).collect()
    }
}

/// The display name of a document: its file name, or the full path if it has none.
pub fn document_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// The on-disk input JSON describing a run.
///
/// ```json
/// {
///   "persona": { "role": "Travel Planner" },
///   "job_to_be_done": { "task": "Plan a 4-day trip" },
///   "documents": [{ "filename": "south_of_france.pdf", "title": "South of France" }]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InputSpec {
    #[serde(default)]
    pub persona: PersonaSpec,
    #[serde(default)]
    pub job_to_be_done: JobSpec,
    #[serde(default)]
    pub documents: Vec<DocumentSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_info: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PersonaSpec {
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobSpec {
    #[serde(default)]
    pub task: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentSpec {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl InputSpec {
    /// Parse the input file from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Turn the input into a validated [`RunRequest`], resolving file names
    /// against `pdf_dir`. Entries without a file name are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::ConfigError`] if the persona role, task, or
    /// document list is empty.
    pub fn into_request(self, pdf_dir: &Path) -> Result<RunRequest> {
        let documents = self
            .documents
            .into_iter()
            .filter_map(|doc| doc.filename)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .map(|name| pdf_dir.join(name))
            .collect();
        let request = RunRequest::new(
            self.persona.role.trim(),
            self.job_to_be_done.task.trim(),
            documents,
        );
        request.validate()?;
        Ok(request)
    }
}
