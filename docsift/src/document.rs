//! Data types for chunks, queries, and the sections produced at each ranking stage.

use serde::{Deserialize, Serialize};

/// A window of cleaned page text, the atomic unit of retrieval.
///
/// Chunks are created once during extraction and never modified afterwards.
/// Later stages work on [`SectionInfo`] projections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// File name of the source document.
    pub document: String,
    /// 1-based page number.
    pub page_number: usize,
    /// Content-addressed identifier, see [`chunk_id`](crate::chunking::chunk_id).
    pub chunk_id: String,
    /// Position of this chunk within its page.
    pub chunk_index: usize,
    /// The cleaned chunk text.
    pub text: String,
}

/// A chunk projected for ranking, enriched with a score and rank as it moves
/// through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionInfo {
    pub document: String,
    pub page_number: usize,
    pub chunk_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
}

impl SectionInfo {
    /// A copy of this section carrying `score`.
    pub fn with_score(&self, score: f32) -> Self {
        Self { score: Some(score), ..self.clone() }
    }
}

impl From<&Chunk> for SectionInfo {
    fn from(chunk: &Chunk) -> Self {
        Self {
            document: chunk.document.clone(),
            page_number: chunk.page_number,
            chunk_id: chunk.chunk_id.clone(),
            text: chunk.text.clone(),
            score: None,
            rank: None,
        }
    }
}

/// A section that survived reranking and the per-document cap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedSection {
    pub document: String,
    pub page_number: usize,
    pub chunk_id: String,
    pub text: String,
    /// Cross-encoder relevance score; the scale is defined by the scorer.
    pub score: f32,
    /// 1-based position in the final ranking.
    pub rank: usize,
}

impl RankedSection {
    pub(crate) fn from_section(section: SectionInfo, score: f32, rank: usize) -> Self {
        Self {
            document: section.document,
            page_number: section.page_number,
            chunk_id: section.chunk_id,
            text: section.text,
            score,
            rank,
        }
    }
}

impl From<&RankedSection> for SectionInfo {
    fn from(section: &RankedSection) -> Self {
        Self {
            document: section.document.clone(),
            page_number: section.page_number,
            chunk_id: section.chunk_id.clone(),
            text: section.text.clone(),
            score: Some(section.score),
            rank: Some(section.rank),
        }
    }
}

/// The persona and task of a run, combined into one retrieval query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    persona: String,
    task: String,
    text: String,
}

impl Query {
    pub fn new(persona: impl Into<String>, task: impl Into<String>) -> Self {
        let persona = persona.into();
        let task = task.into();
        let text = format!("{persona}: {task}");
        Self { persona, task, text }
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    /// The combined query text, `"{persona}: {task}"`.
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
