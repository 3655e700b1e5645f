//! The run output record and its persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{DocsiftError, Result};

/// Everything a run produces, serialized as the output JSON file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputRecord {
    pub metadata: RunMetadata,
    pub extracted_sections: Vec<ExtractedSection>,
    pub subsection_analysis: Vec<SubsectionAnalysis>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMetadata {
    pub input_documents: Vec<String>,
    pub persona: String,
    pub job_to_be_done: String,
    /// ISO-8601 time at which the record was assembled.
    pub processing_timestamp: String,
}

/// A ranked section, titled by its most query-aligned sentence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedSection {
    pub document: String,
    pub section_title: String,
    pub importance_rank: usize,
    pub page_number: usize,
}

/// A refined excerpt taken from a ranked section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubsectionAnalysis {
    pub document: String,
    pub refined_text: String,
    pub page_number: usize,
}

impl OutputRecord {
    /// Write the record as indented UTF-8 JSON, replacing any file at `path`.
    ///
    /// Parent directories are created as needed. The JSON goes to a sibling
    /// temporary file first and is renamed into place, so readers never see a
    /// partial file.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::OutputError`] if the directory, temporary file,
    /// or rename fails.
    pub async fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| output_error(parent, e))?;
        }

        let tmp = temp_path(path);
        tokio::fs::write(&tmp, json.as_bytes()).await.map_err(|e| output_error(&tmp, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(output_error(path, e));
        }

        info!(path = %path.display(), sections = self.extracted_sections.len(), "wrote output");
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn output_error(path: &Path, e: std::io::Error) -> DocsiftError {
    error!(path = %path.display(), error = %e, "failed to write output");
    DocsiftError::OutputError { path: path.to_path_buf(), message: e.to_string() }
}
