//! End-to-end pipeline scenarios with in-memory page sources.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use docsift::config::document_name;
use docsift::{
    DocsiftError, EmbeddingProvider, HashingEmbeddingProvider, LexicalCrossEncoder, PageSource,
    Pipeline, RankConfig, RunRequest,
};

/// Serves fixed pages per file name; unknown files fail like unreadable PDFs.
struct MemorySource {
    documents: HashMap<String, Vec<String>>,
}

impl MemorySource {
    fn new(documents: Vec<(&str, Vec<String>)>) -> Self {
        Self { documents: documents.into_iter().map(|(name, pages)| (name.to_string(), pages)).collect() }
    }
}

impl PageSource for MemorySource {
    fn pages(&self, path: &Path) -> docsift::Result<Vec<String>> {
        let name = document_name(path);
        if name.starts_with("panics") {
            panic!("parser crashed on {name}");
        }
        self.documents.get(&name).cloned().ok_or(DocsiftError::ExtractionError {
            document: name,
            message: "corrupt file".into(),
        })
    }
}

struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> docsift::Result<Vec<f32>> {
        Err(DocsiftError::EmbeddingError {
            provider: "Failing".into(),
            message: "model session not available".into(),
        })
    }

    fn dimensions(&self) -> usize {
        8
    }

    fn name(&self) -> &str {
        "Failing"
    }
}

fn travel_page(city: &str, n: usize) -> String {
    format!(
        "Page {n}\n\
         {city} offers coastal seafood restaurants for groups of friends.\n\
         A trip to {city} with college friends can include beach days and nightlife.\n\
         Plan each day of the trip around local markets and evening activities.\n\
         {n}"
    )
}

fn unrelated_page(n: usize) -> String {
    format!(
        "Section {n}\n\
         Hydraulic pump maintenance requires checking every seal carefully.\n\
         Replace the filter cartridge after four hundred operating hours."
    )
}

fn pipeline(source: MemorySource, config: RankConfig) -> Pipeline {
    Pipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(HashingEmbeddingProvider::new(256)))
        .cross_encoder(Arc::new(LexicalCrossEncoder::new()))
        .page_source(Arc::new(source))
        .build()
        .unwrap()
}

fn request(documents: &[&str]) -> RunRequest {
    RunRequest::new(
        "Travel Planner",
        "Plan a trip of 4 days for a group of 10 college friends",
        documents.iter().map(|d| PathBuf::from("/input").join(d)).collect(),
    )
}

fn three_city_source() -> MemorySource {
    MemorySource::new(vec![
        ("nice.pdf", (1..=4).map(|n| travel_page("Nice", n)).collect()),
        ("marseille.pdf", (1..=4).map(|n| travel_page("Marseille", n)).collect()),
        ("cannes.pdf", (1..=4).map(|n| travel_page("Cannes", n)).collect()),
    ])
}

#[tokio::test]
async fn caps_sections_per_document() {
    let pipeline = pipeline(three_city_source(), RankConfig::default());
    let record = pipeline.run(&request(&["nice.pdf", "marseille.pdf", "cannes.pdf"])).await.unwrap();

    assert_eq!(record.extracted_sections.len(), 5);
    let mut per_doc: HashMap<&str, usize> = HashMap::new();
    for section in &record.extracted_sections {
        *per_doc.entry(section.document.as_str()).or_default() += 1;
    }
    assert!(per_doc.values().all(|count| *count <= 2), "per-document counts: {per_doc:?}");

    let ranks: Vec<usize> = record.extracted_sections.iter().map(|s| s.importance_rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    assert!(record.extracted_sections.iter().all(|s| !s.section_title.is_empty()));
    assert!(record.subsection_analysis.len() <= 10);
}

#[tokio::test]
async fn document_without_text_and_unreadable_document_are_skipped() {
    let source = MemorySource::new(vec![
        ("nice.pdf", (1..=3).map(|n| travel_page("Nice", n)).collect()),
        ("scanned.pdf", vec!["".to_string(), "12".to_string()]),
        ("cannes.pdf", (1..=3).map(|n| travel_page("Cannes", n)).collect()),
    ]);
    let pipeline = pipeline(source, RankConfig::default());
    let documents = ["nice.pdf", "scanned.pdf", "cannes.pdf", "missing.pdf"];
    let record = pipeline.run(&request(&documents)).await.unwrap();

    assert_eq!(record.metadata.input_documents, documents);
    assert_eq!(record.extracted_sections.len(), 4);
    assert!(
        record
            .extracted_sections
            .iter()
            .all(|s| s.document == "nice.pdf" || s.document == "cannes.pdf")
    );
}

#[tokio::test]
async fn extraction_report_lists_failures() {
    let source = MemorySource::new(vec![("nice.pdf", vec![travel_page("Nice", 1)])]);
    let pipeline = pipeline(source, RankConfig::default());
    let report = pipeline
        .extract(&[PathBuf::from("/input/nice.pdf"), PathBuf::from("/input/broken.pdf")])
        .await;
    assert_eq!(report.chunks.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "broken.pdf");
}

#[tokio::test]
async fn crashed_extraction_task_is_reported_as_failure() {
    let source = MemorySource::new(vec![
        ("nice.pdf", vec![travel_page("Nice", 1)]),
        ("cannes.pdf", vec![travel_page("Cannes", 1)]),
    ]);
    let pipeline = pipeline(source, RankConfig::default());
    let report = pipeline
        .extract(&[
            PathBuf::from("/input/nice.pdf"),
            PathBuf::from("/input/panics.pdf"),
            PathBuf::from("/input/cannes.pdf"),
        ])
        .await;

    let documents: Vec<&str> = report.chunks.iter().map(|c| c.document.as_str()).collect();
    assert_eq!(documents, vec!["nice.pdf", "cannes.pdf"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "panics.pdf");
    assert!(matches!(
        &report.failures[0].1,
        DocsiftError::ExtractionError { document, .. } if document == "panics.pdf"
    ));
}

#[tokio::test]
async fn empty_pages_never_become_candidates() {
    let source = MemorySource::new(vec![(
        "guide.pdf",
        vec!["Header\n3".to_string(), travel_page("Nice", 2), "Footer only\n4".to_string()],
    )]);
    let pipeline = pipeline(source, RankConfig::default());
    let record = pipeline.run(&request(&["guide.pdf"])).await.unwrap();
    assert_eq!(record.extracted_sections.len(), 1);
    assert_eq!(record.extracted_sections[0].page_number, 2);
}

#[tokio::test]
async fn relevant_document_outranks_unrelated_one() {
    let source = MemorySource::new(vec![
        ("manual.pdf", (1..=3).map(unrelated_page).collect()),
        ("nice.pdf", vec![travel_page("Nice", 1)]),
    ]);
    let pipeline = pipeline(source, RankConfig::default());
    let record = pipeline.run(&request(&["manual.pdf", "nice.pdf"])).await.unwrap();
    assert_eq!(record.extracted_sections[0].document, "nice.pdf");
}

#[tokio::test]
async fn repeated_runs_are_identical() {
    let pipeline = pipeline(three_city_source(), RankConfig::default());
    let input = request(&["nice.pdf", "marseille.pdf", "cannes.pdf"]);
    let first = pipeline.run(&input).await.unwrap();
    let second = pipeline.run(&input).await.unwrap();
    assert_eq!(first.extracted_sections, second.extracted_sections);
    assert_eq!(first.subsection_analysis, second.subsection_analysis);
}

#[tokio::test]
async fn oracle_failure_aborts_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out/result.json");
    let pipeline = Pipeline::builder()
        .config(RankConfig::default())
        .embedding_provider(Arc::new(FailingEmbedder))
        .cross_encoder(Arc::new(LexicalCrossEncoder::new()))
        .page_source(Arc::new(three_city_source()))
        .build()
        .unwrap();

    let err = pipeline.run_to_file(&request(&["nice.pdf"]), &output).await.unwrap_err();
    assert!(matches!(err, DocsiftError::EmbeddingError { .. }));
    assert!(err.is_fatal());
    assert!(!output.exists());
}

#[tokio::test]
async fn run_to_file_persists_record() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("nested/challenge_output.json");
    let pipeline = pipeline(three_city_source(), RankConfig::default());
    let record = pipeline.run_to_file(&request(&["nice.pdf", "cannes.pdf"]), &output).await.unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written["metadata"]["persona"], "Travel Planner");
    assert_eq!(
        written["extracted_sections"].as_array().unwrap().len(),
        record.extracted_sections.len()
    );
}

#[tokio::test]
async fn invalid_request_is_rejected_before_extraction() {
    let pipeline = pipeline(three_city_source(), RankConfig::default());
    let err = pipeline.run(&RunRequest::new("", "task", vec![PathBuf::from("a.pdf")])).await.unwrap_err();
    assert!(matches!(err, DocsiftError::ConfigError(_)));

    let err = pipeline.run(&RunRequest::new("persona", "task", vec![])).await.unwrap_err();
    assert!(matches!(err, DocsiftError::ConfigError(_)));
}

#[test]
fn pipeline_rejects_overlapping_window_config() {
    let config = RankConfig { chunk_size: 10, chunk_overlap: 10, ..RankConfig::default() };
    let result = Pipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .cross_encoder(Arc::new(LexicalCrossEncoder::new()))
        .page_source(Arc::new(three_city_source()))
        .build();
    assert!(matches!(result, Err(DocsiftError::ConfigError(_))));
}
