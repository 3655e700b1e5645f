use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use docsift::{
    CrossEncoder, EmbeddingProvider, HashingEmbeddingProvider, InputSpec, LexicalCrossEncoder,
    PdfPageSource, Pipeline, RankConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "docsift")]
#[command(about = "Extract the PDF sections most relevant to a persona and task")]
struct Cli {
    /// Directory holding the input JSON and the PDFs it names.
    #[arg(long, default_value = "/app/input")]
    input_dir: PathBuf,
    /// Input JSON; defaults to `challenge1b_input.json` inside the input directory.
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long, default_value = "/app/output/challenge1b_output.json")]
    output: PathBuf,
    #[arg(long)]
    top_k: Option<usize>,
    #[arg(long)]
    max_per_doc: Option<usize>,
    #[arg(long)]
    chunk_size: Option<usize>,
    #[arg(long)]
    chunk_overlap: Option<usize>,
    #[arg(long)]
    candidate_pool: Option<usize>,
    /// Concurrent extraction workers.
    #[arg(long)]
    workers: Option<usize>,
    /// Dimension of the offline hashing embedder.
    #[arg(long, default_value_t = 384)]
    embedding_dims: usize,
    /// TEI server used for embeddings instead of the offline embedder.
    #[cfg(feature = "tei")]
    #[arg(long)]
    tei_url: Option<String>,
    /// TEI server used for reranking instead of the lexical scorer.
    #[cfg(feature = "tei")]
    #[arg(long)]
    tei_rerank_url: Option<String>,
}

impl Cli {
    fn rank_config(&self) -> Result<RankConfig> {
        let mut builder = RankConfig::builder();
        if let Some(k) = self.top_k {
            builder = builder.top_k(k);
        }
        if let Some(max) = self.max_per_doc {
            builder = builder.max_per_doc(max);
        }
        if let Some(size) = self.chunk_size {
            builder = builder.chunk_size(size);
        }
        if let Some(overlap) = self.chunk_overlap {
            builder = builder.chunk_overlap(overlap);
        }
        if let Some(pool) = self.candidate_pool {
            builder = builder.candidate_pool(pool);
        }
        if let Some(workers) = self.workers {
            builder = builder.max_workers(workers);
        }
        Ok(builder.build()?)
    }

    #[cfg(feature = "tei")]
    async fn oracles(&self) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn CrossEncoder>)> {
        use docsift::tei::{TeiCrossEncoder, TeiEmbeddingProvider};

        let embedder: Arc<dyn EmbeddingProvider> = match &self.tei_url {
            Some(url) => Arc::new(TeiEmbeddingProvider::connect(url).await?),
            None => Arc::new(HashingEmbeddingProvider::new(self.embedding_dims)),
        };
        let scorer: Arc<dyn CrossEncoder> = match &self.tei_rerank_url {
            Some(url) => Arc::new(TeiCrossEncoder::connect(url).await?),
            None => Arc::new(LexicalCrossEncoder::new()),
        };
        Ok((embedder, scorer))
    }

    #[cfg(not(feature = "tei"))]
    async fn oracles(&self) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn CrossEncoder>)> {
        Ok((
            Arc::new(HashingEmbeddingProvider::new(self.embedding_dims)),
            Arc::new(LexicalCrossEncoder::new()),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if !cli.input_dir.is_dir() {
        bail!("input directory {} not found", cli.input_dir.display());
    }
    let input_path =
        cli.input.clone().unwrap_or_else(|| cli.input_dir.join("challenge1b_input.json"));
    let text = tokio::fs::read_to_string(&input_path)
        .await
        .with_context(|| format!("failed to read input file {}", input_path.display()))?;
    let request = InputSpec::from_json(&text)
        .and_then(|spec| spec.into_request(&cli.input_dir))
        .with_context(|| format!("invalid input file {}", input_path.display()))?;

    let config = cli.rank_config()?;
    let (embedder, scorer) = cli.oracles().await?;
    info!(
        embedder = embedder.name(),
        reranker = scorer.name(),
        documents = request.documents.len(),
        "starting run"
    );

    let pipeline = Pipeline::builder()
        .config(config)
        .embedding_provider(embedder)
        .cross_encoder(scorer)
        .page_source(Arc::new(PdfPageSource))
        .build()?;
    let record = pipeline.run_to_file(&request, &cli.output).await?;

    println!(
        "Done. documents={} sections={} excerpts={} output={}",
        record.metadata.input_documents.len(),
        record.extracted_sections.len(),
        record.subsection_analysis.len(),
        cli.output.display()
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
