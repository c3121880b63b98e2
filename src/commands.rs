use anyhow::{Context, Result};
use console::style;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::embeddings::{ChunkSource, EmbeddingGateway, OpenAiEmbedder};
use crate::generation::{AnthropicClient, ContentFormat, DraftRequest, Drafter};
use crate::ingest::{InputFormat, Ingestor, UPSERT_BATCH_SIZE, load_chunks};
use crate::retriever::{RetrievedChunk, Retriever};
use crate::store::VectorStore;

/// Characters of each chunk shown when listing retrieval results
const PREVIEW_CHARS: usize = 120;

/// Which curriculum slice to draw from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub language: String,
    pub exam: String,
    pub level: String,
}

fn load_config() -> Result<Config> {
    Config::load_default().context("Failed to load configuration")
}

async fn open_store(config: &Config) -> Result<Arc<VectorStore>> {
    let store = VectorStore::open(config)
        .await
        .context("Failed to open vector store")?;
    Ok(Arc::new(store))
}

fn build_embedder(config: &Config) -> Result<Arc<dyn EmbeddingGateway>> {
    let embedder = OpenAiEmbedder::from_config(&config.embedding)?;
    Ok(Arc::new(embedder))
}

fn build_retriever(config: &Config, store: Arc<VectorStore>) -> Result<Retriever> {
    Ok(Retriever::new(
        build_embedder(config)?,
        store,
        config.retrieval.clone(),
    ))
}

async fn build_drafter(config: &Config) -> Result<Drafter> {
    let store = open_store(config).await?;
    let retriever = build_retriever(config, store)?;
    let generator = AnthropicClient::from_config(&config.generation)?;
    Ok(Drafter::new(
        retriever,
        Arc::new(generator),
        config.generation.clone(),
    ))
}

fn draft_request(target: &Target, theme: &str, format: ContentFormat) -> DraftRequest {
    DraftRequest {
        language: target.language.clone(),
        exam: target.exam.clone(),
        level: target.level.clone(),
        theme: theme.to_string(),
        format,
    }
}

/// Embed and store the chunks in a file
///
/// Raw formats are cut with the configured chunking limits and labelled
/// from `source`.
#[inline]
pub async fn ingest_file(
    path: &Path,
    format: InputFormat,
    source: Option<&ChunkSource>,
) -> Result<()> {
    let config = load_config()?;
    let chunks = load_chunks(path, format, source, &config.chunking)
        .with_context(|| format!("Failed to read {} chunks from {}", format, path.display()))?;

    if chunks.is_empty() {
        warn!("No chunk records in {}", path.display());
        println!(
            "{}",
            style(format!("No chunk records found in {}", path.display())).yellow()
        );
        return Ok(());
    }

    let store = open_store(&config).await?;
    let ingestor = Ingestor::new(build_embedder(&config)?, Arc::clone(&store));

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(chunks.len() as u64).with_style(
            ProgressStyle::with_template("{bar:40} [{pos}/{len}] Embedding {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(path.display().to_string());

    for batch in chunks.chunks(UPSERT_BATCH_SIZE) {
        ingestor.embed_and_upsert(batch).await?;
        bar.inc(batch.len() as u64);
    }
    bar.finish_and_clear();

    info!("Ingested {} chunks from {}", chunks.len(), path.display());
    println!(
        "{} Ingested {} chunks",
        style("✓").green(),
        chunks.len()
    );

    let per_collection = chunks.iter().counts_by(|chunk| chunk.collection_name());
    for (collection, count) in per_collection.into_iter().sorted() {
        let total = store.collection_count(&collection).await?;
        println!("  {collection}: {count} written, {total} stored");
    }

    Ok(())
}

/// Print every collection with its record count
#[inline]
pub async fn list_collections(optimize: bool) -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config).await?;

    let summaries = store.summarize().await?;
    if summaries.is_empty() {
        println!("No collections yet.");
        println!("Use 'lingo-press ingest <file.jsonl>' to add chunks.");
    } else {
        println!("{}", style(format!("Collections ({} total):", summaries.len())).bold());
        for summary in &summaries {
            let updated = summary
                .last_updated
                .map(|ts| ts.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| "never".to_string());
            println!(
                "  {:<32} {:>8} records  updated {}",
                summary.collection, summary.records, updated
            );
        }
        let total: i64 = summaries.iter().map(|s| s.records).sum();
        println!("  {total} records in total");
    }

    if optimize {
        store
            .database()
            .optimize()
            .await
            .context("Failed to optimize database")?;
        println!("{} Database optimized", style("✓").green());
    }

    Ok(())
}

/// Retrieve and print the grammar and vocabulary context for a theme
#[inline]
pub async fn retrieve(target: &Target, theme: &str) -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config).await?;
    let retriever = build_retriever(&config, store)?;

    let retrieval = retriever
        .retrieve(theme, &target.language, &target.exam, &target.level)
        .await?;

    if retrieval.is_empty() {
        println!(
            "{}",
            style(format!(
                "No chunks found for {} {} {}. Has this exam been ingested?",
                target.language, target.exam, target.level
            ))
            .yellow()
        );
        return Ok(());
    }

    print_chunks("Grammar", "G", &retrieval.grammar);
    println!();
    print_chunks("Vocabulary", "V", &retrieval.vocabulary);
    Ok(())
}

/// Draft a newsletter piece and print it
#[inline]
pub async fn generate(
    target: &Target,
    theme: &str,
    format: ContentFormat,
    with_title: bool,
) -> Result<()> {
    let config = load_config()?;
    let drafter = build_drafter(&config).await?;
    let request = draft_request(target, theme, format);
    let draft = drafter.draft(&request).await?;

    if draft.retrieval.is_empty() {
        eprintln!(
            "{}",
            style("No curriculum chunks matched; this draft is based on the theme alone.")
                .yellow()
        );
    }

    if with_title {
        let title = drafter
            .title(&draft.text, &target.language, &target.level)
            .await?;
        println!("# {title}");
        println!();
    }
    println!("{}", draft.text);

    let provenance = draft.retrieval.provenance_ids();
    if !provenance.is_empty() {
        eprintln!();
        eprintln!("{} {}", style("Sources:").dim(), provenance.join(", "));
    }

    Ok(())
}

/// Draft a piece and print it as the provider writes it
#[inline]
pub async fn generate_streaming(target: &Target, theme: &str, format: ContentFormat) -> Result<()> {
    let config = load_config()?;
    let drafter = build_drafter(&config).await?;
    let request = draft_request(target, theme, format);
    let mut draft = drafter.draft_stream(&request).await?;

    if draft.retrieval.is_empty() {
        eprintln!(
            "{}",
            style("No curriculum chunks matched; this draft is based on the theme alone.")
                .yellow()
        );
    }

    let mut stdout = std::io::stdout();
    while let Some(piece) = draft.text.next().await {
        write!(stdout, "{}", piece?)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;

    let provenance = draft.retrieval.provenance_ids();
    if !provenance.is_empty() {
        eprintln!();
        eprintln!("{} {}", style("Sources:").dim(), provenance.join(", "));
    }

    Ok(())
}

fn print_chunks(heading: &str, tag: &str, chunks: &[RetrievedChunk]) {
    println!("{}", style(format!("{heading} ({})", chunks.len())).bold());
    if chunks.is_empty() {
        println!("  (none)");
        return;
    }

    for (i, chunk) in chunks.iter().enumerate() {
        let preview: String = chunk
            .document
            .split_whitespace()
            .join(" ")
            .chars()
            .take(PREVIEW_CHARS)
            .collect();
        println!(
            "  [{tag}{}] {:.4}  {}",
            i + 1,
            chunk.distance,
            style(&chunk.id).dim()
        );
        println!("       {preview}");
    }
}
