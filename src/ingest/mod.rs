
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::embeddings::{
    ChunkSource, ChunkingConfig, EmbeddingGateway, chunk_grammar_entry, chunk_paragraph,
    chunk_vocab_batch,
};
use crate::store::{Collection, Metadata, VectorStore, collection_name};
use crate::{PressError, Result};

/// Rows per upsert call
pub const UPSERT_BATCH_SIZE: usize = 100;

const CHUNK_ID_HEX_CHARS: usize = 16;

/// Kind of study material a chunk holds
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContentType {
    Grammar,
    Vocabulary,
    Other(String),
}

impl ContentType {
    #[inline]
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Grammar => "grammar",
            ContentType::Vocabulary => "vocabulary",
            ContentType::Other(other) => other,
        }
    }
}

impl From<String> for ContentType {
    #[inline]
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "grammar" => ContentType::Grammar,
            "vocabulary" => ContentType::Vocabulary,
            _ => ContentType::Other(value),
        }
    }
}

impl From<&str> for ContentType {
    #[inline]
    fn from(value: &str) -> Self {
        ContentType::from(value.to_string())
    }
}

impl From<ContentType> for String {
    #[inline]
    fn from(value: ContentType) -> Self {
        match value {
            ContentType::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of scraped study text, as produced by the scrapers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub language: String,
    pub exam: String,
    pub level: String,
    pub content_type: ContentType,
    pub source_url: String,
    pub chunk_text: String,
    pub chunk_index: u32,
    #[serde(default)]
    pub grammar_point: Option<String>,
}

impl ChunkRecord {
    /// Deterministic id derived from the source URL and chunk position
    #[inline]
    pub fn id(&self) -> String {
        make_chunk_id(&self.source_url, self.chunk_index)
    }

    #[inline]
    pub fn collection_name(&self) -> String {
        collection_name(&self.language, &self.exam)
    }

    /// Metadata stored alongside the embedding
    #[inline]
    pub fn metadata(&self) -> Metadata {
        let char_count = i64::try_from(self.chunk_text.chars().count()).unwrap_or(i64::MAX);
        let mut metadata = Metadata::new();
        metadata.insert("language".to_string(), self.language.as_str().into());
        metadata.insert("exam".to_string(), self.exam.as_str().into());
        metadata.insert("level".to_string(), self.level.as_str().into());
        metadata.insert(
            "content_type".to_string(),
            self.content_type.as_str().into(),
        );
        metadata.insert("source_url".to_string(), self.source_url.as_str().into());
        metadata.insert(
            "grammar_point".to_string(),
            self.grammar_point.as_deref().unwrap_or_default().into(),
        );
        metadata.insert("char_count".to_string(), char_count.into());
        metadata
    }
}

/// First 16 hex characters of SHA-256 over `source_url` followed by the decimal index
#[inline]
pub fn make_chunk_id(source_url: &str, chunk_index: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_url.as_bytes());
    hasher.update(chunk_index.to_string().as_bytes());
    let mut id = format!("{:x}", hasher.finalize());
    id.truncate(CHUNK_ID_HEX_CHARS);
    id
}

/// Read scraper output: one JSON chunk record per non-empty line
#[inline]
pub fn load_chunks_jsonl(path: &Path) -> Result<Vec<ChunkRecord>> {
    let content = std::fs::read_to_string(path)?;
    let mut chunks = Vec::new();

    for (line_number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let chunk: ChunkRecord = serde_json::from_str(line).map_err(|e| {
            PressError::Validation(format!(
                "{}:{}: invalid chunk record: {}",
                path.display(),
                line_number + 1,
                e
            ))
        })?;
        chunks.push(chunk);
    }

    debug!("Loaded {} chunks from {}", chunks.len(), path.display());
    Ok(chunks)
}

/// Layout of a file handed to ingestion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputFormat {
    /// Chunk records, one JSON object per line
    #[default]
    Jsonl,
    /// A scraped grammar page, split into entries
    GrammarPage,
    /// One vocabulary word per line
    VocabList,
    /// Free prose, packed paragraph by paragraph
    Reading,
}

impl InputFormat {
    pub const ALL: [InputFormat; 4] = [
        InputFormat::Jsonl,
        InputFormat::GrammarPage,
        InputFormat::VocabList,
        InputFormat::Reading,
    ];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            InputFormat::Jsonl => "jsonl",
            InputFormat::GrammarPage => "grammar-page",
            InputFormat::VocabList => "vocab-list",
            InputFormat::Reading => "reading",
        }
    }
}

impl FromStr for InputFormat {
    type Err = PressError;

    #[inline]
    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim().to_lowercase().replace('_', "-");
        InputFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == value)
            .ok_or_else(|| {
                PressError::Validation(format!(
                    "unknown input format '{value}', expected one of: jsonl, grammar-page, vocab-list, reading"
                ))
            })
    }
}

impl fmt::Display for InputFormat {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cut raw scraped text into chunk records
///
/// `Jsonl` input is already chunked and is rejected here.
#[inline]
pub fn chunk_raw_text(
    text: &str,
    format: InputFormat,
    source: &ChunkSource,
    config: &ChunkingConfig,
) -> Result<Vec<ChunkRecord>> {
    let chunks = match format {
        InputFormat::Jsonl => {
            return Err(PressError::Validation(
                "JSONL input holds chunk records, not raw text".to_string(),
            ));
        }
        InputFormat::GrammarPage => chunk_grammar_entry(text, source, config),
        InputFormat::VocabList => {
            let words: Vec<String> = text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(ToString::to_string)
                .collect();
            chunk_vocab_batch(&words, source, config)
        }
        InputFormat::Reading => {
            chunk_paragraph(text, source, &ContentType::from("reading"), config)
        }
    };
    Ok(chunks)
}

/// Read an ingest file of any format into chunk records
///
/// Raw formats need a `source` to label their chunks.
#[inline]
pub fn load_chunks(
    path: &Path,
    format: InputFormat,
    source: Option<&ChunkSource>,
    config: &ChunkingConfig,
) -> Result<Vec<ChunkRecord>> {
    if format == InputFormat::Jsonl {
        return load_chunks_jsonl(path);
    }
    let source = source.ok_or_else(|| {
        PressError::Validation(format!(
            "{format} input needs a language, exam, level and source URL"
        ))
    })?;

    let text = std::fs::read_to_string(path)?;
    let chunks = chunk_raw_text(&text, format, source, config)?;
    debug!(
        "Cut {} {} chunks from {}",
        chunks.len(),
        format,
        path.display()
    );
    Ok(chunks)
}

/// Embeds chunk records and writes them into their language collections
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingGateway>,
    store: Arc<VectorStore>,
}

impl Ingestor {
    #[inline]
    pub fn new(embedder: Arc<dyn EmbeddingGateway>, store: Arc<VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Embed every chunk and upsert it; returns the chunk ids in input order
    ///
    /// When the same id occurs more than once, the last occurrence is stored.
    #[inline]
    pub async fn embed_and_upsert(&self, chunks: &[ChunkRecord]) -> Result<Vec<String>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.chunk_text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(PressError::Embedding(format!(
                "expected {} embeddings, gateway returned {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let ids: Vec<String> = chunks.iter().map(ChunkRecord::id).collect();

        // collection -> id -> position of the last occurrence
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut latest: HashMap<(String, &str), usize> = HashMap::new();
        for (position, chunk) in chunks.iter().enumerate() {
            latest.insert((chunk.collection_name(), ids[position].as_str()), position);
        }
        for (position, chunk) in chunks.iter().enumerate() {
            let name = chunk.collection_name();
            if latest.get(&(name.clone(), ids[position].as_str())) == Some(&position) {
                groups.entry(name).or_default().push(position);
            } else {
                warn!(
                    "Chunk {} ({} #{}) appears again later; keeping the later text",
                    ids[position], chunk.source_url, chunk.chunk_index
                );
            }
        }

        for (name, positions) in &groups {
            let collection = self.store.get_collection(name);
            for batch in positions.chunks(UPSERT_BATCH_SIZE) {
                let batch_ids: Vec<String> = batch.iter().map(|&i| ids[i].clone()).collect();
                let batch_embeddings: Vec<Vec<f32>> =
                    batch.iter().map(|&i| embeddings[i].clone()).collect();
                let batch_documents: Vec<String> =
                    batch.iter().map(|&i| chunks[i].chunk_text.clone()).collect();
                let batch_metadatas: Vec<Metadata> =
                    batch.iter().map(|&i| chunks[i].metadata()).collect();

                collection
                    .upsert(
                        &batch_ids,
                        &batch_embeddings,
                        &batch_documents,
                        &batch_metadatas,
                    )
                    .await?;
            }
            info!(
                "Upserted {} chunks into collection '{}'",
                positions.len(),
                name
            );
        }

        Ok(ids)
    }
}
