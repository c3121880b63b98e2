
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

use crate::ingest::{ChunkRecord, ContentType};

const GRAMMAR_POINT_MAX_CHARS: usize = 100;
const VOCABULARY_HEADER: &str = "Vocabulary:\n";

/// Limits applied when cutting scraped text into chunks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Grammar entries shorter than this (in characters) are skipped
    pub min_grammar_chars: usize,
    /// Grammar entries are truncated to this many characters
    pub max_grammar_chars: usize,
    /// Words per vocabulary chunk
    pub vocab_batch_size: usize,
    /// Paragraphs are packed into chunks up to this many characters
    pub paragraph_max_chars: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            min_grammar_chars: 30,
            max_grammar_chars: 1000,
            vocab_batch_size: 10,
            paragraph_max_chars: 800,
        }
    }
}

/// Fields shared by every chunk cut from one scraped page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSource {
    pub language: String,
    pub exam: String,
    pub level: String,
    pub source_url: String,
}

impl ChunkSource {
    #[inline]
    pub fn new(
        language: impl Into<String>,
        exam: impl Into<String>,
        level: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            language: language.into(),
            exam: exam.into(),
            level: level.into(),
            source_url: source_url.into(),
        }
    }

    fn record(
        &self,
        content_type: ContentType,
        chunk_text: String,
        chunk_index: usize,
        grammar_point: Option<String>,
    ) -> ChunkRecord {
        ChunkRecord {
            language: self.language.clone(),
            exam: self.exam.clone(),
            level: self.level.clone(),
            content_type,
            source_url: self.source_url.clone(),
            chunk_text,
            chunk_index: u32::try_from(chunk_index).unwrap_or(u32::MAX),
            grammar_point,
        }
    }
}

// A blank line, or a line break before a numbered item or a markdown header
static GRAMMAR_ENTRY_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n{2,}|\n(?=\d+\.\s|#{1,3}\s)").expect("valid regex")
});

static PARAGRAPH_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("valid regex"));

/// Split `text` at every match of `boundary`, keeping empty pieces
fn split_on<'t>(boundary: &Regex, text: &'t str) -> Vec<&'t str> {
    let mut pieces = Vec::new();
    let mut last = 0;
    for found in boundary.find_iter(text).flatten() {
        pieces.push(text.get(last..found.start()).unwrap_or_default());
        last = found.end();
    }
    pieces.push(text.get(last..).unwrap_or_default());
    pieces
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Split a grammar page into one chunk per entry
///
/// `chunk_index` is the entry's position in the split, so skipped short
/// entries leave gaps and re-chunking the same page yields the same indices.
#[inline]
pub fn chunk_grammar_entry(
    text: &str,
    source: &ChunkSource,
    config: &ChunkingConfig,
) -> Vec<ChunkRecord> {
    let chunks: Vec<ChunkRecord> = split_on(&GRAMMAR_ENTRY_BOUNDARY, text)
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let entry = entry.trim();
            if entry.chars().count() < config.min_grammar_chars {
                return None;
            }
            Some(source.record(
                ContentType::Grammar,
                truncate_chars(entry, config.max_grammar_chars),
                index,
                Some(extract_grammar_point(entry)),
            ))
        })
        .collect();

    debug!(
        "Cut {} grammar chunks from {}",
        chunks.len(),
        source.source_url
    );
    chunks
}

/// Batch vocabulary words into chunks of `vocab_batch_size`
#[inline]
pub fn chunk_vocab_batch(
    words: &[String],
    source: &ChunkSource,
    config: &ChunkingConfig,
) -> Vec<ChunkRecord> {
    words
        .chunks(config.vocab_batch_size.max(1))
        .enumerate()
        .map(|(index, batch)| {
            source.record(
                ContentType::Vocabulary,
                format!("{}{}", VOCABULARY_HEADER, batch.join("\n")),
                index,
                None,
            )
        })
        .collect()
}

/// Pack blank-line separated paragraphs into chunks of at most `paragraph_max_chars`
///
/// A single paragraph longer than the limit becomes a chunk of its own.
#[inline]
pub fn chunk_paragraph(
    text: &str,
    source: &ChunkSource,
    content_type: &ContentType,
    config: &ChunkingConfig,
) -> Vec<ChunkRecord> {
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0;

    for paragraph in split_on(&PARAGRAPH_BOUNDARY, text.trim()) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        let paragraph_chars = paragraph.chars().count();

        if !buffer.is_empty() && buffer_chars + paragraph_chars > config.paragraph_max_chars {
            let grammar_point = extract_grammar_point(&buffer);
            chunks.push(source.record(
                content_type.clone(),
                std::mem::take(&mut buffer),
                chunks.len(),
                Some(grammar_point),
            ));
            buffer_chars = 0;
        }

        if !buffer.is_empty() {
            buffer.push_str("\n\n");
            buffer_chars += 2;
        }
        buffer.push_str(paragraph);
        buffer_chars += paragraph_chars;
    }

    if !buffer.is_empty() {
        let grammar_point = extract_grammar_point(&buffer);
        chunks.push(source.record(content_type.clone(), buffer, chunks.len(), Some(grammar_point)));
    }

    chunks
}

/// Label for a grammar entry: its first line without header or numbering marks
#[inline]
pub fn extract_grammar_point(text: &str) -> String {
    let first_line = text.split('\n').next().unwrap_or_default().trim();
    let label = strip_numbering(strip_header_marker(first_line));
    truncate_chars(label, GRAMMAR_POINT_MAX_CHARS)
}

fn strip_header_marker(line: &str) -> &str {
    let hashes = line.chars().take(3).take_while(|&c| c == '#').count();
    if hashes == 0 {
        return line;
    }
    line.get(hashes..).unwrap_or_default().trim_start()
}

fn strip_numbering(line: &str) -> &str {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return line;
    }
    match line.get(digits..).and_then(|rest| rest.strip_prefix('.')) {
        Some(rest) => rest.trim_start(),
        None => line,
    }
}
