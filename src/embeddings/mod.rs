// Embeddings module
// Text-to-vector gateways and the chunker that prepares scraped text for them

pub mod chunking;
pub mod openai;

use async_trait::async_trait;

use crate::Result;

pub use chunking::{
    ChunkSource, ChunkingConfig, chunk_grammar_entry, chunk_paragraph, chunk_vocab_batch,
    extract_grammar_point,
};
pub use openai::OpenAiEmbedder;

/// Converts text into fixed-dimension vectors
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// One vector per input text, in input order
    ///
    /// Empty input returns an empty result without contacting the provider.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Length of every vector this gateway returns
    fn dimension(&self) -> usize;
}
