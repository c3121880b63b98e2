#[cfg(test)]
mod tests;

pub mod dedup;

pub use dedup::{Deduplicator, TokenJaccard, suppress_near_duplicates};

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::RetrievalConfig;
use crate::embeddings::EmbeddingGateway;
use crate::ingest::ContentType;
use crate::store::{Collection, CollectionProvider, QueryMatch, Where, collection_name};
use crate::{PressError, Result};

/// A chunk returned by retrieval, with its distance to the theme
pub type RetrievedChunk = QueryMatch;

/// Grammar and vocabulary context for one theme, each ascending by distance
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Retrieval {
    pub grammar: Vec<RetrievedChunk>,
    pub vocabulary: Vec<RetrievedChunk>,
}

impl Retrieval {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.grammar.is_empty() && self.vocabulary.is_empty()
    }

    #[inline]
    pub fn grammar_texts(&self) -> Vec<String> {
        self.grammar.iter().map(|c| c.document.clone()).collect()
    }

    #[inline]
    pub fn vocabulary_texts(&self) -> Vec<String> {
        self.vocabulary.iter().map(|c| c.document.clone()).collect()
    }

    /// Ids of every returned chunk, grammar first
    #[inline]
    pub fn provenance_ids(&self) -> Vec<String> {
        self.grammar
            .iter()
            .chain(&self.vocabulary)
            .map(|c| c.id.clone())
            .collect()
    }
}

/// Two-phase grammar/vocabulary retrieval with near-duplicate suppression
pub struct Retriever {
    embedder: Arc<dyn EmbeddingGateway>,
    collections: Arc<dyn CollectionProvider>,
    config: RetrievalConfig,
    deduplicator: Arc<dyn Deduplicator>,
}

impl Retriever {
    #[inline]
    pub fn new(
        embedder: Arc<dyn EmbeddingGateway>,
        collections: Arc<dyn CollectionProvider>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            collections,
            config,
            deduplicator: Arc::new(TokenJaccard),
        }
    }

    #[inline]
    pub fn with_deduplicator(mut self, deduplicator: Arc<dyn Deduplicator>) -> Self {
        self.deduplicator = deduplicator;
        self
    }

    #[inline]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Retrieve grammar and vocabulary chunks for `theme`
    ///
    /// A missing or empty collection yields an empty [`Retrieval`]. Any
    /// embedding or storage failure aborts the whole call, and running past
    /// the configured timeout is [`PressError::Timeout`].
    #[inline]
    pub async fn retrieve(
        &self,
        theme: &str,
        language: &str,
        exam: &str,
        level: &str,
    ) -> Result<Retrieval> {
        let limit = Duration::from_secs(self.config.timeout_seconds);
        tokio::time::timeout(limit, self.retrieve_within(theme, language, exam, level))
            .await
            .map_err(|_| {
                PressError::Timeout(format!(
                    "retrieval for theme '{}' did not finish within {}s",
                    theme, self.config.timeout_seconds
                ))
            })?
    }

    async fn retrieve_within(
        &self,
        theme: &str,
        language: &str,
        exam: &str,
        level: &str,
    ) -> Result<Retrieval> {
        let collection = self.collections.collection(&collection_name(language, exam));

        if collection.count().await? == 0 {
            warn!("Collection empty for {} {}", language, exam);
            return Ok(Retrieval::default());
        }

        let query_embedding = self.embed_theme(theme).await?;
        let queries = [query_embedding];

        let grammar_filter = category_filter(language, exam, level, &ContentType::Grammar);
        let vocabulary_filter = category_filter(language, exam, level, &ContentType::Vocabulary);

        let (grammar, vocabulary) = futures::try_join!(
            self.query_category(
                collection.as_ref(),
                &queries,
                self.config.grammar_n,
                &grammar_filter
            ),
            self.query_category(
                collection.as_ref(),
                &queries,
                self.config.vocab_n,
                &vocabulary_filter
            ),
        )?;

        let retrieval = Retrieval {
            grammar,
            vocabulary,
        };

        if retrieval.is_empty() {
            warn!(
                "No chunks matched {} {} level {} for theme '{}'",
                language, exam, level, theme
            );
        } else {
            info!(
                "Retrieved {} grammar + {} vocab chunks for theme '{}'",
                retrieval.grammar.len(),
                retrieval.vocabulary.len(),
                theme
            );
        }

        Ok(retrieval)
    }

    async fn embed_theme(&self, theme: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embedder.embed(&[theme.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(PressError::Embedding(format!(
                "expected one vector for the theme, gateway returned {}",
                vectors.len()
            )));
        }
        Ok(vectors.swap_remove(0))
    }

    async fn query_category(
        &self,
        collection: &dyn Collection,
        queries: &[Vec<f32>],
        n_results: usize,
        filter: &Where,
    ) -> Result<Vec<RetrievedChunk>> {
        let matches = collection
            .query(queries, n_results, Some(filter))
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let found = matches.len();
        let kept = suppress_near_duplicates(
            matches,
            |chunk| chunk.document.as_str(),
            self.deduplicator.as_ref(),
            self.config.mmr_similarity_threshold,
        );
        debug!(
            "Kept {} of {} matches in '{}' after deduplication",
            kept.len(),
            found,
            collection.name()
        );

        Ok(kept)
    }
}

/// Exact match on language, exam, level and content type
#[inline]
pub fn category_filter(
    language: &str,
    exam: &str,
    level: &str,
    content_type: &ContentType,
) -> Where {
    Where::all_eq([
        ("language", language),
        ("exam", exam),
        ("level", level),
        ("content_type", content_type.as_str()),
    ])
}
