
pub mod anthropic;
pub mod prompts;

pub use anthropic::AnthropicClient;
pub use prompts::{ContentFormat, build_content_prompt, build_system_prompt, build_title_prompt};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::GenerationConfig;
use crate::retriever::{Retrieval, Retriever};
use crate::{PressError, Result};

/// Token budget for title generation
pub const TITLE_MAX_TOKENS: u32 = 100;

/// One prompt to a text generation provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Empty means no system prompt
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
}

#[async_trait]
pub trait GenerationGateway: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Text pieces in the order the provider produces them
    ///
    /// Without native streaming the whole completion arrives as one piece.
    #[inline]
    fn generate_stream(&self, request: &GenerationRequest) -> BoxStream<'_, Result<String>> {
        let request = request.clone();
        stream::once(async move { self.generate(&request).await }).boxed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRequest {
    pub language: String,
    pub exam: String,
    pub level: String,
    pub theme: String,
    pub format: ContentFormat,
}

/// Generated text together with the chunks it was grounded on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Draft {
    pub text: String,
    pub retrieval: Retrieval,
}

/// A draft whose text is still arriving
pub struct DraftStream<'a> {
    pub retrieval: Retrieval,
    pub text: BoxStream<'a, Result<String>>,
}

/// Retrieval followed by generation for one newsletter piece
pub struct Drafter {
    retriever: Retriever,
    generator: Arc<dyn GenerationGateway>,
    config: GenerationConfig,
}

impl Drafter {
    #[inline]
    pub fn new(
        retriever: Retriever,
        generator: Arc<dyn GenerationGateway>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            retriever,
            generator,
            config,
        }
    }

    #[inline]
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Retrieve context for the theme and generate a draft from it
    ///
    /// An empty retrieval still produces a draft from the theme alone; check
    /// [`Retrieval::is_empty`] on the result to tell the two apart.
    #[inline]
    pub async fn draft(&self, request: &DraftRequest) -> Result<Draft> {
        let (retrieval, generation) = self.prepare(request).await?;
        let text = self.generate(&generation).await?;
        info!("Generated {} chars", text.chars().count());

        Ok(Draft { text, retrieval })
    }

    /// Like [`Drafter::draft`], but yields the text as the provider writes it
    ///
    /// Retrieval completes before this returns. Each piece must arrive within
    /// the generation timeout of the one before it.
    #[inline]
    pub async fn draft_stream(&self, request: &DraftRequest) -> Result<DraftStream<'_>> {
        let (retrieval, generation) = self.prepare(request).await?;
        let limit = Duration::from_secs(self.config.timeout_seconds);
        let seconds = self.config.timeout_seconds;

        let pieces = self.generator.generate_stream(&generation);
        let text = stream::unfold(Some(pieces), move |pieces| async move {
            let mut pieces = pieces?;
            match tokio::time::timeout(limit, pieces.next()).await {
                Ok(Some(Ok(piece))) => Some((Ok(piece), Some(pieces))),
                Ok(Some(Err(e))) => Some((Err(e), None)),
                Ok(None) => None,
                Err(_) => Some((
                    Err(PressError::Timeout(format!(
                        "generation stalled for {seconds}s"
                    ))),
                    None,
                )),
            }
        })
        .boxed();

        Ok(DraftStream { retrieval, text })
    }

    async fn prepare(&self, request: &DraftRequest) -> Result<(Retrieval, GenerationRequest)> {
        let retrieval = self
            .retriever
            .retrieve(
                &request.theme,
                &request.language,
                &request.exam,
                &request.level,
            )
            .await?;

        if retrieval.is_empty() {
            warn!(
                "No curriculum chunks for {} {} {}; drafting from the theme alone",
                request.language, request.exam, request.level
            );
        }

        let generation = GenerationRequest {
            system: build_system_prompt(&request.language, &request.exam, &request.level),
            prompt: build_content_prompt(
                request.format,
                &request.theme,
                &request.language,
                &request.level,
                &retrieval.grammar_texts(),
                &retrieval.vocabulary_texts(),
            ),
            max_tokens: self.config.max_tokens,
        };

        info!(
            "Generating {} content: {} {} {} theme='{}'",
            request.format, request.language, request.exam, request.level, request.theme
        );
        Ok((retrieval, generation))
    }

    /// Short post title for a finished draft
    #[inline]
    pub async fn title(&self, content: &str, language: &str, level: &str) -> Result<String> {
        let request = GenerationRequest {
            system: String::new(),
            prompt: build_title_prompt(content, language, level),
            max_tokens: TITLE_MAX_TOKENS,
        };
        let title = self.generate(&request).await?;
        Ok(title.trim().to_string())
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let limit = Duration::from_secs(self.config.timeout_seconds);
        tokio::time::timeout(limit, self.generator.generate(request))
            .await
            .map_err(|_| {
                PressError::Timeout(format!(
                    "generation did not finish within {}s",
                    self.config.timeout_seconds
                ))
            })?
    }
}
