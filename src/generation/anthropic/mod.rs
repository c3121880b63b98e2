
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{GenerationGateway, GenerationRequest};
use crate::config::{GenerationConfig, api_key_from_env};
use crate::http::HttpClient;
use crate::{PressError, Result};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Text pieces buffered between the reader thread and the consumer
const STREAM_BUFFER: usize = 32;

/// Client for the Anthropic Messages API
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    endpoint: String,
    model: String,
    api_key: String,
    http: HttpClient,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [Message<'a>; 1],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

/// One server-sent event payload from a streamed Messages response
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta { delta: Delta },
    MessageDelta { delta: MessageDeltaBody },
    MessageStop,
    Error { error: StreamError },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicClient {
    #[inline]
    pub fn new(config: &GenerationConfig, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: format!("{}/messages", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: api_key.into(),
            http: HttpClient::new(Duration::from_secs(config.timeout_seconds)),
        }
    }

    #[inline]
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let api_key = api_key_from_env(&config.api_key_env)?;
        Ok(Self::new(config, api_key))
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.http = self.http.with_retry_attempts(attempts);
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, request: &GenerationRequest, stream: bool) -> Result<String> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            system: (!request.system.is_empty()).then_some(request.system.as_str()),
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
            stream,
        };
        serde_json::to_string(&body)
            .map_err(|e| PressError::Generation(format!("Failed to serialize request: {e}")))
    }

    fn headers(&self) -> [(&str, &str); 2] {
        [
            ("x-api-key", self.api_key.as_str()),
            ("anthropic-version", ANTHROPIC_VERSION),
        ]
    }

    fn generate_blocking(&self, request: &GenerationRequest) -> Result<String> {
        let body = self.request_body(request, false)?;
        let response_text =
            self.http
                .post_json(&self.endpoint, &self.headers(), &body, PressError::Generation)?;

        let response: MessagesResponse = serde_json::from_str(&response_text)
            .map_err(|e| PressError::Generation(format!("Failed to parse response: {e}")))?;

        if response.stop_reason.as_deref() == Some("max_tokens") {
            warn!(
                "Generation stopped at the {} token limit; output is truncated",
                request.max_tokens
            );
        }

        let text: String = response
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();

        if text.is_empty() {
            return Err(PressError::Generation(
                "Response contained no text content".to_string(),
            ));
        }

        debug!("Generated {} chars", text.chars().count());
        Ok(text)
    }

    /// Read a streamed response, forwarding each text delta to `sender`
    ///
    /// Stops early once the receiving side is gone.
    fn stream_blocking(
        &self,
        request: &GenerationRequest,
        sender: &mpsc::Sender<Result<String>>,
    ) -> Result<()> {
        let body = self.request_body(request, true)?;
        let reader = self.http.post_json_streaming(
            &self.endpoint,
            &self.headers(),
            &body,
            PressError::Generation,
        )?;

        let mut produced = 0;
        for line in reader.lines() {
            let line = line.map_err(|e| PressError::Network(format!("Stream interrupted: {e}")))?;
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let event: StreamEvent = serde_json::from_str(data.trim()).map_err(|e| {
                PressError::Generation(format!("Failed to parse stream event: {e}"))
            })?;

            match event {
                StreamEvent::ContentBlockDelta {
                    delta: Delta::TextDelta { text },
                } => {
                    produced += text.chars().count();
                    if sender.blocking_send(Ok(text)).is_err() {
                        debug!("Stream consumer went away; stopping");
                        return Ok(());
                    }
                }
                StreamEvent::MessageDelta { delta } => {
                    if delta.stop_reason.as_deref() == Some("max_tokens") {
                        warn!(
                            "Generation stopped at the {} token limit; output is truncated",
                            request.max_tokens
                        );
                    }
                }
                StreamEvent::MessageStop => break,
                StreamEvent::Error { error } => {
                    return Err(PressError::Generation(format!(
                        "Provider error mid-stream: {}",
                        error.message
                    )));
                }
                StreamEvent::ContentBlockDelta { .. } | StreamEvent::Other => {}
            }
        }

        if produced == 0 {
            return Err(PressError::Generation(
                "Response contained no text content".to_string(),
            ));
        }
        debug!("Streamed {} chars", produced);
        Ok(())
    }
}

#[async_trait]
impl GenerationGateway for AnthropicClient {
    #[inline]
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let client = self.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || client.generate_blocking(&request))
            .await
            .map_err(|e| PressError::Generation(format!("Generation task failed: {e}")))?
    }

    /// Must be called from within a Tokio runtime
    #[inline]
    fn generate_stream(&self, request: &GenerationRequest) -> BoxStream<'_, Result<String>> {
        let client = self.clone();
        let request = request.clone();
        let (sender, receiver) = mpsc::channel(STREAM_BUFFER);

        tokio::task::spawn_blocking(move || {
            if let Err(e) = client.stream_blocking(&request, &sender) {
                // Receiver may already be gone; nothing left to report to
                let _ = sender.blocking_send(Err(e));
            }
        });

        stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|item| (item, receiver))
        })
        .boxed()
    }
}
