// Blocking JSON-over-HTTP shared by the provider gateways

#[cfg(test)]
mod tests;

use std::io::{BufRead, BufReader};
use std::time::Duration;
use tracing::{debug, error, warn};
use ureq::Body;
use ureq::http::Response;

use crate::PressError;

pub(crate) const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u32 = 2;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Maps a non-retryable provider failure into the caller's error kind
pub(crate) type ProviderError = fn(String) -> PressError;

#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff: Duration,
}

enum Failure {
    Retry(String),
    Fatal(PressError),
}

impl HttpClient {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            agent: agent_with_timeout(timeout),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }

    pub(crate) fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = agent_with_timeout(timeout);
        self
    }

    pub(crate) fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Delay before the second attempt; later delays grow exponentially
    #[cfg(test)]
    pub(crate) fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// POST a JSON body and return the response body
    ///
    /// 5xx responses and transport failures are retried with exponential
    /// backoff and end as [`PressError::Network`]. 401/403 become
    /// [`PressError::Authentication`], 429 [`PressError::Quota`], and any
    /// other failure goes through `other`.
    pub(crate) fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &str,
        other: ProviderError,
    ) -> Result<String, PressError> {
        self.post_with_retry(url, headers, body, other, |mut resp| {
            resp.body_mut().read_to_string()
        })
    }

    /// POST a JSON body and hand back the response body unread
    ///
    /// Retries cover the request and status line only; failures while
    /// reading the returned body surface as I/O errors to the caller.
    pub(crate) fn post_json_streaming(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &str,
        other: ProviderError,
    ) -> Result<impl BufRead + Send + 'static, PressError> {
        self.post_with_retry(url, headers, body, other, |resp| {
            Ok(BufReader::new(resp.into_body().into_reader()))
        })
    }

    fn post_with_retry<T>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &str,
        other: ProviderError,
        read: impl Fn(Response<Body>) -> Result<T, ureq::Error>,
    ) -> Result<T, PressError> {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!(
                "HTTP POST {} attempt {}/{}",
                url, attempt, self.retry_attempts
            );

            let mut request = self
                .agent
                .post(url)
                .header("Content-Type", "application/json");
            for (name, value) in headers {
                request = request.header(*name, *value);
            }

            match request.send(body).and_then(&read) {
                Ok(value) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(value);
                }
                Err(err) => match classify(&err, url, other) {
                    Failure::Fatal(e) => return Err(e),
                    Failure::Retry(message) => {
                        warn!(
                            "{}, attempt {}/{}",
                            message, attempt, self.retry_attempts
                        );
                        last_error = Some(message);

                        if attempt < self.retry_attempts {
                            let delay = self.backoff * EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1);
                            debug!("Waiting {:?} before retry", delay);
                            std::thread::sleep(delay);
                        }
                    }
                },
            }
        }

        error!("All retry attempts failed for request to {}", url);
        Err(PressError::Network(format!(
            "{} after {} attempts",
            last_error.unwrap_or_else(|| format!("request to {url} failed")),
            self.retry_attempts
        )))
    }
}

fn agent_with_timeout(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

fn classify(err: &ureq::Error, url: &str, other: ProviderError) -> Failure {
    match err {
        ureq::Error::StatusCode(status) => match *status {
            401 | 403 => Failure::Fatal(PressError::Authentication(format!(
                "HTTP {status} from {url}; check the API key"
            ))),
            429 => Failure::Fatal(PressError::Quota(format!(
                "HTTP 429 from {url}; rate limit or quota exceeded"
            ))),
            s if s >= 500 => Failure::Retry(format!("Server error (status {s}) from {url}")),
            s => {
                warn!("Client error (status {}), not retrying", s);
                Failure::Fatal(other(format!("HTTP {s} from {url}")))
            }
        },
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => Failure::Retry(format!("Transport error: {err}")),
        _ => {
            warn!("Non-retryable error: {}", err);
            Failure::Fatal(other(format!("request to {url} failed: {err}")))
        }
    }
}
