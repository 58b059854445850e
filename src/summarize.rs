//! Summarization backends.
//!
//! Two capabilities are consumed, each behind its own trait so pipelines can
//! run against fakes:
//! - **[`FastSummarizer`]**: a local model (Ollama) used per document during
//!   ingestion. It must be reachable before ingestion starts; see
//!   [`ensure_ready`].
//! - **[`Completer`]**: a remote chat-completion model (OpenAI) used for the
//!   weekly digest.
//!
//! # Retry Strategy
//!
//! HTTP calls go through [`post_json_with_retry`]:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Once retries are exhausted the error is returned to the caller; the digest
//! treats it as fatal for the run.

use async_trait::async_trait;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{FastConfig, RichConfig};

/// Interval between readiness probes after a start attempt.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("failed to start backend: {0}")]
    Start(String),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    Parse(String),
}

/// Local, fast summarization capability.
#[async_trait]
pub trait FastSummarizer: Send + Sync {
    /// Cheap reachability probe.
    async fn is_ready(&self) -> bool;
    /// One-shot attempt to bring the backend up.
    async fn start(&self) -> Result<(), BackendError>;
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, BackendError>;
}

/// Remote, higher-quality completion capability.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        role_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, BackendError>;
}

/// Make sure the fast backend answers, starting it once if it does not.
///
/// After the start attempt the backend is probed until `timeout` elapses.
/// Failure to start, or to become ready in time, is an error: ingestion must
/// not proceed and silently produce nothing.
pub async fn ensure_ready(
    summarizer: &dyn FastSummarizer,
    timeout: Duration,
) -> Result<(), BackendError> {
    if summarizer.is_ready().await {
        return Ok(());
    }

    warn!("fast summarizer unreachable; attempting to start it");
    summarizer.start().await?;

    let deadline = Instant::now() + timeout;
    loop {
        if summarizer.is_ready().await {
            info!("fast summarizer started");
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(BackendError::Unreachable(format!(
                "not ready {}s after start attempt",
                timeout.as_secs()
            )));
        }
        tokio::time::sleep(READY_POLL_INTERVAL).await;
    }
}

// ============ Ollama ============

/// [`FastSummarizer`] backed by a local Ollama instance.
///
/// Readiness is `GET /api/tags`; generation is `POST /api/generate` with
/// streaming disabled.
pub struct OllamaSummarizer {
    client: reqwest::Client,
    url: String,
    start_command: Vec<String>,
}

impl OllamaSummarizer {
    pub fn new(config: &FastConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            start_command: config.start_command.clone(),
        })
    }
}

#[async_trait]
impl FastSummarizer for OllamaSummarizer {
    async fn is_ready(&self) -> bool {
        match self.client.get(format!("{}/api/tags", self.url)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(error = %e, url = %self.url, "ollama readiness probe failed");
                false
            }
        }
    }

    async fn start(&self) -> Result<(), BackendError> {
        let (program, args) = self
            .start_command
            .split_first()
            .ok_or_else(|| BackendError::Start("empty start command".to_string()))?;

        info!(command = %self.start_command.join(" "), "starting fast summarizer");
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BackendError::Start(format!("{}: {}", program, e)))?;
        Ok(())
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, BackendError> {
        let body = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
        });

        let json = post_json_with_retry(
            &self.client,
            &format!("{}/api/generate", self.url),
            None,
            &body,
            0,
        )
        .await?;

        parse_generate_response(&json)
    }
}

fn parse_generate_response(json: &serde_json::Value) -> Result<String, BackendError> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| BackendError::Parse("Ollama response missing 'response'".to_string()))
}

// ============ OpenAI ============

/// [`Completer`] backed by the OpenAI chat completions API.
pub struct OpenAICompleter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
}

impl OpenAICompleter {
    /// # Errors
    ///
    /// Returns [`BackendError::Config`] when no API key was supplied.
    pub fn new(config: &RichConfig, api_key: Option<&str>) -> Result<Self, BackendError> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| BackendError::Config("OPENAI_API_KEY not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Completer for OpenAICompleter {
    async fn complete(
        &self,
        model: &str,
        role_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, BackendError> {
        let body = serde_json::json!({
            "model": model,
            "messages": [
                { "role": "system", "content": role_prompt },
                { "role": "user", "content": user_prompt },
            ],
        });

        let start = Instant::now();
        let json = post_json_with_retry(
            &self.client,
            &format!("{}/chat/completions", self.base_url),
            Some(&self.api_key),
            &body,
            self.max_retries,
        )
        .await?;

        debug!(
            model = %model,
            duration_ms = start.elapsed().as_millis() as u64,
            "chat completion"
        );

        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String, BackendError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| BackendError::Parse("OpenAI response missing choices[0].message.content".to_string()))
}

/// POST a JSON body, retrying transient failures with exponential backoff.
pub(crate) async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
) -> Result<serde_json::Value, BackendError> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut request = client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(token) = bearer {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json()
                        .await
                        .map_err(|e| BackendError::Parse(e.to_string()));
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = BackendError::Api {
                    status: status.as_u16(),
                    body: body_text,
                };

                // Rate limited or server error: retry
                if status.as_u16() == 429 || status.is_server_error() {
                    warn!(url = %url, attempt, error = %err, "transient API error");
                    last_err = Some(err);
                    continue;
                }

                return Err(err);
            }
            Err(e) => {
                warn!(url = %url, attempt, error = %e, "request failed");
                last_err = Some(BackendError::Network(e.to_string()));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| BackendError::Network("request failed after retries".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeFast {
        ready: AtomicBool,
        start_succeeds: bool,
        becomes_ready: bool,
        starts: AtomicUsize,
    }

    impl FakeFast {
        fn new(ready: bool, start_succeeds: bool, becomes_ready: bool) -> Self {
            Self {
                ready: AtomicBool::new(ready),
                start_succeeds,
                becomes_ready,
                starts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FastSummarizer for FakeFast {
        async fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }
        async fn start(&self) -> Result<(), BackendError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if !self.start_succeeds {
                return Err(BackendError::Start("no such program".to_string()));
            }
            if self.becomes_ready {
                self.ready.store(true, Ordering::SeqCst);
            }
            Ok(())
        }
        async fn generate(&self, _model: &str, _prompt: &str) -> Result<String, BackendError> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn ready_backend_is_not_started() {
        let fake = FakeFast::new(true, true, true);
        ensure_ready(&fake, Duration::ZERO).await.unwrap();
        assert_eq!(fake.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unreachable_backend_is_started_once() {
        let fake = FakeFast::new(false, true, true);
        ensure_ready(&fake, Duration::ZERO).await.unwrap();
        assert_eq!(fake.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_start_is_fatal() {
        let fake = FakeFast::new(false, false, false);
        let err = ensure_ready(&fake, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, BackendError::Start(_)));
        assert_eq!(fake.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn backend_that_never_answers_times_out() {
        let fake = FakeFast::new(false, true, false);
        let err = ensure_ready(&fake, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, BackendError::Unreachable(_)));
    }

    #[test]
    fn parses_generate_response() {
        let json = serde_json::json!({ "response": "  One sentence.\n" });
        assert_eq!(parse_generate_response(&json).unwrap(), "One sentence.");
        assert!(parse_generate_response(&serde_json::json!({})).is_err());
    }

    #[test]
    fn parses_chat_response() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Hello" } }]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "Hello");
        assert!(parse_chat_response(&serde_json::json!({ "choices": [] })).is_err());
    }

    #[test]
    fn completer_requires_api_key() {
        let err = OpenAICompleter::new(&RichConfig::default(), None)
            .err()
            .unwrap();
        assert!(matches!(err, BackendError::Config(_)));
        assert!(OpenAICompleter::new(&RichConfig::default(), Some("")).is_err());
        assert!(OpenAICompleter::new(&RichConfig::default(), Some("sk-test")).is_ok());
    }
}
