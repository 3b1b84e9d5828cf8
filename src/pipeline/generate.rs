//! Text generation: the seam between the pipeline and an LLM.
//!
//! Every agent talks to the model through [`TextGenerator`], a one-method
//! trait taking a rendered prompt and returning text. The production
//! implementation, [`LlmGenerator`], wraps any `edgequake_llm` provider; tests
//! inject scripted doubles instead.
//!
//! ## Retry Strategy
//!
//! [`generate_with_retry`] bounds every call with `api_timeout_secs` and
//! retries up to `max_retries` times with exponential backoff
//! (`retry_backoff_ms * 2^attempt`). The default is zero retries: a failed
//! call aborts the run.
//!
//! Every attempt, retries included, first takes a ticket from the shared
//! [`RateLimiter`], so the configured rate bounds actual requests sent.

use crate::config::SummaryConfig;
use crate::error::SummaryError;
use crate::pipeline::agents::Stage;
use crate::pipeline::rate::RateLimiter;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Sampling parameters for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Text returned by a generator plus token accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

impl Generation {
    /// A generation with no token accounting, handy for test doubles.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// A single failed generation attempt.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct GenerateError(pub String);

impl GenerateError {
    pub fn new(msg: impl fmt::Display) -> Self {
        Self(msg.to_string())
    }
}

/// Anything that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Generation, GenerateError>;
}

/// [`TextGenerator`] backed by an `edgequake_llm` chat provider.
pub struct LlmGenerator {
    provider: Arc<dyn LLMProvider>,
}

impl LlmGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

impl fmt::Debug for LlmGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmGenerator")
            .field("provider", &"<dyn LLMProvider>")
            .finish()
    }
}

#[async_trait]
impl TextGenerator for LlmGenerator {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Generation, GenerateError> {
        let messages = vec![ChatMessage::user(prompt)];
        let options = CompletionOptions {
            temperature: Some(params.temperature),
            max_tokens: Some(params.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(GenerateError::new)?;

        Ok(Generation {
            text: response.content,
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
        })
    }
}

/// Run one stage's generation call with timeout and retry.
///
/// `chunk` is the 1-indexed chunk number (`None` for the final rewrite) and
/// is only used for logging and error context. The call timeout starts after
/// the rate-limit ticket is granted.
pub async fn generate_with_retry(
    generator: &dyn TextGenerator,
    limiter: &RateLimiter,
    stage: Stage,
    chunk: Option<usize>,
    prompt: &str,
    params: &GenerationParams,
    config: &SummaryConfig,
) -> Result<Generation, SummaryError> {
    let start = Instant::now();
    let call_timeout = Duration::from_secs(config.api_timeout_secs);
    let mut last_err = String::from("Unknown error");

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "{} {}: retry {}/{} after {}ms",
                stage,
                chunk_tag(chunk),
                attempt,
                config.max_retries,
                backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        limiter.acquire().await;
        match timeout(call_timeout, generator.generate(prompt, params)).await {
            Ok(Ok(generation)) => {
                debug!(
                    "{} {}: {} input tokens, {} output tokens, {:?}",
                    stage,
                    chunk_tag(chunk),
                    generation.prompt_tokens,
                    generation.completion_tokens,
                    start.elapsed()
                );
                return Ok(generation);
            }
            Ok(Err(e)) => {
                warn!("{} {}: attempt {} failed: {}", stage, chunk_tag(chunk), attempt + 1, e);
                last_err = e.to_string();
            }
            Err(_) => {
                warn!(
                    "{} {}: attempt {} timed out after {}s",
                    stage,
                    chunk_tag(chunk),
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_err = format!("timed out after {}s", config.api_timeout_secs);
            }
        }
    }

    Err(SummaryError::Generation {
        stage,
        chunk,
        attempts: config.max_retries + 1,
        detail: last_err,
    })
}

fn chunk_tag(chunk: Option<usize>) -> String {
    match chunk {
        Some(n) => format!("[chunk {n}]"),
        None => "[final]".to_string(),
    }
}
