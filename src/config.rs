//! Configuration types for a summarization run.
//!
//! All pipeline behaviour is controlled through [`SummaryConfig`], built via
//! its [`SummaryConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across tasks and to diff two runs.

use crate::error::SummaryError;
use crate::pipeline::generate::TextGenerator;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for a summarization run.
///
/// # Example
/// ```rust
/// use edgequake_summarizer::SummaryConfig;
///
/// let config = SummaryConfig::builder()
///     .max_chunk_size(3000)
///     .overlap_size(150)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct SummaryConfig {
    /// Maximum chunk length in characters. Default: 4000.
    ///
    /// 4 000 characters is roughly 1 000 tokens: small enough that the
    /// Researcher reads every sentence closely, large enough that a typical
    /// report needs only a handful of chunks.
    pub max_chunk_size: usize,

    /// Characters repeated between consecutive chunks. Default: 200.
    /// Must be smaller than `max_chunk_size`.
    pub overlap_size: usize,

    /// LLM model identifier, e.g. "gpt-4.1-nano", "llama-3.1-8b-instant".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`/`generator`, auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed generator. Takes precedence over everything else;
    /// this is how tests inject scripted replies.
    pub generator: Option<Arc<dyn TextGenerator>>,

    /// Sampling temperature for Researcher, Summarizer and Rewriter. Default: 0.3.
    pub temperature: f32,

    /// Maximum output tokens for Researcher, Summarizer and Rewriter. Default: 2048.
    pub max_tokens: usize,

    /// Sampling temperature for the Critic. Default: 0.0.
    ///
    /// The Critic must emit parseable JSON; any creativity only hurts.
    pub critic_temperature: f32,

    /// Maximum output tokens for the Critic. Default: 500.
    pub critic_max_tokens: usize,

    /// Retry attempts on a failed generation call. Default: 0 (fail fast).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Generation requests admitted per `rate_interval_ms`. Default: 1.
    pub requests_per_interval: u32,

    /// Rate-limit window in milliseconds. Default: 1000. Zero disables pacing.
    pub rate_interval_ms: u64,

    /// Chunks processed at once. Default: 1 (strictly sequential).
    ///
    /// Raising this only helps when the rate limit allows bursts; summaries
    /// are always joined in document order.
    pub concurrency: usize,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Progress events sink. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 4000,
            overlap_size: 200,
            model: None,
            provider_name: None,
            provider: None,
            generator: None,
            temperature: 0.3,
            max_tokens: 2048,
            critic_temperature: 0.0,
            critic_max_tokens: 500,
            max_retries: 0,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            requests_per_interval: 1,
            rate_interval_ms: 1000,
            concurrency: 1,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SummaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummaryConfig")
            .field("max_chunk_size", &self.max_chunk_size)
            .field("overlap_size", &self.overlap_size)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("generator", &self.generator.as_ref().map(|_| "<dyn TextGenerator>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("critic_temperature", &self.critic_temperature)
            .field("critic_max_tokens", &self.critic_max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("requests_per_interval", &self.requests_per_interval)
            .field("rate_interval_ms", &self.rate_interval_ms)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl SummaryConfig {
    /// Create a new builder for `SummaryConfig`.
    pub fn builder() -> SummaryConfigBuilder {
        SummaryConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SummaryConfig`].
#[derive(Debug)]
pub struct SummaryConfigBuilder {
    config: SummaryConfig,
}

impl SummaryConfigBuilder {
    pub fn max_chunk_size(mut self, chars: usize) -> Self {
        self.config.max_chunk_size = chars;
        self
    }

    pub fn overlap_size(mut self, chars: usize) -> Self {
        self.config.overlap_size = chars;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.config.generator = Some(generator);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn critic_temperature(mut self, t: f32) -> Self {
        self.config.critic_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn critic_max_tokens(mut self, n: usize) -> Self {
        self.config.critic_max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn requests_per_interval(mut self, n: u32) -> Self {
        self.config.requests_per_interval = n;
        self
    }

    pub fn rate_interval_ms(mut self, ms: u64) -> Self {
        self.config.rate_interval_ms = ms;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SummaryConfig, SummaryError> {
        let c = &self.config;
        if c.max_chunk_size == 0 {
            return Err(SummaryError::InvalidConfig(
                "max chunk size must be ≥ 1".into(),
            ));
        }
        if c.overlap_size >= c.max_chunk_size {
            return Err(SummaryError::InvalidConfig(format!(
                "overlap size ({}) must be smaller than max chunk size ({})",
                c.overlap_size, c.max_chunk_size
            )));
        }
        if c.requests_per_interval == 0 {
            return Err(SummaryError::InvalidConfig(
                "requests per interval must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(SummaryError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
