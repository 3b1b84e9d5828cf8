//! The four stage agents: Researcher, Summarizer, Critic, Rewriter.
//!
//! Each agent is a prompt template plus one generation call. Agents hold no
//! state of their own; the generator is injected so tests can script replies.
//! All four share one [`RateLimiter`], so every request is paced.

use crate::config::SummaryConfig;
use crate::error::SummaryError;
use crate::pipeline::critic::CriticVerdict;
use crate::pipeline::generate::{generate_with_retry, Generation, GenerationParams, TextGenerator};
use crate::pipeline::postprocess::clean_generated_text;
use crate::pipeline::rate::RateLimiter;
use crate::prompts;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Which agent a call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Researcher,
    Summarizer,
    Critic,
    Rewriter,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Researcher => "Researcher",
            Stage::Summarizer => "Summarizer",
            Stage::Critic => "Critic",
            Stage::Rewriter => "Rewriter",
        };
        f.write_str(name)
    }
}

/// Agents bound to one generator, one rate limiter and one configuration.
#[derive(Clone, Copy)]
pub struct Agents<'a> {
    generator: &'a dyn TextGenerator,
    limiter: &'a RateLimiter,
    config: &'a SummaryConfig,
}

impl<'a> Agents<'a> {
    pub fn new(
        generator: &'a dyn TextGenerator,
        limiter: &'a RateLimiter,
        config: &'a SummaryConfig,
    ) -> Self {
        Self {
            generator,
            limiter,
            config,
        }
    }

    fn prose_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }

    async fn call(
        &self,
        stage: Stage,
        chunk: Option<usize>,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<Generation, SummaryError> {
        generate_with_retry(
            self.generator,
            self.limiter,
            stage,
            chunk,
            prompt,
            &params,
            self.config,
        )
        .await
    }

    /// Extract the key points of `text` as a bulleted list.
    pub async fn research(&self, text: &str, chunk: usize) -> Result<Generation, SummaryError> {
        let prompt = prompts::render_researcher(text);
        let mut out = self
            .call(Stage::Researcher, Some(chunk), &prompt, self.prose_params())
            .await?;
        out.text = clean_generated_text(&out.text);
        Ok(out)
    }

    /// Write a summary paragraph covering `key_points`.
    pub async fn summarize(&self, key_points: &str, chunk: usize) -> Result<Generation, SummaryError> {
        let prompt = prompts::render_summarizer(key_points);
        let mut out = self
            .call(Stage::Summarizer, Some(chunk), &prompt, self.prose_params())
            .await?;
        out.text = clean_generated_text(&out.text);
        Ok(out)
    }

    /// Review `summary` against `key_points`.
    ///
    /// An unparseable reply yields the fallback verdict; only a failed
    /// generation call is an error.
    pub async fn critique(
        &self,
        summary: &str,
        key_points: &str,
        chunk: usize,
    ) -> Result<(CriticVerdict, Generation), SummaryError> {
        let prompt = prompts::render_critic(summary, key_points);
        let params = GenerationParams {
            temperature: self.config.critic_temperature,
            max_tokens: self.config.critic_max_tokens,
        };
        let out = self.call(Stage::Critic, Some(chunk), &prompt, params).await?;

        let verdict = match CriticVerdict::parse(&out.text) {
            Ok(v) => v,
            Err(e) => {
                warn!("Critic [chunk {}]: {}; using fallback verdict", chunk, e);
                CriticVerdict::fallback(e)
            }
        };
        Ok((verdict, out))
    }

    /// Rewrite `summary` for `audience` without changing its content.
    pub async fn rewrite(&self, summary: &str, audience: &str) -> Result<Generation, SummaryError> {
        let prompt = prompts::render_rewriter(summary, audience);
        let mut out = self
            .call(Stage::Rewriter, None, &prompt, self.prose_params())
            .await?;
        out.text = clean_generated_text(&out.text);
        Ok(out)
    }
}
