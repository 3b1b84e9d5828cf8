//! Pipeline driver and public entry points.
//!
//! ## Phases
//!
//! ```text
//! Splitting ──▶ PerChunk(1) ──▶ … ──▶ PerChunk(n) ──▶ Joining ──▶ FinalRewrite ──▶ Done
//!                 │
//!                 └─ Research ──▶ Summarize ──▶ Critique
//! ```
//!
//! Every generation request (all three per-chunk calls and the final rewrite)
//! takes a ticket from one shared [`RateLimiter`]. With the default
//! `concurrency = 1` chunks run strictly one after another; with more, chunk futures overlap but `buffered` still yields
//! them in document order, so the joined text never depends on which chunk
//! finished first.
//!
//! Critic verdicts are reported in [`SummaryOutput::chunks`] but never gate
//! or alter the summary. Any generation failure aborts the run.

use crate::config::SummaryConfig;
use crate::error::SummaryError;
use crate::output::{ChunkReport, SummaryOutput, SummaryStats};
use crate::pipeline::agents::{Agents, Stage};
use crate::pipeline::chunk::{Chunk, Chunker};
use crate::pipeline::generate::{Generation, LlmGenerator, TextGenerator};
use crate::pipeline::input::{self, DocumentInput};
use crate::pipeline::rate::RateLimiter;
use crate::progress::ProgressCallback;
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Model used when a provider is named but no model is given.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Separator between chunk summaries in the text sent to the Rewriter.
pub const SUMMARY_SEPARATOR: &str = "\n\n";

/// API-key variable for each provider that needs one, in auto-detection order.
const PROVIDER_KEYS: [(&str, &str); 7] = [
    ("openai", "OPENAI_API_KEY"),
    ("anthropic", "ANTHROPIC_API_KEY"),
    ("gemini", "GEMINI_API_KEY"),
    ("mistral", "MISTRAL_API_KEY"),
    ("openrouter", "OPENROUTER_API_KEY"),
    ("xai", "XAI_API_KEY"),
    ("azure", "AZURE_OPENAI_API_KEY"),
];

/// Local providers that run without a key.
const KEYLESS_PROVIDERS: [&str; 2] = ["ollama", "lmstudio"];

/// Where the driver is in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Splitting,
    PerChunk(usize),
    Joining,
    FinalRewrite,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Splitting => f.write_str("splitting"),
            Phase::PerChunk(n) => write!(f, "chunk {n}"),
            Phase::Joining => f.write_str("joining"),
            Phase::FinalRewrite => f.write_str("final rewrite"),
            Phase::Done => f.write_str("done"),
        }
    }
}

/// Summarize `content` for `audience`.
///
/// This is the primary entry point for the library. `content` is pasted text
/// or text already extracted by [`crate::pipeline::input::extract_text`].
///
/// # Errors
/// - [`SummaryError::MissingCredential`]: no API key; raised before chunking
/// - [`SummaryError::EmptyInput`]: `content` is blank
/// - [`SummaryError::InvalidConfig`]: bad chunking parameters
/// - [`SummaryError::Generation`]: an agent call failed (names stage and chunk)
pub async fn summarize(
    content: impl AsRef<str>,
    audience: &str,
    config: &SummaryConfig,
) -> Result<SummaryOutput, SummaryError> {
    let generator = resolve_generator(config)?;
    run_pipeline(generator.as_ref(), content.as_ref(), audience, config).await
}

/// Extract text from a document (pasted text, PDF path, or PDF URL) and
/// summarize it.
///
/// Extraction failures short-circuit before any agent call.
pub async fn summarize_document(
    document: &DocumentInput,
    audience: &str,
    config: &SummaryConfig,
) -> Result<SummaryOutput, SummaryError> {
    let generator = resolve_generator(config)?;
    let content = input::extract_text(document, config.download_timeout_secs).await?;
    run_pipeline(generator.as_ref(), &content, audience, config).await
}

/// Summarize a document and write the final summary to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn summarize_to_file(
    document: &DocumentInput,
    audience: &str,
    output_path: impl AsRef<Path>,
    config: &SummaryConfig,
) -> Result<SummaryOutput, SummaryError> {
    let output = summarize_document(document, audience, config).await?;
    let path = output_path.as_ref();
    let write_err = |source| SummaryError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let tmp_path = path.with_extension("tmp");
    let mut body = output.summary.clone();
    if !body.ends_with('\n') {
        body.push('\n');
    }
    tokio::fs::write(&tmp_path, body).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    Ok(output)
}

/// Synchronous wrapper around [`summarize`].
///
/// Creates a temporary tokio runtime internally.
pub fn summarize_sync(
    content: impl AsRef<str>,
    audience: &str,
    config: &SummaryConfig,
) -> Result<SummaryOutput, SummaryError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SummaryError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(summarize(content, audience, config))
}

// ── Driver ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
struct Usage {
    calls: usize,
    input_tokens: u64,
    output_tokens: u64,
}

impl Usage {
    fn record(&mut self, g: &Generation) {
        self.calls += 1;
        self.input_tokens += g.prompt_tokens as u64;
        self.output_tokens += g.completion_tokens as u64;
    }

    fn merge(&mut self, other: Usage) {
        self.calls += other.calls;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

async fn run_pipeline(
    generator: &dyn TextGenerator,
    content: &str,
    audience: &str,
    config: &SummaryConfig,
) -> Result<SummaryOutput, SummaryError> {
    let total_start = Instant::now();
    if content.trim().is_empty() {
        return Err(SummaryError::EmptyInput);
    }
    let progress = config.progress_callback.as_ref();

    // ── Splitting ────────────────────────────────────────────────────────
    debug!("Phase: {}", Phase::Splitting);
    let chunker = Chunker::new(config.max_chunk_size, config.overlap_size)?;
    let chunks = chunker.split(content);
    let total = chunks.len();
    info!(
        "Document split into {} chunks ({} chars, max {} / overlap {})",
        total,
        content.chars().count(),
        config.max_chunk_size,
        config.overlap_size
    );
    if let Some(cb) = progress {
        cb.on_summary_start(total);
    }

    // ── PerChunk(i) ──────────────────────────────────────────────────────
    let limiter = RateLimiter::new(
        config.requests_per_interval,
        Duration::from_millis(config.rate_interval_ms),
    );
    let agents = Agents::new(generator, &limiter, config);

    let results: Vec<(ChunkReport, Usage)> = stream::iter(chunks)
        .map(|chunk| process_chunk(agents, chunk, total, progress))
        .buffered(config.concurrency.max(1))
        .try_collect()
        .await?;

    let mut usage = Usage::default();
    let mut reports = Vec::with_capacity(results.len());
    for (report, u) in results {
        usage.merge(u);
        reports.push(report);
    }

    // ── Joining ──────────────────────────────────────────────────────────
    debug!("Phase: {}", Phase::Joining);
    let combined_summary = join_summaries(&reports);
    let flagged = reports.iter().filter(|r| !r.verdict.is_accurate).count();
    info!("All {} chunks summarized ({} flagged by the Critic)", total, flagged);

    // ── FinalRewrite ─────────────────────────────────────────────────────
    debug!("Phase: {}", Phase::FinalRewrite);
    if let Some(cb) = progress {
        cb.on_rewrite_start();
    }
    let rewrite_start = Instant::now();
    let rewritten = agents.rewrite(&combined_summary, audience).await?;
    usage.record(&rewritten);
    let rewrite_duration_ms = rewrite_start.elapsed().as_millis() as u64;

    // ── Done ─────────────────────────────────────────────────────────────
    let stats = SummaryStats {
        input_chars: content.chars().count(),
        chunk_count: total,
        flagged_chunks: flagged,
        generation_calls: usage.calls,
        total_input_tokens: usage.input_tokens,
        total_output_tokens: usage.output_tokens,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        rewrite_duration_ms,
    };
    info!(
        "Phase: {}: {} chunks, {} calls, {}ms total",
        Phase::Done,
        stats.chunk_count,
        stats.generation_calls,
        stats.total_duration_ms
    );
    if let Some(cb) = progress {
        cb.on_summary_complete(total);
    }

    Ok(SummaryOutput {
        summary: rewritten.text,
        combined_summary,
        audience: audience.to_string(),
        chunks: reports,
        stats,
    })
}

/// Research → Summarize → Critique for one chunk.
async fn process_chunk(
    agents: Agents<'_>,
    chunk: Chunk,
    total: usize,
    progress: Option<&ProgressCallback>,
) -> Result<(ChunkReport, Usage), SummaryError> {
    let num = chunk.index + 1;
    let start = Instant::now();
    let mut usage = Usage::default();
    info!("Processing {}/{} ({} chars)", Phase::PerChunk(num), total, chunk.char_len());
    if let Some(cb) = progress {
        cb.on_chunk_start(num, total);
    }

    let key_points = agents.research(&chunk.text, num).await?;
    usage.record(&key_points);
    stage_done(progress, num, Stage::Researcher);

    let summary = agents.summarize(&key_points.text, num).await?;
    usage.record(&summary);
    stage_done(progress, num, Stage::Summarizer);

    let (verdict, review) = agents.critique(&summary.text, &key_points.text, num).await?;
    usage.record(&review);
    stage_done(progress, num, Stage::Critic);
    if !verdict.is_accurate {
        warn!("Critic flagged chunk {}: {}", num, verdict.feedback);
    }

    if let Some(cb) = progress {
        cb.on_chunk_complete(num, total, summary.text.chars().count());
    }

    Ok((
        ChunkReport {
            chunk_num: num,
            start: chunk.start,
            end: chunk.end,
            key_points: key_points.text,
            summary: summary.text,
            verdict,
            duration_ms: start.elapsed().as_millis() as u64,
        },
        usage,
    ))
}

fn stage_done(progress: Option<&ProgressCallback>, chunk: usize, stage: Stage) {
    if let Some(cb) = progress {
        cb.on_stage_complete(chunk, stage);
    }
}

/// Concatenate chunk summaries in document order.
fn join_summaries(reports: &[ChunkReport]) -> String {
    reports
        .iter()
        .map(|r| r.summary.as_str())
        .collect::<Vec<_>>()
        .join(SUMMARY_SEPARATOR)
}

// ── Provider resolution ──────────────────────────────────────────────────

fn env_lookup(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

/// API-key variable `provider` reads, or `None` for keyless and unlisted
/// providers (the factory judges those itself).
fn credential_var(provider: &str) -> Option<&'static str> {
    let name = provider.to_ascii_lowercase();
    if KEYLESS_PROVIDERS.contains(&name.as_str()) {
        return None;
    }
    PROVIDER_KEYS
        .iter()
        .find(|(p, _)| *p == name)
        .map(|(_, v)| *v)
}

/// Check that the variable `provider` reads its key from is set.
fn check_credential(
    provider: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<(), SummaryError> {
    match credential_var(provider) {
        Some(var) if lookup(var).is_none() => Err(SummaryError::MissingCredential {
            vars: vec![var.to_string()],
            hint: format!("Export {var}=<your key> (or add it to a .env file) to use '{provider}'."),
        }),
        _ => Ok(()),
    }
}

/// First provider, in [`PROVIDER_KEYS`] order, whose key is set.
fn detect_provider(lookup: &dyn Fn(&str) -> Option<String>) -> Option<&'static str> {
    PROVIDER_KEYS
        .iter()
        .find(|(_, var)| lookup(var).is_some())
        .map(|(p, _)| *p)
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, SummaryError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        SummaryError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// How a provider will be built once its credential is known to be present.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ProviderPlan {
    /// `ProviderFactory::create_llm_provider(name, model)`.
    Named { name: String, model: String },
    /// `ProviderFactory::from_env()`; `detected` names the key that was found.
    FromEnv { detected: &'static str },
}

/// Resolve the text generator, from most-specific to least-specific:
///
/// 1. a pre-built generator (`config.generator`)
/// 2. a pre-built provider (`config.provider`)
/// 3. a named provider (`config.provider_name`) + model
/// 4. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`
/// 5. the first provider whose API key is set
///
/// Steps 3–5 verify the variable the provider will read its key from, so a
/// missing key surfaces as [`SummaryError::MissingCredential`] before any
/// chunking.
pub fn resolve_generator(config: &SummaryConfig) -> Result<Arc<dyn TextGenerator>, SummaryError> {
    if let Some(ref generator) = config.generator {
        return Ok(Arc::clone(generator));
    }
    if let Some(ref provider) = config.provider {
        return Ok(Arc::new(LlmGenerator::new(Arc::clone(provider))));
    }

    let provider = match plan_provider(config, &env_lookup)? {
        ProviderPlan::Named { name, model } => create_provider(&name, &model)?,
        ProviderPlan::FromEnv { detected } => {
            let (provider, _embedding) =
                ProviderFactory::from_env().map_err(|e| SummaryError::ProviderNotConfigured {
                    provider: detected.to_string(),
                    hint: format!("{e}"),
                })?;
            provider
        }
    };
    Ok(Arc::new(LlmGenerator::new(provider)))
}

fn plan_provider(
    config: &SummaryConfig,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<ProviderPlan, SummaryError> {
    let model = || config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string());

    if let Some(ref name) = config.provider_name {
        check_credential(name, lookup)?;
        return Ok(ProviderPlan::Named {
            name: name.clone(),
            model: model(),
        });
    }

    if let (Some(name), Some(model)) = (
        lookup("EDGEQUAKE_LLM_PROVIDER"),
        lookup("EDGEQUAKE_MODEL"),
    ) {
        check_credential(&name, lookup)?;
        return Ok(ProviderPlan::Named { name, model });
    }

    match detect_provider(lookup) {
        Some("openai") => Ok(ProviderPlan::Named {
            name: "openai".to_string(),
            model: model(),
        }),
        Some(detected) => Ok(ProviderPlan::FromEnv { detected }),
        None => Err(SummaryError::MissingCredential {
            vars: PROVIDER_KEYS.iter().map(|(_, v)| v.to_string()).collect(),
            hint: "Set an API key for one provider (e.g. export OPENAI_API_KEY=sk-...), \
                   or choose a local provider with --provider ollama."
                .to_string(),
        }),
    }
}
