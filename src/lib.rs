//! # edgequake-summarizer
//!
//! Summarize long documents with a small team of LLM agents.
//!
//! ## Why agents?
//!
//! A single "summarize this" prompt over a long report drops facts from the
//! middle and drifts in tone. Here each chunk is read closely by a
//! Researcher, condensed by a Summarizer, and checked by a Critic; a Rewriter
//! then adapts the joined summaries for the reader you name ("a high school
//! student", "a board member", ...).
//!
//! ## Pipeline Overview
//!
//! ```text
//! Text / PDF
//!  │
//!  ├─ 1. Input      pasted text wins; otherwise PDF text via pdfium
//!  ├─ 2. Split      overlapping chunks (4000 chars, 200 overlap)
//!  ├─ 3. Per chunk  Researcher → Summarizer → Critic, paced by a rate limiter
//!  ├─ 4. Join       chunk summaries in document order, "\n\n"-separated
//!  ├─ 5. Rewrite    one Rewriter call for the target audience
//!  └─ 6. Output     final summary + per-chunk reports + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_summarizer::{summarize, SummaryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = SummaryConfig::default();
//!     let report = std::fs::read_to_string("report.txt")?;
//!     let output = summarize(&report, "A High School Student", &config).await?;
//!     println!("{}", output.summary);
//!     eprintln!("{} chunks, {} flagged by the Critic",
//!         output.stats.chunk_count,
//!         output.stats.flagged_chunks);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `summarize` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-summarizer = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod summarize;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{SummaryConfig, SummaryConfigBuilder};
pub use error::{CriticParseError, SummaryError};
pub use output::{ChunkReport, SummaryOutput, SummaryStats};
pub use pipeline::agents::Stage;
pub use pipeline::chunk::{reassemble, Chunk, Chunker};
pub use pipeline::critic::CriticVerdict;
pub use pipeline::generate::{GenerateError, Generation, GenerationParams, LlmGenerator, TextGenerator};
pub use pipeline::input::{extract_text, select_input, DocumentInput};
pub use pipeline::rate::RateLimiter;
pub use progress::{NoopProgressCallback, ProgressCallback, SummaryProgressCallback};
pub use summarize::{
    resolve_generator, summarize, summarize_document, summarize_sync, summarize_to_file,
};
