//! Pipeline stages for agentic summarization.
//!
//! Each submodule owns one concern, so each can be tested without the
//! others and without a network.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ chunk ──▶ agents (Researcher → Summarizer → Critic) ──▶ join ──▶ agents (Rewriter)
//! (text/PDF) (split)        per chunk; every call paced by rate              once
//! ```
//!
//! 1. [`input`]: pasted text, or PDF text extracted via pdfium
//! 2. [`chunk`]: overlapping, lossless character windows
//! 3. [`agents`]: the four prompt-driven roles over one [`generate::TextGenerator`]
//! 4. [`critic`]: lenient JSON recovery for the Critic's verdict
//! 5. [`generate`]: the generation seam, with timeout and retry/backoff
//! 6. [`rate`]: token-bucket pacing of every generation request
//! 7. [`postprocess`]: deterministic cleanup of prose replies

pub mod agents;
pub mod chunk;
pub mod critic;
pub mod generate;
pub mod input;
pub mod postprocess;
pub mod rate;
