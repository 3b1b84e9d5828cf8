//! Result types returned by the `summarize*` entry points.

use crate::pipeline::critic::CriticVerdict;
use serde::{Deserialize, Serialize};

/// Everything a summarization run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryOutput {
    /// The audience-adapted final summary.
    pub summary: String,
    /// Chunk summaries joined in document order, as sent to the Rewriter.
    pub combined_summary: String,
    pub audience: String,
    /// Per-chunk intermediate results, in document order.
    pub chunks: Vec<ChunkReport>,
    pub stats: SummaryStats,
}

/// Intermediate results for one chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkReport {
    /// 1-indexed chunk number.
    pub chunk_num: usize,
    /// Char range of the chunk in the source document.
    pub start: usize,
    pub end: usize,
    pub key_points: String,
    pub summary: String,
    /// Informational only: verdicts never change the final summary.
    pub verdict: CriticVerdict,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryStats {
    pub input_chars: usize,
    pub chunk_count: usize,
    /// Chunks whose Critic verdict was `is_accurate = false` (including fallbacks).
    pub flagged_chunks: usize,
    pub generation_calls: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub rewrite_duration_ms: u64,
}
