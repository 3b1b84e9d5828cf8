//! Progress-callback trait for per-chunk pipeline events.
//!
//! Inject an [`Arc<dyn SummaryProgressCallback>`] via
//! [`crate::config::SummaryConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its phases. Callers can forward them
//! to a progress bar, a log, or a channel without the library knowing how.
//!
//! # Example
//!
//! ```rust
//! use edgequake_summarizer::{SummaryConfig, SummaryProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl SummaryProgressCallback for CountingCallback {
//!     fn on_chunk_complete(&self, chunk: usize, total: usize, summary_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Chunk {}/{} summarized ({} chars)", chunk, total, summary_len);
//!     }
//! }
//!
//! let config = SummaryConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::agents::Stage;
use std::sync::Arc;

/// Called by the pipeline as it processes each chunk.
///
/// All methods have default no-op implementations. Chunk numbers are
/// 1-indexed. With `concurrency > 1`, chunk events may interleave.
pub trait SummaryProgressCallback: Send + Sync {
    /// Called once after splitting, before any agent call.
    fn on_summary_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Called when a chunk enters the Researcher.
    fn on_chunk_start(&self, chunk: usize, total_chunks: usize) {
        let _ = (chunk, total_chunks);
    }

    /// Called after each per-chunk stage returns.
    fn on_stage_complete(&self, chunk: usize, stage: Stage) {
        let _ = (chunk, stage);
    }

    /// Called when a chunk's Researcher → Summarizer → Critic pass is done.
    /// `summary_len` counts characters, not bytes.
    fn on_chunk_complete(&self, chunk: usize, total_chunks: usize, summary_len: usize) {
        let _ = (chunk, total_chunks, summary_len);
    }

    /// Called before the final Rewriter call.
    fn on_rewrite_start(&self) {}

    /// Called once the final summary is ready.
    fn on_summary_complete(&self, total_chunks: usize) {
        let _ = total_chunks;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SummaryProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::SummaryConfig`].
pub type ProgressCallback = Arc<dyn SummaryProgressCallback>;
