//! Error types for the edgequake-summarizer library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`SummaryError`] (**fatal**): the run cannot produce a summary (bad
//!   chunking parameters, unreadable document, missing API key, a generation
//!   call that failed). Returned as `Err(SummaryError)` from the top-level
//!   `summarize*` functions.
//!
//! * [`CriticParseError`] (**non-fatal**): the Critic's reply did not contain
//!   a usable JSON verdict. The Critic absorbs it into a fallback
//!   [`crate::pipeline::critic::CriticVerdict`]; it never reaches the caller.

use crate::pipeline::agents::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-summarizer library.
#[derive(Debug, Error)]
pub enum SummaryError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or chunker validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No API key for the text-generation provider was found in the environment.
    #[error("Missing API credential: none of [{}] is set.\n{hint}", join_vars(.vars))]
    MissingCredential { vars: Vec<String>, hint: String },

    /// The configured provider could not be constructed.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Neither pasted text nor a document was supplied.
    #[error("Nothing to summarize: paste some text or provide a PDF file.")]
    EmptyInput,

    /// The document could not be opened, downloaded, or its text extracted.
    #[error("Could not read document '{source_name}': {detail}")]
    DocumentExtraction { source_name: String, detail: String },

    // ── Generation errors ─────────────────────────────────────────────────
    /// A stage's generation call failed after all attempts.
    ///
    /// `chunk` is the 1-indexed chunk number, or `None` for the final rewrite.
    #[error("{stage} failed{} after {attempts} attempt(s): {detail}", chunk_label(.chunk))]
    Generation {
        stage: Stage,
        chunk: Option<usize>,
        attempts: u32,
        detail: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_vars(vars: &[String]) -> String {
    vars.join(", ")
}

fn chunk_label(chunk: &Option<usize>) -> String {
    match chunk {
        Some(n) => format!(" on chunk {n}"),
        None => String::new(),
    }
}

/// Why a Critic reply could not be turned into a verdict.
///
/// Never returned from the public pipeline; see
/// [`crate::pipeline::critic::CriticVerdict::parse_or_fallback`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CriticParseError {
    /// The reply contained no `{ … }` span.
    #[error("no JSON object found in critic output")]
    NoJsonObject,

    /// A `{ … }` span was found but did not deserialize into a verdict.
    #[error("invalid critic JSON: {0}")]
    InvalidJson(String),
}
