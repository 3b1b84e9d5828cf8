//! Tolerant parsing of the Critic's JSON verdict.
//!
//! Models asked for JSON routinely wrap it in prose ("Here is my review:")
//! or use Python-style single quotes. Parsing therefore has two explicit
//! paths: [`CriticVerdict::parse`] tries to recover a verdict and reports why
//! it could not; [`CriticVerdict::parse_or_fallback`] turns any failure into a
//! fallback verdict so the pipeline never stops on a malformed review.

use crate::error::CriticParseError;
use serde::{Deserialize, Serialize};

/// The Critic's assessment of one chunk summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticVerdict {
    pub is_accurate: bool,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub missing_points: Vec<String>,
}

impl CriticVerdict {
    /// Extract the span from the first `{` to the last `}`, normalise single
    /// quotes to double quotes, and deserialize.
    pub fn parse(raw: &str) -> Result<Self, CriticParseError> {
        let open = raw.find('{').ok_or(CriticParseError::NoJsonObject)?;
        let close = raw.rfind('}').ok_or(CriticParseError::NoJsonObject)?;
        if close < open {
            return Err(CriticParseError::NoJsonObject);
        }

        let json = raw[open..=close].replace('\'', "\"");
        serde_json::from_str(&json).map_err(|e| CriticParseError::InvalidJson(e.to_string()))
    }

    /// Like [`parse`](Self::parse), but never fails.
    pub fn parse_or_fallback(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(Self::fallback)
    }

    /// The verdict recorded when the Critic's reply is unusable.
    pub fn fallback(err: CriticParseError) -> Self {
        Self {
            is_accurate: false,
            feedback: format!("Could not parse Critic output: {err}"),
            missing_points: Vec::new(),
        }
    }
}
