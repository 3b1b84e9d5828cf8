//! Chunking: split a long document into overlapping, ordered windows.
//!
//! ## Why overlap?
//!
//! Each chunk is summarized in isolation. A fact that straddles a chunk
//! boundary would otherwise be cut in half and lost to both sides; repeating
//! the last `overlap_size` characters of one chunk at the start of the next
//! gives the Researcher enough context to pick it up.
//!
//! ## Why prefer structural breaks?
//!
//! A window that ends mid-sentence produces key points that end mid-thought.
//! The chunker looks backwards from the hard limit for a paragraph break, then
//! a line break, then a sentence end, then a space, and only cuts blindly when
//! the second half of the window contains none of them.
//!
//! Sizes are counted in `char`s, so a chunk never splits a UTF-8 sequence.

use crate::error::SummaryError;
use serde::{Deserialize, Serialize};

/// Separators tried in priority order when choosing where a chunk ends.
/// The chunk ends just after the separator.
const BREAKS: [&str; 6] = ["\n\n", "\n", ". ", "! ", "? ", " "];

/// A contiguous window of the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 0-indexed position in the chunk sequence.
    pub index: usize,
    /// Char offset (inclusive) of the first character in the document.
    pub start: usize,
    /// Char offset (exclusive) one past the last character.
    pub end: usize,
    /// Number of leading characters repeated from the previous chunk.
    pub overlap: usize,
    pub text: String,
}

impl Chunk {
    /// Length of the chunk in characters.
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }

    /// The chunk text without the characters it shares with its predecessor.
    pub fn fresh_text(&self) -> &str {
        match self.text.char_indices().nth(self.overlap) {
            Some((byte, _)) => &self.text[byte..],
            None => "",
        }
    }
}

/// Splits documents into overlapping chunks of at most `max_chunk_size` chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_chunk_size: usize,
    overlap_size: usize,
}

impl Chunker {
    /// Create a chunker.
    ///
    /// # Errors
    /// [`SummaryError::InvalidConfig`] when `overlap_size >= max_chunk_size`:
    /// such a window could never advance past its own overlap.
    pub fn new(max_chunk_size: usize, overlap_size: usize) -> Result<Self, SummaryError> {
        if overlap_size >= max_chunk_size {
            return Err(SummaryError::InvalidConfig(format!(
                "overlap size ({overlap_size}) must be smaller than max chunk size ({max_chunk_size})"
            )));
        }
        Ok(Self {
            max_chunk_size,
            overlap_size,
        })
    }

    /// Iterate over the chunks of `text` in document order.
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        let mut offsets: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        offsets.push(text.len());
        Chunks {
            text,
            offsets,
            max: self.max_chunk_size,
            overlap: self.overlap_size,
            next_start: 0,
            index: 0,
            done: text.is_empty(),
        }
    }

    /// Collect every chunk of `text`.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        self.chunks(text).collect()
    }
}

/// Consuming iterator returned by [`Chunker::chunks`].
#[derive(Debug)]
pub struct Chunks<'a> {
    text: &'a str,
    /// Byte offset of every char, plus `text.len()` as a sentinel.
    offsets: Vec<usize>,
    max: usize,
    overlap: usize,
    next_start: usize,
    index: usize,
    done: bool,
}

impl Chunks<'_> {
    fn char_count(&self) -> usize {
        self.offsets.len() - 1
    }

    fn char_at_byte(&self, byte: usize) -> usize {
        // `byte` always lands on a char boundary (just after a separator).
        self.offsets.partition_point(|&b| b < byte)
    }

    /// Choose the end (exclusive, in chars) of a chunk starting at `start`.
    fn find_end(&self, start: usize) -> usize {
        let hard_end = start + self.max;
        if hard_end >= self.char_count() {
            return self.char_count();
        }

        // Only look in the back half of the window (and never at or before
        // the overlap, so the next chunk always starts further along).
        let lo = (start + self.max / 2).max(start + self.overlap + 1);
        let window = &self.text[self.offsets[lo]..self.offsets[hard_end]];

        for sep in BREAKS {
            if let Some(pos) = window.rfind(sep) {
                let cut = self.char_at_byte(self.offsets[lo] + pos + sep.len());
                if cut > start + self.overlap && cut <= hard_end {
                    return cut;
                }
            }
        }
        hard_end
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }

        let start = self.next_start;
        let end = self.find_end(start);
        let overlap = if self.index == 0 { 0 } else { self.overlap };

        let chunk = Chunk {
            index: self.index,
            start,
            end,
            overlap,
            text: self.text[self.offsets[start]..self.offsets[end]].to_string(),
        };

        if end >= self.char_count() {
            self.done = true;
        } else {
            self.next_start = end - self.overlap;
            self.index += 1;
        }
        Some(chunk)
    }
}

/// Rebuild the original document from its chunks by dropping each chunk's
/// leading overlap.
pub fn reassemble(chunks: &[Chunk]) -> String {
    chunks.iter().map(Chunk::fresh_text).collect()
}
