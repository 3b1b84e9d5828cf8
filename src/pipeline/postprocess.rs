//! Post-processing: deterministic cleanup of generated text.
//!
//! Each agent's reply passes through [`clean_generated_text`] before it is
//! handed to the next stage. The rules fix model quirks without touching
//! content:
//!
//! 1. Strip an outer ```` ``` ```` fence (models sometimes wrap prose in one)
//! 2. Normalise line endings (CRLF → LF)
//! 3. Trim trailing whitespace per line
//! 4. Collapse 3+ consecutive blank lines down to 1
//! 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 6. Trim leading and trailing blank space
//!
//! Critic replies are *not* cleaned here; the verdict parser needs the raw
//! text to locate its JSON object.

use once_cell::sync::Lazy;
use regex::Regex;

pub fn clean_generated_text(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer fences ──────────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\r?\n(.*)\r?\n```$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ──────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ───────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ──────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 5: Invisible characters ────────────────────────────────────────────

const INVISIBLE: [char; 6] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}', '\u{00AD}'];

fn remove_invisible_chars(input: &str) -> String {
    input.chars().filter(|c| !INVISIBLE.contains(c)).collect()
}
