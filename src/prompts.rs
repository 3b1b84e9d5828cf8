//! Prompt templates for the four summarization agents.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: changing how an agent behaves requires
//!    editing exactly one place.
//!
//! 2. **Testability**: unit tests can render and inspect prompts directly
//!    without spinning up a real LLM.
//!
//! Templates use `{name}` placeholders filled by the `render_*` helpers below.

/// Researcher: extract facts, do not summarize.
pub const RESEARCHER_PROMPT: &str = r#"You are the Researcher Agent. Your task is to carefully read the following text and extract its key facts, arguments, and entities. Do NOT summarize or paraphrase. Just list the important factual points, events, people, and concepts.

Text:
{text}

Output format:
- Point 1: ...
- Point 2: ...
- Point 3: ..."#;

/// Summarizer: turn key points into one coherent paragraph.
pub const SUMMARIZER_PROMPT: &str = r#"You are the Summarizer Agent. You will take the following key points extracted by the Researcher Agent and write a coherent, well-written summary paragraph that covers all of them naturally.

Key Points:
{key_points}

Now write the summary:"#;

/// Critic: compare a summary against its key points and answer in JSON.
pub const CRITIC_PROMPT: &str = r#"You are an expert summary reviewer. Compare the following summary with the key points.

Key Points:
{key_points}

Summary:
{summary}

Tasks:
1. Check if the summary covers all key points.
2. Identify any missing or inaccurate points.
3. Return a valid JSON with this format:
{
  "is_accurate": true/false,
  "feedback": "Explain any issues",
  "missing_points": ["list missing key points"]
}"#;

/// Rewriter: adapt tone and vocabulary for an audience without changing content.
pub const REWRITER_PROMPT: &str = r#"You are the Re-writer Agent, a master of tone and style. Your task is to take the following verified summary and rewrite it for the specified target audience. Do not add or remove information. Only change the vocabulary, sentence structure, and tone.

Target Audience: {audience}

Verified Summary:
{summary}

Now, produce the final, re-written summary:"#;

/// Fill `{name}` placeholders in a single pass, so a value that happens to
/// contain `{summary}` is never substituted twice.
fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + vars.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;

    'outer: while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        for (name, value) in vars {
            let key = format!("{{{name}}}");
            if tail.starts_with(&key) {
                out.push_str(value);
                rest = &tail[key.len()..];
                continue 'outer;
            }
        }
        out.push('{');
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}

pub fn render_researcher(text: &str) -> String {
    fill(RESEARCHER_PROMPT, &[("text", text)])
}

pub fn render_summarizer(key_points: &str) -> String {
    fill(SUMMARIZER_PROMPT, &[("key_points", key_points)])
}

pub fn render_critic(summary: &str, key_points: &str) -> String {
    fill(
        CRITIC_PROMPT,
        &[("key_points", key_points), ("summary", summary)],
    )
}

pub fn render_rewriter(summary: &str, audience: &str) -> String {
    fill(
        REWRITER_PROMPT,
        &[("audience", audience), ("summary", summary)],
    )
}
