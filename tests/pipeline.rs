//! Integration tests for the summarization pipeline.
//!
//! Every test injects a scripted [`TextGenerator`], so no network or API key
//! is needed. The scripted model recognises each agent by its prompt and
//! answers with replies derived from the first `wNNNN` token it sees, which
//! lets tests predict exact outputs from the public [`Chunker`].
//!
//! Run with:
//!   cargo test --test pipeline

use async_trait::async_trait;
use edgequake_summarizer::{
    select_input, summarize, summarize_document, summarize_sync, summarize_to_file, Chunker,
    DocumentInput, GenerateError, Generation, GenerationParams, Stage, SummaryConfig, SummaryError,
    SummaryProgressCallback, TextGenerator,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Route library logs to the test harness (`RUST_LOG=debug` to see them).
fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"w\d{4}").unwrap());

/// `count` space-separated tokens `w0000 w0001 …`, 6 chars each.
fn document(count: usize) -> String {
    (0..count).map(|i| format!("w{i:04} ")).collect()
}

fn first_token(s: &str) -> String {
    TOKEN
        .find(s)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "none".to_string())
}

fn stage_of(prompt: &str) -> Stage {
    if prompt.starts_with("You are the Researcher Agent") {
        Stage::Researcher
    } else if prompt.starts_with("You are the Summarizer Agent") {
        Stage::Summarizer
    } else if prompt.starts_with("You are an expert summary reviewer") {
        Stage::Critic
    } else {
        Stage::Rewriter
    }
}

/// Summaries the scripted model will produce for `doc`, in document order.
fn expected_summaries(doc: &str, size: usize, overlap: usize) -> Vec<String> {
    Chunker::new(size, overlap)
        .unwrap()
        .split(doc)
        .iter()
        .map(|c| format!("F({})", first_token(&c.text)))
        .collect()
}

#[derive(Default)]
struct Script {
    /// Fail the Nth (1-indexed) Summarizer call.
    fail_summarizer_call: Option<usize>,
    /// Reply the Critic sends instead of valid JSON.
    critic_reply: Option<&'static str>,
    /// Slow down the Researcher for chunks starting with this token.
    slow_token: Option<&'static str>,
    /// Time every call takes, whatever the stage.
    latency: Option<Duration>,
    /// Summarizer reply instead of `F(token)`.
    summary_reply: Option<&'static str>,
}

#[derive(Default)]
struct ScriptedModel {
    script: Script,
    calls: Mutex<Vec<(Stage, GenerationParams)>>,
    prompts: Mutex<Vec<String>>,
    started: Mutex<Vec<Instant>>,
    summarizer_calls: AtomicUsize,
}

impl ScriptedModel {
    fn with(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            ..Default::default()
        })
    }

    fn count(&self, stage: Stage) -> usize {
        self.calls.lock().unwrap().iter().filter(|(s, _)| *s == stage).count()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn params_for(&self, stage: Stage) -> Vec<GenerationParams> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == stage)
            .map(|(_, p)| *p)
            .collect()
    }

    /// Gaps between the starts of consecutive calls.
    fn gaps(&self) -> Vec<Duration> {
        let started = self.started.lock().unwrap();
        started.windows(2).map(|w| w[1] - w[0]).collect()
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for ScriptedModel {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Generation, GenerateError> {
        self.started.lock().unwrap().push(Instant::now());
        let stage = stage_of(prompt);
        self.calls.lock().unwrap().push((stage, *params));
        self.prompts.lock().unwrap().push(prompt.to_string());
        let token = first_token(prompt);
        if let Some(latency) = self.script.latency {
            tokio::time::sleep(latency).await;
        }

        let text = match stage {
            Stage::Researcher => {
                if self.script.slow_token == Some(token.as_str()) {
                    tokio::time::sleep(Duration::from_millis(80)).await;
                }
                format!("- first={token}")
            }
            Stage::Summarizer => {
                let n = self.summarizer_calls.fetch_add(1, Ordering::SeqCst) + 1;
                if self.script.fail_summarizer_call == Some(n) {
                    return Err(GenerateError::new("503 Service Unavailable"));
                }
                match self.script.summary_reply {
                    Some(reply) => reply.to_string(),
                    None => format!("F({token})"),
                }
            }
            Stage::Critic => self
                .script
                .critic_reply
                .unwrap_or(r#"{"is_accurate": true, "feedback": "ok", "missing_points": []}"#)
                .to_string(),
            Stage::Rewriter => {
                let body = prompt
                    .split("Verified Summary:\n")
                    .nth(1)
                    .and_then(|s| s.split("\n\nNow, produce").next())
                    .unwrap_or_default();
                format!("FINAL\n\n{body}")
            }
        };

        Ok(Generation {
            text,
            prompt_tokens: 10,
            completion_tokens: 5,
        })
    }
}

fn config_for(model: &Arc<ScriptedModel>) -> edgequake_summarizer::SummaryConfigBuilder {
    SummaryConfig::builder()
        .generator(Arc::clone(model) as Arc<dyn TextGenerator>)
        .rate_interval_ms(0)
}

#[derive(Default)]
struct EventLog {
    starts: AtomicUsize,
    chunks_done: AtomicUsize,
    summary_lens: Mutex<Vec<usize>>,
    rewrites: AtomicUsize,
}

impl SummaryProgressCallback for EventLog {
    fn on_summary_start(&self, _total: usize) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }
    fn on_chunk_complete(&self, _chunk: usize, _total: usize, len: usize) {
        self.chunks_done.fetch_add(1, Ordering::SeqCst);
        self.summary_lens.lock().unwrap().push(len);
    }
    fn on_rewrite_start(&self) {
        self.rewrites.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn nine_thousand_chars_take_three_chunks_and_ten_calls() {
    let doc = document(1500);
    assert_eq!(doc.chars().count(), 9000);

    let model = ScriptedModel::with(Script::default());
    let config = config_for(&model).build().unwrap();
    let out = summarize(&doc, "A High School Student", &config).await.unwrap();

    assert_eq!(out.stats.chunk_count, 3);
    assert_eq!(model.count(Stage::Researcher), 3);
    assert_eq!(model.count(Stage::Summarizer), 3);
    assert_eq!(model.count(Stage::Critic), 3);
    assert_eq!(model.count(Stage::Rewriter), 1);
    assert_eq!(out.stats.generation_calls, 10);
    assert_eq!(out.stats.total_input_tokens, 100);
    assert_eq!(out.stats.total_output_tokens, 50);
    assert_eq!(out.stats.flagged_chunks, 0);

    let expected = expected_summaries(&doc, 4000, 200).join("\n\n");
    assert_eq!(out.combined_summary, expected);
    assert_eq!(out.summary, format!("FINAL\n\n{expected}"));
    assert_eq!(out.chunks[0].key_points, "- first=w0000");
    assert_eq!(out.chunks[0].start, 0);
    assert_eq!(out.audience, "A High School Student");
}

#[tokio::test]
async fn short_text_is_one_chunk() {
    let model = ScriptedModel::with(Script::default());
    let config = config_for(&model).build().unwrap();
    let out = summarize("w0042 is a short note.", "A Child", &config).await.unwrap();

    assert_eq!(out.stats.chunk_count, 1);
    assert_eq!(out.combined_summary, "F(w0042)");
    assert_eq!(model.total_calls(), 4);
}

#[tokio::test]
async fn summaries_keep_document_order_under_concurrency() {
    init_logs();
    let doc = document(100);
    // First chunk's Researcher is slowest, so it finishes last.
    let model = ScriptedModel::with(Script {
        slow_token: Some("w0000"),
        ..Default::default()
    });
    let config = config_for(&model)
        .max_chunk_size(120)
        .overlap_size(12)
        .concurrency(4)
        .build()
        .unwrap();

    let out = summarize(&doc, "Engineers", &config).await.unwrap();
    let expected = expected_summaries(&doc, 120, 12);
    assert!(expected.len() > 3);
    assert_eq!(out.combined_summary, expected.join("\n\n"));
    let nums: Vec<usize> = out.chunks.iter().map(|c| c.chunk_num).collect();
    assert_eq!(nums, (1..=expected.len()).collect::<Vec<_>>());
}

#[tokio::test]
async fn rewriter_sees_audience_and_critic_uses_its_own_params() {
    let model = ScriptedModel::with(Script::default());
    let config = config_for(&model)
        .temperature(0.7)
        .max_tokens(1000)
        .build()
        .unwrap();
    summarize(document(10), "A Board Member", &config).await.unwrap();

    assert!(model.last_prompt().contains("Target Audience: A Board Member"));
    let critic = model.params_for(Stage::Critic);
    assert_eq!(critic[0].temperature, 0.0);
    assert_eq!(critic[0].max_tokens, 500);
    let researcher = model.params_for(Stage::Researcher);
    assert_eq!(researcher[0].temperature, 0.7);
    assert_eq!(researcher[0].max_tokens, 1000);
}

#[tokio::test]
async fn progress_events_fire_once_per_chunk() {
    let model = ScriptedModel::with(Script::default());
    let log = Arc::new(EventLog::default());
    let config = config_for(&model)
        .max_chunk_size(60)
        .overlap_size(6)
        .progress_callback(log.clone())
        .build()
        .unwrap();

    let out = summarize(document(30), "Anyone", &config).await.unwrap();
    assert_eq!(log.starts.load(Ordering::SeqCst), 1);
    assert_eq!(log.chunks_done.load(Ordering::SeqCst), out.stats.chunk_count);
    assert_eq!(log.rewrites.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn chunk_summary_length_is_counted_in_chars() {
    let model = ScriptedModel::with(Script {
        summary_reply: Some("Café crème brûlée, naïve façade."),
        ..Default::default()
    });
    let log = Arc::new(EventLog::default());
    let config = config_for(&model)
        .progress_callback(log.clone())
        .build()
        .unwrap();

    let out = summarize(document(10), "Anyone", &config).await.unwrap();
    let summary = &out.chunks[0].summary;
    assert_ne!(summary.chars().count(), summary.len());
    assert_eq!(*log.summary_lens.lock().unwrap(), vec![summary.chars().count()]);
}

// ── Critic ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unparseable_critic_reply_is_flagged_but_not_fatal() {
    init_logs();
    let model = ScriptedModel::with(Script {
        critic_reply: Some("Looks fine to me!"),
        ..Default::default()
    });
    let config = config_for(&model).build().unwrap();
    let out = summarize(document(10), "Anyone", &config).await.unwrap();

    let verdict = &out.chunks[0].verdict;
    assert!(!verdict.is_accurate);
    assert!(verdict.feedback.starts_with("Could not parse Critic output"));
    assert!(verdict.missing_points.is_empty());
    assert_eq!(out.stats.flagged_chunks, 1);
    // The verdict never changes the text.
    assert_eq!(out.combined_summary, "F(w0000)");
}

#[tokio::test]
async fn chatty_critic_json_is_recovered() {
    let model = ScriptedModel::with(Script {
        critic_reply: Some(
            "Here is my review:\n{'is_accurate': false, 'feedback': 'misses w0003', 'missing_points': ['w0003']}\nThanks",
        ),
        ..Default::default()
    });
    let config = config_for(&model).build().unwrap();
    let out = summarize(document(10), "Anyone", &config).await.unwrap();

    let verdict = &out.chunks[0].verdict;
    assert!(!verdict.is_accurate);
    assert_eq!(verdict.missing_points, vec!["w0003".to_string()]);
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn generation_failure_names_stage_and_chunk() {
    init_logs();
    let model = ScriptedModel::with(Script {
        fail_summarizer_call: Some(2),
        ..Default::default()
    });
    let config = config_for(&model).build().unwrap();
    let err = summarize(document(1500), "Anyone", &config)
        .await
        .unwrap_err();

    match err {
        SummaryError::Generation {
            stage,
            chunk,
            attempts,
            ref detail,
        } => {
            assert_eq!(stage, Stage::Summarizer);
            assert_eq!(chunk, Some(2));
            assert_eq!(attempts, 1);
            assert!(detail.contains("503"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(model.count(Stage::Rewriter), 0);
    assert_eq!(model.count(Stage::Researcher), 2);
}

#[tokio::test]
async fn retries_recover_from_a_transient_failure() {
    let model = ScriptedModel::with(Script {
        fail_summarizer_call: Some(1),
        ..Default::default()
    });
    let config = config_for(&model)
        .max_retries(2)
        .retry_backoff_ms(1)
        .build()
        .unwrap();
    let out = summarize(document(10), "Anyone", &config).await.unwrap();
    assert_eq!(out.combined_summary, "F(w0000)");
    assert_eq!(model.count(Stage::Summarizer), 2);
}

#[tokio::test]
async fn missing_credential_fails_before_chunking() {
    if std::env::var_os("XAI_API_KEY").is_some() {
        println!("SKIP: XAI_API_KEY is set");
        return;
    }
    let log = Arc::new(EventLog::default());
    let config = SummaryConfig::builder()
        .provider_name("xai")
        .progress_callback(log.clone())
        .build()
        .unwrap();

    let err = summarize(document(1500), "Anyone", &config)
        .await
        .unwrap_err();
    match err {
        SummaryError::MissingCredential { vars, .. } => {
            assert_eq!(vars, vec!["XAI_API_KEY".to_string()])
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(log.starts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn corrupt_pdf_fails_before_any_agent_call() {
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(b"this is plain text pretending to be a pdf").unwrap();

    let model = ScriptedModel::with(Script::default());
    let config = config_for(&model).build().unwrap();
    let input = DocumentInput::Pdf(tmp.path().to_string_lossy().to_string());

    let err = summarize_document(&input, "Anyone", &config)
        .await
        .unwrap_err();
    assert!(matches!(err, SummaryError::DocumentExtraction { .. }), "got {err:?}");
    assert_eq!(model.total_calls(), 0);
}

#[tokio::test]
async fn blank_text_is_rejected_without_calls() {
    let model = ScriptedModel::with(Script::default());
    let config = config_for(&model).build().unwrap();
    let err = summarize("  \n\t ", "Anyone", &config).await.unwrap_err();
    assert!(matches!(err, SummaryError::EmptyInput));
    assert_eq!(model.total_calls(), 0);
}

// ── Input and output ─────────────────────────────────────────────────────────

#[tokio::test]
async fn pasted_text_takes_priority_over_pdf() {
    let model = ScriptedModel::with(Script::default());
    let config = config_for(&model).build().unwrap();
    let input = select_input(Some("w0007 pasted"), Some("/no/such/file.pdf")).unwrap();

    let out = summarize_document(&input, "Anyone", &config).await.unwrap();
    assert_eq!(out.combined_summary, "F(w0007)");
}

#[tokio::test]
async fn summary_is_written_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/summary.md");

    let model = ScriptedModel::with(Script::default());
    let config = config_for(&model).build().unwrap();
    let input = DocumentInput::Text(document(10));

    let out = summarize_to_file(&input, "Anyone", &path, &config).await.unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, format!("{}\n", out.summary));
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn sync_wrapper_runs_without_an_outer_runtime() {
    let model = ScriptedModel::with(Script::default());
    let config = config_for(&model).build().unwrap();
    let out = tokio_test::assert_ok!(summarize_sync("w0001 and friends", "Anyone", &config));
    assert_eq!(out.combined_summary, "F(w0001)");
    tokio_test::assert_err!(summarize_sync("", "Anyone", &config));
}

// ── Pacing ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn every_request_is_paced_by_the_rate_limiter() {
    init_logs();
    let model = ScriptedModel::with(Script {
        latency: Some(Duration::from_millis(30)),
        ..Default::default()
    });
    let config = config_for(&model)
        .max_chunk_size(60)
        .overlap_size(6)
        .requests_per_interval(1)
        .rate_interval_ms(100)
        .build()
        .unwrap();

    let doc = document(15);
    let chunks = Chunker::new(60, 6).unwrap().split(&doc).len();
    assert_eq!(chunks, 2);

    let out = summarize(&doc, "Anyone", &config).await.unwrap();
    assert_eq!(out.stats.generation_calls, 3 * chunks + 1);

    // Calls take 30ms but the bucket mints one ticket per 100ms, so every
    // request, the Rewriter included, starts a full interval after the last.
    let gaps = model.gaps();
    assert_eq!(gaps.len(), 3 * chunks);
    for gap in gaps {
        assert!(gap >= Duration::from_millis(90), "gap {gap:?}");
    }
}

#[tokio::test]
async fn zero_interval_disables_pacing() {
    let model = ScriptedModel::with(Script::default());
    let config = config_for(&model)
        .max_chunk_size(60)
        .overlap_size(6)
        .build()
        .unwrap();

    let start = Instant::now();
    summarize(document(50), "Anyone", &config).await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(500));
}
