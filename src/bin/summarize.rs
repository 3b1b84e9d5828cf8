//! CLI binary for edgequake-summarizer.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `SummaryConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_summarizer::{
    resolve_generator, select_input, summarize_document, summarize_to_file, DocumentInput, ProgressCallback, Stage,
    SummaryConfig, SummaryOutput, SummaryProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: [&str; 11] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over chunks, one log line per chunk,
/// and the current agent in the bar message.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_summary_start` tells us the chunk count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Summarizing");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, chunk: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&chunk))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl SummaryProgressCallback for CliProgressCallback {
    fn on_summary_start(&self, total_chunks: usize) {
        self.activate_bar(total_chunks);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Summarizing {total_chunks} chunk(s)…"))
        ));
    }

    fn on_chunk_start(&self, chunk: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(chunk, Instant::now());
        }
        self.bar.set_message(format!("chunk {chunk}: {}", Stage::Researcher));
    }

    fn on_stage_complete(&self, chunk: usize, stage: Stage) {
        let next = match stage {
            Stage::Researcher => Stage::Summarizer,
            Stage::Summarizer => Stage::Critic,
            Stage::Critic | Stage::Rewriter => return,
        };
        self.bar.set_message(format!("chunk {chunk}: {next}"));
    }

    fn on_chunk_complete(&self, chunk: usize, total: usize, summary_len: usize) {
        let secs = self.elapsed_secs(chunk);
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            chunk,
            total,
            dim(&format!("{summary_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_rewrite_start(&self) {
        self.bar.set_prefix("Rewriting");
        self.bar.set_message(Stage::Rewriter.to_string());
    }

    fn on_summary_complete(&self, total_chunks: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} chunk(s) summarized and rewritten",
            green("✔"),
            bold(&total_chunks.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Summarize a PDF for the default audience (stdout)
  summarize report.pdf

  # Summarize pasted text for a specific reader
  summarize --text "$(cat notes.txt)" --audience "A Board Member"

  # Read text from stdin
  cat notes.txt | summarize -

  # Summarize a PDF from a URL into a file
  summarize https://arxiv.org/pdf/1706.03762 -o attention-summary.md

  # Use a specific provider and model
  summarize --provider anthropic --model claude-haiku-4-20250514 report.pdf

  # Smaller chunks, faster pacing, full JSON report (per-chunk key points + Critic verdicts)
  summarize --chunk-size 2000 --overlap 100 --rate 3 --json report.pdf > report.json

PIPELINE:
  Each chunk goes Researcher → Summarizer → Critic. Chunk summaries are joined
  in document order, then a single Rewriter call adapts them to --audience.
  Critic verdicts are reported (--json) and logged but never change the text.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium; skips auto-download
  RUST_LOG                Log filter (e.g. edgequake_summarizer=debug)

  Variables may also be placed in a .env file in the working directory.
"#;

/// Summarize long documents for a target audience with a team of LLM agents.
#[derive(Parser, Debug)]
#[command(
    name = "summarize",
    version,
    about = "Summarize long documents for a target audience with a team of LLM agents",
    long_about = "Split a document (pasted text, a local PDF, or a PDF URL) into overlapping \
chunks, run Researcher → Summarizer → Critic agents on each chunk, and rewrite the joined \
summaries for the audience you name. Works with OpenAI, Anthropic, Gemini, Ollama and any \
provider edgequake-llm supports.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF path, HTTP/HTTPS URL to a PDF, or "-" to read text from stdin.
    input: Option<String>,

    /// Text to summarize. Takes priority over INPUT.
    #[arg(long, env = "SUMMARIZE_TEXT")]
    text: Option<String>,

    /// Who the final summary is written for.
    #[arg(short, long, env = "SUMMARIZE_AUDIENCE", default_value = "A High School Student")]
    audience: String,

    /// Write the final summary to this file instead of stdout.
    #[arg(short, long, env = "SUMMARIZE_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini, claude-haiku-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, mistral, ollama, …
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Maximum chunk length in characters.
    #[arg(long, env = "SUMMARIZE_CHUNK_SIZE", default_value_t = 4000)]
    chunk_size: usize,

    /// Characters shared between consecutive chunks.
    #[arg(long, env = "SUMMARIZE_OVERLAP", default_value_t = 200)]
    overlap: usize,

    /// Generation requests allowed per rate interval.
    #[arg(long, env = "SUMMARIZE_RATE", default_value_t = 1)]
    rate: u32,

    /// Rate interval in milliseconds (0 disables pacing).
    #[arg(long, env = "SUMMARIZE_RATE_INTERVAL_MS", default_value_t = 1000)]
    rate_interval_ms: u64,

    /// Chunks processed at once.
    #[arg(short, long, env = "SUMMARIZE_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Temperature for Researcher, Summarizer and Rewriter (0.0–2.0).
    #[arg(long, env = "SUMMARIZE_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Max output tokens per agent call (the Critic keeps its own 500 cap).
    #[arg(long, env = "SUMMARIZE_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Retries per agent call on failure.
    #[arg(long, env = "SUMMARIZE_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "SUMMARIZE_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "SUMMARIZE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Output the full structured report (SummaryOutput) as JSON.
    #[arg(long, env = "SUMMARIZE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SUMMARIZE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SUMMARIZE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SUMMARIZE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose asks for them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Pick the input ───────────────────────────────────────────────────
    let stdin_text = if cli.input.as_deref() == Some("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read text from stdin")?;
        Some(buf)
    } else {
        None
    };
    let text = cli.text.as_deref().or(stdin_text.as_deref());
    let pdf = cli.input.as_deref().filter(|i| *i != "-");
    let document = select_input(text, pdf)
        .context("Nothing to summarize: pass --text, a PDF path/URL, or '-' for stdin")?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn SummaryProgressCallback>)
    } else {
        None
    };
    let config = prepare(&cli, &document, build_config(&cli, progress_cb)?)?;

    // ── Run the pipeline ─────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let output = summarize_to_file(&document, &cli.audience, output_path, &config)
            .await
            .context("Summarization failed")?;
        if cli.json {
            print_json(&output)?;
        }
        if !cli.quiet {
            eprintln!(
                "{}  {} chunks  {}ms  →  {}",
                green("✔"),
                output.stats.chunk_count,
                output.stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
            print_stats(&output);
        }
    } else {
        let output = summarize_document(&document, &cli.audience, &config)
            .await
            .context("Summarization failed")?;

        if cli.json {
            print_json(&output)?;
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(output.summary.as_bytes())
                .context("Failed to write to stdout")?;
            if !output.summary.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }

        if !cli.quiet && !cli.json {
            print_stats(&output);
        }
    }

    Ok(())
}

/// Resolve the provider, then fetch the PDF engine if the input needs it.
///
/// A missing API key is reported before anything is downloaded.
fn prepare(cli: &Cli, document: &DocumentInput, mut config: SummaryConfig) -> Result<SummaryConfig> {
    let generator = resolve_generator(&config)?;
    config.generator = Some(generator);

    if matches!(document, DocumentInput::Pdf(_)) {
        ensure_pdf_engine(cli.quiet)?;
    }
    Ok(config)
}

/// Download pdfium on first use, with a progress bar unless quiet.
fn ensure_pdf_engine(quiet: bool) -> Result<()> {
    if std::env::var_os("PDFIUM_LIB_PATH").is_some() || pdfium_auto::is_pdfium_cached() {
        return Ok(());
    }
    if quiet {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download PDFium engine")?;
        return Ok(());
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&TICKS),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(())
}

fn print_json(output: &SummaryOutput) -> Result<()> {
    let json = serde_json::to_string_pretty(output).context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}

fn print_stats(output: &SummaryOutput) {
    let stats = &output.stats;
    if stats.flagged_chunks > 0 {
        eprintln!(
            "{} Critic flagged {}/{} chunk(s); see --json for feedback",
            yellow("⚠"),
            stats.flagged_chunks,
            stats.chunk_count
        );
    }
    eprintln!(
        "   {} calls  {} tokens in  /  {} tokens out  {}",
        stats.generation_calls,
        dim(&stats.total_input_tokens.to_string()),
        dim(&stats.total_output_tokens.to_string()),
        dim(&format!("{}ms total", stats.total_duration_ms)),
    );
}

/// Map CLI args to `SummaryConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<SummaryConfig> {
    let mut builder = SummaryConfig::builder()
        .max_chunk_size(cli.chunk_size)
        .overlap_size(cli.overlap)
        .requests_per_interval(cli.rate)
        .rate_interval_ms(cli.rate_interval_ms)
        .concurrency(cli.concurrency)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
