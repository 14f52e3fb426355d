//! CLI binary for pdf-triage.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ProcessingConfig` / `ExtractionOptions` and prints results.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_triage::pipeline::input::load_input;
use pdf_triage::{
    classify, DocumentPipeline, ExtractionOptions, MemoryInstructionStore, ProcessingConfig,
    ProcessingOutcome,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one document (stdout)
  pdf-triage policy.pdf

  # Convert to file
  pdf-triage policy.pdf -o policy.md

  # Classify only, no text extraction or rendering
  pdf-triage --classify-only scan.pdf

  # Several documents, 8 at a time, full JSON outcomes
  pdf-triage --concurrency 8 --json a.pdf b.pdf c.pdf > outcomes.json

  # Force the local heuristics (no API key needed)
  pdf-triage --local contract.pdf

  # Per-file field extraction instructions
  pdf-triage --instructions fields.json invoice-2024.pdf

INSTRUCTIONS FILE:
  A JSON object keyed by input file name:
    {
      "invoice-2024.pdf": {
        "prompt": "Extract the invoice total and due date",
        "example": "{\"total\": \"$1,200.00\", \"due\": \"2024-03-01\"}",
        "field_name": "invoice"
      }
    }

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY               OpenAI API key
  ANTHROPIC_API_KEY            Anthropic API key
  GEMINI_API_KEY               Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER       Provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL              Model ID
  AI_ENABLED                   Master switch for the remote path
  AI_FALLBACK_TO_LOCAL         Fall back to local rendering on remote failure
  AI_MAX_TEXT_LENGTH           Complexity threshold / prompt truncation (chars)
  AI_FOR_SIMPLE_ONLY           Only native, high-quality, short documents go remote
  LOCAL_PROCESSING_DEFAULT     Process everything locally
  LOCAL_FOR_COMPLEX_DOCUMENTS  Keep complex documents local
  AI_RATE_LIMIT_RPM            Remote calls per rolling minute
  AI_MAX_RETRIES               Attempts per remote call
  AI_RETRY_DELAY_MS            Base retry delay
  MAX_UPLOAD_SIZE              Largest accepted document (bytes)

EXIT STATUS:
  0 when every input completed, 1 when any input failed or was protected.
"#;

/// Classify PDF documents and convert them to Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-triage",
    version,
    about = "Classify PDF documents and convert them to Markdown, locally or with an LLM",
    long_about = "Classify PDF documents (local files or URLs) by structure, extract their text \
with a strategy suited to that structure, and convert it to Markdown with a short analysis. \
Remote processing goes through a single rate-limited, retrying dispatcher and falls back to \
local heuristics when the provider fails.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Write Markdown to this file instead of stdout (single input only).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of documents processed at once.
    #[arg(short, long, env = "PDF_TRIAGE_CONCURRENCY", default_value_t = 4,
          value_parser = clap::value_parser!(u32).range(1..=64))]
    concurrency: u32,

    /// Print the classification only.
    #[arg(long)]
    classify_only: bool,

    /// JSON file of per-document field extraction instructions.
    #[arg(long, value_name = "FILE.json")]
    instructions: Option<PathBuf>,

    /// Extra guidance appended to the remote markdown prompt.
    #[arg(long, value_name = "TEXT")]
    prompt: Option<String>,

    /// Token budget for each remote completion (100–8000).
    #[arg(long, env = "PDF_TRIAGE_MAX_TOKENS", default_value_t = 4000)]
    max_tokens: usize,

    /// Skip the content analysis.
    #[arg(long)]
    no_analysis: bool,

    /// Skip the PDF metadata block.
    #[arg(long)]
    no_metadata: bool,

    /// Force the local path for every input.
    #[arg(long)]
    local: bool,

    /// Master switch for remote processing.
    #[arg(long, env = "AI_ENABLED", default_value_t = true, action = ArgAction::Set)]
    ai_enabled: bool,

    /// Fall back to local rendering when the remote call fails.
    #[arg(long, env = "AI_FALLBACK_TO_LOCAL", default_value_t = true, action = ArgAction::Set)]
    fallback_to_local: bool,

    /// Texts longer than this count as complex; also truncates prompts.
    #[arg(long, env = "AI_MAX_TEXT_LENGTH", default_value_t = 50_000)]
    max_text_length: usize,

    /// Only native, high-quality, short documents go remote.
    #[arg(long, env = "AI_FOR_SIMPLE_ONLY", default_value_t = false, action = ArgAction::Set)]
    ai_for_simple_only: bool,

    /// Take the local path by default.
    #[arg(long, env = "LOCAL_PROCESSING_DEFAULT", default_value_t = false, action = ArgAction::Set)]
    local_processing_default: bool,

    /// Keep protected, scanned, low-quality and oversized documents local.
    #[arg(long, env = "LOCAL_FOR_COMPLEX_DOCUMENTS", default_value_t = true, action = ArgAction::Set)]
    local_for_complex_documents: bool,

    /// Remote calls admitted in any rolling 60-second window.
    #[arg(long, env = "AI_RATE_LIMIT_RPM", default_value_t = 50)]
    rate_limit_rpm: u32,

    /// Attempts per remote call, including the first.
    #[arg(long, env = "AI_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Base retry delay in milliseconds.
    #[arg(long, env = "AI_RETRY_DELAY_MS", default_value_t = 1000)]
    retry_delay_ms: u64,

    /// Largest accepted document in bytes.
    #[arg(long, env = "MAX_UPLOAD_SIZE", default_value_t = 10 * 1024 * 1024)]
    max_upload_size: usize,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_LLM_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, default_value_t = 0.1)]
    temperature: f32,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF_TRIAGE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Output the serialised outcome as JSON instead of Markdown.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "PDF_TRIAGE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF_TRIAGE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF_TRIAGE_QUIET")]
    quiet: bool,
}

/// What happened to one input.
enum Report {
    Outcome(ProcessingOutcome),
    /// The input never reached the pipeline (missing file, failed download).
    InputError(String),
}

impl Report {
    fn is_success(&self) -> bool {
        matches!(self, Report::Outcome(o) if o.is_success())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO-level library logs would interleave with the spinner, so they are
    // suppressed while it is active.
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

    if cli.output.is_some() && cli.inputs.len() > 1 {
        anyhow::bail!("--output accepts a single input, got {}", cli.inputs.len());
    }

    let config = build_config(&cli)?;

    if cli.classify_only {
        return classify_inputs(&cli, &config).await;
    }

    let mut pipeline = DocumentPipeline::new(config).context("Failed to start pipeline")?;
    if let Some(ref path) = cli.instructions {
        let store = MemoryInstructionStore::from_file(path)
            .with_context(|| format!("Failed to load instructions from {}", path.display()))?;
        pipeline = pipeline.with_instruction_store(Arc::new(store));
    }
    if !cli.quiet && cli.ai_enabled && !cli.local && !pipeline.remote_available() {
        eprintln!("{} {}", yellow("⚠"), dim("No LLM provider available; processing locally"));
    }

    let options = build_options(&cli);
    options.validate().context("Invalid options")?;

    let bar = if show_progress {
        Some(spinner(cli.inputs.len()))
    } else {
        None
    };

    // ── Run ──────────────────────────────────────────────────────────────
    // One pipeline for every input: its dispatcher bounds the aggregate
    // remote rate however many documents are in flight.
    let started = Instant::now();
    let pipeline = &pipeline;
    let options = &options;
    let bar_ref = bar.as_ref();
    let output = cli.output.as_ref();
    let mut reports: Vec<(usize, String, Report)> = stream::iter(cli.inputs.iter().enumerate())
        .map(|(idx, input)| async move {
            let report = match output {
                Some(path) => pipeline.process_to_file(input, path, options).await,
                None => pipeline.process_input(input, options).await,
            }
            .map_or_else(|e| Report::InputError(e.to_string()), Report::Outcome);
            if let Some(bar) = bar_ref {
                bar.println(report_line(input, &report));
                bar.inc(1);
            }
            (idx, input.clone(), report)
        })
        .buffer_unordered(cli.concurrency as usize)
        .collect()
        .await;
    reports.sort_by_key(|(idx, _, _)| *idx);

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    // ── Print ────────────────────────────────────────────────────────────
    if cli.json {
        print_json(&reports)?;
    } else if cli.output.is_none() {
        print_markdown(&reports)?;
    }

    let failed: Vec<&(usize, String, Report)> =
        reports.iter().filter(|(_, _, r)| !r.is_success()).collect();

    if !cli.quiet {
        if !show_progress && !cli.json {
            for (_, input, report) in &failed {
                eprintln!("{}", report_line(input, report));
            }
        }
        let ok = reports.len() - failed.len();
        let mark = if failed.is_empty() { green("✔") } else { red("✘") };
        eprintln!(
            "{} {}/{} documents processed  {}",
            mark,
            bold(&ok.to_string()),
            reports.len(),
            dim(&format!("{}ms", started.elapsed().as_millis())),
        );
        if let (Some(path), true) = (&cli.output, failed.is_empty()) {
            eprintln!("   →  {}", bold(&path.display().to_string()));
        }
    }

    if !failed.is_empty() {
        anyhow::bail!("{} of {} inputs failed", failed.len(), reports.len());
    }
    Ok(())
}

/// Map CLI args to `ProcessingConfig`.
fn build_config(cli: &Cli) -> Result<ProcessingConfig> {
    let mut builder = ProcessingConfig::builder()
        .ai_enabled(cli.ai_enabled && !cli.local)
        .fallback_to_local(cli.fallback_to_local)
        .max_text_length(cli.max_text_length)
        .ai_for_simple_only(cli.ai_for_simple_only)
        .local_processing_default(cli.local_processing_default)
        .local_for_complex_documents(cli.local_for_complex_documents)
        .rate_limit_rpm(cli.rate_limit_rpm)
        .max_retries(cli.max_retries)
        .retry_delay_ms(cli.retry_delay_ms)
        .max_upload_size(cli.max_upload_size)
        .temperature(cli.temperature)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }

    builder.build().context("Invalid configuration")
}

/// Map CLI args to per-request `ExtractionOptions`.
fn build_options(cli: &Cli) -> ExtractionOptions {
    let mut options = ExtractionOptions::default()
        .with_analysis(!cli.no_analysis)
        .with_metadata(!cli.no_metadata)
        .with_max_tokens(cli.max_tokens)
        .local_only(cli.local);
    if let Some(ref prompt) = cli.prompt {
        options = options.with_instructions(prompt.clone());
    }
    options
}

fn spinner(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  {pos:>3}/{len} documents  ⏱ {elapsed_precise}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_spinner())
    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
    bar.set_style(style);
    bar.set_prefix("Processing");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// One status line per input, printed above the spinner.
fn report_line(input: &str, report: &Report) -> String {
    match report {
        Report::Outcome(ProcessingOutcome::Completed(r)) => format!(
            "  {} {}  {}  {}  {}",
            green("✓"),
            input,
            dim(r.classification.document_kind().as_str()),
            dim(r.processing_method.as_str()),
            dim(&format!("{:.1}s", r.elapsed_ms as f64 / 1000.0)),
        ),
        Report::Outcome(ProcessingOutcome::Protected(_)) => {
            format!("  {} {}  {}", yellow("🔒"), input, red("PDF_PROTECTED"))
        }
        Report::Outcome(ProcessingOutcome::Failed {
            code,
            message,
            stage,
            ..
        }) => format!(
            "  {} {}  {} while {}: {}",
            red("✗"),
            input,
            red(code.as_str()),
            stage,
            truncate(message, 80)
        ),
        Report::InputError(e) => format!("  {} {}  {}", red("✗"), input, red(&truncate(e, 80))),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

fn print_markdown(reports: &[(usize, String, Report)]) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let many = reports.len() > 1;
    for (_, input, report) in reports {
        let Report::Outcome(outcome) = report else {
            continue;
        };
        let markdown = outcome.markdown();
        if markdown.is_empty() {
            continue;
        }
        if many {
            writeln!(handle, "<!-- {input} -->").context("Failed to write to stdout")?;
        }
        handle
            .write_all(markdown.as_bytes())
            .context("Failed to write to stdout")?;
        if !markdown.ends_with('\n') {
            handle
                .write_all(b"\n")
                .context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

fn print_json(reports: &[(usize, String, Report)]) -> Result<()> {
    let values: Vec<serde_json::Value> = reports
        .iter()
        .map(|(_, input, report)| -> Result<serde_json::Value, serde_json::Error> {
            match report {
                Report::Outcome(outcome) => {
                    let mut value = serde_json::to_value(outcome)?;
                    if let Some(obj) = value.as_object_mut() {
                        obj.insert("input".into(), serde_json::Value::String(input.clone()));
                    }
                    Ok(value)
                }
                Report::InputError(e) => Ok(serde_json::json!({
                    "status": "input_error",
                    "input": input,
                    "message": e,
                })),
            }
        })
        .collect::<Result<_, serde_json::Error>>()
        .context("Failed to serialise output")?;

    let json = if values.len() == 1 {
        serde_json::to_string_pretty(&values[0])
    } else {
        serde_json::to_string_pretty(&values)
    }
    .context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}

/// `--classify-only`: load each input and print its classification.
async fn classify_inputs(cli: &Cli, config: &ProcessingConfig) -> Result<()> {
    let mut failures = 0usize;
    let mut results = Vec::new();
    for input in &cli.inputs {
        let loaded = match load_input(input, config.download_timeout_secs, config.max_upload_size)
            .await
        {
            Ok(loaded) => loaded,
            Err(e) => {
                failures += 1;
                eprintln!("  {} {}  {}", red("✗"), input, red(&e.to_string()));
                continue;
            }
        };
        let classification = tokio::task::spawn_blocking(move || classify(&loaded.bytes))
            .await
            .context("Classification task failed")?;
        if classification.is_protected() {
            failures += 1;
        }

        if cli.json {
            results.push(serde_json::json!({
                "input": input,
                "classification": classification,
            }));
        } else {
            println!("File:             {}", input);
            println!("Kind:             {}", classification.document_kind());
            println!("Pages:            {}", classification.page_count());
            println!("Characters:       {}", classification.text_character_count());
            println!("Text quality:     {}", classification.text_quality().as_str());
            println!("Form fields:      {}", classification.has_form_fields());
            println!("Requires OCR:     {}", classification.requires_ocr());
            println!("Extraction:       {}", classification.extraction_method());
            println!();
        }
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&results).context("Failed to serialise classification")?
        );
    }
    if failures > 0 {
        anyhow::bail!("{} of {} inputs could not be classified or are protected", failures, cli.inputs.len());
    }
    Ok(())
}
