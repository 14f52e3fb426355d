//! # pdf-triage
//!
//! Classify PDF documents by structure, extract their text with a strategy
//! suited to that structure, and turn it into Markdown plus a short semantic
//! analysis, either locally with rule-based heuristics or through a
//! rate-limited LLM completion service.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Classify   native / scanned / mixed / form-based / protected
//!  ├─ 2. Validate   options and upload size
//!  ├─ 3. Extract    strategy chosen by document kind (spawn_blocking)
//!  ├─ 4. Choose     local or remote path, once per request
//!  ├─ 5. Render     local heuristics or remote completion (with fallback)
//!  ├─ 6. Analyse    local heuristics or remote completion (with fallback)
//!  └─ 7. Assemble   ProcessingOutcome: Completed | Protected | Failed
//! ```
//!
//! Every remote call from every request goes through one dispatcher: a
//! single lane with a sliding 60-second admission window and retry with
//! backoff. Aggregate traffic to the provider therefore stays under the
//! configured requests-per-minute ceiling however many documents are in
//! flight.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_triage::{DocumentPipeline, ExtractionOptions, ProcessingConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY.
//!     // Without one, every document is processed locally.
//!     let pipeline = DocumentPipeline::new(ProcessingConfig::default())?;
//!     let outcome = pipeline
//!         .process_input("policy.pdf", &ExtractionOptions::default())
//!         .await?;
//!     println!("{}", outcome.markdown());
//!     Ok(())
//! }
//! ```
//!
//! The classifier, local renderer and local analyser are pure functions and
//! can be used on their own:
//!
//! ```rust
//! let c = pdf_triage::classify(b"not a pdf");
//! assert!(c.requires_ocr());
//! let md = pdf_triage::render_markdown("", &c);
//! assert!(md.contains("no extractable text"));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-triage` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod instructions;
pub mod output;
pub mod pipeline;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionOptions, ProcessingConfig, ProcessingConfigBuilder};
pub use convert::{choose_path, DocumentPipeline, LocalReason, PathDecision};
pub use error::{ErrorCode, RemoteError, RemoteErrorKind, TriageError};
pub use instructions::{DocumentInstructions, InstructionStore, MemoryInstructionStore};
pub use output::{
    DocumentMetadata, ProcessingMethod, ProcessingOutcome, ProcessingResult, ProcessingWarning,
    Severity, Stage, WarningKind,
};
pub use pipeline::analyze::{analyze as analyze_text, AnalysisResult, DocumentType, Language};
pub use pipeline::classify::{classify, ClassificationResult, DocumentKind, TextQuality};
pub use pipeline::dispatch::{Dispatcher, RetryPolicy};
pub use pipeline::extract::{ExtractionStrategy, StrategyKind, StrategyRegistry};
pub use pipeline::llm::{CompletionRequest, CompletionService, LlmCompletionService};
pub use pipeline::render::render as render_markdown;
