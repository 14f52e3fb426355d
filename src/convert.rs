//! Pipeline Orchestrator: one document in, one [`ProcessingOutcome`] out.
//!
//! ## Stages
//!
//! ```text
//! Classifying ──▶ (protected? ──▶ Protected outcome)
//!      │
//!      ▼
//! Validating ──▶ Extracting ──▶ SelectingRenderPath ──▶ Rendering ──▶ Analyzing ──▶ Assembling ──▶ Done
//! ```
//!
//! The local/remote decision is made once per request by [`choose_path`] and
//! applies to both rendering and analysis. A failed remote step falls back
//! to the local renderer/analyser when `fallback_to_local` is set; without
//! fallback a failed rendering fails the request while a failed analysis is
//! simply left out.
//!
//! `lopdf` parsing is CPU-bound, so classification and extraction run on the
//! blocking pool via `spawn_blocking`.

use crate::config::{ExtractionOptions, ProcessingConfig};
use crate::error::{ErrorCode, TriageError};
use crate::instructions::InstructionStore;
use crate::output::{
    DocumentMetadata, ProcessingMethod, ProcessingOutcome, ProcessingResult, ProcessingWarning,
    Severity, Stage, WarningKind,
};
use crate::pipeline::analyze;
use crate::pipeline::classify::{self, ClassificationResult, DocumentKind, TextQuality};
use crate::pipeline::dispatch::Dispatcher;
use crate::pipeline::extract::{ExtractionStrategy, StrategyRegistry};
use crate::pipeline::input;
use crate::pipeline::llm::{CompletionService, LlmCompletionService, RemoteEnricher};
use crate::pipeline::pdf::{self, PdfProbe};
use crate::pipeline::render;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Where a request is rendered and analysed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathDecision {
    Local(LocalReason),
    Remote,
}

/// Why a request stayed on the local path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalReason {
    RemoteDisabled,
    RemoteUnavailable,
    RequestOverride,
    LocalDefault,
    ComplexDocument,
    NotSimple,
}

impl fmt::Display for LocalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LocalReason::RemoteDisabled => "remote processing disabled",
            LocalReason::RemoteUnavailable => "no completion service configured",
            LocalReason::RequestOverride => "local processing requested",
            LocalReason::LocalDefault => "local processing is the default",
            LocalReason::ComplexDocument => "complex document",
            LocalReason::NotSimple => "remote restricted to simple documents",
        };
        f.write_str(s)
    }
}

/// Decide between the local and remote paths. The first matching rule wins.
pub fn choose_path(
    config: &ProcessingConfig,
    options: &ExtractionOptions,
    classification: &ClassificationResult,
    text_length: usize,
    remote_available: bool,
) -> PathDecision {
    if !config.ai_enabled {
        return PathDecision::Local(LocalReason::RemoteDisabled);
    }
    if !remote_available {
        return PathDecision::Local(LocalReason::RemoteUnavailable);
    }
    if options.use_local_processing {
        return PathDecision::Local(LocalReason::RequestOverride);
    }
    if config.local_processing_default {
        return PathDecision::Local(LocalReason::LocalDefault);
    }

    let kind = classification.document_kind();
    let quality = classification.text_quality();
    if config.local_for_complex_documents {
        let complex = kind == DocumentKind::Protected
            || (kind == DocumentKind::Scanned && text_length == 0)
            || matches!(quality, TextQuality::Low | TextQuality::None)
            || text_length > config.max_text_length
            || (kind == DocumentKind::Mixed && classification.requires_ocr());
        if complex {
            return PathDecision::Local(LocalReason::ComplexDocument);
        }
    }
    if config.ai_for_simple_only {
        let simple = kind == DocumentKind::Native
            && quality == TextQuality::High
            && text_length < config.max_text_length;
        if !simple {
            return PathDecision::Local(LocalReason::NotSimple);
        }
    }
    PathDecision::Remote
}

/// Classifies, extracts, renders and analyses documents.
///
/// Build one per process and share it: every remote call of every request
/// goes through its single [`Dispatcher`].
pub struct DocumentPipeline {
    config: ProcessingConfig,
    registry: StrategyRegistry,
    remote: Option<RemoteEnricher>,
    instructions: Option<Arc<dyn InstructionStore>>,
}

impl fmt::Debug for DocumentPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentPipeline")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("remote", &self.remote.as_ref().map(|_| "<RemoteEnricher>"))
            .field("instructions", &self.instructions.as_ref().map(|_| "<dyn InstructionStore>"))
            .finish()
    }
}

impl DocumentPipeline {
    /// Build a pipeline, resolving the LLM provider when remote processing
    /// is enabled.
    ///
    /// A provider that cannot be resolved does not fail startup: the remote
    /// path is disabled with a warning and every request is handled locally.
    pub fn new(config: ProcessingConfig) -> Result<Self, TriageError> {
        config.validate()?;
        let service: Option<Arc<dyn CompletionService>> = if config.ai_enabled {
            match resolve_provider(&config) {
                Ok(provider) => Some(Arc::new(LlmCompletionService::new(provider))),
                Err(e) => {
                    warn!("Remote processing unavailable, using local processing only: {}", e);
                    None
                }
            }
        } else {
            None
        };
        Ok(Self::assemble(config, StrategyRegistry::standard(), service))
    }

    /// Build a pipeline around a caller-supplied completion service.
    pub fn with_completion_service(
        config: ProcessingConfig,
        service: Arc<dyn CompletionService>,
    ) -> Result<Self, TriageError> {
        config.validate()?;
        Ok(Self::assemble(config, StrategyRegistry::standard(), Some(service)))
    }

    /// Use `store` for per-document field extraction.
    pub fn with_instruction_store(mut self, store: Arc<dyn InstructionStore>) -> Self {
        self.instructions = Some(store);
        self
    }

    /// Replace the extraction strategies. Fails if any document kind is
    /// left without a strategy.
    pub fn with_strategies(mut self, strategies: Vec<ExtractionStrategy>) -> Result<Self, TriageError> {
        self.registry = StrategyRegistry::new(strategies)?;
        Ok(self)
    }

    fn assemble(
        config: ProcessingConfig,
        registry: StrategyRegistry,
        service: Option<Arc<dyn CompletionService>>,
    ) -> Self {
        let remote = service.map(|service| {
            let dispatcher = Arc::new(Dispatcher::from_config(&config));
            RemoteEnricher::new(
                service,
                dispatcher,
                config.temperature,
                config.max_text_length,
            )
        });
        Self {
            config,
            registry,
            remote,
            instructions: None,
        }
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// True when a completion service is configured and enabled.
    pub fn remote_available(&self) -> bool {
        self.config.ai_enabled && self.remote.is_some()
    }

    /// Process one in-memory document.
    pub async fn process(
        &self,
        bytes: &[u8],
        filename: Option<&str>,
        options: &ExtractionOptions,
    ) -> ProcessingOutcome {
        let span = info_span!(
            "process",
            filename = filename.unwrap_or("<memory>"),
            bytes = bytes.len()
        );
        self.run(bytes, filename, options).instrument(span).await
    }

    /// Load a local path or URL, then [`process`](Self::process) it.
    ///
    /// # Errors
    /// Only input resolution errors; per-document failures are reported in
    /// the outcome.
    pub async fn process_input(
        &self,
        input_str: impl AsRef<str>,
        options: &ExtractionOptions,
    ) -> Result<ProcessingOutcome, TriageError> {
        let loaded = input::load_input(
            input_str.as_ref(),
            self.config.download_timeout_secs,
            self.config.max_upload_size,
        )
        .await?;
        Ok(self
            .process(&loaded.bytes, Some(&loaded.filename), options)
            .await)
    }

    /// Process an input and write the markdown to `output_path`.
    ///
    /// The file is written only for a completed outcome, atomically (temp
    /// file + rename) so readers never see a partial document.
    pub async fn process_to_file(
        &self,
        input_str: impl AsRef<str>,
        output_path: impl AsRef<Path>,
        options: &ExtractionOptions,
    ) -> Result<ProcessingOutcome, TriageError> {
        let outcome = self.process_input(input_str, options).await?;
        if outcome.is_success() {
            write_atomic(output_path.as_ref(), outcome.markdown()).await?;
        }
        Ok(outcome)
    }

    async fn run(
        &self,
        bytes: &[u8],
        filename: Option<&str>,
        options: &ExtractionOptions,
    ) -> ProcessingOutcome {
        let start = Instant::now();
        let data: Arc<[u8]> = Arc::from(bytes);
        info!("Processing document ({} bytes)", data.len());

        // ── Classifying ──────────────────────────────────────────────────
        let classification = {
            let data = Arc::clone(&data);
            tokio::task::spawn_blocking(move || classify::classify(&data))
                .await
                .unwrap_or_else(|e| {
                    warn!("Classification task failed, using safe default: {}", e);
                    ClassificationResult::safe_default()
                })
        };
        debug!("Classified: {}", classification.summary());

        let mut result = ProcessingResult::new(classification.clone());
        result.filename = filename.map(str::to_string);

        if classification.is_protected() {
            info!("Document is protected, skipping extraction");
            if options.extract_metadata {
                result.metadata = Some(read_metadata_blocking(Arc::clone(&data), 0).await);
            }
            result.warn(ProcessingWarning::new(
                WarningKind::DocumentProtected,
                Severity::Error,
                "Document is encrypted or permission-restricted; no text was extracted",
            ));
            result.error = Some(ErrorCode::PdfProtected);
            result.elapsed_ms = start.elapsed().as_millis() as u64;
            return ProcessingOutcome::Protected(result);
        }

        // ── Validating ───────────────────────────────────────────────────
        if let Err(e) = options.validate() {
            return fail(result, e, Stage::Validating, start);
        }
        if data.len() > self.config.max_upload_size {
            let e = TriageError::FileTooLarge {
                size: data.len(),
                max: self.config.max_upload_size,
            };
            return fail(result, e, Stage::Validating, start);
        }

        // ── Extracting ───────────────────────────────────────────────────
        let strategy = match self.registry.select(classification.document_kind()) {
            Ok(s) => s,
            Err(e) => return fail(result, e, Stage::Extracting, start),
        };
        debug!("Extracting with {} strategy", strategy.kind());
        let extracted = {
            let data = Arc::clone(&data);
            tokio::task::spawn_blocking(move || strategy.extract(&data))
                .await
                .unwrap_or_else(|e| {
                    Err(TriageError::ExtractionFailed {
                        strategy: strategy.kind().to_string(),
                        detail: format!("extraction task failed: {e}"),
                    })
                })
        };
        let text = match extracted {
            Ok(text) if strategy.is_placeholder() => {
                debug!("Placeholder extraction: {}", text);
                String::new()
            }
            Ok(text) => text,
            Err(e) => return fail(result, e, Stage::Extracting, start),
        };
        if classification.requires_ocr() {
            result.warn(ProcessingWarning::new(
                WarningKind::OcrRequired,
                Severity::Warning,
                format!(
                    "{} document needs OCR, which is not available; output covers the text layer only",
                    classification.document_kind()
                ),
            ));
        }
        let text_length = text.chars().count();
        if options.extract_metadata {
            result.metadata = Some(read_metadata_blocking(Arc::clone(&data), text_length).await);
        }

        // ── SelectingRenderPath ──────────────────────────────────────────
        let decision = choose_path(
            &self.config,
            options,
            &classification,
            text_length,
            self.remote.is_some(),
        );
        let remote = match decision {
            PathDecision::Local(reason) => {
                debug!("Local path: {}", reason);
                None
            }
            PathDecision::Remote => self.remote.as_ref(),
        };
        let mut fell_back = false;

        // ── Rendering ────────────────────────────────────────────────────
        let markdown = match remote {
            None => render::render(&text, &classification),
            Some(remote) => {
                match remote
                    .render_markdown(
                        &text,
                        &classification,
                        options.instructions.as_deref(),
                        options.max_tokens,
                    )
                    .await
                {
                    Ok(md) => md,
                    Err(e) if self.config.fallback_to_local => {
                        warn!("Remote rendering failed, falling back to local: {}", e);
                        result.warn(ProcessingWarning::remote(WarningKind::RemoteRenderFailed, &e));
                        fell_back = true;
                        render::render(&text, &classification)
                    }
                    Err(e) => {
                        let err = TriageError::RemoteExhausted {
                            attempts: self.config.max_retries,
                            last_error: e,
                        };
                        result.processing_method = ProcessingMethod::Remote;
                        return fail(result, err, Stage::Rendering, start);
                    }
                }
            }
        };
        result.markdown = markdown;

        // ── Analyzing ────────────────────────────────────────────────────
        if options.include_analysis {
            let analysis = match remote {
                None => Some(analyze::analyze(&text, &classification)),
                Some(remote) => match remote.analyze(&text, options.max_tokens).await {
                    Ok(analysis) => Some(analysis),
                    Err(e) if self.config.fallback_to_local => {
                        warn!("Remote analysis failed, falling back to local: {}", e);
                        result.warn(ProcessingWarning::remote(WarningKind::RemoteAnalysisFailed, &e));
                        fell_back = true;
                        Some(analyze::analyze(&text, &classification))
                    }
                    Err(e) => {
                        warn!("Remote analysis failed, omitting analysis: {}", e);
                        result.warn(ProcessingWarning::remote(WarningKind::AnalysisOmitted, &e));
                        None
                    }
                },
            };
            result.analysis = analysis;
        }
        if let Some(remote) = remote {
            self.extract_fields(remote, &text, filename, options, &mut result)
                .await;
        }

        // ── Assembling ───────────────────────────────────────────────────
        result.processing_method = match (remote.is_some(), fell_back) {
            (false, _) => ProcessingMethod::Local,
            (true, false) => ProcessingMethod::Remote,
            (true, true) => ProcessingMethod::RemoteWithLocalFallback,
        };
        result.success = true;
        result.elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            "Processed {} document via {} in {}ms ({} warnings)",
            classification.document_kind(),
            result.processing_method,
            result.elapsed_ms,
            result.warnings.len()
        );
        ProcessingOutcome::Completed(result)
    }

    /// Configured field extraction. Never fails the request.
    async fn extract_fields(
        &self,
        remote: &RemoteEnricher,
        text: &str,
        filename: Option<&str>,
        options: &ExtractionOptions,
        result: &mut ProcessingResult,
    ) {
        let (Some(store), Some(filename)) = (self.instructions.as_ref(), filename) else {
            return;
        };
        let Some(instructions) = store.lookup(filename) else {
            warn!("No extraction instructions configured for '{}'", filename);
            return;
        };
        match remote
            .extract_fields(text, &instructions, options.max_tokens)
            .await
        {
            Ok(value) => {
                result
                    .extracted_fields
                    .get_or_insert_with(serde_json::Map::new)
                    .insert(instructions.field_name.clone(), value);
            }
            Err(e) => {
                warn!("Field extraction for '{}' failed: {}", filename, e);
                result.warn(ProcessingWarning::remote(WarningKind::FieldExtractionFailed, &e));
            }
        }
    }
}

/// Finish a request as failed, keeping everything computed so far.
fn fail(
    mut partial: ProcessingResult,
    error: TriageError,
    stage: Stage,
    start: Instant,
) -> ProcessingOutcome {
    let code = error.code();
    warn!("Processing failed while {}: {}", stage, error);
    partial.success = false;
    partial.error = Some(code);
    partial.elapsed_ms = start.elapsed().as_millis() as u64;
    ProcessingOutcome::Failed {
        code,
        message: error.to_string(),
        stage,
        partial,
    }
}

/// Read the info dictionary and structural facts. Unparseable input yields
/// only the byte size and a raw `/Encrypt` scan.
pub fn read_metadata(bytes: &[u8], text_length: usize) -> DocumentMetadata {
    let mut meta = DocumentMetadata {
        file_size: bytes.len(),
        text_length,
        ..Default::default()
    };
    let Some(probe) = PdfProbe::load(bytes) else {
        meta.is_encrypted = pdf::has_protection_markers(bytes);
        return meta;
    };
    let info = probe.info();
    meta.title = info.title;
    meta.author = info.author;
    meta.subject = info.subject;
    meta.creator = info.creator;
    meta.producer = info.producer;
    meta.creation_date = info.creation_date;
    meta.modification_date = info.modification_date;
    meta.pdf_version = Some(probe.version());
    meta.page_count = probe.page_count();
    meta.is_encrypted = probe.is_encrypted();
    meta
}

async fn read_metadata_blocking(data: Arc<[u8]>, text_length: usize) -> DocumentMetadata {
    let file_size = data.len();
    tokio::task::spawn_blocking(move || read_metadata(&data, text_length))
        .await
        .unwrap_or_else(|e| {
            warn!("Metadata task failed: {}", e);
            DocumentMetadata {
                file_size,
                text_length,
                ..Default::default()
            }
        })
}

async fn write_atomic(path: &Path, contents: &str) -> Result<(), TriageError> {
    let write_err = |e| TriageError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

// ── Provider resolution ──────────────────────────────────────────────────

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Provider name read during auto-detection; the CLI's `--provider` binds it.
pub const PROVIDER_ENV: &str = "EDGEQUAKE_LLM_PROVIDER";
/// Model ID paired with [`PROVIDER_ENV`].
pub const MODEL_ENV: &str = "EDGEQUAKE_MODEL";

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, TriageError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        TriageError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`, `config.model`).
///    The factory reads the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    both set and non-empty.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set, so users with several keys
///    default to it.
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_provider(config: &ProcessingConfig) -> Result<Arc<dyn LLMProvider>, TriageError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var(PROVIDER_ENV),
        std::env::var(MODEL_ENV),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| TriageError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::classify::DocumentFeatures;

    fn classification(chars: usize, pages: usize) -> ClassificationResult {
        ClassificationResult::from_features(DocumentFeatures {
            text_character_count: chars,
            page_count: pages,
            ..Default::default()
        })
    }

    fn decide(config: &ProcessingConfig, options: &ExtractionOptions, c: &ClassificationResult, len: usize) -> PathDecision {
        choose_path(config, options, c, len, true)
    }

    #[test]
    fn disabled_remote_always_wins() {
        let config = ProcessingConfig::builder().ai_enabled(false).build().unwrap();
        let c = classification(5000, 1);
        assert_eq!(
            decide(&config, &ExtractionOptions::default(), &c, 5000),
            PathDecision::Local(LocalReason::RemoteDisabled)
        );
    }

    #[test]
    fn missing_service_stays_local() {
        let config = ProcessingConfig::default();
        let c = classification(5000, 1);
        assert_eq!(
            choose_path(&config, &ExtractionOptions::default(), &c, 5000, false),
            PathDecision::Local(LocalReason::RemoteUnavailable)
        );
    }

    #[test]
    fn request_override_precedes_local_default() {
        let config = ProcessingConfig::builder()
            .local_processing_default(true)
            .build()
            .unwrap();
        let c = classification(5000, 1);
        let opts = ExtractionOptions::default().local_only(true);
        assert_eq!(
            decide(&config, &opts, &c, 5000),
            PathDecision::Local(LocalReason::RequestOverride)
        );
        assert_eq!(
            decide(&config, &ExtractionOptions::default(), &c, 5000),
            PathDecision::Local(LocalReason::LocalDefault)
        );
    }

    #[test]
    fn complex_documents_stay_local() {
        let config = ProcessingConfig::builder().max_text_length(1000).build().unwrap();
        let opts = ExtractionOptions::default();
        // scanned, no text
        assert_eq!(
            decide(&config, &opts, &classification(0, 2), 0),
            PathDecision::Local(LocalReason::ComplexDocument)
        );
        // mixed, low quality
        assert_eq!(
            decide(&config, &opts, &classification(50, 1), 50),
            PathDecision::Local(LocalReason::ComplexDocument)
        );
        // too long
        assert_eq!(
            decide(&config, &opts, &classification(2000, 1), 2000),
            PathDecision::Local(LocalReason::ComplexDocument)
        );
        // medium quality, short enough
        assert_eq!(decide(&config, &opts, &classification(300, 1), 300), PathDecision::Remote);
    }

    #[test]
    fn complex_rule_can_be_disabled() {
        let config = ProcessingConfig::builder()
            .local_for_complex_documents(false)
            .build()
            .unwrap();
        assert_eq!(
            decide(&config, &ExtractionOptions::default(), &classification(0, 2), 0),
            PathDecision::Remote
        );
    }

    #[test]
    fn simple_only_requires_native_high_quality_short_text() {
        let config = ProcessingConfig::builder()
            .ai_for_simple_only(true)
            .local_for_complex_documents(false)
            .max_text_length(10_000)
            .build()
            .unwrap();
        let opts = ExtractionOptions::default();
        assert_eq!(decide(&config, &opts, &classification(3000, 1), 3000), PathDecision::Remote);
        assert_eq!(
            decide(&config, &opts, &classification(300, 1), 300),
            PathDecision::Local(LocalReason::NotSimple)
        );
        assert_eq!(
            decide(&config, &opts, &classification(20_000, 1), 20_000),
            PathDecision::Local(LocalReason::NotSimple)
        );
    }

    #[test]
    fn metadata_of_garbage_has_only_size() {
        let meta = read_metadata(b"not a pdf", 0);
        assert_eq!(meta.file_size, 9);
        assert_eq!(meta.page_count, 0);
        assert!(meta.title.is_none());
        assert!(meta.pdf_version.is_none());
    }

    #[test]
    fn metadata_reads_info_dictionary() {
        let bytes = crate::pipeline::pdf::fixtures::text_pdf(&["Hello"]);
        let meta = read_metadata(&bytes, 5);
        assert_eq!(meta.title.as_deref(), Some("Fixture Document"));
        assert_eq!(meta.page_count, 1);
        assert_eq!(meta.pdf_version.as_deref(), Some("1.5"));
        assert_eq!(meta.text_length, 5);
        assert!(!meta.is_encrypted);
    }

    #[test]
    fn disabled_remote_needs_no_provider() {
        let config = ProcessingConfig::builder().ai_enabled(false).build().unwrap();
        let pipeline = DocumentPipeline::new(config).unwrap();
        assert!(!pipeline.remote_available());
    }

    #[tokio::test]
    async fn atomic_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.md");
        write_atomic(&path, "# Hi\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Hi\n");
        assert!(!path.with_extension("md.tmp").exists());
    }
}
