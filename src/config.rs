//! Configuration types for document processing.
//!
//! Two structs split the knobs by lifetime:
//!
//! * [`ProcessingConfig`] — read once at startup and shared by every request.
//!   It holds the feature flags that decide between the local and remote
//!   paths, the dispatcher's rate/retry limits and the provider selection.
//!   Built via [`ProcessingConfigBuilder`] and never mutated afterwards.
//!
//! * [`ExtractionOptions`] — supplied by the caller with each document.

use crate::error::TriageError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Lower bound accepted for [`ExtractionOptions::max_tokens`].
pub const MIN_MAX_TOKENS: usize = 100;
/// Upper bound accepted for [`ExtractionOptions::max_tokens`].
pub const MAX_MAX_TOKENS: usize = 8000;

/// Startup configuration for a [`crate::DocumentPipeline`].
///
/// # Example
/// ```rust
/// use pdf_triage::ProcessingConfig;
///
/// let config = ProcessingConfig::builder()
///     .rate_limit_rpm(20)
///     .max_retries(5)
///     .fallback_to_local(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.rate_limit_rpm, 20);
/// ```
#[derive(Clone)]
pub struct ProcessingConfig {
    /// Master switch for the remote path. Default: true.
    pub ai_enabled: bool,

    /// Render/analyse locally when the remote call fails. Default: true.
    ///
    /// When disabled a failed remote rendering fails the whole request and a
    /// failed remote analysis is dropped from the result.
    pub fallback_to_local: bool,

    /// Texts longer than this many characters count as complex. Default: 50 000.
    ///
    /// The same bound truncates the text embedded in remote prompts.
    pub max_text_length: usize,

    /// Only native, high-quality, short documents go remote. Default: false.
    pub ai_for_simple_only: bool,

    /// Every request takes the local path. Default: false.
    pub local_processing_default: bool,

    /// Protected, scanned, low-quality, oversized and OCR-dependent documents
    /// stay local. Default: true.
    pub local_for_complex_documents: bool,

    /// Ceiling on remote calls admitted in any rolling 60-second window. Default: 50.
    pub rate_limit_rpm: u32,

    /// Attempts per remote call, including the first. Default: 3.
    pub max_retries: u32,

    /// Base retry delay in milliseconds. Default: 1000.
    ///
    /// Generic failures wait exactly this long; rate-limit failures wait
    /// `retry_delay_ms * 2^attempt`.
    pub retry_delay_ms: u64,

    /// Largest accepted document in bytes. Default: 10 MiB.
    pub max_upload_size: usize,

    /// Sampling temperature for remote completions. Default: 0.1.
    pub temperature: f32,

    /// LLM model identifier. If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            ai_enabled: true,
            fallback_to_local: true,
            max_text_length: 50_000,
            ai_for_simple_only: false,
            local_processing_default: false,
            local_for_complex_documents: true,
            rate_limit_rpm: 50,
            max_retries: 3,
            retry_delay_ms: 1000,
            max_upload_size: 10 * 1024 * 1024,
            temperature: 0.1,
            model: None,
            provider_name: None,
            provider: None,
            download_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for ProcessingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingConfig")
            .field("ai_enabled", &self.ai_enabled)
            .field("fallback_to_local", &self.fallback_to_local)
            .field("max_text_length", &self.max_text_length)
            .field("ai_for_simple_only", &self.ai_for_simple_only)
            .field("local_processing_default", &self.local_processing_default)
            .field("local_for_complex_documents", &self.local_for_complex_documents)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("max_upload_size", &self.max_upload_size)
            .field("temperature", &self.temperature)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .finish()
    }
}

impl ProcessingConfig {
    /// Create a new builder for `ProcessingConfig`.
    pub fn builder() -> ProcessingConfigBuilder {
        ProcessingConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check the constraints [`ProcessingConfigBuilder::build`] enforces.
    /// Pipelines run it too, since every field is public.
    pub fn validate(&self) -> Result<(), TriageError> {
        if self.rate_limit_rpm == 0 {
            return Err(TriageError::InvalidConfig(
                "Rate limit must be ≥ 1 request per minute".into(),
            ));
        }
        if self.max_retries == 0 {
            return Err(TriageError::InvalidConfig(
                "Max retries must be ≥ 1 (it counts the first attempt)".into(),
            ));
        }
        if self.max_text_length == 0 {
            return Err(TriageError::InvalidConfig(
                "Max text length must be ≥ 1".into(),
            ));
        }
        if self.max_upload_size == 0 {
            return Err(TriageError::InvalidConfig(
                "Max upload size must be ≥ 1 byte".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ProcessingConfig`].
#[derive(Debug)]
pub struct ProcessingConfigBuilder {
    config: ProcessingConfig,
}

impl ProcessingConfigBuilder {
    pub fn ai_enabled(mut self, v: bool) -> Self {
        self.config.ai_enabled = v;
        self
    }

    pub fn fallback_to_local(mut self, v: bool) -> Self {
        self.config.fallback_to_local = v;
        self
    }

    pub fn max_text_length(mut self, n: usize) -> Self {
        self.config.max_text_length = n;
        self
    }

    pub fn ai_for_simple_only(mut self, v: bool) -> Self {
        self.config.ai_for_simple_only = v;
        self
    }

    pub fn local_processing_default(mut self, v: bool) -> Self {
        self.config.local_processing_default = v;
        self
    }

    pub fn local_for_complex_documents(mut self, v: bool) -> Self {
        self.config.local_for_complex_documents = v;
        self
    }

    pub fn rate_limit_rpm(mut self, rpm: u32) -> Self {
        self.config.rate_limit_rpm = rpm;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn max_upload_size(mut self, bytes: usize) -> Self {
        self.config.max_upload_size = bytes;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessingConfig, TriageError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Per-request options supplied alongside each document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionOptions {
    /// Extra guidance appended to the remote markdown prompt.
    pub instructions: Option<String>,
    /// Produce an [`crate::pipeline::analyze::AnalysisResult`]. Default: true.
    pub include_analysis: bool,
    /// Read the PDF info dictionary into the result. Default: true.
    pub extract_metadata: bool,
    /// Token budget for each remote completion, 100–8000. Default: 4000.
    pub max_tokens: usize,
    /// Force the local path for this request. Default: false.
    pub use_local_processing: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            instructions: None,
            include_analysis: true,
            extract_metadata: true,
            max_tokens: 4000,
            use_local_processing: false,
        }
    }
}

impl ExtractionOptions {
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_analysis(mut self, v: bool) -> Self {
        self.include_analysis = v;
        self
    }

    pub fn with_metadata(mut self, v: bool) -> Self {
        self.extract_metadata = v;
        self
    }

    pub fn with_max_tokens(mut self, n: usize) -> Self {
        self.max_tokens = n;
        self
    }

    pub fn local_only(mut self, v: bool) -> Self {
        self.use_local_processing = v;
        self
    }

    /// Reject options outside their documented ranges.
    pub fn validate(&self) -> Result<(), TriageError> {
        if !(MIN_MAX_TOKENS..=MAX_MAX_TOKENS).contains(&self.max_tokens) {
            return Err(TriageError::InvalidOptions(format!(
                "max_tokens must be {MIN_MAX_TOKENS}–{MAX_MAX_TOKENS}, got {}",
                self.max_tokens
            )));
        }
        Ok(())
    }
}
