//! Error types for the pdf-triage library.
//!
//! Three distinct types reflect three distinct failure modes:
//!
//! * [`TriageError`] — **Fatal**: the request cannot even start (bad input
//!   path, oversized upload, invalid configuration, missing extraction
//!   strategy at startup). Returned as `Err(TriageError)` from entry points.
//!
//! * [`RemoteError`] — **Retryable**: one attempt against the completion
//!   service failed. The dispatcher retries it; the orchestrator decides
//!   whether an exhausted call falls back to local processing.
//!
//! * [`ErrorCode`] — the stable, serialisable code attached to a failed or
//!   protected [`crate::output::ProcessingOutcome`]. Callers match on it
//!   instead of on message text.

use edgequake_llm::LlmError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-triage library.
///
/// Per-document failures that happen after classification are reported
/// through [`crate::output::ProcessingOutcome::Failed`] instead, so the
/// caller keeps the partial result.
#[derive(Debug, Error)]
pub enum TriageError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The document is larger than the configured upload limit.
    #[error("Document is {size} bytes, above the {max} byte upload limit")]
    FileTooLarge { size: usize, max: usize },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Per-request extraction options are out of range.
    #[error("Invalid extraction options: {0}")]
    InvalidOptions(String),

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// No registered extraction strategy handles a document kind.
    #[error("No extraction strategy registered for {kind} documents")]
    StrategyNotRegistered { kind: String },

    // ── Processing errors ─────────────────────────────────────────────────
    /// The text layer could not be read with the selected strategy.
    #[error("Text extraction with the {strategy} strategy failed: {detail}")]
    ExtractionFailed { strategy: String, detail: String },

    /// The document is encrypted or permission-restricted.
    #[error("PDF is password protected or restricted; text extraction was not attempted")]
    ProtectedDocument,

    /// The completion service kept failing until retries ran out.
    #[error("Remote processing failed after {attempts} attempts: {last_error}")]
    RemoteExhausted {
        attempts: u32,
        #[source]
        last_error: RemoteError,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TriageError {
    /// The stable code reported when this error ends a request.
    pub fn code(&self) -> ErrorCode {
        match self {
            TriageError::ProtectedDocument => ErrorCode::PdfProtected,
            TriageError::InvalidOptions(_) => ErrorCode::InvalidOptions,
            TriageError::FileTooLarge { .. } => ErrorCode::FileTooLarge,
            TriageError::ExtractionFailed { .. } => ErrorCode::ExtractionFailed,
            TriageError::RemoteExhausted { .. } | TriageError::ProviderNotConfigured { .. } => {
                ErrorCode::AiProcessingFailed
            }
            _ => ErrorCode::ProcessingFailed,
        }
    }
}

/// A single failed attempt against the remote completion service.
///
/// Rate limiting is kept apart from every other failure because the
/// dispatcher backs off exponentially only for throttling.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// HTTP 429 or an equivalent throttling signal.
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Network failure, 5xx, timeout, or any other transient error.
    #[error("Remote service error: {0}")]
    Transient(String),

    /// The service answered with no content at all.
    #[error("Remote service returned empty content")]
    EmptyContent,

    /// The service answered, but not in the requested shape.
    #[error("Remote service returned malformed content: {0}")]
    Malformed(String),
}

impl RemoteError {
    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            RemoteError::RateLimited(_) => RemoteErrorKind::RateLimited,
            RemoteError::Transient(_) => RemoteErrorKind::Transient,
            RemoteError::EmptyContent => RemoteErrorKind::EmptyContent,
            RemoteError::Malformed(_) => RemoteErrorKind::Malformed,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, RemoteError::RateLimited(_))
    }
}

/// Only the provider's own throttling variant earns the exponential
/// backoff; every other provider failure waits the flat retry delay.
impl From<LlmError> for RemoteError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::RateLimited(message) => RemoteError::RateLimited(message),
            other => RemoteError::Transient(other.to_string()),
        }
    }
}

/// Serialisable tag for a [`RemoteError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    RateLimited,
    Transient,
    EmptyContent,
    Malformed,
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemoteErrorKind::RateLimited => "rate_limited",
            RemoteErrorKind::Transient => "transient",
            RemoteErrorKind::EmptyContent => "empty_content",
            RemoteErrorKind::Malformed => "malformed",
        };
        f.write_str(s)
    }
}

/// Stable error codes surfaced to callers of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    PdfProtected,
    InvalidOptions,
    FileTooLarge,
    ExtractionFailed,
    AiProcessingFailed,
    ProcessingFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::PdfProtected => "PDF_PROTECTED",
            ErrorCode::InvalidOptions => "INVALID_OPTIONS",
            ErrorCode::FileTooLarge => "FILE_TOO_LARGE",
            ErrorCode::ExtractionFailed => "EXTRACTION_FAILED",
            ErrorCode::AiProcessingFailed => "AI_PROCESSING_FAILED",
            ErrorCode::ProcessingFailed => "PROCESSING_FAILED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
