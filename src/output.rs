//! Result types returned by the pipeline.
//!
//! A request always ends in a [`ProcessingOutcome`]. All three variants carry
//! a [`ProcessingResult`], so classification and warnings computed before a
//! failure are never lost. Everything here derives `Serialize`; the CLI's
//! `--json` mode prints the outcome as-is.

use crate::error::{ErrorCode, RemoteError, RemoteErrorKind};
use crate::pipeline::analyze::AnalysisResult;
use crate::pipeline::classify::ClassificationResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which path produced the markdown and analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingMethod {
    Local,
    Remote,
    /// The remote path was chosen but at least one step fell back to local.
    RemoteWithLocalFallback,
}

impl ProcessingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMethod::Local => "local",
            ProcessingMethod::Remote => "remote",
            ProcessingMethod::RemoteWithLocalFallback => "remote-with-local-fallback",
        }
    }
}

impl fmt::Display for ProcessingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    DocumentProtected,
    OcrRequired,
    RemoteRenderFailed,
    RemoteAnalysisFailed,
    AnalysisOmitted,
    FieldExtractionFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A non-fatal problem recorded while processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingWarning {
    pub kind: WarningKind,
    pub message: String,
    pub severity: Severity,
    /// Set when the warning records a failed remote call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<RemoteErrorKind>,
}

impl ProcessingWarning {
    pub fn new(kind: WarningKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            severity,
            remote_error: None,
        }
    }

    /// Warning for a remote call that failed after all retries.
    pub fn remote(kind: WarningKind, error: &RemoteError) -> Self {
        Self {
            kind,
            message: error.to_string(),
            severity: Severity::Warning,
            remote_error: Some(error.kind()),
        }
    }
}

/// Values read from the PDF structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub pdf_version: Option<String>,
    pub page_count: usize,
    pub is_encrypted: bool,
    /// Size of the input in bytes.
    pub file_size: usize,
    /// Characters of extracted text.
    pub text_length: usize,
}

/// Orchestrator state. A failed request reports the stage it stopped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classifying,
    Validating,
    Extracting,
    SelectingRenderPath,
    Rendering,
    Analyzing,
    Assembling,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Classifying => "classifying",
            Stage::Validating => "validating",
            Stage::Extracting => "extracting",
            Stage::SelectingRenderPath => "selecting render path",
            Stage::Rendering => "rendering",
            Stage::Analyzing => "analyzing",
            Stage::Assembling => "assembling",
            Stage::Done => "done",
        };
        f.write_str(s)
    }
}

/// Everything known about one processed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub markdown: String,
    pub classification: ClassificationResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DocumentMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
    pub warnings: Vec<ProcessingWarning>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
    pub processing_method: ProcessingMethod,
    pub elapsed_ms: u64,
    /// Configured field extraction answers keyed by field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_fields: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ProcessingResult {
    /// An empty, not-yet-successful result for `classification`.
    pub fn new(classification: ClassificationResult) -> Self {
        Self {
            filename: None,
            markdown: String::new(),
            classification,
            metadata: None,
            analysis: None,
            warnings: Vec::new(),
            success: false,
            error: None,
            processing_method: ProcessingMethod::Local,
            elapsed_ms: 0,
            extracted_fields: None,
        }
    }

    pub fn warn(&mut self, warning: ProcessingWarning) {
        self.warnings.push(warning);
    }
}

/// How a request ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessingOutcome {
    Completed(ProcessingResult),
    /// Terminal result for an encrypted document: no text was extracted.
    Protected(ProcessingResult),
    Failed {
        code: ErrorCode,
        message: String,
        stage: Stage,
        partial: ProcessingResult,
    },
}

impl ProcessingOutcome {
    pub fn result(&self) -> &ProcessingResult {
        match self {
            ProcessingOutcome::Completed(r) | ProcessingOutcome::Protected(r) => r,
            ProcessingOutcome::Failed { partial, .. } => partial,
        }
    }

    pub fn into_result(self) -> ProcessingResult {
        match self {
            ProcessingOutcome::Completed(r) | ProcessingOutcome::Protected(r) => r,
            ProcessingOutcome::Failed { partial, .. } => partial,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProcessingOutcome::Completed(_))
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            ProcessingOutcome::Completed(_) => None,
            ProcessingOutcome::Protected(_) => Some(ErrorCode::PdfProtected),
            ProcessingOutcome::Failed { code, .. } => Some(*code),
        }
    }

    pub fn markdown(&self) -> &str {
        &self.result().markdown
    }
}
