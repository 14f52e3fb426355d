//! Document classification: decide what kind of PDF we were handed.
//!
//! The classifier is total. Every byte buffer (empty, truncated, not a PDF
//! at all) produces exactly one [`DocumentKind`]. Inputs that cannot be
//! parsed get the safe default (scanned, OCR required, zero counts) so the
//! pipeline always has a usable answer.
//!
//! ## Priority order
//!
//! ```text
//! /Encrypt in trailer ──► Protected
//! form fields          ──► FormBased
//! no text at all       ──► Scanned   (requires OCR)
//! < 100 chars/page     ──► Mixed     (requires OCR)
//! otherwise            ──► Native
//! ```

use crate::pipeline::extract::StrategyKind;
use crate::pipeline::pdf::{self, PdfProbe};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Pages averaging fewer characters than this are treated as partly scanned.
pub const MIXED_DENSITY_THRESHOLD: f64 = 100.0;
/// Above this many characters per page the text layer is considered rich.
pub const HIGH_QUALITY_THRESHOLD: f64 = 500.0;

/// Mutually exclusive structural category of a PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Digital document with a usable text layer.
    Native,
    /// Image-only document; no text layer.
    Scanned,
    /// Sparse text layer, probably a scan with some embedded text.
    Mixed,
    /// Interactive form (AcroForm fields present).
    FormBased,
    /// Encrypted or permission-restricted.
    Protected,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 5] = [
        DocumentKind::Native,
        DocumentKind::Scanned,
        DocumentKind::Mixed,
        DocumentKind::FormBased,
        DocumentKind::Protected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Native => "native",
            DocumentKind::Scanned => "scanned",
            DocumentKind::Mixed => "mixed",
            DocumentKind::FormBased => "form_based",
            DocumentKind::Protected => "protected",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Density tier of the extractable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextQuality {
    High,
    Medium,
    Low,
    None,
}

impl TextQuality {
    /// Tier for `chars` characters spread over `pages` pages.
    ///
    /// `None` when there is no text or the ratio is undefined.
    pub fn from_counts(chars: usize, pages: usize) -> Self {
        match density(chars, pages) {
            Some(ratio) if ratio > HIGH_QUALITY_THRESHOLD => TextQuality::High,
            Some(ratio) if ratio > MIXED_DENSITY_THRESHOLD => TextQuality::Medium,
            Some(_) => TextQuality::Low,
            None => TextQuality::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TextQuality::High => "high",
            TextQuality::Medium => "medium",
            TextQuality::Low => "low",
            TextQuality::None => "none",
        }
    }
}

/// Characters per page, or `None` when there is nothing to divide.
fn density(chars: usize, pages: usize) -> Option<f64> {
    if chars == 0 || pages == 0 {
        None
    } else {
        Some(chars as f64 / pages as f64)
    }
}

/// Raw structural observations the classification is derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentFeatures {
    pub is_protected: bool,
    pub has_form_fields: bool,
    pub text_character_count: usize,
    pub page_count: usize,
}

/// Structural classification of one document. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    document_kind: DocumentKind,
    has_extractable_text: bool,
    text_character_count: usize,
    page_count: usize,
    requires_ocr: bool,
    has_form_fields: bool,
    is_protected: bool,
    extraction_method: String,
    text_quality: TextQuality,
}

impl ClassificationResult {
    /// Apply the priority rules to a set of observations.
    pub fn from_features(f: DocumentFeatures) -> Self {
        let has_text = f.text_character_count > 0;
        let (kind, requires_ocr) = if f.is_protected {
            (DocumentKind::Protected, false)
        } else if f.has_form_fields {
            (DocumentKind::FormBased, false)
        } else if !has_text {
            (DocumentKind::Scanned, true)
        } else if density(f.text_character_count, f.page_count).unwrap_or(0.0)
            < MIXED_DENSITY_THRESHOLD
        {
            (DocumentKind::Mixed, true)
        } else {
            (DocumentKind::Native, false)
        };

        Self {
            document_kind: kind,
            has_extractable_text: has_text,
            text_character_count: f.text_character_count,
            page_count: f.page_count,
            requires_ocr,
            has_form_fields: f.has_form_fields,
            is_protected: f.is_protected,
            extraction_method: StrategyKind::for_document(kind).tag().to_string(),
            text_quality: TextQuality::from_counts(f.text_character_count, f.page_count),
        }
    }

    /// The answer for input that could not be parsed at all.
    pub fn safe_default() -> Self {
        Self::from_features(DocumentFeatures::default())
    }

    pub fn document_kind(&self) -> DocumentKind {
        self.document_kind
    }

    pub fn has_extractable_text(&self) -> bool {
        self.has_extractable_text
    }

    pub fn text_character_count(&self) -> usize {
        self.text_character_count
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn requires_ocr(&self) -> bool {
        self.requires_ocr
    }

    pub fn has_form_fields(&self) -> bool {
        self.has_form_fields
    }

    pub fn is_protected(&self) -> bool {
        self.is_protected
    }

    pub fn extraction_method(&self) -> &str {
        &self.extraction_method
    }

    pub fn text_quality(&self) -> TextQuality {
        self.text_quality
    }

    /// One-line human summary used in rendered documents and logs.
    pub fn summary(&self) -> String {
        format!(
            "{} document, {} page(s), {} characters, text quality {}{}",
            self.document_kind,
            self.page_count,
            self.text_character_count,
            self.text_quality.as_str(),
            if self.requires_ocr { ", OCR required" } else { "" }
        )
    }
}

/// Classify raw PDF bytes. Never fails.
pub fn classify(bytes: &[u8]) -> ClassificationResult {
    let Some(probe) = PdfProbe::load(bytes) else {
        if pdf::has_protection_markers(bytes) {
            debug!("Unparseable document carries protection markers");
            return ClassificationResult::from_features(DocumentFeatures {
                is_protected: true,
                ..Default::default()
            });
        }
        debug!("Unparseable document, using safe default classification");
        return ClassificationResult::safe_default();
    };

    let features = if probe.is_encrypted() {
        DocumentFeatures {
            is_protected: true,
            page_count: probe.page_count(),
            ..Default::default()
        }
    } else {
        let text_character_count = probe
            .page_texts()
            .iter()
            .map(|t| t.trim().chars().count())
            .sum();
        DocumentFeatures {
            is_protected: false,
            has_form_fields: !probe.form_fields().is_empty(),
            text_character_count,
            page_count: probe.page_count(),
        }
    };

    let result = ClassificationResult::from_features(features);
    debug!("Classified document: {}", result.summary());
    result
}
