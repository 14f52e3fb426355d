//! Text extraction strategies and the registry that selects between them.
//!
//! The set of strategies is closed, so they are an enum rather than trait
//! objects. Selection is a linear scan over the registered strategies in
//! registration order; the first one whose [`ExtractionStrategy::can_handle`]
//! accepts the document kind wins. A registry that leaves any
//! [`DocumentKind`] uncovered is rejected when it is built, so a missing
//! strategy is a startup error and never a per-request surprise.

use crate::error::TriageError;
use crate::pipeline::classify::DocumentKind;
use crate::pipeline::pdf::PdfProbe;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Marker text returned by the OCR placeholder.
pub const OCR_PLACEHOLDER_TEXT: &str =
    "[OCR not implemented: this document has no text layer and needs optical character recognition]";

/// Identifies a strategy without carrying any behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Native,
    Ocr,
    Form,
    DecryptFirst,
}

impl StrategyKind {
    /// The strategy the default registry picks for `kind`.
    pub fn for_document(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Native | DocumentKind::Mixed => StrategyKind::Native,
            DocumentKind::Scanned => StrategyKind::Ocr,
            DocumentKind::FormBased => StrategyKind::Form,
            DocumentKind::Protected => StrategyKind::DecryptFirst,
        }
    }

    /// Free-form tag recorded as the classification's extraction method.
    pub fn tag(&self) -> &'static str {
        match self {
            StrategyKind::Native => "direct-text",
            StrategyKind::Ocr => "ocr",
            StrategyKind::Form => "form-fields",
            StrategyKind::DecryptFirst => "decrypt-first",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A text-extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Read the embedded text layer directly.
    Native,
    /// Placeholder for optical character recognition.
    Ocr,
    /// Text layer plus interactive form field values.
    Form,
    /// Decrypt before extracting. Protected documents are short-circuited
    /// before extraction, so this only ever refuses.
    DecryptFirst,
}

impl ExtractionStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            ExtractionStrategy::Native => StrategyKind::Native,
            ExtractionStrategy::Ocr => StrategyKind::Ocr,
            ExtractionStrategy::Form => StrategyKind::Form,
            ExtractionStrategy::DecryptFirst => StrategyKind::DecryptFirst,
        }
    }

    pub fn can_handle(&self, kind: DocumentKind) -> bool {
        matches!(
            (self, kind),
            (ExtractionStrategy::Native, DocumentKind::Native | DocumentKind::Mixed)
                | (ExtractionStrategy::Ocr, DocumentKind::Scanned)
                | (ExtractionStrategy::Form, DocumentKind::FormBased)
                | (ExtractionStrategy::DecryptFirst, DocumentKind::Protected)
        )
    }

    /// True when the returned text is a stand-in rather than document content.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, ExtractionStrategy::Ocr)
    }

    /// Extract text from the raw PDF bytes.
    pub fn extract(&self, bytes: &[u8]) -> Result<String, TriageError> {
        match self {
            ExtractionStrategy::Native => {
                let probe = self.load(bytes)?;
                Ok(join_pages(&probe.page_texts()))
            }
            ExtractionStrategy::Ocr => Ok(OCR_PLACEHOLDER_TEXT.to_string()),
            ExtractionStrategy::Form => {
                let probe = self.load(bytes)?;
                let mut text = join_pages(&probe.page_texts());
                let fields = probe.form_fields();
                debug!("Form extraction found {} fields", fields.len());
                if !fields.is_empty() {
                    if !text.is_empty() {
                        text.push_str("\n\n");
                    }
                    text.push_str("FORM FIELDS\n");
                    for field in fields {
                        let value = field.value.unwrap_or_default();
                        text.push_str(&format!("{}: {}\n", field.name, value.trim()));
                    }
                }
                Ok(text.trim_end().to_string())
            }
            ExtractionStrategy::DecryptFirst => Err(TriageError::ProtectedDocument),
        }
    }

    fn load(&self, bytes: &[u8]) -> Result<PdfProbe, TriageError> {
        PdfProbe::load(bytes).ok_or_else(|| TriageError::ExtractionFailed {
            strategy: self.kind().to_string(),
            detail: "document could not be parsed".into(),
        })
    }
}

fn join_pages(pages: &[String]) -> String {
    pages
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Ordered set of strategies covering every document kind.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    strategies: Vec<ExtractionStrategy>,
}

impl StrategyRegistry {
    /// Build a registry, failing if any document kind has no strategy.
    pub fn new(strategies: Vec<ExtractionStrategy>) -> Result<Self, TriageError> {
        for kind in DocumentKind::ALL {
            if !strategies.iter().any(|s| s.can_handle(kind)) {
                return Err(TriageError::StrategyNotRegistered {
                    kind: kind.to_string(),
                });
            }
        }
        Ok(Self { strategies })
    }

    /// Native, Form, OCR, DecryptFirst.
    pub fn standard() -> Self {
        Self {
            strategies: vec![
                ExtractionStrategy::Native,
                ExtractionStrategy::Form,
                ExtractionStrategy::Ocr,
                ExtractionStrategy::DecryptFirst,
            ],
        }
    }

    /// First registered strategy that handles `kind`.
    pub fn select(&self, kind: DocumentKind) -> Result<ExtractionStrategy, TriageError> {
        self.strategies
            .iter()
            .copied()
            .find(|s| s.can_handle(kind))
            .ok_or_else(|| TriageError::StrategyNotRegistered {
                kind: kind.to_string(),
            })
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::pdf::fixtures::*;

    #[test]
    fn standard_registry_covers_every_kind() {
        let registry = StrategyRegistry::standard();
        for kind in DocumentKind::ALL {
            let strategy = registry.select(kind).expect("covered");
            assert_eq!(strategy.kind(), StrategyKind::for_document(kind));
        }
    }

    #[test]
    fn incomplete_registry_is_rejected() {
        let err = StrategyRegistry::new(vec![ExtractionStrategy::Native]).unwrap_err();
        assert!(matches!(err, TriageError::StrategyNotRegistered { .. }));
    }

    #[test]
    fn selection_takes_first_match() {
        let registry = StrategyRegistry::new(vec![
            ExtractionStrategy::Form,
            ExtractionStrategy::Native,
            ExtractionStrategy::Native,
            ExtractionStrategy::Ocr,
            ExtractionStrategy::DecryptFirst,
        ])
        .expect("complete");
        assert_eq!(
            registry.select(DocumentKind::Mixed).unwrap(),
            ExtractionStrategy::Native
        );
    }

    #[test]
    fn ocr_returns_marker() {
        let text = ExtractionStrategy::Ocr.extract(b"anything").unwrap();
        assert_eq!(text, OCR_PLACEHOLDER_TEXT);
        assert!(ExtractionStrategy::Ocr.is_placeholder());
        assert!(!ExtractionStrategy::Native.is_placeholder());
    }

    #[test]
    fn decrypt_first_refuses() {
        let err = ExtractionStrategy::DecryptFirst.extract(b"x").unwrap_err();
        assert!(matches!(err, TriageError::ProtectedDocument));
    }

    #[test]
    fn native_extracts_text_layer() {
        let bytes = text_pdf(&["Quarterly report", "Second page"]);
        let text = ExtractionStrategy::Native.extract(&bytes).unwrap();
        assert!(text.contains("Quarterly"), "got: {text:?}");
        assert!(text.contains("Second"), "got: {text:?}");
    }

    #[test]
    fn native_fails_on_garbage() {
        let err = ExtractionStrategy::Native.extract(b"nope").unwrap_err();
        assert!(matches!(err, TriageError::ExtractionFailed { .. }));
    }

    #[test]
    fn form_appends_field_values() {
        let bytes = form_pdf("REGISTRATION", &[("Applicant", "Maria Lopez")]);
        let text = ExtractionStrategy::Form.extract(&bytes).unwrap();
        assert!(text.contains("FORM FIELDS"));
        assert!(text.contains("Applicant: Maria Lopez"), "got: {text:?}");
    }
}
