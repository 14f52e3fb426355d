//! Low-level PDF access over `lopdf`.
//!
//! Everything that touches the PDF object model lives here so the classifier
//! and the extraction strategies only see plain Rust values. `lopdf` is pure
//! Rust and parses from memory, so no temporary files or native libraries are
//! needed. Its parser is not hardened against every malformed file, so the
//! entry points in this module treat a panic inside `lopdf` as a parse
//! failure.

use lopdf::{Dictionary, Document, Object};
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

/// Trailer key that only appears in a PDF carrying a security handler.
/// A catalog `/Perms` entry is a signature permissions dictionary (UR3,
/// DocMDP) and says nothing about encryption.
const ENCRYPT_MARKER: &[u8] = b"/Encrypt";

/// A parsed PDF ready for inspection.
pub struct PdfProbe {
    doc: Document,
}

/// A single interactive form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: Option<String>,
}

/// Values read from the PDF info dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoDictionary {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
}

/// Scan the raw bytes for an encryption dictionary reference.
///
/// Only meaningful for files too damaged to parse; a parsed document is
/// judged by [`PdfProbe::is_encrypted`].
pub fn has_protection_markers(bytes: &[u8]) -> bool {
    bytes
        .windows(ENCRYPT_MARKER.len())
        .any(|w| w == ENCRYPT_MARKER)
}

impl PdfProbe {
    /// Parse `bytes` into a document. Returns `None` for anything `lopdf`
    /// rejects, including empty buffers and non-PDF data.
    pub fn load(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() {
            return None;
        }
        match panic::catch_unwind(AssertUnwindSafe(|| Document::load_mem(bytes))) {
            Ok(Ok(doc)) => Some(Self { doc }),
            Ok(Err(e)) => {
                debug!("lopdf rejected document: {}", e);
                None
            }
            Err(_) => {
                debug!("lopdf panicked while parsing document");
                None
            }
        }
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    pub fn version(&self) -> String {
        self.doc.version.clone()
    }

    /// True when the trailer references an encryption dictionary.
    pub fn is_encrypted(&self) -> bool {
        self.doc.trailer.get(b"Encrypt").is_ok()
    }

    /// Text layer of every page, in page order. Pages whose content streams
    /// cannot be decoded contribute an empty string.
    pub fn page_texts(&self) -> Vec<String> {
        self.doc
            .get_pages()
            .keys()
            .map(|&number| {
                let doc = &self.doc;
                match panic::catch_unwind(AssertUnwindSafe(|| doc.extract_text(&[number]))) {
                    Ok(Ok(text)) => text,
                    Ok(Err(e)) => {
                        debug!("Page {}: text extraction failed: {}", number, e);
                        String::new()
                    }
                    Err(_) => {
                        debug!("Page {}: text extraction panicked", number);
                        String::new()
                    }
                }
            })
            .collect()
    }

    /// All terminal fields of the interactive form (AcroForm), depth-first.
    pub fn form_fields(&self) -> Vec<FormField> {
        let mut fields = Vec::new();
        let Some(acro_form) = self.catalog().and_then(|c| self.dict_entry(c, b"AcroForm")) else {
            return fields;
        };
        if let Some(Object::Array(roots)) = acro_form.get(b"Fields").ok().map(|o| self.resolve(o)) {
            for root in roots {
                self.collect_fields(root, None, &mut fields, 0);
            }
        }
        fields
    }

    pub fn info(&self) -> InfoDictionary {
        let Some(info) = self
            .doc
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|o| self.resolve(o).as_dict().ok())
        else {
            return InfoDictionary::default();
        };

        let text = |key: &[u8]| info.get(key).ok().and_then(|o| self.text_value(o));
        InfoDictionary {
            title: text(b"Title"),
            author: text(b"Author"),
            subject: text(b"Subject"),
            creator: text(b"Creator"),
            producer: text(b"Producer"),
            creation_date: text(b"CreationDate"),
            modification_date: text(b"ModDate"),
        }
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn catalog(&self) -> Option<&Dictionary> {
        let root = self.doc.trailer.get(b"Root").ok()?;
        self.resolve(root).as_dict().ok()
    }

    fn dict_entry<'a>(&'a self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
        let obj = dict.get(key).ok()?;
        self.resolve(obj).as_dict().ok()
    }

    /// Follow a reference chain to the object it points at.
    fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        let mut current = obj;
        // Bounded so a reference cycle cannot spin forever.
        for _ in 0..16 {
            match current {
                Object::Reference(id) => match self.doc.get_object(*id) {
                    Ok(next) => current = next,
                    Err(_) => return current,
                },
                _ => return current,
            }
        }
        current
    }

    fn text_value(&self, obj: &Object) -> Option<String> {
        match self.resolve(obj) {
            Object::String(bytes, _) => {
                let s = decode_pdf_string(bytes);
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Object::Name(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            Object::Integer(i) => Some(i.to_string()),
            Object::Real(r) => Some(r.to_string()),
            Object::Boolean(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn collect_fields(
        &self,
        obj: &Object,
        parent_name: Option<&str>,
        out: &mut Vec<FormField>,
        depth: usize,
    ) {
        if depth > 32 {
            return;
        }
        let Ok(dict) = self.resolve(obj).as_dict() else {
            return;
        };

        let partial = dict.get(b"T").ok().and_then(|o| self.text_value(o));
        let name = match (parent_name, partial) {
            (Some(p), Some(t)) => Some(format!("{p}.{t}")),
            (None, Some(t)) => Some(t),
            (Some(p), None) => Some(p.to_string()),
            (None, None) => None,
        };

        if let Some(Object::Array(kids)) = dict.get(b"Kids").ok().map(|o| self.resolve(o)) {
            // Widget-only kids carry no name of their own; treat the parent as the field.
            let named_kids = kids.iter().any(|k| {
                self.resolve(k)
                    .as_dict()
                    .map(|d| d.has(b"T"))
                    .unwrap_or(false)
            });
            if named_kids {
                for kid in kids {
                    self.collect_fields(kid, name.as_deref(), out, depth + 1);
                }
                return;
            }
        }

        if let Some(name) = name {
            let value = dict.get(b"V").ok().and_then(|o| self.text_value(o));
            out.push(FormField { name, value });
        }
    }
}

/// Decode a PDF text string: UTF-16BE with a byte-order mark, otherwise
/// UTF-8 with a Latin-1 fallback.
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn garbage_does_not_load() {
        assert!(PdfProbe::load(b"").is_none());
        assert!(PdfProbe::load(b"definitely not a pdf").is_none());
        assert!(PdfProbe::load(&[0u8; 512]).is_none());
    }

    #[test]
    fn loads_pages_and_text() {
        let bytes = text_pdf(&["Hello World from page one", "Second page text"]);
        let probe = PdfProbe::load(&bytes).expect("fixture loads");
        assert_eq!(probe.page_count(), 2);
        let texts = probe.page_texts();
        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains("Hello"), "got: {:?}", texts[0]);
    }

    #[test]
    fn reads_form_fields() {
        let bytes = form_pdf("APPLICATION FORM", &[("FullName", "Jane Doe"), ("City", "Austin")]);
        let probe = PdfProbe::load(&bytes).expect("fixture loads");
        let fields = probe.form_fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "FullName");
        assert_eq!(fields[0].value.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn no_acroform_means_no_fields() {
        let bytes = text_pdf(&["plain"]);
        let probe = PdfProbe::load(&bytes).expect("fixture loads");
        assert!(probe.form_fields().is_empty());
    }

    #[test]
    fn reads_info_dictionary() {
        let bytes = text_pdf(&["x"]);
        let probe = PdfProbe::load(&bytes).expect("fixture loads");
        let info = probe.info();
        assert_eq!(info.title.as_deref(), Some("Fixture Document"));
        assert!(info.author.is_none());
    }

    #[test]
    fn protection_markers_found_in_raw_bytes() {
        assert!(has_protection_markers(&encrypted_pdf("secret")));
        assert!(!has_protection_markers(&text_pdf(&["open"])));
        assert!(!has_protection_markers(b""));
    }

    #[test]
    fn decodes_utf16_strings() {
        let bytes = [0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        assert_eq!(decode_pdf_string(&bytes), "Hi");
        assert_eq!(decode_pdf_string(b"plain"), "plain");
        assert_eq!(decode_pdf_string(&[0xE9]), "é");
    }
}
