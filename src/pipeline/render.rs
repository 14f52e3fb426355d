//! Local Markdown rendering: rule-based conversion of extracted text.
//!
//! Used whenever the remote path is skipped or has failed, so it must never
//! fail and must always produce the same document for the same input. Three
//! genre renderers exist and are tried in order:
//!
//! 1. **Insurance** — text mentioning at least three insurance keywords.
//!    Lines are bucketed into policy, coverage, contact and general sections.
//! 2. **Form** — documents classified as [`DocumentKind::FormBased`].
//!    Section headers, fill-in fields and checkboxes are rendered distinctly.
//! 3. **General** — titles, `key: value` fields, bullets and prose paragraphs.
//!
//! Every document then passes through [`postprocess::clean_markdown`].

use crate::pipeline::classify::{ClassificationResult, DocumentKind};
use crate::pipeline::postprocess;
use once_cell::sync::Lazy;
use regex::Regex;

/// Keywords that mark a document as insurance paperwork.
const INSURANCE_KEYWORDS: &[&str] = &[
    "policy",
    "coverage",
    "claim",
    "insured",
    "premium",
    "deductible",
    "farmers",
];

/// Distinct insurance keywords needed before the insurance renderer kicks in.
const INSURANCE_KEYWORD_THRESHOLD: usize = 3;

/// Prose lines shorter than this end the current paragraph.
const PARAGRAPH_BREAK_LEN: usize = 40;

/// Key/value colons must sit within this many leading characters.
const FIELD_COLON_WINDOW: usize = 50;

/// Lines at or above this length are never titles or form headers.
const MAX_TITLE_LEN: usize = 80;

/// Render extracted text as Markdown. Pure and total.
pub fn render(text: &str, classification: &ClassificationResult) -> String {
    let body = if text.trim().is_empty() {
        render_empty(classification)
    } else if is_insurance_text(text) {
        render_insurance(text, classification)
    } else if classification.document_kind() == DocumentKind::FormBased {
        render_form(text, classification)
    } else {
        render_general(text, classification)
    };
    postprocess::clean_markdown(&body)
}

/// True when at least three distinct insurance keywords appear.
pub fn is_insurance_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    INSURANCE_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .count()
        >= INSURANCE_KEYWORD_THRESHOLD
}

// ── Markdown writer ──────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq)]
enum Block {
    Start,
    Heading,
    Paragraph,
    Item,
}

/// Tracks the previous block so list items stay tight and everything else
/// is separated by a blank line.
struct MarkdownWriter {
    out: String,
    last: Block,
}

impl MarkdownWriter {
    fn new() -> Self {
        Self {
            out: String::new(),
            last: Block::Start,
        }
    }

    fn separate(&mut self, next: Block) {
        match (self.last, next) {
            (Block::Start, _) => {}
            (Block::Item, Block::Item) => self.out.push('\n'),
            _ => self.out.push_str("\n\n"),
        }
        self.last = next;
    }

    fn heading(&mut self, level: usize, text: &str) {
        self.separate(Block::Heading);
        self.out.push_str(&"#".repeat(level));
        self.out.push(' ');
        self.out.push_str(text.trim());
    }

    fn paragraph(&mut self, text: &str) {
        self.separate(Block::Paragraph);
        self.out.push_str(text.trim());
    }

    fn item(&mut self, text: &str) {
        self.separate(Block::Item);
        self.out.push_str("- ");
        self.out.push_str(text.trim());
    }

    fn footer(&mut self, classification: &ClassificationResult) {
        self.paragraph("---");
        self.paragraph(&format!("_Rendered locally: {}._", classification.summary()));
    }

    fn finish(self) -> String {
        self.out
    }
}

// ── Shared line helpers ──────────────────────────────────────────────────────

static RE_CURRENCY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[$€£]\s?\d[\d,]*(?:\.\d{2})?").unwrap());

/// Split `Key: value` when the colon sits early in the line and is not the
/// scheme separator of a URL.
fn split_field(line: &str) -> Option<(&str, &str)> {
    let (byte_idx, char_idx) = line
        .char_indices()
        .enumerate()
        .take(FIELD_COLON_WINDOW)
        .find(|(_, (_, c))| *c == ':')
        .map(|(ci, (bi, _))| (bi, ci))?;
    if char_idx <= 2 {
        return None;
    }
    let rest = &line[byte_idx + 1..];
    if rest.starts_with("//") {
        return None;
    }
    Some((line[..byte_idx].trim(), rest.trim()))
}

fn format_field(key: &str, value: &str) -> String {
    if value.is_empty() {
        format!("**{key}:**")
    } else {
        format!("**{key}:** {value}")
    }
}

/// Field formatting when the line is a field, the trimmed line otherwise.
fn field_or_text(line: &str) -> String {
    match split_field(line) {
        Some((k, v)) => format_field(k, v),
        None => line.trim().to_string(),
    }
}

fn is_all_caps(line: &str) -> bool {
    let letters = line.chars().filter(|c| c.is_alphabetic()).count();
    letters >= 3 && !line.chars().any(|c| c.is_lowercase())
}

// ── Empty document ───────────────────────────────────────────────────────────

fn render_empty(classification: &ClassificationResult) -> String {
    let mut w = MarkdownWriter::new();
    w.heading(1, "PDF Document");
    w.paragraph("_This document contains no extractable text._");
    w.item(&format_field("Document kind", classification.document_kind().as_str()));
    w.item(&format_field("Pages", &classification.page_count().to_string()));
    w.item(&format_field(
        "OCR required",
        if classification.requires_ocr() { "yes" } else { "no" },
    ));
    w.item(&format_field(
        "Extraction method",
        classification.extraction_method(),
    ));
    w.finish()
}

// ── Insurance renderer ───────────────────────────────────────────────────────

static RE_POLICY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(policy|p[oó]liza|insured|asegurado|effective|expiration|vigencia|claim|reclamo)\b")
        .unwrap()
});

static RE_COVERAGE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\b(coverage|cobertura|premium|prima|deductible|deducible|limits?|l[ií]mite|liability)\b|[$€£]\s?\d)",
    )
    .unwrap()
});

static RE_CONTACT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\b(phone|tel[eé]fono|tel|fax|email|e-mail|correo|address|direcci[oó]n|agent|agente)\b|@|\(\d{3}\)\s?\d{3}-\d{4}|\b\d{3}-\d{3}-\d{4}\b)",
    )
    .unwrap()
});

#[derive(Clone, Copy, PartialEq, Eq)]
enum InsuranceBucket {
    Policy,
    Coverage,
    Contact,
    General,
}

fn insurance_bucket(line: &str) -> InsuranceBucket {
    if RE_POLICY_LINE.is_match(line) {
        InsuranceBucket::Policy
    } else if RE_COVERAGE_LINE.is_match(line) {
        InsuranceBucket::Coverage
    } else if RE_CONTACT_LINE.is_match(line) {
        InsuranceBucket::Contact
    } else {
        InsuranceBucket::General
    }
}

fn render_insurance(text: &str, classification: &ClassificationResult) -> String {
    let mut policy = Vec::new();
    let mut coverage = Vec::new();
    let mut contact = Vec::new();
    let mut general = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match insurance_bucket(line) {
            InsuranceBucket::Policy => policy.push(field_or_text(line)),
            InsuranceBucket::Coverage => {
                let formatted = field_or_text(line);
                if RE_CURRENCY.is_match(line) {
                    coverage.push(format!("💰 {formatted}"));
                } else {
                    coverage.push(formatted);
                }
            }
            InsuranceBucket::Contact => contact.push(format!("📞 {}", field_or_text(line))),
            InsuranceBucket::General => general.push(field_or_text(line)),
        }
    }

    let mut w = MarkdownWriter::new();
    w.heading(1, "Documento de Seguro");
    let sections = [
        ("📋 Información de la Póliza", policy),
        ("🛡️ Información de Cobertura", coverage),
        ("📞 Información de Contacto", contact),
        ("📄 Información General", general),
    ];
    for (title, lines) in sections {
        if lines.is_empty() {
            continue;
        }
        w.heading(2, title);
        for line in &lines {
            w.item(line);
        }
    }
    w.footer(classification);
    w.finish()
}

// ── Form renderer ────────────────────────────────────────────────────────────

static RE_BLANK_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{3,}").unwrap());

static RE_CHECKBOX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\[\s?\]|\[[xX✓✔]\]|☐|☑|☒|□|■)\s*(.*)$").unwrap());

const BLANK_VALUE: &str = "`__________`";

fn is_form_header(line: &str) -> bool {
    line.chars().count() < MAX_TITLE_LEN && !line.contains(':') && is_all_caps(line)
}

fn render_form(text: &str, classification: &ClassificationResult) -> String {
    let mut w = MarkdownWriter::new();
    w.heading(1, "Form Document");

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if is_form_header(line) {
            w.heading(3, line);
        } else if let Some(caps) = RE_CHECKBOX.captures(line) {
            let checked = caps[1]
                .chars()
                .any(|c| matches!(c, 'x' | 'X' | '✓' | '✔' | '☑' | '☒' | '■'));
            let mark = if checked { "[x]" } else { "[ ]" };
            w.item(&format!("{mark} {}", caps[2].trim()));
        } else if RE_BLANK_RULE.is_match(line) {
            let label = RE_BLANK_RULE.replace_all(line, " ");
            let label = label.trim().trim_end_matches(':').trim();
            if label.is_empty() {
                w.item(BLANK_VALUE);
            } else {
                w.item(&format!("**{label}:** {BLANK_VALUE}"));
            }
        } else if let Some((key, value)) = split_field(line) {
            if value.is_empty() {
                w.item(&format!("**{key}:** {BLANK_VALUE}"));
            } else {
                w.item(&format_field(key, value));
            }
        } else {
            w.paragraph(line);
        }
    }

    w.footer(classification);
    w.finish()
}

// ── General renderer ─────────────────────────────────────────────────────────

static RE_SECTION_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:\d+(?:\.\d+)+\.?|(?:section|chapter|article|part|cap[ií]tulo|secci[oó]n|art[ií]culo)\s+[\dIVXLC]+[.:]?)\s+\S",
    )
    .unwrap()
});

static RE_BULLET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[•·▪◦‣*\-–]|\d{1,3}[.)]|[a-zA-Z][.)])\s+(.+)$").unwrap()
});

#[derive(Debug, PartialEq, Eq)]
enum LineKind<'a> {
    SectionTitle,
    Title,
    Bullet(&'a str),
    Field(&'a str, &'a str),
    Prose,
}

fn classify_line(line: &str) -> LineKind<'_> {
    let short = line.chars().count() < MAX_TITLE_LEN;
    if short && RE_SECTION_TITLE.is_match(line) {
        return LineKind::SectionTitle;
    }
    if short && is_all_caps(line) {
        return LineKind::Title;
    }
    if let Some(caps) = RE_BULLET.captures(line) {
        if let Some(m) = caps.get(1) {
            return LineKind::Bullet(m.as_str());
        }
    }
    if let Some((k, v)) = split_field(line) {
        return LineKind::Field(k, v);
    }
    LineKind::Prose
}

fn flush_paragraph(w: &mut MarkdownWriter, buffer: &mut Vec<String>) {
    if !buffer.is_empty() {
        w.paragraph(&buffer.join(" "));
        buffer.clear();
    }
}

fn render_general(text: &str, classification: &ClassificationResult) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();

    let mut w = MarkdownWriter::new();
    let first = lines.iter().position(|l| !l.is_empty());
    let body_start = match first.map(|i| (i, classify_line(lines[i]))) {
        Some((i, LineKind::Title | LineKind::SectionTitle)) => {
            w.heading(1, lines[i]);
            i + 1
        }
        _ => {
            w.heading(1, "Document");
            0
        }
    };

    let mut buffer: Vec<String> = Vec::new();
    for line in &lines[body_start..] {
        if line.is_empty() {
            flush_paragraph(&mut w, &mut buffer);
            continue;
        }
        match classify_line(line) {
            LineKind::SectionTitle => {
                flush_paragraph(&mut w, &mut buffer);
                w.heading(3, line);
            }
            LineKind::Title => {
                flush_paragraph(&mut w, &mut buffer);
                w.heading(2, line);
            }
            LineKind::Bullet(content) => {
                flush_paragraph(&mut w, &mut buffer);
                w.item(&field_or_text(content));
            }
            LineKind::Field(k, v) => {
                flush_paragraph(&mut w, &mut buffer);
                w.item(&format_field(k, v));
            }
            LineKind::Prose => {
                buffer.push(line.to_string());
                if line.chars().count() < PARAGRAPH_BREAK_LEN {
                    flush_paragraph(&mut w, &mut buffer);
                }
            }
        }
    }
    flush_paragraph(&mut w, &mut buffer);

    w.footer(classification);
    w.finish()
}
