//! Local content analysis: document type, summary, key points, topics and
//! language, all derived with fixed regexes and word lists.
//!
//! This is the stand-in for the remote analysis call, so its output has the
//! same shape as the JSON the completion service is asked to return (see
//! [`crate::prompts::ANALYSIS_SYSTEM_PROMPT`]). Every function here is pure.

use crate::pipeline::classify::ClassificationResult;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

const MAX_KEY_POINTS: usize = 5;
const MAX_KEY_POINT_LEN: usize = 100;
const MAX_TOPICS: usize = 5;
const MIN_VOCABULARY_TOPICS: usize = 3;
const SUMMARY_LINES: usize = 3;
const SUMMARY_MIN_LINE_LEN: usize = 30;
const SUMMARY_MAX_LEN: usize = 200;
/// Frequency back-fill only considers words longer than this.
const TOPIC_MIN_WORD_LEN: usize = 5;

// ── Types ────────────────────────────────────────────────────────────────────

/// Coarse genre of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Insurance,
    Invoice,
    Contract,
    Check,
    #[default]
    #[serde(other)]
    General,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Insurance => "insurance",
            DocumentType::Invoice => "invoice",
            DocumentType::Contract => "contract",
            DocumentType::Check => "check",
            DocumentType::General => "general",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detected language, serialised as an ISO 639-1 code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "es")]
    Spanish,
    #[serde(rename = "en")]
    English,
    #[default]
    #[serde(rename = "unknown", other)]
    Unknown,
}

/// One coverage line of an insurance document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub coverage_type: String,
    pub amount: String,
}

/// Fields pulled out of insurance documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsuranceDetails {
    pub policy_number: Option<String>,
    pub claim_number: Option<String>,
    pub insured: Option<String>,
    pub effective_date: Option<String>,
    pub expiration_date: Option<String>,
    pub premium: Option<String>,
    pub coverages: Vec<Coverage>,
}

/// Semantic summary of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisResult {
    pub document_type: DocumentType,
    pub summary: String,
    pub key_points: Vec<String>,
    pub topics: Vec<String>,
    pub language: Language,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurance: Option<InsuranceDetails>,
}

// ── Entry point ──────────────────────────────────────────────────────────────

/// Analyse extracted text. Pure and total.
pub fn analyze(text: &str, classification: &ClassificationResult) -> AnalysisResult {
    let document_type = detect_document_type(text);
    let insurance = (document_type == DocumentType::Insurance).then(|| extract_insurance(text));

    let mut summary = summarize(text, document_type);
    if text.trim().is_empty() {
        summary = format!("No extractable text ({}).", classification.summary());
    }

    AnalysisResult {
        document_type,
        summary,
        key_points: key_points(text),
        topics: topics(text, document_type),
        language: detect_language(text),
        insurance,
    }
}

// ── Document type ────────────────────────────────────────────────────────────

static RE_INSURANCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(insurance|seguro|p[oó]liza|policy\s*(number|no\.?|#)|insured|asegurado|premium|deductible|farmers)\b")
        .unwrap()
});

static RE_INVOICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(invoice|factura|bill\s+to|amount\s+due|subtotal)\b").unwrap()
});

static RE_CONTRACT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(contract|contrato|agreement|acuerdo|hereby|the\s+parties|terms\s+and\s+conditions)\b")
        .unwrap()
});

static RE_CHECK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(pay\s+to\s+the\s+order\s+of|\bcheque\b|routing\s+number|check\s*(number|no\.?|#))")
        .unwrap()
});

/// First matching genre pattern, in insurance, invoice, contract, check order.
pub fn detect_document_type(text: &str) -> DocumentType {
    let patterns: [(&Lazy<Regex>, DocumentType); 4] = [
        (&RE_INSURANCE, DocumentType::Insurance),
        (&RE_INVOICE, DocumentType::Invoice),
        (&RE_CONTRACT, DocumentType::Contract),
        (&RE_CHECK, DocumentType::Check),
    ];
    patterns
        .iter()
        .find(|(re, _)| re.is_match(text))
        .map(|(_, t)| *t)
        .unwrap_or(DocumentType::General)
}

// ── Insurance fields ─────────────────────────────────────────────────────────

const DATE: &str = r"(\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|\d{4}-\d{2}-\d{2}|[A-Za-z]{3,9}\.?\s+\d{1,2},?\s+\d{4})";
const MONEY: &str = r"(\$\s?\d[\d,]*(?:\.\d{2})?)";

static RE_POLICY_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:policy|p[oó]liza)\s*(?:number|no\.?|#|n[uú]mero)?\s*[:#]?\s*([A-Z0-9][A-Z0-9\-]*\d[A-Z0-9\-]*)")
        .unwrap()
});

static RE_CLAIM_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:claim|reclamo)\s*(?:number|no\.?|#|n[uú]mero)?\s*[:#]?\s*([A-Z0-9][A-Z0-9\-]*\d[A-Z0-9\-]*)")
        .unwrap()
});

static RE_INSURED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:named\s+)?(?:insured|asegurado)(?:\s+name)?\s*:\s*(.+?)\s*$").unwrap()
});

static RE_EFFECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)\beffective(?:\s+date)?\s*:?\s*{DATE}")).unwrap());

static RE_EXPIRATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:expiration|expiry|expires)(?:\s+date)?\s*:?\s*{DATE}")).unwrap()
});

static RE_PREMIUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)\b(?:premium|prima)[^$\n]{{0,30}}{MONEY}")).unwrap());

static RE_COVERAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?im)^\s*([^:$\n]{{0,60}}?\b(?:coverage|cobertura|liability|limit|protection)\b[^:$\n]{{0,30}}?)\s*:?\s*{MONEY}"
    ))
    .unwrap()
});

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

pub fn extract_insurance(text: &str) -> InsuranceDetails {
    let coverages = RE_COVERAGE
        .captures_iter(text)
        .map(|c| Coverage {
            coverage_type: c[1].trim().to_string(),
            amount: c[2].trim().to_string(),
        })
        .collect();

    InsuranceDetails {
        policy_number: first_capture(&RE_POLICY_NUMBER, text),
        claim_number: first_capture(&RE_CLAIM_NUMBER, text),
        insured: first_capture(&RE_INSURED, text),
        effective_date: first_capture(&RE_EFFECTIVE, text),
        expiration_date: first_capture(&RE_EXPIRATION, text),
        premium: first_capture(&RE_PREMIUM, text),
        coverages,
    }
}

// ── Summary ──────────────────────────────────────────────────────────────────

static RE_LEADING_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[•·▪◦‣*\-–]|\d{1,3}[.)]|[a-zA-Z][.)])\s").unwrap());

fn summarize(text: &str, document_type: DocumentType) -> String {
    match document_type {
        DocumentType::Insurance => {
            return "Insurance document describing policy details, coverage and premiums.".into()
        }
        DocumentType::Invoice => {
            return "Invoice listing billed items, amounts due and payment terms.".into()
        }
        DocumentType::Contract => {
            return "Contract setting out the terms agreed between the parties.".into()
        }
        DocumentType::Check | DocumentType::General => {}
    }

    let joined = text
        .lines()
        .map(str::trim)
        .filter(|l| l.chars().count() > SUMMARY_MIN_LINE_LEN && !RE_LEADING_BULLET.is_match(l))
        .take(SUMMARY_LINES)
        .collect::<Vec<_>>()
        .join(" ");

    if joined.is_empty() {
        return "Document contains no descriptive text.".into();
    }
    truncate_chars(&joined, SUMMARY_MAX_LEN)
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

// ── Key points ───────────────────────────────────────────────────────────────

static KEY_POINT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // currency
        r"[$€£]\s?\d[\d,]*(?:\.\d{2})?",
        // dates
        r"(?i)\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b|\b\d{4}-\d{2}-\d{2}\b|\b(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4}\b",
        // identifier keywords
        r"(?i)\b(?:number|n[uú]mero|reference|account|id)\b|#\s?\d",
        // financial terms
        r"(?i)\b(?:total|amount|balance|due|premium|deductible|payment|subtotal|tax|prima|deducible|pago|importe)\b",
        // long codes
        r"\b[A-Z]{2,}-?\d{4,}\b|\b\d{8,}\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

pub fn key_points(text: &str) -> Vec<String> {
    let mut points: Vec<String> = Vec::new();
    for line in text.lines().map(str::trim) {
        if points.len() >= MAX_KEY_POINTS {
            break;
        }
        if line.is_empty() || line.chars().count() >= MAX_KEY_POINT_LEN {
            continue;
        }
        if KEY_POINT_PATTERNS.iter().any(|re| re.is_match(line))
            && !points.iter().any(|p| p == line)
        {
            points.push(line.to_string());
        }
    }
    points
}

// ── Topics ───────────────────────────────────────────────────────────────────

/// `(needle, topic)` pairs checked against the lower-cased text.
fn vocabulary(document_type: DocumentType) -> &'static [(&'static str, &'static str)] {
    match document_type {
        DocumentType::Insurance => &[
            ("insurance", "insurance"),
            ("coverage", "coverage"),
            ("premium", "premium"),
            ("deductible", "deductible"),
            ("claim", "claims"),
            ("liability", "liability"),
            ("vehicle", "auto"),
            ("property", "property"),
        ],
        DocumentType::Invoice => &[
            ("payment", "payment"),
            ("tax", "tax"),
            ("shipping", "shipping"),
            ("discount", "discount"),
            ("due", "billing"),
        ],
        DocumentType::Contract => &[
            ("obligation", "obligations"),
            ("termination", "termination"),
            ("liability", "liability"),
            ("confidential", "confidentiality"),
            ("payment", "payment"),
            ("jurisdiction", "jurisdiction"),
        ],
        DocumentType::Check => &[
            ("pay to", "payment"),
            ("bank", "banking"),
            ("deposit", "deposit"),
        ],
        DocumentType::General => &[],
    }
}

const STOP_WORDS: &[&str] = &[
    "about", "above", "across", "after", "again", "against", "almost", "already", "although",
    "always", "another", "around", "because", "before", "behind", "being", "below", "between",
    "beyond", "cannot", "could", "document", "during", "either", "enough", "especially",
    "everything", "further", "having", "however", "itself", "little", "mostly", "neither",
    "nothing", "others", "otherwise", "perhaps", "please", "rather", "should", "something",
    "still", "their", "themselves", "therefore", "these", "thing", "things", "those", "though",
    "through", "toward", "towards", "under", "unless", "until", "upon", "usually", "whatever",
    "whether", "which", "while", "within", "without", "would", "yourself", "también", "porque",
    "cuando", "durante", "entre", "sobre", "desde", "hasta", "según", "través", "nuestro",
    "nuestra", "nuestros", "nuestras", "mientras", "siempre", "ningún", "alguno", "algunos",
    "además", "aunque", "mismo", "misma", "otros", "otras", "puede", "pueden", "documento",
];

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

pub fn topics(text: &str, document_type: DocumentType) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut topics: Vec<String> = Vec::new();
    for (needle, topic) in vocabulary(document_type) {
        if topics.len() >= MAX_TOPICS {
            break;
        }
        if lower.contains(needle) && !topics.iter().any(|t| t == topic) {
            topics.push((*topic).to_string());
        }
    }

    if topics.len() < MIN_VOCABULARY_TOPICS {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for w in words(text) {
            if w.chars().count() > TOPIC_MIN_WORD_LEN
                && w.chars().all(char::is_alphabetic)
                && !STOP_WORDS.contains(&w.as_str())
            {
                *counts.entry(w).or_default() += 1;
            }
        }
        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        for (word, _) in ranked {
            if topics.len() >= MAX_TOPICS {
                break;
            }
            if !topics.contains(&word) {
                topics.push(word);
            }
        }
    }
    topics
}

// ── Language ─────────────────────────────────────────────────────────────────

const SPANISH_WORDS: &[&str] = &[
    "el", "la", "los", "las", "de", "del", "que", "y", "en", "un", "una", "por", "con", "para",
    "es", "al", "se", "su", "como", "más",
];

const ENGLISH_WORDS: &[&str] = &[
    "the", "and", "of", "to", "in", "is", "for", "that", "with", "on", "as", "by", "this", "are",
    "be", "it", "an", "or", "from", "was",
];

/// Majority language when one word list outnumbers the other by half again.
pub fn detect_language(text: &str) -> Language {
    let (mut es, mut en) = (0usize, 0usize);
    for w in words(text) {
        if SPANISH_WORDS.contains(&w.as_str()) {
            es += 1;
        }
        if ENGLISH_WORDS.contains(&w.as_str()) {
            en += 1;
        }
    }
    // Integer form of `a > b * 1.5`.
    if es > 0 && es * 2 > en * 3 {
        Language::Spanish
    } else if en > 0 && en * 2 > es * 3 {
        Language::English
    } else {
        Language::Unknown
    }
}
