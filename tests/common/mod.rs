//! Shared helpers for the integration tests: in-memory PDF builders and a
//! scripted completion service that records every request.

#![allow(dead_code)]

use async_trait::async_trait;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use pdf_triage::prompts::{
    ANALYSIS_SYSTEM_PROMPT, FIELD_EXTRACTION_SYSTEM_PROMPT, MARKDOWN_SYSTEM_PROMPT,
};
use pdf_triage::{CompletionRequest, CompletionService, ProcessingConfig, RemoteError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Route library logs to the test harness; `RUST_LOG=debug` shows the
/// dispatcher's retry decisions.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── PDF builders ─────────────────────────────────────────────────────────────

/// One page per entry; every line of a page is its own text object.
pub fn text_pdf(pages: &[&str]) -> Vec<u8> {
    build_pdf(pages, &[], false)
}

pub fn form_pdf(page_text: &str, fields: &[(&str, &str)]) -> Vec<u8> {
    build_pdf(&[page_text], fields, false)
}

pub fn encrypted_pdf(page_text: &str) -> Vec<u8> {
    build_pdf(&[page_text], &[], true)
}

/// A single page of ordinary prose, long enough to rate as high quality.
pub fn report_pdf() -> Vec<u8> {
    text_pdf(&[REPORT_TEXT])
}

pub const REPORT_TEXT: &str = "QUARTERLY OPERATIONS REPORT
The northern warehouse completed its migration to the new inventory system
during the second month of the quarter, two weeks ahead of the plan.
Order throughput rose steadily once the scanners were recalibrated and the
night shift adopted the revised picking routes for bulky items.
Returns processing remains the slowest step in the chain and accounts for
most of the overtime recorded by the logistics team this quarter.
The team proposes a dedicated returns bay and a second sorting belt, with
installation scheduled before the holiday peak begins in November.
Energy consumption fell by eleven percent after the lighting retrofit and
the heating schedule change approved by facilities in the first month.";

fn build_pdf(pages: &[&str], fields: &[(&str, &str)], encrypt: bool) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let mut content = String::new();
        for (i, line) in text.lines().enumerate() {
            let escaped = line
                .replace('\\', "\\\\")
                .replace('(', "\\(")
                .replace(')', "\\)");
            content.push_str(&format!(
                "BT /F1 10 Tf 40 {} Td ({}) Tj ET\n",
                780 - (i as i64 * 12),
                escaped
            ));
        }
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    if !fields.is_empty() {
        let field_ids: Vec<Object> = fields
            .iter()
            .map(|(name, value)| {
                let id: ObjectId = doc.add_object(dictionary! {
                    "FT" => "Tx",
                    "T" => Object::string_literal(*name),
                    "V" => Object::string_literal(*value),
                });
                id.into()
            })
            .collect();
        catalog.set("AcroForm", dictionary! { "Fields" => field_ids });
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal("Integration Fixture"),
        "Author" => Object::string_literal("QA"),
    });
    doc.trailer.set("Info", info_id);

    if encrypt {
        doc.trailer.set(
            "Encrypt",
            dictionary! {
                "Filter" => "Standard",
                "V" => 1,
                "R" => 2,
                "P" => -44,
            },
        );
    }

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("fixture PDF serialises");
    buf
}

// ── Mock completion service ──────────────────────────────────────────────────

/// Which remote task a request belongs to, recovered from its system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Markdown,
    Analysis,
    Fields,
}

impl Purpose {
    fn of(request: &CompletionRequest) -> Self {
        match request.system_prompt.as_str() {
            MARKDOWN_SYSTEM_PROMPT => Purpose::Markdown,
            ANALYSIS_SYSTEM_PROMPT => Purpose::Analysis,
            FIELD_EXTRACTION_SYSTEM_PROMPT => Purpose::Fields,
            other => panic!("unexpected system prompt: {other:.40}"),
        }
    }
}

type Responder = Box<dyn Fn(Purpose, usize) -> Result<String, RemoteError> + Send + Sync>;

/// Answers through a closure given the task and the 0-based call number for
/// that task, and records every request it sees.
pub struct MockService {
    respond: Responder,
    calls: Mutex<Vec<(Purpose, CompletionRequest)>>,
    counters: [AtomicUsize; 3],
}

impl MockService {
    pub fn new(
        respond: impl Fn(Purpose, usize) -> Result<String, RemoteError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
            counters: Default::default(),
        })
    }

    /// Every task succeeds with a canned answer.
    pub fn healthy() -> Arc<Self> {
        Self::new(|purpose, _| Ok(canned(purpose)))
    }

    pub fn calls(&self, purpose: Purpose) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| *p == purpose)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn requests(&self, purpose: Purpose) -> Vec<CompletionRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| *p == purpose)
            .map(|(_, r)| r.clone())
            .collect()
    }
}

pub const REMOTE_MARKDOWN: &str = "```markdown\n# Remote Report\n\nRendered by the model.\n```";

pub const REMOTE_ANALYSIS: &str = r#"{
  "document_type": "general",
  "summary": "An operations report.",
  "key_points": ["Migration finished early"],
  "topics": ["logistics", "energy"],
  "language": "en"
}"#;

pub const REMOTE_FIELDS: &str = r#"Here you go: {"total": "$1,200.00", "due": "2024-03-01"}"#;

pub fn canned(purpose: Purpose) -> String {
    match purpose {
        Purpose::Markdown => REMOTE_MARKDOWN.to_string(),
        Purpose::Analysis => REMOTE_ANALYSIS.to_string(),
        Purpose::Fields => REMOTE_FIELDS.to_string(),
    }
}

#[async_trait]
impl CompletionService for MockService {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, RemoteError> {
        let purpose = Purpose::of(request);
        self.calls.lock().unwrap().push((purpose, request.clone()));
        let n = self.counters[purpose as usize].fetch_add(1, Ordering::SeqCst);
        (self.respond)(purpose, n)
    }
}

/// Remote path enabled, with retries fast enough for wall-clock tests.
pub fn fast_config() -> pdf_triage::ProcessingConfigBuilder {
    ProcessingConfig::builder()
        .rate_limit_rpm(1000)
        .max_retries(2)
        .retry_delay_ms(1)
}
