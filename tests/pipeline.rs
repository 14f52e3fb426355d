//! End-to-end tests for `DocumentPipeline`.
//!
//! Every test builds its PDF in memory and drives the pipeline against the
//! scripted `MockService`, so nothing here needs network access or an API key.

mod common;

use common::{
    encrypted_pdf, fast_config, form_pdf, init_tracing, report_pdf, text_pdf, MockService,
    Purpose,
};
use pdf_triage::{
    classify, DocumentInstructions, DocumentKind, DocumentPipeline, DocumentType, ErrorCode,
    ExtractionOptions, MemoryInstructionStore, ProcessingConfig, ProcessingMethod,
    ProcessingOutcome, RemoteError, RemoteErrorKind, Stage, TriageError, WarningKind,
};
use std::sync::Arc;
use tokio_test::assert_ok;

fn remote_pipeline(service: Arc<MockService>) -> DocumentPipeline {
    init_tracing();
    let config = fast_config().build().unwrap();
    DocumentPipeline::with_completion_service(config, service).unwrap()
}

fn local_pipeline() -> DocumentPipeline {
    let config = ProcessingConfig::builder().ai_enabled(false).build().unwrap();
    DocumentPipeline::new(config).unwrap()
}

// ── Classification ───────────────────────────────────────────────────────────

#[test]
fn test_classify_is_total_over_arbitrary_bytes() {
    let inputs: Vec<Vec<u8>> = vec![
        Vec::new(),
        b"%PDF-1.7".to_vec(),
        b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\ntrailer << /Root 1 0 R >>".to_vec(),
        (0..=255u8).cycle().take(4096).collect(),
        b"hello world".repeat(100),
    ];
    for bytes in inputs {
        let c = classify(&bytes);
        assert!(DocumentKind::ALL.contains(&c.document_kind()));
    }
}

#[test]
fn test_classify_real_documents() {
    assert_eq!(classify(&report_pdf()).document_kind(), DocumentKind::Native);
    assert_eq!(
        classify(&form_pdf("Name", &[("Name", "Jo")])).document_kind(),
        DocumentKind::FormBased
    );
    assert_eq!(
        classify(&encrypted_pdf("secret")).document_kind(),
        DocumentKind::Protected
    );
    let sparse = classify(&text_pdf(&["Short", "", ""]));
    assert_eq!(sparse.document_kind(), DocumentKind::Mixed);
    assert!(sparse.requires_ocr());
}

// ── Protected documents ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_protected_document_yields_empty_markdown() {
    let service = MockService::healthy();
    let pipeline = remote_pipeline(service.clone());

    let outcome = pipeline
        .process(&encrypted_pdf("Confidential figures"), Some("secret.pdf"), &ExtractionOptions::default())
        .await;

    assert!(matches!(outcome, ProcessingOutcome::Protected(_)));
    assert_eq!(outcome.error_code(), Some(ErrorCode::PdfProtected));
    let result = outcome.result();
    assert_eq!(result.markdown, "");
    assert!(!result.success);
    assert_eq!(result.error, Some(ErrorCode::PdfProtected));
    assert_eq!(result.classification.document_kind(), DocumentKind::Protected);
    assert!(result.metadata.as_ref().unwrap().is_encrypted);
    assert!(result.warnings.iter().any(|w| w.kind == WarningKind::DocumentProtected));
    assert_eq!(service.total_calls(), 0);
}

// ── Empty and image-only input ───────────────────────────────────────────────

#[tokio::test]
async fn test_empty_buffer_renders_placeholder_without_remote_call() {
    let service = MockService::healthy();
    let pipeline = remote_pipeline(service.clone());

    let outcome = pipeline.process(&[], None, &ExtractionOptions::default()).await;

    assert!(outcome.is_success());
    let result = outcome.result();
    assert_eq!(result.classification.document_kind(), DocumentKind::Scanned);
    assert!(result.classification.requires_ocr());
    assert_eq!(result.classification.text_character_count(), 0);
    assert!(result.markdown.contains("no extractable text"), "{}", result.markdown);
    assert!(result.markdown.contains("Pages"));
    assert_eq!(result.processing_method, ProcessingMethod::Local);
    assert!(result.warnings.iter().any(|w| w.kind == WarningKind::OcrRequired));
    assert_eq!(service.total_calls(), 0);
}

// ── Remote path ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_remote_success_uses_model_output() {
    let service = MockService::healthy();
    let pipeline = remote_pipeline(service.clone());
    let options = ExtractionOptions::default()
        .with_instructions("Keep the section order")
        .with_max_tokens(1500);

    let outcome = pipeline.process(&report_pdf(), Some("report.pdf"), &options).await;

    assert!(outcome.is_success());
    let result = outcome.result();
    assert_eq!(result.processing_method, ProcessingMethod::Remote);
    assert!(result.markdown.starts_with("# Remote Report"));
    assert!(!result.markdown.contains("```"));
    let analysis = result.analysis.as_ref().unwrap();
    assert_eq!(analysis.summary, "An operations report.");
    assert_eq!(analysis.document_type, DocumentType::General);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);

    let requests = service.requests(Purpose::Markdown);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].max_tokens, 1500);
    assert!(requests[0].user_prompt.contains("Keep the section order"));
    assert!(requests[0].user_prompt.contains("northern warehouse"));
    assert_eq!(service.calls(Purpose::Analysis), 1);
}

#[tokio::test]
async fn test_transient_failure_falls_back_to_local() {
    let service = MockService::new(|purpose, _| match purpose {
        Purpose::Markdown => Err(RemoteError::Transient("502 Bad Gateway".into())),
        other => Ok(common::canned(other)),
    });
    let pipeline = remote_pipeline(service.clone());

    let outcome = pipeline
        .process(&report_pdf(), None, &ExtractionOptions::default())
        .await;

    assert!(outcome.is_success());
    let result = outcome.result();
    assert_eq!(result.processing_method, ProcessingMethod::RemoteWithLocalFallback);
    assert!(result.markdown.starts_with("# QUARTERLY OPERATIONS REPORT"), "{}", result.markdown);

    let remote_warnings: Vec<_> = result
        .warnings
        .iter()
        .filter(|w| w.remote_error.is_some())
        .collect();
    assert_eq!(remote_warnings.len(), 1);
    assert_eq!(remote_warnings[0].kind, WarningKind::RemoteRenderFailed);
    assert_eq!(remote_warnings[0].remote_error, Some(RemoteErrorKind::Transient));

    // two attempts with max_retries = 2
    assert_eq!(service.calls(Purpose::Markdown), 2);
}

#[tokio::test]
async fn test_rate_limit_is_retried_until_success() {
    let service = MockService::new(|purpose, n| match (purpose, n) {
        (Purpose::Markdown, 0) => Err(RemoteError::RateLimited("429".into())),
        (other, _) => Ok(common::canned(other)),
    });
    let pipeline = remote_pipeline(service.clone());

    let outcome = pipeline
        .process(&report_pdf(), None, &ExtractionOptions::default())
        .await;

    let result = outcome.result();
    assert_eq!(result.processing_method, ProcessingMethod::Remote);
    assert!(result.warnings.is_empty());
    assert_eq!(service.calls(Purpose::Markdown), 2);
}

#[tokio::test]
async fn test_render_failure_without_fallback_fails_request() {
    let service = MockService::new(|_, _| Err(RemoteError::Transient("connection reset".into())));
    let config = fast_config().fallback_to_local(false).build().unwrap();
    let pipeline = DocumentPipeline::with_completion_service(config, service).unwrap();

    let outcome = pipeline
        .process(&report_pdf(), None, &ExtractionOptions::default())
        .await;

    match outcome {
        ProcessingOutcome::Failed {
            code,
            stage,
            partial,
            message,
        } => {
            assert_eq!(code, ErrorCode::AiProcessingFailed);
            assert_eq!(stage, Stage::Rendering);
            assert!(!partial.success);
            assert_eq!(partial.classification.document_kind(), DocumentKind::Native);
            assert!(message.contains("connection reset"), "{message}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_analysis_failure_without_fallback_is_omitted() {
    let service = MockService::new(|purpose, _| match purpose {
        Purpose::Analysis => Ok("I could not analyse this document.".into()),
        other => Ok(common::canned(other)),
    });
    let config = fast_config().fallback_to_local(false).build().unwrap();
    let pipeline = DocumentPipeline::with_completion_service(config, service.clone()).unwrap();

    let outcome = pipeline
        .process(&report_pdf(), None, &ExtractionOptions::default())
        .await;

    assert!(outcome.is_success());
    let result = outcome.result();
    assert!(result.analysis.is_none());
    assert_eq!(result.processing_method, ProcessingMethod::Remote);
    let warning = result
        .warnings
        .iter()
        .find(|w| w.kind == WarningKind::AnalysisOmitted)
        .expect("analysis omitted warning");
    assert_eq!(warning.remote_error, Some(RemoteErrorKind::Malformed));
    // malformed answers are retried like transport errors
    assert_eq!(service.calls(Purpose::Analysis), 2);
}

#[tokio::test]
async fn test_analysis_failure_falls_back_to_local_analysis() {
    let service = MockService::new(|purpose, _| match purpose {
        Purpose::Analysis => Err(RemoteError::Transient("503 Service Unavailable".into())),
        other => Ok(common::canned(other)),
    });
    let pipeline = remote_pipeline(service.clone());

    let outcome = pipeline
        .process(&report_pdf(), None, &ExtractionOptions::default())
        .await;

    assert!(outcome.is_success());
    let result = outcome.result();
    assert_eq!(result.processing_method, ProcessingMethod::RemoteWithLocalFallback);
    // markdown still came from the model
    assert!(result.markdown.starts_with("# Remote Report"), "{}", result.markdown);

    let analysis = result.analysis.as_ref().expect("local analysis");
    assert_eq!(analysis.document_type, DocumentType::General);
    assert_ne!(analysis.summary, "An operations report.");
    assert!(analysis.summary.contains("northern warehouse"), "{}", analysis.summary);

    let failed: Vec<_> = result
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::RemoteAnalysisFailed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].remote_error, Some(RemoteErrorKind::Transient));
    assert_eq!(service.calls(Purpose::Markdown), 1);
    assert_eq!(service.calls(Purpose::Analysis), 2);
}

#[tokio::test]
async fn test_local_override_skips_remote() {
    let service = MockService::healthy();
    let pipeline = remote_pipeline(service.clone());

    let outcome = pipeline
        .process(&report_pdf(), None, &ExtractionOptions::default().local_only(true))
        .await;

    assert_eq!(outcome.result().processing_method, ProcessingMethod::Local);
    assert_eq!(service.total_calls(), 0);
}

#[tokio::test]
async fn test_analysis_can_be_disabled() {
    let service = MockService::healthy();
    let pipeline = remote_pipeline(service.clone());

    let outcome = pipeline
        .process(&report_pdf(), None, &ExtractionOptions::default().with_analysis(false))
        .await;

    assert!(outcome.result().analysis.is_none());
    assert_eq!(service.calls(Purpose::Analysis), 0);
}

// ── Local path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_insurance_document_local_rendering() {
    let text = "Farmers Insurance Renewal
Policy Number: ABC-123
Named Insured: Maria Lopez
Premium: $500.00
Liability coverage: $100,000
Claims phone: (555) 123-4567
Your deductible applies to every claim filed under this policy.";
    let pipeline = local_pipeline();

    let outcome = pipeline
        .process(&text_pdf(&[text]), Some("renewal.pdf"), &ExtractionOptions::default())
        .await;

    let result = outcome.result();
    let md = &result.markdown;
    assert!(md.contains("Información de la Póliza"), "{md}");
    assert!(md.contains("**Policy Number:** ABC-123"), "{md}");
    let coverage = md.split("Información de Cobertura").nth(1).expect("coverage section");
    assert!(coverage.contains("$500.00"), "{md}");

    let analysis = result.analysis.as_ref().unwrap();
    assert_eq!(analysis.document_type, DocumentType::Insurance);
    let details = analysis.insurance.as_ref().unwrap();
    assert_eq!(details.policy_number.as_deref(), Some("ABC-123"));
    assert_eq!(details.premium.as_deref(), Some("$500.00"));
}

#[tokio::test]
async fn test_form_document_local_rendering() {
    let pipeline = local_pipeline();
    let bytes = form_pdf(
        "REGISTRATION FORM\nPlease print clearly",
        &[("FullName", "Jane Doe"), ("City", "Austin")],
    );

    let outcome = pipeline.process(&bytes, None, &ExtractionOptions::default()).await;

    let result = outcome.result();
    assert_eq!(result.classification.document_kind(), DocumentKind::FormBased);
    assert!(result.markdown.contains("# Form Document"), "{}", result.markdown);
    assert!(result.markdown.contains("**FullName:** Jane Doe"), "{}", result.markdown);
}

#[tokio::test]
async fn test_local_rendering_is_deterministic() {
    let pipeline = local_pipeline();
    let bytes = report_pdf();
    let a = pipeline.process(&bytes, None, &ExtractionOptions::default()).await;
    let b = pipeline.process(&bytes, None, &ExtractionOptions::default()).await;
    assert_eq!(a.markdown(), b.markdown());
    assert_eq!(a.result().analysis, b.result().analysis);
}

#[tokio::test]
async fn test_metadata_is_collected() {
    let pipeline = local_pipeline();
    let outcome = pipeline
        .process(&text_pdf(&["One", "Two"]), None, &ExtractionOptions::default())
        .await;
    let meta = outcome.result().metadata.clone().unwrap();
    assert_eq!(meta.title.as_deref(), Some("Integration Fixture"));
    assert_eq!(meta.author.as_deref(), Some("QA"));
    assert_eq!(meta.page_count, 2);
    assert!(!meta.is_encrypted);

    let outcome = pipeline
        .process(&report_pdf(), None, &ExtractionOptions::default().with_metadata(false))
        .await;
    assert!(outcome.result().metadata.is_none());
}

// ── Validation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_invalid_options_fail_validation() {
    let pipeline = local_pipeline();
    let outcome = pipeline
        .process(&report_pdf(), None, &ExtractionOptions::default().with_max_tokens(50))
        .await;
    match outcome {
        ProcessingOutcome::Failed { code, stage, .. } => {
            assert_eq!(code, ErrorCode::InvalidOptions);
            assert_eq!(stage, Stage::Validating);
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn test_pipelines_reject_hand_built_invalid_config() {
    let config = ProcessingConfig {
        max_retries: 0,
        ..ProcessingConfig::default()
    };
    assert!(matches!(
        DocumentPipeline::with_completion_service(config.clone(), MockService::healthy()),
        Err(TriageError::InvalidConfig(_))
    ));
    let config = ProcessingConfig {
        ai_enabled: false,
        ..config
    };
    assert!(matches!(
        DocumentPipeline::new(config),
        Err(TriageError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn test_oversized_document_fails_validation() {
    let config = ProcessingConfig::builder()
        .ai_enabled(false)
        .max_upload_size(256)
        .build()
        .unwrap();
    let pipeline = DocumentPipeline::new(config).unwrap();

    let outcome = pipeline
        .process(&report_pdf(), None, &ExtractionOptions::default())
        .await;
    assert_eq!(outcome.error_code(), Some(ErrorCode::FileTooLarge));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.pdf");
    std::fs::write(&path, report_pdf()).unwrap();
    let err = pipeline
        .process_input(path.to_str().unwrap(), &ExtractionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TriageError::FileTooLarge { max: 256, .. }));
}

// ── Field extraction ─────────────────────────────────────────────────────────

fn invoice_store() -> Arc<MemoryInstructionStore> {
    let mut store = MemoryInstructionStore::new();
    store.insert(
        "invoice.pdf",
        DocumentInstructions {
            prompt: "Extract the total and due date".into(),
            example: r#"{"total": "$0.00", "due": "YYYY-MM-DD"}"#.into(),
            field_name: "invoice".into(),
        },
    );
    Arc::new(store)
}

#[tokio::test]
async fn test_field_extraction_uses_instruction_store() {
    let service = MockService::healthy();
    let pipeline = remote_pipeline(service.clone()).with_instruction_store(invoice_store());

    let outcome = pipeline
        .process(&report_pdf(), Some("invoice.pdf"), &ExtractionOptions::default())
        .await;

    let fields = outcome.result().extracted_fields.clone().unwrap();
    assert_eq!(fields["invoice"]["total"], "$1,200.00");
    let request = &service.requests(Purpose::Fields)[0];
    assert!(request.user_prompt.contains("Extract the total and due date"));
    assert!(request.user_prompt.contains("YYYY-MM-DD"));
}

#[tokio::test]
async fn test_missing_instructions_skip_field_extraction() {
    let service = MockService::healthy();
    let pipeline = remote_pipeline(service.clone()).with_instruction_store(invoice_store());

    let outcome = pipeline
        .process(&report_pdf(), Some("other.pdf"), &ExtractionOptions::default())
        .await;

    assert!(outcome.is_success());
    assert!(outcome.result().extracted_fields.is_none());
    assert_eq!(service.calls(Purpose::Fields), 0);
}

#[tokio::test]
async fn test_failed_field_extraction_only_warns() {
    let service = MockService::new(|purpose, _| match purpose {
        Purpose::Fields => Err(RemoteError::EmptyContent),
        other => Ok(common::canned(other)),
    });
    let pipeline = remote_pipeline(service).with_instruction_store(invoice_store());

    let outcome = pipeline
        .process(&report_pdf(), Some("invoice.pdf"), &ExtractionOptions::default())
        .await;

    assert!(outcome.is_success());
    let result = outcome.result();
    assert!(result.extracted_fields.is_none());
    assert!(result
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::FieldExtractionFailed));
    // field extraction does not count as a rendering fallback
    assert_eq!(result.processing_method, ProcessingMethod::Remote);
}

// ── File entry points ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_process_to_file_writes_markdown() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("report.pdf");
    let output = dir.path().join("out/report.md");
    std::fs::write(&input, report_pdf()).unwrap();

    let pipeline = local_pipeline();
    let outcome = assert_ok!(
        pipeline
            .process_to_file(input.to_str().unwrap(), &output, &ExtractionOptions::default())
            .await
    );

    assert!(outcome.is_success());
    assert_eq!(outcome.result().filename.as_deref(), Some("report.pdf"));
    let written = std::fs::read_to_string(&output).unwrap();
    assert_eq!(written, outcome.markdown());
    assert!(written.ends_with('\n'));
}

#[tokio::test]
async fn test_process_to_file_skips_protected_documents() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("locked.pdf");
    let output = dir.path().join("locked.md");
    std::fs::write(&input, encrypted_pdf("locked")).unwrap();

    let pipeline = local_pipeline();
    let outcome = assert_ok!(
        pipeline
            .process_to_file(input.to_str().unwrap(), &output, &ExtractionOptions::default())
            .await
    );

    assert_eq!(outcome.error_code(), Some(ErrorCode::PdfProtected));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_outcome_serialises_for_cli() {
    let pipeline = local_pipeline();
    let outcome = pipeline
        .process(&report_pdf(), Some("report.pdf"), &ExtractionOptions::default())
        .await;
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["status"], "completed");
    assert_eq!(json["processing_method"], "local");
    assert_eq!(json["classification"]["document_kind"], "native");
}
