//! HTTP endpoint tests using axum-test
//!
//! A static verifier stands in for the identity provider and scripted
//! generators stand in for the generative service, so nothing here touches
//! the network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{
    header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE},
    HeaderValue, StatusCode,
};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use lopdf::{dictionary, Document, Object};
use paraphrase_core::{
    DocumentModel, DocxDocument, ParaphraseConfig, Paraphraser, TextGenerator, TransformError,
    DOCX_MIME_TYPE,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use crate::auth::{Identity, IdentityVerifier};
use crate::build_router;
use crate::state::AppState;

const VALID_TOKEN: &str = "valid-token";

/// Accepts exactly one token and counts verification attempts
#[derive(Default)]
struct StaticVerifier {
    attempts: AtomicUsize,
}

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if token == VALID_TOKEN {
            Ok(Identity {
                subject: "1234".into(),
                email: Some("writer@example.com".into()),
            })
        } else {
            Err("token rejected".into())
        }
    }
}

/// Upper-cases text and counts calls
#[derive(Default)]
struct Shouting {
    calls: AtomicUsize,
}

#[async_trait]
impl TextGenerator for Shouting {
    async fn generate(&self, text: &str) -> Result<String, TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(text.to_uppercase())
    }
}

struct Panicking;

#[async_trait]
impl TextGenerator for Panicking {
    async fn generate(&self, _text: &str) -> Result<String, TransformError> {
        panic!("generator blew up");
    }
}

struct Harness {
    server: TestServer,
    generator: Arc<Shouting>,
    verifier: Arc<StaticVerifier>,
}

fn harness_with_limit(max_upload_bytes: usize) -> Harness {
    let generator = Arc::new(Shouting::default());
    let verifier = Arc::new(StaticVerifier::default());
    let paraphraser = Paraphraser::with_generator(generator.clone(), &ParaphraseConfig::default());
    let state = AppState::new(paraphraser, verifier.clone());
    let server = TestServer::new(build_router(state, max_upload_bytes)).unwrap();
    Harness {
        server,
        generator,
        verifier,
    }
}

fn harness() -> Harness {
    harness_with_limit(25 * 1024 * 1024)
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
}

fn upload(filename: &str, bytes: Vec<u8>) -> MultipartForm {
    MultipartForm::new().add_part("file", Part::bytes(bytes).file_name(filename))
}

fn sample_docx() -> Vec<u8> {
    let mut doc = DocxDocument::blank().unwrap();
    doc.add_paragraph("Hello world.").unwrap();
    doc.add_paragraph("").unwrap();
    doc.add_table(&[vec!["Foo bar."]]).unwrap();
    doc.to_bytes().unwrap()
}

/// A single-page PDF with no text layer
fn blank_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => 1,
            "Kids" => vec![page_id.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

// ============================================================
// Informational endpoints
// ============================================================

#[tokio::test]
async fn test_root_banner() {
    let h = harness();
    let response = h.server.get("/").await;
    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(
        json["message"],
        "Undetectable Document Paraphraser API is running."
    );
}

#[tokio::test]
async fn test_health_reports_concurrency_ceiling() {
    let h = harness();
    let response = h.server.get("/health").await;
    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "paraphrase-server");
    assert_eq!(json["max_concurrency"], 15);
}

// ============================================================
// Authentication
// ============================================================

#[tokio::test]
async fn test_missing_credential_is_rejected_before_any_work() {
    let h = harness();
    let response = h
        .server
        .post("/paraphrase")
        .multipart(upload("essay.docx", sample_docx()))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "MISSING_CREDENTIAL");
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.verifier.attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_credentials_checked_before_body_is_parsed() {
    let h = harness();
    let response = h
        .server
        .post("/paraphrase")
        .add_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
        .bytes("definitely not multipart".into())
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<serde_json::Value>()["code"], "MISSING_CREDENTIAL");
}

#[tokio::test]
async fn test_rejected_token_returns_generic_message() {
    let h = harness();
    let response = h
        .server
        .post("/paraphrase")
        .add_header(AUTHORIZATION, bearer("forged"))
        .multipart(upload("essay.docx", sample_docx()))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["code"], "INVALID_CREDENTIAL");
    assert_eq!(json["error"], "Invalid authentication credentials");
    assert_eq!(h.verifier.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_non_bearer_scheme_is_rejected() {
    let h = harness();
    let response = h
        .server
        .post("/paraphrase")
        .add_header(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"))
        .multipart(upload("essay.docx", sample_docx()))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<serde_json::Value>()["code"], "INVALID_CREDENTIAL");
    assert_eq!(h.verifier.attempts.load(Ordering::SeqCst), 0);
}

// ============================================================
// Paraphrasing
// ============================================================

#[tokio::test]
async fn test_docx_upload_returns_rewritten_docx() {
    let h = harness();
    let response = h
        .server
        .post("/paraphrase")
        .add_header(AUTHORIZATION, bearer(VALID_TOKEN))
        .multipart(upload("essay.docx", sample_docx()))
        .await;

    response.assert_status_ok();
    assert_eq!(response.header(CONTENT_TYPE), DOCX_MIME_TYPE);
    assert_eq!(
        response.header(CONTENT_DISPOSITION),
        "attachment; filename=essay_humanized.docx"
    );
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 2);

    let doc = DocxDocument::from_bytes(response.as_bytes()).unwrap();
    let paragraphs = doc.paragraphs();
    assert_eq!(paragraphs.len(), 2);
    assert_eq!(doc.paragraph_text(&paragraphs[0]).unwrap(), "HELLO WORLD.");
    assert_eq!(doc.paragraph_text(&paragraphs[1]).unwrap(), "");
    let cell = &doc.tables()[0].rows[0].cells[0].paragraphs[0];
    assert_eq!(doc.paragraph_text(cell).unwrap(), "FOO BAR.");
}

#[tokio::test]
async fn test_unsupported_format_is_bad_request() {
    let h = harness();
    let response = h
        .server
        .post("/paraphrase")
        .add_header(AUTHORIZATION, bearer(VALID_TOKEN))
        .multipart(upload("notes.txt", b"plain text".to_vec()))
        .await;

    response.assert_status_bad_request();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["code"], "UNSUPPORTED_FORMAT");
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_pdf_without_text_is_bad_request() {
    let h = harness();
    let response = h
        .server
        .post("/paraphrase")
        .add_header(AUTHORIZATION, bearer(VALID_TOKEN))
        .multipart(upload("scan.pdf", blank_pdf()))
        .await;

    response.assert_status_bad_request();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["code"], "EMPTY_EXTRACTION");
    assert_eq!(json["error"], "Could not extract text from file");
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_corrupt_docx_is_malformed() {
    let h = harness();
    let response = h
        .server
        .post("/paraphrase")
        .add_header(AUTHORIZATION, bearer(VALID_TOKEN))
        .multipart(upload("broken.docx", b"PK not really a zip".to_vec()))
        .await;

    response.assert_status_bad_request();
    assert_eq!(response.json::<serde_json::Value>()["code"], "MALFORMED_DOCUMENT");
}

#[tokio::test]
async fn test_missing_file_field_is_invalid_upload() {
    let h = harness();
    let response = h
        .server
        .post("/paraphrase")
        .add_header(AUTHORIZATION, bearer(VALID_TOKEN))
        .multipart(MultipartForm::new().add_text("comment", "no file here"))
        .await;

    response.assert_status_bad_request();
    assert_eq!(response.json::<serde_json::Value>()["code"], "INVALID_UPLOAD");
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let h = harness_with_limit(1024);
    let response = h
        .server
        .post("/paraphrase")
        .add_header(AUTHORIZATION, bearer(VALID_TOKEN))
        .multipart(upload("big.docx", vec![b'x'; 8 * 1024]))
        .await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_handler_panic_becomes_internal_error() {
    let verifier = Arc::new(StaticVerifier::default());
    let paraphraser = Paraphraser::with_generator(Arc::new(Panicking), &ParaphraseConfig::default());
    let state = AppState::new(paraphraser, verifier);
    let server = TestServer::new(build_router(state, 1024 * 1024)).unwrap();

    let response = server
        .post("/paraphrase")
        .add_header(AUTHORIZATION, bearer(VALID_TOKEN))
        .multipart(upload("essay.docx", sample_docx()))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["code"], "INTERNAL_ERROR");

    // the process keeps serving
    server.get("/health").await.assert_status_ok();
}

// ============================================================
// Properties
// ============================================================

proptest! {
    /// Any non-.docx/.pdf name is refused without calling the generator
    #[test]
    fn unsupported_extensions_never_reach_the_generator(
        stem in "[a-z]{1,8}",
        ext in "(txt|doc|rtf|odt|md|DOCX|Pdf)",
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let filename = format!("{}.{}", stem, ext);
        let (status, calls) = runtime.block_on(async {
            let h = harness();
            let status = h
                .server
                .post("/paraphrase")
                .add_header(AUTHORIZATION, bearer(VALID_TOKEN))
                .multipart(upload(&filename, b"irrelevant".to_vec()))
                .await
                .status_code();
            (status, h.generator.calls.load(Ordering::SeqCst))
        });
        prop_assert_eq!(status, StatusCode::BAD_REQUEST);
        prop_assert_eq!(calls, 0);
    }
}
