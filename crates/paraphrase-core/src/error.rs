//! Error types for the paraphrasing pipeline

use thiserror::Error;

/// Request-level failures surfaced to the caller.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Unsupported file type '{0}'. Please upload .docx or .pdf")]
    UnsupportedFormat(String),

    #[error("Could not extract text from file")]
    EmptyExtraction,

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Failed to serialize output document: {0}")]
    SerializationFailure(String),
}

impl PipelineError {
    /// Stable machine-readable kind, used in logs and API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            PipelineError::EmptyExtraction => "EMPTY_EXTRACTION",
            PipelineError::MalformedDocument(_) => "MALFORMED_DOCUMENT",
            PipelineError::SerializationFailure(_) => "SERIALIZATION_FAILURE",
        }
    }
}

/// Per-unit failures of the external rewriting call.
///
/// These never leave the [`Rewriter`](crate::Rewriter): they are logged and
/// replaced by the original text.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Generative API key is not configured")]
    MissingApiKey,

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response contained no text")]
    EmptyResponse,

    #[error("Concurrency limiter closed")]
    LimiterClosed,
}

impl From<reqwest::Error> for TransformError {
    fn from(err: reqwest::Error) -> Self {
        TransformError::Request(err.to_string())
    }
}

/// Failures while reading or writing a document container.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Archive error: {0}")]
    Archive(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Missing part: {0}")]
    MissingPart(String),

    #[error("Unknown paragraph reference")]
    UnknownParagraph,

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for DocumentError {
    fn from(err: zip::result::ZipError) -> Self {
        DocumentError::Archive(err.to_string())
    }
}

impl From<quick_xml::Error> for DocumentError {
    fn from(err: quick_xml::Error) -> Self {
        DocumentError::Xml(err.to_string())
    }
}
