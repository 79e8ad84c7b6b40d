//! Document paraphrasing pipeline
//!
//! Rewrites every paragraph of an uploaded document through an external
//! generative-text service and rebuilds the document:
//!
//! - `.docx`: paragraphs and table-cell paragraphs are rewritten in place,
//!   concurrently, bounded by a [`ConcurrencyLimiter`]
//! - `.pdf`: the text is extracted, rewritten chunk by chunk and packaged as a
//!   new `.docx`
//!
//! Rewriting fails open: a unit whose rewrite fails keeps its original text.

pub mod config;
pub mod docx;
pub mod error;
pub mod flat;
pub mod format;
pub mod generator;
pub mod limiter;
pub mod pipeline;
pub mod rewriter;
pub mod structured;

pub use config::{GenerationConfig, ParaphraseConfig};
pub use docx::DocxDocument;
pub use error::{DocumentError, PipelineError, TransformError};
pub use format::{output_filename, DocumentFormat, DOCX_MIME_TYPE};
pub use generator::{GeminiClient, TextGenerator};
pub use limiter::ConcurrencyLimiter;
pub use pipeline::{ParaphrasedDocument, Paraphraser, Stage};
pub use rewriter::Rewriter;
pub use structured::{commit, extract_units, DocumentModel, ParagraphRef, TextUnit};
