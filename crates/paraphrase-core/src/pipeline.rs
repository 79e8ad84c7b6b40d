//! Pipeline Orchestrator
//!
//! `Received -> FormatDetected -> {Structured | Flat} -> Transformed ->
//! Serialized -> Done`, with `Failed` reachable from every step.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::config::ParaphraseConfig;
use crate::docx::DocxDocument;
use crate::error::{PipelineError, TransformError};
use crate::flat;
use crate::format::{output_filename, DocumentFormat};
use crate::generator::{GeminiClient, TextGenerator};
use crate::limiter::ConcurrencyLimiter;
use crate::rewriter::Rewriter;
use crate::structured::{commit, extract_units, DocumentModel};

/// Processing stage of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    FormatDetected,
    Transformed,
    Serialized,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::FormatDetected => "format_detected",
            Stage::Transformed => "transformed",
            Stage::Serialized => "serialized",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct ParaphrasedDocument {
    /// Suggested download name, always `.docx`
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Path taken, by input format
    pub format: DocumentFormat,
    /// Units (structured) or chunks (flat) sent to the rewriter
    pub submitted: usize,
}

/// Drives extraction, rewriting and reassembly of one uploaded document
#[derive(Clone)]
pub struct Paraphraser {
    rewriter: Rewriter,
    chunk_size: usize,
    output_suffix: String,
}

impl Paraphraser {
    pub fn new(rewriter: Rewriter, config: &ParaphraseConfig) -> Self {
        Self {
            rewriter,
            chunk_size: config.chunk_size.max(1),
            output_suffix: config.output_suffix.clone(),
        }
    }

    /// Wire a generator and a fresh limiter sized from `config`
    pub fn with_generator(generator: Arc<dyn TextGenerator>, config: &ParaphraseConfig) -> Self {
        let limiter = ConcurrencyLimiter::new(config.max_concurrency);
        Self::new(Rewriter::new(generator, limiter), config)
    }

    /// Production wiring against the Gemini API
    pub fn from_config(config: &ParaphraseConfig) -> Result<Self, TransformError> {
        let client = GeminiClient::new(config)?;
        Ok(Self::with_generator(Arc::new(client), config))
    }

    pub fn rewriter(&self) -> &Rewriter {
        &self.rewriter
    }

    /// Run the whole pipeline for one upload
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn process(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<ParaphrasedDocument, PipelineError> {
        debug!(stage = %Stage::Received);
        let result = self.run(filename, bytes).await;
        match &result {
            Ok(doc) => info!(
                stage = %Stage::Done,
                output = %doc.filename,
                submitted = doc.submitted,
                "Document paraphrased"
            ),
            Err(err) => warn!(stage = %Stage::Failed, kind = err.kind(), error = %err),
        }
        result
    }

    async fn run(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<ParaphrasedDocument, PipelineError> {
        let format = DocumentFormat::from_filename(filename)?;
        debug!(stage = %Stage::FormatDetected, %format);

        let (bytes, submitted) = match format {
            DocumentFormat::Docx => self.process_structured(bytes).await?,
            DocumentFormat::Pdf => self.process_flat(bytes).await?,
        };
        debug!(stage = %Stage::Serialized, output_size = bytes.len());

        Ok(ParaphrasedDocument {
            filename: output_filename(filename, &self.output_suffix),
            bytes,
            format,
            submitted,
        })
    }

    async fn process_structured(
        &self,
        bytes: Vec<u8>,
    ) -> Result<(Vec<u8>, usize), PipelineError> {
        // inflating and parsing a large package blocks; keep it off the runtime workers
        let mut doc = tokio::task::spawn_blocking(move || DocxDocument::load(&bytes))
            .await
            .map_err(|e| PipelineError::MalformedDocument(format!("DOCX parsing aborted: {}", e)))?
            .map_err(|e| PipelineError::MalformedDocument(e.to_string()))?;

        let submitted = self.rewrite_document(&mut doc).await?;

        let output = tokio::task::spawn_blocking(move || doc.save())
            .await
            .map_err(|e| {
                PipelineError::SerializationFailure(format!("DOCX writing aborted: {}", e))
            })?
            .map_err(|e| PipelineError::SerializationFailure(e.to_string()))?;
        Ok((output, submitted))
    }

    /// Rewrite every non-blank unit of `doc` concurrently and commit the
    /// results in extraction order. Returns the number of units submitted.
    pub async fn rewrite_document<D: DocumentModel>(
        &self,
        doc: &mut D,
    ) -> Result<usize, PipelineError> {
        let units =
            extract_units(doc).map_err(|e| PipelineError::MalformedDocument(e.to_string()))?;
        info!("Found {} text elements to paraphrase.", units.len());

        let rewritten = join_all(units.iter().map(|unit| self.rewriter.rewrite(&unit.text))).await;
        debug!(stage = %Stage::Transformed, units = units.len());

        for (unit, text) in units.iter().zip(&rewritten) {
            commit(doc, unit, text)
                .map_err(|e| PipelineError::SerializationFailure(e.to_string()))?;
        }
        Ok(units.len())
    }

    async fn process_flat(&self, bytes: Vec<u8>) -> Result<(Vec<u8>, usize), PipelineError> {
        // lopdf may panic on hostile input; the blocking task contains it
        let text = tokio::task::spawn_blocking(move || flat::extract_text(&bytes))
            .await
            .map_err(|e| PipelineError::MalformedDocument(format!("PDF extraction aborted: {}", e)))?
            .map_err(|e| PipelineError::MalformedDocument(e.to_string()))?;

        if text.trim().is_empty() {
            return Err(PipelineError::EmptyExtraction);
        }

        let rewritten = self.rewrite_flat_text(&text).await;
        debug!(stage = %Stage::Transformed, chunks = rewritten.len());

        let output = flat::synthesize(&rewritten.join("\n"))
            .and_then(|doc| doc.to_bytes())
            .map_err(|e| PipelineError::SerializationFailure(e.to_string()))?;
        Ok((output, rewritten.len()))
    }

    /// Rewrite chunk by chunk, one call at a time, preserving order
    pub async fn rewrite_flat_text(&self, text: &str) -> Vec<String> {
        let chunks = flat::chunk_text(text, self.chunk_size);
        info!("Split extracted text into {} chunks.", chunks.len());

        let mut rewritten = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            rewritten.push(self.rewriter.rewrite(chunk).await);
        }
        rewritten
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every call and the peak number of overlapping calls
    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for Recording {
        async fn generate(&self, text: &str) -> Result<String, TransformError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.lock().unwrap().push(text.to_string());
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("[{}]", text))
        }
    }

    fn paraphraser(config: &ParaphraseConfig) -> (Arc<Recording>, Paraphraser) {
        let generator = Arc::new(Recording::default());
        let paraphraser = Paraphraser::with_generator(generator.clone(), config);
        (generator, paraphraser)
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::FormatDetected.to_string(), "format_detected");
        assert_eq!(Stage::Failed.to_string(), "failed");
    }

    #[tokio::test]
    async fn test_unsupported_format_makes_no_calls() {
        let (generator, paraphraser) = paraphraser(&ParaphraseConfig::default());
        let err = paraphraser
            .process("notes.txt", b"hello".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat(_)));
        assert!(generator.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_docx_is_malformed() {
        let (_, paraphraser) = paraphraser(&ParaphraseConfig::default());
        let err = paraphraser
            .process("essay.docx", b"PK broken".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedDocument(_)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_docx_parsing_does_not_block_other_tasks() {
        use std::sync::atomic::AtomicBool;

        let (generator, paraphraser) = paraphraser(&ParaphraseConfig::default());
        let mut doc = DocxDocument::blank().unwrap();
        for _ in 0..200 {
            doc.add_paragraph("   ").unwrap();
        }
        let bytes = doc.to_bytes().unwrap();

        let done = AtomicBool::new(false);
        let ticks = AtomicUsize::new(0);
        let work = async {
            let out = paraphraser.process("spaces.docx", bytes).await;
            done.store(true, Ordering::SeqCst);
            out
        };
        let ticker = async {
            while !done.load(Ordering::SeqCst) {
                ticks.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
            }
        };

        let (out, ()) = tokio::join!(work, ticker);
        assert_eq!(out.unwrap().submitted, 0);
        assert!(generator.calls.lock().unwrap().is_empty());
        // without offloading, a call-free document completes in a single poll
        assert!(ticks.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_malformed() {
        let (generator, paraphraser) = paraphraser(&ParaphraseConfig::default());
        let err = paraphraser
            .process("scan.pdf", b"%PDF-1.7 garbage".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedDocument(_)));
        assert!(generator.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flat_text_chunks_sequentially_in_order() {
        let config = ParaphraseConfig::default().with_chunk_size(4);
        let (generator, paraphraser) = paraphraser(&config);

        let rewritten = paraphraser.rewrite_flat_text("abcdefghij").await;

        assert_eq!(rewritten, vec!["[abcd]", "[efgh]", "[ij]"]);
        assert_eq!(*generator.calls.lock().unwrap(), vec!["abcd", "efgh", "ij"]);
        assert_eq!(generator.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_chunks_are_not_sent() {
        let config = ParaphraseConfig::default().with_chunk_size(3);
        let (generator, paraphraser) = paraphraser(&config);

        let rewritten = paraphraser.rewrite_flat_text("abc   def").await;

        assert_eq!(rewritten, vec!["[abc]", "   ", "[def]"]);
        assert_eq!(generator.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_output_filename_uses_configured_suffix() {
        let config = ParaphraseConfig {
            output_suffix: "_rewritten".into(),
            ..ParaphraseConfig::default()
        };
        let (_, paraphraser) = paraphraser(&config);
        let doc = DocxDocument::blank().unwrap().to_bytes().unwrap();

        let out = paraphraser.process("Essay.final.docx", doc).await.unwrap();
        assert_eq!(out.filename, "Essay.final_rewritten.docx");
        assert_eq!(out.format, DocumentFormat::Docx);
        assert_eq!(out.submitted, 0);
    }
}
