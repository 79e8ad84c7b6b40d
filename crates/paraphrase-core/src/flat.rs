//! Flat-Text Adapter (legacy PDF path)
//!
//! PDFs have no addressable paragraphs: the whole body is extracted as one
//! string, cut into fixed-size chunks and later rebuilt as a brand-new
//! `.docx` with one paragraph per non-blank line.
//!
//! Chunk boundaries fall on character counts, not sentences, so a chunk may
//! end mid-sentence.

use lopdf::Document;
use tracing::debug;

use crate::docx::DocxDocument;
use crate::error::DocumentError;

/// Extract the text of every page, in page order, each followed by a newline.
///
/// Pages whose text cannot be decoded contribute only their newline.
pub fn extract_text(pdf: &[u8]) -> Result<String, DocumentError> {
    let doc = Document::load_mem(pdf).map_err(|e| DocumentError::Pdf(e.to_string()))?;

    let mut text = String::new();
    for page_number in doc.get_pages().into_keys() {
        match doc.extract_text(&[page_number]) {
            Ok(page_text) => text.push_str(&page_text),
            Err(err) => debug!(page = page_number, error = %err, "No text extracted from page"),
        }
        text.push('\n');
    }
    Ok(text)
}

/// Split into contiguous slices of at most `chunk_size` characters
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<&str> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == chunk_size {
            chunks.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

/// Build a new document with one paragraph per non-blank line
pub fn synthesize(text: &str) -> Result<DocxDocument, DocumentError> {
    let mut doc = DocxDocument::blank()?;
    for line in text.split('\n') {
        let line = line.trim_end_matches('\r');
        if !line.trim().is_empty() {
            doc.add_paragraph(line)?;
        }
    }
    Ok(doc)
}
