//! Input format detection and output naming

use std::fmt;
use std::path::Path;

use crate::error::PipelineError;

/// Media type of every pipeline output
pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Recognized upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Structured path: rewritten in place, concurrently
    Docx,
    /// Flat path: text extracted, rewritten sequentially, rebuilt as .docx
    Pdf,
}

impl DocumentFormat {
    /// Detect the format from the filename suffix
    pub fn from_filename(filename: &str) -> Result<Self, PipelineError> {
        if filename.ends_with(".docx") {
            Ok(DocumentFormat::Docx)
        } else if filename.ends_with(".pdf") {
            Ok(DocumentFormat::Pdf)
        } else {
            Err(PipelineError::UnsupportedFormat(filename.to_string()))
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Docx => "docx",
            DocumentFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// `report.pdf` -> `report<suffix>.docx`; output is always .docx
pub fn output_filename(input: &str, suffix: &str) -> String {
    let stem = match Path::new(input).extension() {
        Some(ext) => &input[..input.len() - ext.len() - 1],
        None => input,
    };
    format!("{}{}.docx", stem, suffix)
}
