//! Structured Document Adapter
//!
//! [`DocumentModel`] is the narrow capability interface a structured
//! container must offer. [`extract_units`] and [`commit`] build the text-unit
//! view of the pipeline on top of it, independent of the concrete format.
//!
//! Limitation: committing new text replaces the paragraph's runs with a
//! single run, so character formatting (bold, italic, font changes inside a
//! paragraph) is not preserved.

use crate::error::DocumentError;

/// Opaque handle to one paragraph inside a document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParagraphRef(Vec<usize>);

impl ParagraphRef {
    pub(crate) fn new(path: Vec<usize>) -> Self {
        Self(path)
    }

    pub(crate) fn path(&self) -> &[usize] {
        &self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableCell {
    pub paragraphs: Vec<ParagraphRef>,
}

/// Capabilities the pipeline needs from a structured document
pub trait DocumentModel: Sized {
    fn load(bytes: &[u8]) -> Result<Self, DocumentError>;

    fn save(&self) -> Result<Vec<u8>, DocumentError>;

    /// Top-level paragraphs in document order
    fn paragraphs(&self) -> Vec<ParagraphRef>;

    /// Top-level tables in document order
    fn tables(&self) -> Vec<Table>;

    fn paragraph_text(&self, paragraph: &ParagraphRef) -> Result<String, DocumentError>;

    /// Replace the full text of a paragraph
    fn set_paragraph_text(
        &mut self,
        paragraph: &ParagraphRef,
        text: &str,
    ) -> Result<(), DocumentError>;
}

/// One non-blank paragraph and the text it held at extraction time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    pub paragraph: ParagraphRef,
    pub text: String,
}

/// Collect the transformable units of a document.
///
/// Order: top-level paragraphs, then for each table every row, every cell and
/// every paragraph of that cell. Whitespace-only paragraphs are skipped.
pub fn extract_units<D: DocumentModel>(doc: &D) -> Result<Vec<TextUnit>, DocumentError> {
    let table_paragraphs = doc.tables().into_iter().flat_map(|table| {
        table
            .rows
            .into_iter()
            .flat_map(|row| row.cells.into_iter())
            .flat_map(|cell| cell.paragraphs.into_iter())
    });

    let mut units = Vec::new();
    for paragraph in doc.paragraphs().into_iter().chain(table_paragraphs) {
        let text = doc.paragraph_text(&paragraph)?;
        if !text.trim().is_empty() {
            units.push(TextUnit { paragraph, text });
        }
    }
    Ok(units)
}

/// Write rewritten text back into the unit's paragraph
pub fn commit<D: DocumentModel>(
    doc: &mut D,
    unit: &TextUnit,
    text: &str,
) -> Result<(), DocumentError> {
    doc.set_paragraph_text(&unit.paragraph, text)
}
