//! WordprocessingML (`.docx`) document model
//!
//! Only the main document part is parsed. Every other package entry (styles,
//! media, headers, ...) is copied byte-for-byte when the document is saved.
//!
//! Elements are matched by local name under whichever prefix the document
//! element binds to the WordprocessingML namespace.

mod package;
mod xml;

use std::io::Cursor;

use zip::ZipArchive;

use crate::error::DocumentError;
use crate::structured::{DocumentModel, ParagraphRef, Table, TableCell, TableRow};
use package::{
    main_part_name, read_part, rewrite_part, write_package, BLANK_DOCUMENT_XML,
    CONTENT_TYPES_PART, CONTENT_TYPES_XML, DEFAULT_MAIN_PART, PACKAGE_RELS_PART,
    PACKAGE_RELS_XML,
};
use xml::{XmlElement, XmlNode, XmlTree};

/// WordprocessingML main namespace
pub const WORDML_NAMESPACE: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const DEFAULT_PREFIX: &str = "w";

const BODY: &str = "body";
const P: &str = "p";
const PPR: &str = "pPr";
const R: &str = "r";
const T: &str = "t";
const TAB: &str = "tab";
const BR: &str = "br";
const CR: &str = "cr";
const HYPERLINK: &str = "hyperlink";
const NO_BREAK_HYPHEN: &str = "noBreakHyphen";
const TBL: &str = "tbl";
const TR: &str = "tr";
const TC: &str = "tc";
const SECT_PR: &str = "sectPr";

/// Qualified WordprocessingML names for one document
#[derive(Debug, Clone, PartialEq, Eq)]
struct WordNames {
    /// `None` when the namespace is the default one
    prefix: Option<String>,
}

impl WordNames {
    fn detect(tree: &XmlTree) -> Self {
        let prefix = tree
            .root()
            .and_then(|(_, root)| root.prefix_bound_to(WORDML_NAMESPACE))
            .unwrap_or_else(|| Some(DEFAULT_PREFIX.to_string()));
        Self { prefix }
    }

    fn is(&self, el: &XmlElement, local: &str) -> bool {
        el.has_name(self.prefix.as_deref(), local)
    }

    fn children<'a>(
        &'a self,
        el: &'a XmlElement,
        local: &'a str,
    ) -> impl Iterator<Item = (usize, &'a XmlElement)> + 'a {
        el.elements().filter(move |(_, child)| self.is(child, local))
    }

    fn qualify(&self, local: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, local),
            None => local.to_string(),
        }
    }

    fn element(&self, local: &str) -> XmlElement {
        XmlElement::new(&self.qualify(local))
    }

    fn paragraph(&self, text: &str) -> XmlElement {
        let p = self.element(P);
        let run = self.text_run(text);
        if run.children.is_empty() {
            p
        } else {
            p.with_child(run)
        }
    }

    /// A single unformatted run. Tabs become `tab`; line breaks, vertical
    /// tabs and form feeds become `br`; characters XML 1.0 forbids are dropped.
    fn text_run(&self, text: &str) -> XmlElement {
        let mut run = self.element(R);
        let mut pending = String::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\t' => {
                    run = self.flush_text(run, &mut pending);
                    run = run.with_child(self.element(TAB));
                }
                '\r' | '\n' | '\u{b}' | '\u{c}' => {
                    if c == '\r' && chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    run = self.flush_text(run, &mut pending);
                    run = run.with_child(self.element(BR));
                }
                c if is_xml_char(c) => pending.push(c),
                _ => {}
            }
        }
        self.flush_text(run, &mut pending)
    }

    fn flush_text(&self, run: XmlElement, pending: &mut String) -> XmlElement {
        if pending.is_empty() {
            return run;
        }
        let t = self
            .element(T)
            .with_attribute("xml:space", "preserve")
            .with_text(pending);
        pending.clear();
        run.with_child(t)
    }

    fn push_run_text(&self, run: &XmlElement, out: &mut String) -> Result<(), DocumentError> {
        for (_, el) in run.elements() {
            if self.is(el, T) {
                out.push_str(&el.text()?);
            } else if self.is(el, TAB) {
                out.push('\t');
            } else if self.is(el, BR) || self.is(el, CR) {
                out.push('\n');
            } else if self.is(el, NO_BREAK_HYPHEN) {
                out.push('-');
            }
        }
        Ok(())
    }
}

/// Characters allowed by the XML 1.0 `Char` production
fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// A `.docx` document loaded in memory
#[derive(Debug, Clone)]
pub struct DocxDocument {
    /// Original package; `None` for documents created from scratch
    package: Option<Vec<u8>>,
    main_part: String,
    document: XmlTree,
    names: WordNames,
}

impl DocxDocument {
    /// An empty document with a single US Letter section
    pub fn blank() -> Result<Self, DocumentError> {
        let document = XmlTree::parse(BLANK_DOCUMENT_XML.as_bytes())?;
        Ok(Self {
            package: None,
            main_part: DEFAULT_MAIN_PART.to_string(),
            names: WordNames::detect(&document),
            document,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let main_part = main_part_name(&mut archive)?;
        let document = XmlTree::parse(&read_part(&mut archive, &main_part)?)?;

        let doc = Self {
            package: Some(bytes.to_vec()),
            main_part,
            names: WordNames::detect(&document),
            document,
        };
        if doc.body_path().is_none() {
            return Err(DocumentError::MissingPart(doc.names.qualify(BODY)));
        }
        Ok(doc)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        let document_xml = self.document.write()?;
        match &self.package {
            Some(package) => rewrite_part(package, &self.main_part, &document_xml),
            None => write_package(&[
                (CONTENT_TYPES_PART, CONTENT_TYPES_XML.as_bytes()),
                (PACKAGE_RELS_PART, PACKAGE_RELS_XML.as_bytes()),
                (DEFAULT_MAIN_PART, document_xml.as_slice()),
            ]),
        }
    }

    /// Append a paragraph to the body
    pub fn add_paragraph(&mut self, text: &str) -> Result<ParagraphRef, DocumentError> {
        let paragraph = self.names.paragraph(text);
        self.append_to_body(paragraph)
    }

    /// Append a table with one single-paragraph cell per string
    pub fn add_table(&mut self, rows: &[Vec<&str>]) -> Result<(), DocumentError> {
        let names = &self.names;
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut grid = names.element("tblGrid");
        for _ in 0..columns {
            grid = grid.with_child(names.element("gridCol"));
        }

        let mut table = names
            .element(TBL)
            .with_child(
                names.element("tblPr").with_child(
                    names
                        .element("tblW")
                        .with_attribute(&names.qualify("w"), "0")
                        .with_attribute(&names.qualify("type"), "auto"),
                ),
            )
            .with_child(grid);
        for row in rows {
            let mut tr = names.element(TR);
            for cell in row {
                tr = tr.with_child(names.element(TC).with_child(names.paragraph(cell)));
            }
            table = table.with_child(tr);
        }

        self.append_to_body(table).map(|_| ())
    }

    fn body_path(&self) -> Option<Vec<usize>> {
        let (root_idx, root) = self.document.root()?;
        let (body_idx, _) = self.names.children(root, BODY).next()?;
        Some(vec![root_idx, body_idx])
    }

    fn body(&self) -> Option<&XmlElement> {
        self.document.element_at(&self.body_path()?)
    }

    fn paragraph_at(&self, paragraph: &ParagraphRef) -> Result<&XmlElement, DocumentError> {
        self.document
            .element_at(paragraph.path())
            .filter(|el| self.names.is(el, P))
            .ok_or(DocumentError::UnknownParagraph)
    }

    /// Insert before the trailing section properties, as word processors expect
    fn append_to_body(&mut self, element: XmlElement) -> Result<ParagraphRef, DocumentError> {
        let names = self.names.clone();
        let mut path = self
            .body_path()
            .ok_or_else(|| DocumentError::MissingPart(names.qualify(BODY)))?;
        let body = self
            .document
            .element_at_mut(&path)
            .ok_or_else(|| DocumentError::MissingPart(names.qualify(BODY)))?;

        let index = match body.children.last() {
            Some(XmlNode::Element(last)) if names.is(last, SECT_PR) => body.children.len() - 1,
            _ => body.children.len(),
        };
        body.children.insert(index, XmlNode::Element(element));
        body.self_closing = false;

        path.push(index);
        Ok(ParagraphRef::new(path))
    }
}

impl DocumentModel for DocxDocument {
    fn load(bytes: &[u8]) -> Result<Self, DocumentError> {
        Self::from_bytes(bytes)
    }

    fn save(&self) -> Result<Vec<u8>, DocumentError> {
        self.to_bytes()
    }

    fn paragraphs(&self) -> Vec<ParagraphRef> {
        let (Some(path), Some(body)) = (self.body_path(), self.body()) else {
            return Vec::new();
        };
        self.names
            .children(body, P)
            .map(|(i, _)| ParagraphRef::new(child_path(&path, &[i])))
            .collect()
    }

    fn tables(&self) -> Vec<Table> {
        let (Some(path), Some(body)) = (self.body_path(), self.body()) else {
            return Vec::new();
        };
        let names = &self.names;
        names
            .children(body, TBL)
            .map(|(t, tbl)| Table {
                rows: names
                    .children(tbl, TR)
                    .map(|(r, tr)| TableRow {
                        cells: names
                            .children(tr, TC)
                            .map(|(c, tc)| TableCell {
                                paragraphs: names
                                    .children(tc, P)
                                    .map(|(p, _)| {
                                        ParagraphRef::new(child_path(&path, &[t, r, c, p]))
                                    })
                                    .collect(),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect()
    }

    fn paragraph_text(&self, paragraph: &ParagraphRef) -> Result<String, DocumentError> {
        let p = self.paragraph_at(paragraph)?;

        let mut text = String::new();
        for (_, child) in p.elements() {
            if self.names.is(child, R) {
                self.names.push_run_text(child, &mut text)?;
            } else if self.names.is(child, HYPERLINK) {
                for (_, run) in self.names.children(child, R) {
                    self.names.push_run_text(run, &mut text)?;
                }
            }
        }
        Ok(text)
    }

    fn set_paragraph_text(
        &mut self,
        paragraph: &ParagraphRef,
        text: &str,
    ) -> Result<(), DocumentError> {
        let names = &self.names;
        let p = self
            .document
            .element_at_mut(paragraph.path())
            .filter(|el| names.is(el, P))
            .ok_or(DocumentError::UnknownParagraph)?;

        p.children
            .retain(|node| matches!(node, XmlNode::Element(el) if names.is(el, PPR)));
        let run = names.text_run(text);
        if !run.children.is_empty() {
            p.children.push(XmlNode::Element(run));
        }
        Ok(())
    }
}

fn child_path(base: &[usize], rest: &[usize]) -> Vec<usize> {
    base.iter().chain(rest).copied().collect()
}
