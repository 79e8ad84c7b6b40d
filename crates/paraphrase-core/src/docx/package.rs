//! OPC package I/O for `.docx` containers

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::xml::XmlTree;
use crate::error::DocumentError;

pub(crate) const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub(crate) const PACKAGE_RELS_PART: &str = "_rels/.rels";
pub(crate) const DEFAULT_MAIN_PART: &str = "word/document.xml";

const OFFICE_DOCUMENT_REL: &str = "/officeDocument";

pub(crate) const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

pub(crate) const PACKAGE_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

pub(crate) const BLANK_DOCUMENT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body><w:sectPr><w:pgSz w:w="12240" w:h="15840"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/></w:sectPr></w:body></w:document>"#;

fn file_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Name of the main document part, taken from the package relationships
pub(crate) fn main_part_name<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<String, DocumentError> {
    let rels = match archive.by_name(PACKAGE_RELS_PART) {
        Ok(mut file) => {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            buf
        }
        Err(zip::result::ZipError::FileNotFound) => return Ok(DEFAULT_MAIN_PART.to_string()),
        Err(err) => return Err(err.into()),
    };

    let tree = XmlTree::parse(&rels)?;
    let target = tree.root().and_then(|(_, root)| {
        root.elements_named("Relationship")
            .find(|(_, rel)| {
                rel.attribute("Type")
                    .is_some_and(|t| t.ends_with(OFFICE_DOCUMENT_REL))
            })
            .and_then(|(_, rel)| rel.attribute("Target"))
    });

    Ok(target
        .map(|t| t.trim_start_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_MAIN_PART.to_string()))
}

pub(crate) fn read_part<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Vec<u8>, DocumentError> {
    let mut file = archive.by_name(name).map_err(|err| match err {
        zip::result::ZipError::FileNotFound => DocumentError::MissingPart(name.to_string()),
        other => other.into(),
    })?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Copy every entry of `source` unchanged except `replaced`, whose content
/// becomes `content`
pub(crate) fn rewrite_part(
    source: &[u8],
    replaced: &str,
    content: &[u8],
) -> Result<Vec<u8>, DocumentError> {
    let mut archive = ZipArchive::new(Cursor::new(source))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        if entry.name() == replaced {
            drop(entry);
            writer.start_file(replaced, file_options())?;
            writer.write_all(content)?;
        } else {
            writer.raw_copy_file(entry)?;
        }
    }

    Ok(writer.finish()?.into_inner())
}

/// Write a fresh package from `(name, content)` parts, in order
pub(crate) fn write_package(parts: &[(&str, &[u8])]) -> Result<Vec<u8>, DocumentError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in parts {
        writer.start_file(*name, file_options())?;
        writer.write_all(content)?;
    }
    Ok(writer.finish()?.into_inner())
}
