use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use super::LoaderError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Extract the body paragraphs of a `.docx` file, in document order.
///
/// Each paragraph is whitespace-trimmed and empty paragraphs are dropped.
/// Paragraphs inside tables and text boxes are not body paragraphs and are
/// skipped.
pub fn extract_paragraphs(bytes: &[u8]) -> Result<Vec<String>, LoaderError> {
    let xml = read_document_xml(bytes)?;
    paragraphs_from_xml(&xml)
}

fn read_document_xml(bytes: &[u8]) -> Result<String, LoaderError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| LoaderError::Archive(e.to_string()))?;

    let mut part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|_| LoaderError::MissingPart(DOCUMENT_PART))?;

    let mut content = String::new();
    part.read_to_string(&mut content)?;
    Ok(content)
}

/// Walk `word/document.xml` and collect paragraph text.
///
/// Run text comes from `w:t`; `w:tab` becomes a tab and `w:br`/`w:cr` a
/// newline, matching how word processors flatten a paragraph to text.
pub(crate) fn paragraphs_from_xml(xml: &str) -> Result<Vec<String>, LoaderError> {
    let mut reader = Reader::from_str(xml);

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut table_depth = 0usize;
    let mut paragraph_depth = 0usize;
    let mut in_text = false;

    loop {
        let in_body_paragraph = table_depth == 0 && paragraph_depth == 1;

        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:tbl" => table_depth += 1,
                b"w:p" => {
                    if table_depth == 0 && paragraph_depth == 0 {
                        current.clear();
                    }
                    paragraph_depth += 1;
                }
                b"w:t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if in_body_paragraph => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text && in_body_paragraph => {
                let text = t
                    .unescape()
                    .map_err(|e| LoaderError::Xml(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:tbl" => table_depth = table_depth.saturating_sub(1),
                b"w:p" => {
                    paragraph_depth = paragraph_depth.saturating_sub(1);
                    if table_depth == 0 && paragraph_depth == 0 {
                        let trimmed = current.trim();
                        if !trimmed.is_empty() {
                            paragraphs.push(trimmed.to_string());
                        }
                        current.clear();
                    }
                }
                b"w:t" => in_text = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(LoaderError::Xml(format!(
                    "at position {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    tracing::debug!(paragraphs = paragraphs.len(), "Parsed document body");
    Ok(paragraphs)
}
