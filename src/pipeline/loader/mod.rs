//! Turning uploaded files into plain data: contract paragraphs from `.docx`
//! and billing tasks from `.xlsx`.

pub mod docx;
pub mod spreadsheet;

pub use docx::extract_paragraphs;
pub use spreadsheet::read_tasks;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Not a valid document archive: {0}")]
    Archive(String),

    #[error("Document is missing {0}")]
    MissingPart(&'static str),

    #[error("Malformed document XML: {0}")]
    Xml(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Spreadsheet has no worksheets")]
    EmptyWorkbook,

    #[error("Spreadsheet has no header row")]
    MissingHeader,

    #[error("Spreadsheet is missing the {0:?} column")]
    MissingColumn(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// In-memory `.docx` builder for tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::{Cursor, Write};

    pub(crate) fn escape(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    }

    /// Wrap body XML in a minimal `word/document.xml`.
    pub(crate) fn document_xml(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr/></w:body></w:document>"#
        )
    }

    pub(crate) fn paragraphs_xml(paragraphs: &[&str]) -> String {
        paragraphs
            .iter()
            .map(|p| {
                if p.is_empty() {
                    "<w:p/>".to_string()
                } else {
                    format!(
                        r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
                        escape(p)
                    )
                }
            })
            .collect()
    }

    pub(crate) fn zip_parts(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in parts {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn xlsx_cell(reference: &str, value: &str) -> String {
        if value.parse::<f64>().is_ok() {
            format!(r#"<c r="{reference}"><v>{value}</v></c>"#)
        } else {
            format!(
                r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#,
                escape(value)
            )
        }
    }

    /// A single-sheet `.xlsx` with a "Task Description" / "Amount" header
    /// followed by one row per task.
    pub(crate) fn build_xlsx(tasks: &[(&str, &str)]) -> Vec<u8> {
        let header = ("Task Description", "Amount");
        let rows: String = std::iter::once(&header)
            .chain(tasks.iter())
            .enumerate()
            .map(|(i, (description, amount))| {
                let n = i + 1;
                format!(
                    r#"<row r="{n}">{}{}</row>"#,
                    xlsx_cell(&format!("A{n}"), description),
                    xlsx_cell(&format!("B{n}"), amount)
                )
            })
            .collect();
        let sheet = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{rows}</sheetData></worksheet>"#
        );
        zip_parts(&[
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#,
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
            ),
            (
                "xl/workbook.xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Tasks" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#,
            ),
            ("xl/worksheets/sheet1.xml", &sheet),
        ])
    }

    /// A `.docx` whose body holds one paragraph per entry.
    pub(crate) fn build_docx(paragraphs: &[&str]) -> Vec<u8> {
        let xml = document_xml(&paragraphs_xml(paragraphs));
        zip_parts(&[
            ("[Content_Types].xml", r#"<?xml version="1.0"?><Types/>"#),
            ("word/document.xml", &xml),
        ])
    }
}
