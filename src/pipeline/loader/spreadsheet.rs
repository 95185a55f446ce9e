use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx, XlsxError};

use super::LoaderError;
use crate::models::Task;

pub const DESCRIPTION_COLUMN: &str = "Task Description";
pub const AMOUNT_COLUMN: &str = "Amount";

/// Read billing tasks from the first worksheet of an `.xlsx` file.
///
/// The first non-empty row is the header. Rows without a description are
/// skipped.
pub fn read_tasks(bytes: &[u8]) -> Result<Vec<Task>, LoaderError> {
    let mut workbook: Xlsx<Cursor<Vec<u8>>> = open_workbook_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e: XlsxError| LoaderError::Spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(LoaderError::EmptyWorkbook)?
        .map_err(|e| LoaderError::Spreadsheet(e.to_string()))?;

    let rows: Vec<Vec<Data>> = range.rows().map(|row| row.to_vec()).collect();
    let tasks = tasks_from_rows(&rows)?;

    tracing::debug!(tasks = tasks.len(), "Parsed task list");
    Ok(tasks)
}

pub(crate) fn tasks_from_rows(rows: &[Vec<Data>]) -> Result<Vec<Task>, LoaderError> {
    let header_index = rows
        .iter()
        .position(|row| row.iter().any(|cell| !cell_text(cell).trim().is_empty()))
        .ok_or(LoaderError::MissingHeader)?;
    let header = &rows[header_index];

    let column = |name: &'static str| {
        header
            .iter()
            .position(|cell| cell_text(cell).trim() == name)
            .ok_or(LoaderError::MissingColumn(name))
    };
    let description_col = column(DESCRIPTION_COLUMN)?;
    let amount_col = column(AMOUNT_COLUMN)?;

    let tasks = rows[header_index + 1..]
        .iter()
        .filter_map(|row| {
            let description = row.get(description_col).map(cell_text).unwrap_or_default();
            let description = description.trim();
            if description.is_empty() {
                return None;
            }
            let amount = row.get(amount_col).map(cell_text).unwrap_or_default();
            Some(Task::new(description, amount.trim()))
        })
        .collect();

    Ok(tasks)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => format_number(*f),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERR:{e:?}"),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Spreadsheets store every number as a float; whole amounts read better
/// without the trailing `.0`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
