//! Spreadsheet reader (XLSX, XLSM, XLS, ODS) via calamine.
//!
//! Sheets are returned in workbook order as arrays of display strings, one
//! row per spreadsheet row. Rows whose cells are all empty are dropped and
//! trailing empty cells are trimmed, matching what a user sees when the
//! sheet is exported as CSV.

use crate::error::DocMatrixError;
use crate::format::{SourceDocument, SourceFormat};
use crate::formats::grid::is_blank_row;
use crate::formats::Sheet;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use tracing::debug;

/// Read every sheet of a workbook.
pub fn extract_sheets(doc: &SourceDocument) -> Result<Vec<Sheet>, DocMatrixError> {
    read_workbook(&doc.name, &doc.bytes)
}

/// Read every sheet of a workbook from memory.
pub fn read_workbook(name: &str, bytes: &[u8]) -> Result<Vec<Sheet>, DocMatrixError> {
    let fail = |detail: String| DocMatrixError::extraction(name, SourceFormat::Excel, detail);

    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(|e| fail(e.to_string()))?;

    let mut sheets = Vec::new();
    for sheet_name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| fail(format!("sheet '{sheet_name}': {e}")))?;

        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| {
                let mut cells: Vec<String> = row.iter().map(cell_text).collect();
                while cells.last().is_some_and(|c| c.is_empty()) {
                    cells.pop();
                }
                cells
            })
            .filter(|row| !row.is_empty() && !is_blank_row(row))
            .collect();

        debug!("'{}' sheet '{}': {} rows", name, sheet_name, rows.len());
        sheets.push(Sheet::new(sheet_name, rows));
    }
    Ok(sheets)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_is_an_extraction_error() {
        let err = read_workbook("bad.xlsx", b"definitely not a workbook").unwrap_err();
        assert!(matches!(
            err,
            DocMatrixError::ExtractionFailed { format: SourceFormat::Excel, .. }
        ));
    }

    #[test]
    fn numbers_render_without_trailing_zeroes() {
        assert_eq!(cell_text(&Data::Float(30.0)), "30");
        assert_eq!(cell_text(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_text(&Data::Int(7)), "7");
        assert_eq!(cell_text(&Data::String("  x ".into())), "x");
        assert_eq!(cell_text(&Data::Empty), "");
    }
}
