//! PDF reader: page text and coordinate-tagged text items via pdfium.
//!
//! ## Two modes
//!
//! * **Text mode** joins each page's text in reading order, prefixing pages
//!   with `--- Page N ---`.
//! * **Grid mode** rebuilds tables from item positions: items are clustered
//!   into rows by `y` and into cells by `x` ([`cluster_rows`]). The
//!   clustering is a pure function over [`TextItem`]s so it can be tested
//!   without the pdfium library.
//!
//! All functions here are blocking; callers run them in `spawn_blocking`.

use crate::error::DocMatrixError;
use crate::format::{SourceDocument, SourceFormat};
use crate::formats::grid::{is_separator_row, parse_pipe_line, parse_text_to_grid, Grid};
use crate::formats::{Sheet, NO_EXTRACTED_TEXT};
use crate::pipeline::engine::bind_pdfium;
use pdfium_render::prelude::*;
use tracing::debug;

/// A text fragment with its origin (left, bottom) in PDF points.
#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    pub x: f32,
    pub y: f32,
    pub text: String,
}

impl TextItem {
    pub fn new(x: f32, y: f32, text: impl Into<String>) -> Self {
        Self {
            x,
            y,
            text: text.into(),
        }
    }
}

/// Text content of one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfPageContent {
    /// Page text in reading order.
    pub text: String,
    pub items: Vec<TextItem>,
}

/// Read text and items from every page.
pub fn read_pages(name: &str, bytes: &[u8]) -> Result<Vec<PdfPageContent>, DocMatrixError> {
    let fail = |detail: String| DocMatrixError::extraction(name, SourceFormat::Pdf, detail);
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| fail(format!("{e:?}")))?;

    let mut pages = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| fail(format!("page {}: {e:?}", idx + 1)))?;
        let items: Vec<TextItem> = text
            .segments()
            .iter()
            .map(|segment| {
                let bounds = segment.bounds();
                TextItem::new(bounds.left.value, bounds.bottom.value, segment.text())
            })
            .filter(|item| !item.text.trim().is_empty())
            .collect();
        let all = text.all();
        debug!("'{}' page {}: {} items, {} chars", name, idx + 1, items.len(), all.len());
        pages.push(PdfPageContent { text: all, items });
    }
    Ok(pages)
}

/// Text mode: `--- Page N ---` blocks, or the placeholder when empty.
pub fn extract_text(doc: &SourceDocument) -> Result<String, DocMatrixError> {
    Ok(pages_to_text(&read_pages(&doc.name, &doc.bytes)?))
}

/// Grid mode: one sheet per page that has text.
pub fn extract_sheets(
    doc: &SourceDocument,
    row_tolerance: f32,
    column_tolerance: f32,
) -> Result<Vec<Sheet>, DocMatrixError> {
    let pages = read_pages(&doc.name, &doc.bytes)?;
    Ok(pages_to_sheets(&pages, row_tolerance, column_tolerance))
}

pub fn pages_to_text(pages: &[PdfPageContent]) -> String {
    if pages.iter().all(|p| p.text.trim().is_empty()) {
        return NO_EXTRACTED_TEXT.to_string();
    }
    pages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("--- Page {} ---\n\n{}", i + 1, p.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn pages_to_sheets(
    pages: &[PdfPageContent],
    row_tolerance: f32,
    column_tolerance: f32,
) -> Vec<Sheet> {
    let sheets: Vec<Sheet> = pages
        .iter()
        .enumerate()
        .filter_map(|(i, page)| {
            let rows = cluster_rows(&page.items, row_tolerance, column_tolerance);
            (!rows.is_empty()).then(|| Sheet::new(format!("Page {}", i + 1), rows))
        })
        .collect();
    if sheets.is_empty() {
        vec![Sheet::new("Sheet1", vec![vec![NO_EXTRACTED_TEXT.to_string()]])]
    } else {
        sheets
    }
}

/// Cluster positioned items into table rows.
///
/// Rows: items whose `y` lies within `row_tolerance` of the row's first item,
/// top of page first. Cells: within a row, items sorted by `x`; an item
/// joins the current cell when its `x` is within `column_tolerance` of the
/// previous item's `x`. A row that ends up as one cell is re-split by the
/// grid normaliser.
pub fn cluster_rows(items: &[TextItem], row_tolerance: f32, column_tolerance: f32) -> Grid {
    let mut sorted: Vec<&TextItem> = items.iter().filter(|i| !i.text.trim().is_empty()).collect();
    sorted.sort_by(|a, b| b.y.total_cmp(&a.y));

    let mut rows: Vec<Vec<&TextItem>> = Vec::new();
    for item in sorted {
        match rows.last_mut() {
            Some(row) if (row[0].y - item.y).abs() <= row_tolerance => row.push(item),
            _ => rows.push(vec![item]),
        }
    }

    let mut grid = Grid::new();
    for mut row in rows {
        row.sort_by(|a, b| a.x.total_cmp(&b.x));

        let mut cells: Vec<String> = Vec::new();
        let mut prev_x: Option<f32> = None;
        for item in row {
            let text = item.text.trim();
            match (prev_x, cells.last_mut()) {
                (Some(px), Some(cell)) if item.x - px <= column_tolerance => {
                    cell.push(' ');
                    cell.push_str(text);
                }
                _ => cells.push(text.to_string()),
            }
            prev_x = Some(item.x);
        }

        cells.retain(|c| !c.is_empty());
        if cells.is_empty() {
            continue;
        }
        if cells.len() == 1 && cells[0].contains('|') {
            match parse_pipe_line(&cells[0]) {
                Some(split) => cells = split,
                None => continue,
            }
        } else if cells.len() == 1 {
            let reparsed = parse_text_to_grid(&cells[0]);
            if let Some(first) = reparsed.into_iter().next() {
                cells = first;
            }
        }
        if is_separator_row(&cells) {
            continue;
        }
        grid.push(cells);
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_ordered_top_down_and_cells_left_right() {
        let items = vec![
            TextItem::new(200.0, 700.0, "Age"),
            TextItem::new(50.0, 702.0, "Name"),
            TextItem::new(50.0, 680.0, "Alice"),
            TextItem::new(200.0, 681.0, "30"),
        ];
        let grid = cluster_rows(&items, 5.0, 15.0);
        assert_eq!(
            grid,
            vec![
                vec!["Name".to_string(), "Age".to_string()],
                vec!["Alice".to_string(), "30".to_string()]
            ]
        );
    }

    #[test]
    fn close_items_share_a_cell() {
        let items = vec![
            TextItem::new(50.0, 500.0, "New"),
            TextItem::new(60.0, 500.0, "York"),
            TextItem::new(200.0, 500.0, "10"),
        ];
        let grid = cluster_rows(&items, 5.0, 15.0);
        assert_eq!(grid, vec![vec!["New York".to_string(), "10".to_string()]]);
    }

    #[test]
    fn tolerances_are_respected() {
        let items = vec![TextItem::new(50.0, 500.0, "a"), TextItem::new(50.0, 492.0, "b")];
        assert_eq!(cluster_rows(&items, 5.0, 15.0).len(), 2);
        assert_eq!(cluster_rows(&items, 10.0, 15.0).len(), 1);
    }

    #[test]
    fn single_cell_rows_are_resplit() {
        let items = vec![TextItem::new(50.0, 500.0, "Total    42")];
        assert_eq!(
            cluster_rows(&items, 5.0, 15.0),
            vec![vec!["Total".to_string(), "42".to_string()]]
        );
    }

    #[test]
    fn pipe_rows_are_split_and_separators_dropped() {
        let items = vec![
            TextItem::new(50.0, 700.0, "| Name | Age |"),
            TextItem::new(50.0, 680.0, "|------|-----|"),
            TextItem::new(50.0, 660.0, "| Alice | 30 |"),
        ];
        assert_eq!(
            cluster_rows(&items, 5.0, 15.0),
            vec![
                vec!["Name".to_string(), "Age".to_string()],
                vec!["Alice".to_string(), "30".to_string()]
            ]
        );
    }

    #[test]
    fn separator_fragments_spread_across_columns_are_dropped() {
        let items = vec![
            TextItem::new(50.0, 700.0, "Name"),
            TextItem::new(200.0, 700.0, "Age"),
            TextItem::new(50.0, 680.0, "|------"),
            TextItem::new(200.0, 680.0, "|:---:|"),
            TextItem::new(50.0, 660.0, "Alice"),
            TextItem::new(200.0, 660.0, "30"),
        ];
        assert_eq!(cluster_rows(&items, 5.0, 15.0).len(), 2);
    }

    #[test]
    fn empty_pages_yield_placeholders() {
        let pages = vec![PdfPageContent::default()];
        assert_eq!(pages_to_text(&pages), NO_EXTRACTED_TEXT);
        let sheets = pages_to_sheets(&pages, 5.0, 15.0);
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].rows, vec![vec![NO_EXTRACTED_TEXT.to_string()]]);
    }

    #[test]
    fn text_mode_marks_pages() {
        let pages = vec![
            PdfPageContent {
                text: "first".into(),
                items: vec![],
            },
            PdfPageContent {
                text: "second".into(),
                items: vec![],
            },
        ];
        assert_eq!(
            pages_to_text(&pages),
            "--- Page 1 ---\n\nfirst\n\n--- Page 2 ---\n\nsecond"
        );
    }
}
