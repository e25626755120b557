//! Intermediate content model shared by readers and writers.
//!
//! Every route reads its source into one of three shapes and hands that to
//! an encoder:
//!
//! ```text
//! PlainText ─┐
//! Grid ──────┼──▶ writer
//! Markup ────┘
//! ```
//!
//! Slides are produced by the PPT reader and mapped onto one of these shapes
//! by the route that consumes them.

pub mod grid;
pub mod markup;
pub mod ooxml;

use grid::{grid_to_text, Grid};
use markup::{to_plain_text, DocNode};

/// Placeholder written by encoders when a source has no extractable text.
pub const NO_EXTRACTED_TEXT: &str = "(No extracted text)";

/// Placeholder used by text targets when nothing was found.
pub const NO_TEXT_FOUND: &str = "(No text found)";

/// One named sheet of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub rows: Grid,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Grid) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| grid::is_blank_row(r))
    }
}

/// One slide of a presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    /// 1-based slide number.
    pub index: usize,
    pub title: String,
    pub body: Vec<String>,
}

impl Slide {
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.body.iter().all(|l| l.trim().is_empty())
    }
}

/// Content extracted from a source, before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedContent {
    /// Newline-delimited text, with an optional per-page split.
    PlainText { text: String, pages: Vec<String> },
    Grid(Vec<Sheet>),
    StructuredMarkup(Vec<DocNode>),
}

impl ExtractedContent {
    pub fn text(text: impl Into<String>) -> Self {
        ExtractedContent::PlainText {
            text: text.into(),
            pages: Vec::new(),
        }
    }

    /// Flatten to text: sheets are prefixed with `--- Sheet: <name> ---`.
    pub fn to_plain_text(&self) -> String {
        match self {
            ExtractedContent::PlainText { text, .. } => text.clone(),
            ExtractedContent::Grid(sheets) => sheets_to_text(sheets),
            ExtractedContent::StructuredMarkup(nodes) => to_plain_text(nodes),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ExtractedContent::PlainText { text, .. } => text.trim().is_empty(),
            ExtractedContent::Grid(sheets) => sheets.iter().all(Sheet::is_empty),
            ExtractedContent::StructuredMarkup(nodes) => to_plain_text(nodes).trim().is_empty(),
        }
    }
}

/// Text form of a workbook.
pub fn sheets_to_text(sheets: &[Sheet]) -> String {
    sheets
        .iter()
        .map(|s| format!("--- Sheet: {} ---\n{}", s.name, grid_to_text(&s.rows)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Text form of a deck: title then body lines per slide.
pub fn slides_to_text(slides: &[Slide]) -> String {
    slides
        .iter()
        .map(|s| {
            let mut lines = vec![format!("--- Slide {} ---", s.index)];
            if !s.title.is_empty() {
                lines.push(s.title.clone());
            }
            lines.extend(s.body.iter().cloned());
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
