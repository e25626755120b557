//! Page planning for generated PDFs.
//!
//! Planning is separated from painting: every PDF-producing route first
//! builds a [`DocumentPlan`] (pages of positioned text, filled rectangles and
//! images, in PDF points with the origin at the bottom-left) and only then
//! hands it to [`crate::writers::pdf`] for painting with pdfium. Pagination,
//! wrapping and table layout are therefore plain functions that tests can
//! inspect without the native library.
//!
//! | Planner | Used for |
//! |---------|----------|
//! | [`plan_text`]   | plain text, one wrapped line after another |
//! | [`plan_tables`] | sheets: red header, banded rows, header repeated per page |
//! | [`plan_flow`]   | styled lines from a [`crate::formats::markup::DocNode`] tree |
//! | [`plan_slides`] | one landscape page per slide with a footer |
//! | [`plan_image`]  | one image fitted inside the margins |
//!
//! Every planner returns at least one page.

use super::metrics::{split_to_width, text_width, wrap_text, FontFace};
use crate::config::{ConversionConfig, Orientation};
use crate::formats::grid::{is_blank_row, rectangularize, Grid};
use crate::formats::markup::{LineKind, StyledLine};
use crate::formats::{Sheet, Slide, NO_EXTRACTED_TEXT};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// A4 in points.
pub const A4_WIDTH: f32 = 595.28;
pub const A4_HEIGHT: f32 = 841.89;

/// Points per pixel for images, assuming 96 DPI.
pub const POINTS_PER_PIXEL: f32 = 0.75;

pub const EMPTY_SLIDE_TEXT: &str = "(Empty Slide or Image-only)";

const CELL_PADDING: f32 = 4.0;
const LIST_INDENT: f32 = 18.0;
const SLIDE_TITLE_SIZE: f32 = 24.0;
const SLIDE_BODY_SIZE: f32 = 14.0;
const FOOTER_SIZE: f32 = 9.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn a4(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Portrait => PageSize {
                width: A4_WIDTH,
                height: A4_HEIGHT,
            },
            Orientation::Landscape => PageSize {
                width: A4_HEIGHT,
                height: A4_WIDTH,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const HEADER: Rgb = Rgb(220, 38, 38);
    pub const BAND: Rgb = Rgb(245, 245, 245);
    pub const MUTED: Rgb = Rgb(110, 110, 110);
}

/// A positioned drawing instruction. `y` of text is the baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum PageElement {
    Text {
        x: f32,
        y: f32,
        text: String,
        size: f32,
        face: FontFace,
        color: Rgb,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Rgb,
    },
    /// Draws `DocumentPlan::images[source]`.
    Image {
        source: usize,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PagePlan {
    pub size: PageSize,
    pub elements: Vec<PageElement>,
}

impl PagePlan {
    pub fn new(size: PageSize) -> Self {
        Self {
            size,
            elements: Vec::new(),
        }
    }

    /// Text of every text element, in drawing order.
    pub fn texts(&self) -> Vec<&str> {
        self.elements
            .iter()
            .filter_map(|e| match e {
                PageElement::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Pages to paint plus the encoded images they reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPlan {
    pub pages: Vec<PagePlan>,
    pub images: Vec<Vec<u8>>,
}

impl DocumentPlan {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Append another plan's pages, re-indexing its images.
    pub fn append(&mut self, other: DocumentPlan) {
        let offset = self.images.len();
        self.images.extend(other.images);
        for mut page in other.pages {
            for element in &mut page.elements {
                if let PageElement::Image { source, .. } = element {
                    *source += offset;
                }
            }
            self.pages.push(page);
        }
    }

    /// All text on all pages, one element per line.
    pub fn texts(&self) -> Vec<&str> {
        self.pages.iter().flat_map(PagePlan::texts).collect()
    }
}

/// Typography and margins for planning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutSettings {
    pub font_size: f32,
    /// Baseline-to-baseline distance for body text.
    pub line_height: f32,
    pub margin: f32,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self::from_config(&ConversionConfig::default())
    }
}

impl LayoutSettings {
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            font_size: config.font_size,
            line_height: config.line_height(),
            margin: config.margin,
        }
    }

    fn line_factor(&self) -> f32 {
        self.line_height / self.font_size
    }
}

/// Lines of body text that fit on one page of `size`.
pub fn max_lines_per_page(settings: &LayoutSettings, size: PageSize) -> usize {
    let usable = size.height - 2.0 * settings.margin;
    ((usable / settings.line_height).floor() as usize)
        .saturating_sub(1)
        .max(1)
}

// ── Flow cursor ─────────────────────────────────────────────────────────────

/// Vertical cursor over a growing list of pages.
struct Flow {
    settings: LayoutSettings,
    size: PageSize,
    pages: Vec<PagePlan>,
    y: f32,
    /// Extra space kept free above the bottom margin (footers).
    bottom_reserve: f32,
}

impl Flow {
    fn new(settings: LayoutSettings, size: PageSize) -> Self {
        Self {
            settings,
            size,
            pages: vec![PagePlan::new(size)],
            y: size.height - settings.margin,
            bottom_reserve: 0.0,
        }
    }

    fn top(&self) -> f32 {
        self.size.height - self.settings.margin
    }

    fn bottom(&self) -> f32 {
        self.settings.margin + self.bottom_reserve
    }

    fn usable_width(&self) -> f32 {
        self.size.width - 2.0 * self.settings.margin
    }

    fn at_page_top(&self) -> bool {
        (self.y - self.top()).abs() < f32::EPSILON
    }

    fn new_page(&mut self) {
        self.pages.push(PagePlan::new(self.size));
        self.y = self.top();
    }

    /// Start a new page unless `height` still fits (or the page is empty).
    fn ensure(&mut self, height: f32) {
        if self.y - height < self.bottom() && !self.at_page_top() {
            self.new_page();
        }
    }

    fn push(&mut self, element: PageElement) {
        if let Some(page) = self.pages.last_mut() {
            page.elements.push(element);
        }
    }

    /// Place one line of text at the cursor and advance by `advance`.
    fn line(&mut self, x: f32, text: &str, size: f32, face: FontFace, color: Rgb, advance: f32) {
        self.ensure(advance.max(size));
        if !text.is_empty() {
            let y = self.y - size;
            self.push(PageElement::Text {
                x,
                y,
                text: text.to_string(),
                size,
                face,
                color,
            });
        }
        self.y -= advance;
    }

    fn gap(&mut self, height: f32) {
        if !self.at_page_top() {
            self.y -= height;
        }
    }

    fn finish(self) -> Vec<PagePlan> {
        self.pages
    }
}

// ── Plain text ──────────────────────────────────────────────────────────────

/// Paginate plain text on A4 portrait.
///
/// Lines are wrapped to the usable width; each page holds at most
/// [`max_lines_per_page`] lines. Blank lines take a line slot.
pub fn plan_text(text: &str, settings: &LayoutSettings) -> DocumentPlan {
    let size = PageSize::a4(Orientation::Portrait);
    let text = if text.trim().is_empty() {
        NO_EXTRACTED_TEXT
    } else {
        text
    };
    let width = size.width - 2.0 * settings.margin;
    let lines: Vec<String> = text
        .split('\n')
        .flat_map(|l| wrap_text(l.trim_end_matches('\r'), FontFace::Regular, settings.font_size, width))
        .collect();

    let per_page = max_lines_per_page(settings, size);
    let top = size.height - settings.margin;
    let pages = lines
        .chunks(per_page)
        .map(|chunk| {
            let mut page = PagePlan::new(size);
            for (i, line) in chunk.iter().enumerate() {
                if line.is_empty() {
                    continue;
                }
                page.elements.push(PageElement::Text {
                    x: settings.margin,
                    y: top - settings.font_size - i as f32 * settings.line_height,
                    text: line.clone(),
                    size: settings.font_size,
                    face: FontFace::Regular,
                    color: Rgb::BLACK,
                });
            }
            page
        })
        .collect();
    DocumentPlan {
        pages,
        images: Vec::new(),
    }
}

// ── Tables ──────────────────────────────────────────────────────────────────

/// Lay sheets out as tables on A4 portrait.
///
/// Each sheet starts on a new page under a `Sheet: <name>` heading. The
/// first non-blank row is the header (red fill, white bold text) and is
/// repeated at the top of every continuation page; body rows alternate a
/// light band. Blank rows are skipped. `nameplate`, when given, is printed
/// as `File: <name>` above the first sheet.
pub fn plan_tables(sheets: &[Sheet], settings: &LayoutSettings, nameplate: Option<&str>) -> DocumentPlan {
    let size = PageSize::a4(Orientation::Portrait);
    let mut flow = Flow::new(*settings, size);
    let heading_size = settings.font_size + 3.0;

    if let Some(name) = nameplate {
        let plate_size = settings.font_size + 5.0;
        flow.line(settings.margin, &format!("File: {name}"), plate_size, FontFace::Bold, Rgb::BLACK, plate_size * settings.line_factor());
        flow.gap(settings.line_height);
    }

    if sheets.is_empty() {
        flow.line(settings.margin, NO_EXTRACTED_TEXT, settings.font_size, FontFace::Regular, Rgb::BLACK, settings.line_height);
    }

    let table = TableStyle::new(settings);
    for (i, sheet) in sheets.iter().enumerate() {
        if i > 0 {
            flow.new_page();
        }
        flow.line(
            settings.margin,
            &format!("Sheet: {}", sheet.name),
            heading_size,
            FontFace::Bold,
            Rgb::BLACK,
            heading_size * settings.line_factor(),
        );
        flow.gap(CELL_PADDING);

        let mut rows: Grid = sheet.rows.iter().filter(|r| !is_blank_row(r)).cloned().collect();
        if rows.is_empty() {
            flow.line(settings.margin, NO_EXTRACTED_TEXT, settings.font_size, FontFace::Regular, Rgb::BLACK, settings.line_height);
            continue;
        }
        let columns = rectangularize(&mut rows);
        let column_width = flow.usable_width() / columns as f32;

        let header = table.header_row(&rows[0], column_width, (flow.top() - flow.bottom()) / 2.0, &sheet.name);
        table.draw_row(&mut flow, &header, column_width, RowFill::Header);

        for (n, row) in rows[1..].iter().enumerate() {
            let fill = if n % 2 == 1 { RowFill::Band } else { RowFill::None };
            let mut pending = table.wrap_row(row, column_width, FontFace::Regular);
            loop {
                let needed = table.row_height(pending.line_count());
                let room = flow.y - flow.bottom();
                let fresh_room = flow.top() - flow.bottom() - header.height;
                if needed > room && (needed <= fresh_room || room < table.row_height(1)) {
                    flow.new_page();
                    table.draw_row(&mut flow, &header, column_width, RowFill::Header);
                }
                let part = table.take_lines(&mut pending, flow.y - flow.bottom());
                table.draw_row(&mut flow, &part, column_width, fill);
                if pending.is_done() {
                    break;
                }
                debug!("Sheet '{}' row {} continues on the next page", sheet.name, n + 2);
                flow.new_page();
                table.draw_row(&mut flow, &header, column_width, RowFill::Header);
            }
        }
    }

    DocumentPlan {
        pages: flow.finish(),
        images: Vec::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowFill {
    Header,
    Band,
    None,
}

struct TableStyle {
    font_size: f32,
    line_height: f32,
}

struct WrappedRow {
    cells: Vec<VecDeque<String>>,
    face: FontFace,
}

impl WrappedRow {
    fn line_count(&self) -> usize {
        self.cells.iter().map(|c| c.len()).max().unwrap_or(0)
    }

    fn is_done(&self) -> bool {
        self.cells.iter().all(|c| c.is_empty())
    }
}

struct RowLayout {
    cells: Vec<Vec<String>>,
    height: f32,
    face: FontFace,
}

impl TableStyle {
    fn new(settings: &LayoutSettings) -> Self {
        let font_size = (settings.font_size - 2.0).max(6.0);
        Self {
            font_size,
            line_height: font_size * settings.line_factor(),
        }
    }

    fn row_height(&self, lines: usize) -> f32 {
        lines.max(1) as f32 * self.line_height + 2.0 * CELL_PADDING
    }

    /// Wrap each cell to the column width.
    fn wrap_row(&self, row: &[String], column_width: f32, face: FontFace) -> WrappedRow {
        let inner = (column_width - 2.0 * CELL_PADDING).max(self.font_size);
        WrappedRow {
            cells: row
                .iter()
                .map(|cell| VecDeque::from(wrap_text(cell.trim(), face, self.font_size, inner)))
                .collect(),
            face,
        }
    }

    /// Take the lines that fit in `max_height` (at least one per cell).
    /// Whatever does not fit stays in `row`.
    fn take_lines(&self, row: &mut WrappedRow, max_height: f32) -> RowLayout {
        let max_lines = (((max_height - 2.0 * CELL_PADDING) / self.line_height).floor() as usize).max(1);
        let cells: Vec<Vec<String>> = row
            .cells
            .iter_mut()
            .map(|lines| {
                let n = lines.len().min(max_lines);
                lines.drain(..n).collect()
            })
            .collect();
        let lines = cells.iter().map(Vec::len).max().unwrap_or(1);
        RowLayout {
            height: self.row_height(lines),
            cells,
            face: row.face,
        }
    }

    /// The header row, repeated on every page, so it cannot continue.
    /// Header text taller than `max_height` is cut and marked with `…`.
    fn header_row(&self, row: &[String], column_width: f32, max_height: f32, sheet: &str) -> RowLayout {
        let mut wrapped = self.wrap_row(row, column_width, FontFace::Bold);
        let mut layout = self.take_lines(&mut wrapped, max_height);
        if !wrapped.is_done() {
            warn!("Sheet '{}': header text cut to fit the page", sheet);
            for (cell, rest) in layout.cells.iter_mut().zip(&wrapped.cells) {
                if let (Some(last), false) = (cell.last_mut(), rest.is_empty()) {
                    last.push('…');
                }
            }
        }
        layout
    }

    fn draw_row(&self, flow: &mut Flow, row: &RowLayout, column_width: f32, fill: RowFill) {
        let left = flow.settings.margin;
        let width = column_width * row.cells.len() as f32;
        let fill_color = match fill {
            RowFill::Header => Some(Rgb::HEADER),
            RowFill::Band => Some(Rgb::BAND),
            RowFill::None => None,
        };
        if let Some(color) = fill_color {
            flow.push(PageElement::Rect {
                x: left,
                y: flow.y - row.height,
                width,
                height: row.height,
                fill: color,
            });
        }
        let text_color = if fill == RowFill::Header { Rgb::WHITE } else { Rgb::BLACK };
        for (c, lines) in row.cells.iter().enumerate() {
            let x = left + c as f32 * column_width + CELL_PADDING;
            for (l, line) in lines.iter().enumerate() {
                if line.is_empty() {
                    continue;
                }
                flow.push(PageElement::Text {
                    x,
                    y: flow.y - CELL_PADDING - self.font_size - l as f32 * self.line_height,
                    text: line.clone(),
                    size: self.font_size,
                    face: row.face,
                    color: text_color,
                });
            }
        }
        flow.y -= row.height;
    }
}

// ── Styled flow ─────────────────────────────────────────────────────────────

fn heading_scale(level: u8) -> f32 {
    match level {
        1 => 1.8,
        2 => 1.5,
        3 => 1.3,
        _ => 1.1,
    }
}

struct Token {
    text: String,
    face: FontFace,
    space_before: bool,
}

/// Lay out styled lines (headings, paragraphs, list items, table rows).
///
/// Headings are bold and scaled by level; list items are indented by
/// nesting depth; a page-break line starts a new page.
pub fn plan_flow(lines: &[StyledLine], settings: &LayoutSettings) -> DocumentPlan {
    let size = PageSize::a4(Orientation::Portrait);
    if lines.iter().all(|l| l.text().trim().is_empty()) {
        return plan_text("", settings);
    }

    let mut flow = Flow::new(*settings, size);
    for line in lines {
        let (font_size, heading) = match line.kind {
            LineKind::PageBreak => {
                if !flow.at_page_top() {
                    flow.new_page();
                }
                continue;
            }
            LineKind::Heading(level) => (settings.font_size * heading_scale(level), true),
            _ => (settings.font_size, false),
        };
        if heading {
            flow.gap(settings.line_height * 0.5);
        }

        let indent = line.depth as f32 * LIST_INDENT;
        let x0 = settings.margin + indent;
        let width = (flow.usable_width() - indent).max(font_size);
        let advance = font_size * settings.line_factor();

        let tokens = tokenize(line, heading);
        if tokens.is_empty() {
            flow.line(x0, "", font_size, FontFace::Regular, Rgb::BLACK, advance);
            continue;
        }
        for visual in break_tokens(&tokens, font_size, width) {
            flow.ensure(advance);
            let baseline = flow.y - font_size;
            for (offset, text, face) in visual {
                flow.push(PageElement::Text {
                    x: x0 + offset,
                    y: baseline,
                    text,
                    size: font_size,
                    face,
                    color: Rgb::BLACK,
                });
            }
            flow.y -= advance;
        }
    }

    DocumentPlan {
        pages: flow.finish(),
        images: Vec::new(),
    }
}

fn tokenize(line: &StyledLine, heading: bool) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut pending_space = false;
    for run in &line.runs {
        let face = FontFace::from_style(run.bold || heading, run.italic);
        for (i, piece) in run.text.split(' ').enumerate() {
            if i > 0 {
                pending_space = true;
            }
            if piece.is_empty() {
                continue;
            }
            tokens.push(Token {
                text: piece.to_string(),
                face,
                space_before: pending_space && !tokens.is_empty(),
            });
            pending_space = false;
        }
    }
    tokens
}

type Fragment = (f32, String, FontFace);

/// Greedy line breaking over styled tokens. Each visual line is a list of
/// `(x offset, text, face)` fragments; adjacent same-face words share a fragment.
fn break_tokens(tokens: &[Token], size: f32, width: f32) -> Vec<Vec<Fragment>> {
    let mut breaker = LineBreaker {
        size,
        width,
        lines: vec![Vec::new()],
        cursor: 0.0,
    };
    for token in tokens {
        if text_width(&token.text, token.face, size) > width {
            for (i, piece) in split_to_width(&token.text, token.face, size, width).iter().enumerate() {
                breaker.place(piece, token.face, i == 0 && token.space_before);
            }
        } else {
            breaker.place(&token.text, token.face, token.space_before);
        }
    }
    let mut lines = breaker.lines;
    lines.retain(|l| !l.is_empty());
    lines
}

struct LineBreaker {
    size: f32,
    width: f32,
    lines: Vec<Vec<Fragment>>,
    cursor: f32,
}

impl LineBreaker {
    fn place(&mut self, text: &str, face: FontFace, space: bool) {
        let word_width = text_width(text, face, self.size);
        let space_width = text_width(" ", face, self.size);
        let line_is_empty = self.lines.last().map_or(true, Vec::is_empty);
        if !line_is_empty && self.cursor + space_width + word_width > self.width {
            self.lines.push(Vec::new());
            self.cursor = 0.0;
        }
        let Some(line) = self.lines.last_mut() else {
            return;
        };
        let lead = if space && !line.is_empty() { space_width } else { 0.0 };
        match line.last_mut() {
            Some((_, last_text, last_face)) if *last_face == face => {
                if lead > 0.0 {
                    last_text.push(' ');
                }
                last_text.push_str(text);
            }
            _ => line.push((self.cursor + lead, text.to_string(), face)),
        }
        self.cursor += lead + word_width;
    }
}

// ── Slides ──────────────────────────────────────────────────────────────────

/// One landscape page per slide: 24pt title, 14pt bulleted body, and a
/// `Slide N` footer. A slide without text gets [`EMPTY_SLIDE_TEXT`]. A body
/// that overflows continues on another page under `<title> (cont.)`.
pub fn plan_slides(slides: &[Slide], settings: &LayoutSettings, nameplate: Option<&str>) -> DocumentPlan {
    let size = PageSize::a4(Orientation::Landscape);
    let mut flow = Flow::new(*settings, size);
    flow.bottom_reserve = FOOTER_SIZE * 2.0;
    let factor = settings.line_factor().max(1.2);

    if let Some(name) = nameplate {
        let plate_size = settings.font_size + 3.0;
        flow.line(settings.margin, &format!("File: {name}"), plate_size, FontFace::Bold, Rgb::MUTED, plate_size * factor);
        flow.gap(settings.line_height);
    }

    if slides.is_empty() {
        flow.line(settings.margin, NO_EXTRACTED_TEXT, SLIDE_BODY_SIZE, FontFace::Regular, Rgb::BLACK, SLIDE_BODY_SIZE * factor);
    }

    for (i, slide) in slides.iter().enumerate() {
        if i > 0 {
            flow.new_page();
        }
        let first_page = flow.pages.len() - 1;
        let width = flow.usable_width();
        let title = slide.title.trim();

        let title_lines = wrap_text(title, FontFace::Bold, SLIDE_TITLE_SIZE, width);
        if !title.is_empty() {
            for line in &title_lines {
                flow.line(settings.margin, line, SLIDE_TITLE_SIZE, FontFace::Bold, Rgb::BLACK, SLIDE_TITLE_SIZE * factor);
            }
            flow.gap(SLIDE_BODY_SIZE * 0.5);
        }

        let body: Vec<&str> = slide.body.iter().map(|l| l.trim()).filter(|l| !l.is_empty()).collect();
        if slide.is_empty() {
            flow.line(settings.margin, EMPTY_SLIDE_TEXT, SLIDE_BODY_SIZE, FontFace::Italic, Rgb::MUTED, SLIDE_BODY_SIZE * factor);
        }
        let bullet_width = text_width("• ", FontFace::Regular, SLIDE_BODY_SIZE);
        for paragraph in body {
            let wrapped = wrap_text(paragraph, FontFace::Regular, SLIDE_BODY_SIZE, width - bullet_width);
            for (n, line) in wrapped.iter().enumerate() {
                let advance = SLIDE_BODY_SIZE * factor;
                let before = flow.pages.len();
                flow.ensure(advance);
                if flow.pages.len() > before && !title.is_empty() {
                    let cont = format!("{title} (cont.)");
                    flow.line(settings.margin, &cont, SLIDE_TITLE_SIZE, FontFace::Bold, Rgb::BLACK, SLIDE_TITLE_SIZE * factor);
                    flow.gap(SLIDE_BODY_SIZE * 0.5);
                }
                if n == 0 {
                    flow.line(settings.margin, "•", SLIDE_BODY_SIZE, FontFace::Regular, Rgb::BLACK, 0.0);
                }
                flow.line(settings.margin + bullet_width, line, SLIDE_BODY_SIZE, FontFace::Regular, Rgb::BLACK, advance);
            }
        }

        let footer = format!("Slide {}", slide.index);
        let footer_x = (size.width - text_width(&footer, FontFace::Regular, FOOTER_SIZE)) / 2.0;
        for page in &mut flow.pages[first_page..] {
            page.elements.push(PageElement::Text {
                x: footer_x,
                y: settings.margin * 0.5,
                text: footer.clone(),
                size: FOOTER_SIZE,
                face: FontFace::Regular,
                color: Rgb::MUTED,
            });
        }
    }

    DocumentPlan {
        pages: flow.finish(),
        images: Vec::new(),
    }
}

// ── Images ──────────────────────────────────────────────────────────────────

/// Placement `(x, y, width, height)` of a `px_width`×`px_height` image
/// centred inside the margins, shrunk to fit but never enlarged beyond its
/// natural size at 96 DPI.
pub fn fit_image(px_width: u32, px_height: u32, size: PageSize, margin: f32) -> (f32, f32, f32, f32) {
    let natural_w = px_width.max(1) as f32 * POINTS_PER_PIXEL;
    let natural_h = px_height.max(1) as f32 * POINTS_PER_PIXEL;
    let avail_w = size.width - 2.0 * margin;
    let avail_h = size.height - 2.0 * margin;
    let scale = (avail_w / natural_w).min(avail_h / natural_h).min(1.0);
    let (w, h) = (natural_w * scale, natural_h * scale);
    ((size.width - w) / 2.0, (size.height - h) / 2.0, w, h)
}

/// One portrait page showing `image` (encoded bytes) fitted to the margins.
pub fn plan_image(image: Vec<u8>, px_width: u32, px_height: u32, settings: &LayoutSettings) -> DocumentPlan {
    let size = PageSize::a4(Orientation::Portrait);
    let (x, y, width, height) = fit_image(px_width, px_height, size, settings.margin);
    let mut page = PagePlan::new(size);
    page.elements.push(PageElement::Image {
        source: 0,
        x,
        y,
        width,
        height,
    });
    DocumentPlan {
        pages: vec![page],
        images: vec![image],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::markup::{render_lines, DocNode};

    fn settings() -> LayoutSettings {
        LayoutSettings::default()
    }

    fn rects(page: &PagePlan) -> Vec<Rgb> {
        page.elements
            .iter()
            .filter_map(|e| match e {
                PageElement::Rect { fill, .. } => Some(*fill),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn pagination_boundary() {
        let s = settings();
        let per_page = max_lines_per_page(&s, PageSize::a4(Orientation::Portrait));
        let text = (1..=per_page + 1).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let plan = plan_text(&text, &s);
        assert_eq!(plan.page_count(), 2);
        assert_eq!(plan.pages[0].texts().len(), per_page);
        assert_eq!(plan.pages[1].texts(), vec![format!("line {}", per_page + 1)]);
    }

    #[test]
    fn max_lines_matches_formula() {
        let s = LayoutSettings {
            font_size: 10.0,
            line_height: 12.0,
            margin: 40.0,
        };
        let size = PageSize::a4(Orientation::Portrait);
        let expected = ((size.height - 80.0) / 12.0).floor() as usize - 1;
        assert_eq!(max_lines_per_page(&s, size), expected);
    }

    #[test]
    fn text_stays_inside_margins() {
        let s = settings();
        let plan = plan_text(&"word ".repeat(2000), &s);
        for page in &plan.pages {
            for e in &page.elements {
                if let PageElement::Text { x, y, text, size, face, .. } = e {
                    assert!(*y >= s.margin);
                    assert!(x + text_width(text, *face, *size) <= A4_WIDTH - s.margin + 0.01);
                }
            }
        }
    }

    #[test]
    fn empty_text_gets_placeholder_page() {
        let plan = plan_text("  \n ", &settings());
        assert_eq!(plan.page_count(), 1);
        assert_eq!(plan.texts(), vec![NO_EXTRACTED_TEXT]);
    }

    #[test]
    fn table_header_is_red_and_repeated() {
        let mut rows = vec![vec!["Name".to_string(), "Value".to_string()]];
        for i in 0..200 {
            rows.push(vec![format!("item {i}"), i.to_string()]);
        }
        let plan = plan_tables(&[Sheet::new("Data", rows)], &settings(), None);
        assert!(plan.page_count() > 1);
        for page in &plan.pages {
            assert_eq!(rects(page)[0], Rgb::HEADER);
            assert!(page.texts().contains(&"Name"));
        }
        assert_eq!(plan.pages[0].texts()[0], "Sheet: Data");
        assert!(rects(&plan.pages[0]).contains(&Rgb::BAND));
    }

    #[test]
    fn oversized_cells_continue_on_the_next_page() {
        let long = (0..6000).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let rows = vec![
            vec!["Key".to_string(), "Notes".to_string()],
            vec!["a".to_string(), long],
            vec!["b".to_string(), "after".to_string()],
        ];
        let s = settings();
        let plan = plan_tables(&[Sheet::new("Big", rows)], &s, None);
        assert!(plan.page_count() > 1);

        let words: Vec<&str> = plan
            .texts()
            .into_iter()
            .flat_map(|t| t.split_whitespace())
            .filter(|w| w.starts_with('w'))
            .collect();
        assert_eq!(words.len(), 6000);
        assert_eq!(words.first(), Some(&"w0"));
        assert_eq!(words.last(), Some(&"w5999"));

        for page in &plan.pages {
            assert!(page.texts().contains(&"Notes"));
            for e in &page.elements {
                if let PageElement::Text { y, .. } = e {
                    assert!(*y >= s.margin);
                }
            }
        }
        assert!(plan.pages.last().unwrap().texts().contains(&"after"));
    }

    #[test]
    fn each_sheet_starts_a_page_and_blank_rows_are_skipped() {
        let a = Sheet::new("A", vec![vec!["h".into()], vec!["".into()], vec!["x".into()]]);
        let b = Sheet::new("B", vec![]);
        let plan = plan_tables(&[a, b], &settings(), Some("book.xlsx"));
        assert_eq!(plan.page_count(), 2);
        assert_eq!(plan.pages[0].texts(), vec!["File: book.xlsx", "Sheet: A", "h", "x"]);
        assert_eq!(plan.pages[1].texts(), vec!["Sheet: B", NO_EXTRACTED_TEXT]);
    }

    #[test]
    fn flow_headings_are_bold_and_breaks_split_pages() {
        let nodes = vec![
            DocNode::heading(1, "Title"),
            DocNode::paragraph("body"),
            DocNode::PageBreak,
            DocNode::paragraph("next"),
        ];
        let plan = plan_flow(&render_lines(&nodes), &settings());
        assert_eq!(plan.page_count(), 2);
        match &plan.pages[0].elements[0] {
            PageElement::Text { text, face, size, .. } => {
                assert_eq!(text, "Title");
                assert_eq!(*face, FontFace::Bold);
                assert!(*size > settings().font_size);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(plan.pages[1].texts(), vec!["next"]);
    }

    #[test]
    fn flow_keeps_styles_on_one_line() {
        let nodes = vec![DocNode::Paragraph(vec![
            DocNode::text("plain "),
            DocNode::Strong(vec![DocNode::text("bold")]),
            DocNode::text(" tail"),
        ])];
        let plan = plan_flow(&render_lines(&nodes), &settings());
        assert_eq!(plan.texts(), vec!["plain", "bold", "tail"]);
        let ys: Vec<f32> = plan.pages[0]
            .elements
            .iter()
            .filter_map(|e| match e {
                PageElement::Text { y, .. } => Some(*y),
                _ => None,
            })
            .collect();
        assert!(ys.windows(2).all(|w| (w[0] - w[1]).abs() < f32::EPSILON));
    }

    #[test]
    fn slides_are_landscape_with_footers() {
        let slides = vec![
            Slide {
                index: 1,
                title: "Intro".into(),
                body: vec!["point".into()],
            },
            Slide {
                index: 2,
                title: String::new(),
                body: vec![],
            },
        ];
        let plan = plan_slides(&slides, &settings(), None);
        assert_eq!(plan.page_count(), 2);
        assert!(plan.pages[0].size.width > plan.pages[0].size.height);
        assert!(plan.pages[0].texts().contains(&"Slide 1"));
        assert!(plan.pages[1].texts().contains(&EMPTY_SLIDE_TEXT));
        assert!(plan.pages[1].texts().contains(&"Slide 2"));
    }

    #[test]
    fn long_slide_body_continues() {
        let slides = vec![Slide {
            index: 1,
            title: "Agenda".into(),
            body: (0..80).map(|i| format!("topic {i}")).collect(),
        }];
        let plan = plan_slides(&slides, &settings(), None);
        assert!(plan.page_count() > 1);
        assert!(plan.pages[1].texts().contains(&"Agenda (cont.)"));
        assert!(plan.pages[1].texts().contains(&"Slide 1"));
    }

    #[test]
    fn images_are_fitted_and_centred() {
        let size = PageSize::a4(Orientation::Portrait);
        let (x, y, w, h) = fit_image(4000, 2000, size, 40.0);
        assert!((w - (A4_WIDTH - 80.0)).abs() < 0.01);
        assert!((h - w / 2.0).abs() < 0.01);
        assert!((x - 40.0).abs() < 0.01);
        assert!((y + h / 2.0 - A4_HEIGHT / 2.0).abs() < 0.01);

        let (_, _, w, h) = fit_image(100, 50, size, 40.0);
        assert_eq!((w, h), (75.0, 37.5));
    }

    #[test]
    fn append_reindexes_images() {
        let mut a = plan_image(vec![1], 10, 10, &settings());
        a.append(plan_image(vec![2], 10, 10, &settings()));
        assert_eq!(a.images, vec![vec![1], vec![2]]);
        assert!(matches!(a.pages[1].elements[0], PageElement::Image { source: 1, .. }));
    }
}
