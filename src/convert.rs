//! Conversion entry points and the route bodies behind the registry.
//!
//! ## Layout
//!
//! Each target has one *content builder* that turns any source into the
//! target's intermediate form (node tree, sheets, slide specs, page plan,
//! page images or text) and one thin encoder on top. Route bodies are the
//! composition of the two. [`crate::merge`] reuses the builders so a merged
//! output is built from exactly the same content as a single conversion.
//!
//! Image sources need OCR for every target except PDF (where the image is
//! embedded as-is). The OCR text is fetched by the async caller under the
//! server deadline and handed to the builder, which stays synchronous.
//!
//! ## Why spawn_blocking?
//!
//! Every body does CPU-bound work (zip/XML encoding, pdfium calls), so it
//! runs on the blocking pool and never stalls the Tokio workers.

use crate::config::ConversionConfig;
use crate::error::DocMatrixError;
use crate::format::{extension_of, DocumentFormat, SourceDocument, SourceFormat, TargetFormat};
use crate::formats::grid::{max_columns, parse_text_to_grid};
use crate::formats::markup::{parse_markdown, render_lines, text_to_nodes, DocNode};
use crate::formats::{slides_to_text, ExtractedContent, Sheet, Slide, NO_EXTRACTED_TEXT, NO_TEXT_FOUND};
use crate::output::ConversionResult;
use crate::pipeline::encode::{encode_png, image_dimensions};
use crate::pipeline::ocr::{self, OcrRequest};
use crate::pipeline::postprocess::{fix_common_ocr_errors, validate_table};
use crate::pipeline::{input, render};
use crate::readers;
use crate::registry::{ConversionRegistry, Route};
use crate::writers::layout::{
    plan_flow, plan_image, plan_slides, plan_tables, plan_text, DocumentPlan, LayoutSettings,
    EMPTY_SLIDE_TEXT,
};
use crate::writers::ppt::{deck_slides, table_slides, text_slides, SlideSpec};
use crate::writers::{excel, pdf, ppt, word};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

static STANDARD_REGISTRY: Lazy<ConversionRegistry> = Lazy::new(ConversionRegistry::standard);

// ── Public entry points ──────────────────────────────────────────────────────

/// Convert one document to `target` using the built-in routes.
///
/// # Errors
/// - [`DocMatrixError::UnsupportedConversion`] when no route exists
///   (same-format pairs, for instance)
/// - extraction / encoding errors of the route body
/// - OCR errors (including [`DocMatrixError::OcrTimeout`]) for image sources
pub async fn convert(
    doc: SourceDocument,
    target: TargetFormat,
    config: &ConversionConfig,
) -> Result<ConversionResult, DocMatrixError> {
    convert_with(&STANDARD_REGISTRY, doc, target, config).await
}

/// Convert one document using routes from `registry`.
pub async fn convert_with(
    registry: &ConversionRegistry,
    doc: SourceDocument,
    target: TargetFormat,
    config: &ConversionConfig,
) -> Result<ConversionResult, DocMatrixError> {
    let route = registry.route(doc.format, target)?;
    run_route(route, doc, target, config).await
}

/// Execute one route: OCR first when server-bound, then the body on the
/// blocking pool.
pub async fn run_route(
    route: Route,
    doc: SourceDocument,
    target: TargetFormat,
    config: &ConversionConfig,
) -> Result<ConversionResult, DocMatrixError> {
    let start = Instant::now();
    info!("Converting '{}' ({} → {})", doc.name, doc.format, target);

    let owned_config = config.clone();
    let result = match route {
        Route::Local(body) => {
            tokio::task::spawn_blocking(move || body(&doc, &owned_config))
                .await
                .map_err(join_error)??
        }
        Route::Ocr(body) => {
            let text = recognize(&doc, config).await?;
            tokio::task::spawn_blocking(move || body(&doc, text, &owned_config))
                .await
                .map_err(join_error)??
        }
    };

    info!(
        "Converted → '{}' ({} bytes) in {}ms",
        result.filename(),
        result.byte_len(),
        start.elapsed().as_millis()
    );
    Ok(result)
}

/// Resolve a path or URL, then convert it.
pub async fn convert_input(
    input_str: impl AsRef<str>,
    target: TargetFormat,
    config: &ConversionConfig,
) -> Result<ConversionResult, DocMatrixError> {
    let doc = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    convert(doc, target, config).await
}

/// Convert and write the result to disk; returns the files written.
///
/// Text and document results are written to `output_path`. Image sets
/// treat `output_path` as a directory and write one PNG per page into it.
/// Every file is written to a temporary sibling first and then renamed.
pub async fn convert_to_path(
    doc: SourceDocument,
    target: TargetFormat,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<Vec<PathBuf>, DocMatrixError> {
    let result = convert(doc, target, config).await?;
    write_result(&result, output_path.as_ref()).await
}

/// Write a result to disk atomically; see [`convert_to_path`].
pub async fn write_result(
    result: &ConversionResult,
    path: &Path,
) -> Result<Vec<PathBuf>, DocMatrixError> {
    match result {
        ConversionResult::Text(t) => {
            write_atomic(path, t.text.as_bytes()).await?;
            Ok(vec![path.to_path_buf()])
        }
        ConversionResult::Document(doc) => {
            write_atomic(path, &doc.bytes).await?;
            Ok(vec![path.to_path_buf()])
        }
        ConversionResult::Images(set) => {
            let mut written = Vec::with_capacity(set.images.len());
            for image in &set.images {
                let target = path.join(&image.filename);
                write_atomic(&target, &image.bytes).await?;
                written.push(target);
            }
            Ok(written)
        }
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DocMatrixError> {
    let path = path.to_path_buf();
    let bytes = bytes.to_vec();
    tokio::task::spawn_blocking(move || persist_atomic(&path, &bytes))
        .await
        .map_err(join_error)?
}

/// Write into a temp file in the destination directory, then rename it.
fn persist_atomic(path: &Path, bytes: &[u8]) -> Result<(), DocMatrixError> {
    let fail = |e: std::io::Error| DocMatrixError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(fail)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(fail)?;
    tmp.write_all(bytes).map_err(fail)?;
    tmp.persist(path).map_err(|e| fail(e.error))?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    doc: SourceDocument,
    target: TargetFormat,
    config: &ConversionConfig,
) -> Result<ConversionResult, DocMatrixError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocMatrixError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(convert(doc, target, config))
}

fn join_error(e: tokio::task::JoinError) -> DocMatrixError {
    DocMatrixError::Internal(format!("Conversion task panicked: {e}"))
}

// ── Inspection ───────────────────────────────────────────────────────────────

/// Summary of a source document without converting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub name: String,
    pub format: SourceFormat,
    pub size_bytes: usize,
    /// Pages, sheets, slides, blocks or lines depending on the format.
    pub units: usize,
    pub unit: String,
    /// Pixel size, images only.
    pub dimensions: Option<(u32, u32)>,
}

/// Detect the structure of a document. Blocking (pdfium for PDFs).
pub fn inspect(doc: &SourceDocument) -> Result<DocumentInfo, DocMatrixError> {
    let (units, unit, dimensions) = match doc.format {
        SourceFormat::Pdf => (render::page_count_blocking(&doc.name, &doc.bytes)?, "pages", None),
        SourceFormat::Excel => (readers::excel::extract_sheets(doc)?.len(), "sheets", None),
        SourceFormat::Ppt => (readers::ppt::extract_slides(doc)?.len(), "slides", None),
        SourceFormat::Word => (
            readers::word::parse_docx(&doc.name, &doc.bytes)?.block_count(),
            "blocks",
            None,
        ),
        SourceFormat::Text => (
            readers::text::extract_text(doc).lines().count(),
            "lines",
            None,
        ),
        SourceFormat::Image => {
            let dims = image_dimensions(&doc.bytes)
                .map_err(|e| DocMatrixError::extraction(&doc.name, SourceFormat::Image, e))?;
            (1, "images", Some(dims))
        }
    };
    Ok(DocumentInfo {
        name: doc.name.clone(),
        format: doc.format,
        size_bytes: doc.bytes.len(),
        units,
        unit: unit.to_string(),
        dimensions,
    })
}

/// Resolve a path or URL and inspect it on the blocking pool.
pub async fn inspect_input(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<DocumentInfo, DocMatrixError> {
    let doc = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    tokio::task::spawn_blocking(move || inspect(&doc))
        .await
        .map_err(join_error)?
}

// ── OCR step ─────────────────────────────────────────────────────────────────

/// Recognise the text of an image source under the server deadline.
pub(crate) async fn recognize(
    doc: &SourceDocument,
    config: &ConversionConfig,
) -> Result<String, DocMatrixError> {
    let request = OcrRequest::new(&doc.name, image_mime(doc), doc.bytes.clone());
    ocr::extract_text(request, config).await
}

fn image_mime(doc: &SourceDocument) -> String {
    if let Some(mime) = doc.mime.as_deref().filter(|m| m.starts_with("image/")) {
        return mime.to_string();
    }
    let mime = match extension_of(&doc.name).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => "image/png",
    };
    mime.to_string()
}

fn require_ocr<'a>(doc: &SourceDocument, ocr: Option<&'a str>) -> Result<&'a str, DocMatrixError> {
    ocr.ok_or_else(|| {
        DocMatrixError::Internal(format!("'{}' is an image but no OCR text was supplied", doc.name))
    })
}

// ── Route table ──────────────────────────────────────────────────────────────

/// Every built-in route, one per advertised tool.
pub(crate) fn standard_routes() -> Vec<(SourceFormat, TargetFormat, Route)> {
    use SourceFormat as S;
    use TargetFormat as T;
    vec![
        (S::Image, T::Pdf, Route::Local(to_pdf)),
        (S::Text, T::Pdf, Route::Local(to_pdf)),
        (S::Excel, T::Pdf, Route::Local(to_pdf)),
        (S::Word, T::Pdf, Route::Local(to_pdf)),
        (S::Ppt, T::Pdf, Route::Local(to_pdf)),
        (S::Pdf, T::Word, Route::Local(to_word)),
        (S::Image, T::Word, Route::Ocr(ocr_to_word)),
        (S::Text, T::Word, Route::Local(to_word)),
        (S::Excel, T::Word, Route::Local(to_word)),
        (S::Ppt, T::Word, Route::Local(to_word)),
        (S::Pdf, T::Image, Route::Local(to_image)),
        (S::Word, T::Image, Route::Local(to_image)),
        (S::Text, T::Image, Route::Local(to_image)),
        (S::Excel, T::Image, Route::Local(to_image)),
        (S::Ppt, T::Image, Route::Local(to_image)),
        (S::Pdf, T::Excel, Route::Local(to_excel)),
        (S::Word, T::Excel, Route::Local(to_excel)),
        (S::Text, T::Excel, Route::Local(to_excel)),
        (S::Image, T::Excel, Route::Ocr(ocr_to_excel)),
        (S::Ppt, T::Excel, Route::Local(to_excel)),
        (S::Pdf, T::Ppt, Route::Local(to_ppt)),
        (S::Word, T::Ppt, Route::Local(to_ppt)),
        (S::Image, T::Ppt, Route::Ocr(ocr_to_ppt)),
        (S::Text, T::Ppt, Route::Local(to_ppt)),
        (S::Excel, T::Ppt, Route::Local(to_ppt)),
        (S::Image, T::Text, Route::Ocr(ocr_to_text)),
        (S::Pdf, T::Text, Route::Local(to_text)),
        (S::Excel, T::Text, Route::Local(to_text)),
        (S::Ppt, T::Text, Route::Local(to_text)),
        (S::Word, T::Text, Route::Local(to_text)),
    ]
}

fn to_pdf(doc: &SourceDocument, config: &ConversionConfig) -> Result<ConversionResult, DocMatrixError> {
    let bytes = pdf_bytes(doc, config)?;
    Ok(ConversionResult::document(DocumentFormat::Pdf, &doc.basename(), bytes))
}

fn to_word(doc: &SourceDocument, _config: &ConversionConfig) -> Result<ConversionResult, DocMatrixError> {
    encode_word(doc, word_nodes(doc, None)?)
}

fn ocr_to_word(
    doc: &SourceDocument,
    text: String,
    _config: &ConversionConfig,
) -> Result<ConversionResult, DocMatrixError> {
    encode_word(doc, word_nodes(doc, Some(&text))?)
}

fn encode_word(doc: &SourceDocument, nodes: Vec<DocNode>) -> Result<ConversionResult, DocMatrixError> {
    let bytes = word::write_docx(&nodes)?;
    Ok(ConversionResult::document(DocumentFormat::Docx, &doc.basename(), bytes))
}

fn to_excel(doc: &SourceDocument, config: &ConversionConfig) -> Result<ConversionResult, DocMatrixError> {
    encode_excel(doc, excel_sheets(doc, None, config)?)
}

fn ocr_to_excel(
    doc: &SourceDocument,
    text: String,
    config: &ConversionConfig,
) -> Result<ConversionResult, DocMatrixError> {
    encode_excel(doc, excel_sheets(doc, Some(&text), config)?)
}

fn encode_excel(doc: &SourceDocument, sheets: Vec<Sheet>) -> Result<ConversionResult, DocMatrixError> {
    let bytes = excel::write_xlsx(&sheets)?;
    Ok(ConversionResult::document(DocumentFormat::Xlsx, &doc.basename(), bytes))
}

fn to_ppt(doc: &SourceDocument, _config: &ConversionConfig) -> Result<ConversionResult, DocMatrixError> {
    encode_ppt(doc, ppt_slides(doc, None)?)
}

fn ocr_to_ppt(
    doc: &SourceDocument,
    text: String,
    _config: &ConversionConfig,
) -> Result<ConversionResult, DocMatrixError> {
    encode_ppt(doc, ppt_slides(doc, Some(&text))?)
}

fn encode_ppt(doc: &SourceDocument, slides: Vec<SlideSpec>) -> Result<ConversionResult, DocMatrixError> {
    let bytes = ppt::write_pptx(&slides)?;
    Ok(ConversionResult::document(DocumentFormat::Pptx, &doc.basename(), bytes))
}

fn to_text(doc: &SourceDocument, _config: &ConversionConfig) -> Result<ConversionResult, DocMatrixError> {
    Ok(ConversionResult::text(&doc.basename(), plain_text(doc, None)?))
}

fn ocr_to_text(
    doc: &SourceDocument,
    text: String,
    _config: &ConversionConfig,
) -> Result<ConversionResult, DocMatrixError> {
    Ok(ConversionResult::text(&doc.basename(), plain_text(doc, Some(&text))?))
}

fn to_image(doc: &SourceDocument, config: &ConversionConfig) -> Result<ConversionResult, DocMatrixError> {
    Ok(ConversionResult::images(&doc.basename(), page_images(doc, config)?))
}

// ── Content builders ─────────────────────────────────────────────────────────

/// The natural intermediate form of a non-image, non-slide source.
///
/// PDFs yield per-page text, Word documents a node tree, workbooks their
/// sheets. Presentations are flattened to slide text here; builders that
/// keep slide structure read the slides directly.
pub fn extract(doc: &SourceDocument) -> Result<ExtractedContent, DocMatrixError> {
    let content = match doc.format {
        SourceFormat::Text => ExtractedContent::text(readers::text::extract_text(doc)),
        SourceFormat::Pdf => {
            let pages = readers::pdf::read_pages(&doc.name, &doc.bytes)?;
            let text = readers::pdf::pages_to_text(&pages);
            let pages = if pages.iter().all(|p| p.text.trim().is_empty()) {
                Vec::new()
            } else {
                pages.into_iter().map(|p| p.text.trim().to_string()).collect()
            };
            ExtractedContent::PlainText { text, pages }
        }
        SourceFormat::Word => ExtractedContent::StructuredMarkup(readers::word::extract_markup(doc)?),
        SourceFormat::Excel => ExtractedContent::Grid(readers::excel::extract_sheets(doc)?),
        SourceFormat::Ppt => ExtractedContent::text(slides_to_text(&readers::ppt::extract_slides(doc)?)),
        SourceFormat::Image => {
            return Err(DocMatrixError::extraction(
                &doc.name,
                SourceFormat::Image,
                "image content is only available through OCR",
            ))
        }
    };
    debug!("'{}': extracted {} content", doc.name, shape_name(&content));
    Ok(content)
}

fn shape_name(content: &ExtractedContent) -> &'static str {
    match content {
        ExtractedContent::PlainText { .. } => "plain-text",
        ExtractedContent::Grid(_) => "grid",
        ExtractedContent::StructuredMarkup(_) => "markup",
    }
}

/// Plain text of a source; `"(No text found)"` when there is none.
pub(crate) fn plain_text(
    doc: &SourceDocument,
    ocr: Option<&str>,
) -> Result<String, DocMatrixError> {
    let content = match doc.format {
        SourceFormat::Image => ExtractedContent::text(require_ocr(doc, ocr)?),
        SourceFormat::Word => ExtractedContent::text(readers::word::extract_text(doc)?),
        _ => extract(doc)?,
    };
    if content.is_empty() {
        Ok(NO_TEXT_FOUND.to_string())
    } else {
        Ok(content.to_plain_text())
    }
}

/// Node tree of a source for the Word encoder.
pub(crate) fn word_nodes(
    doc: &SourceDocument,
    ocr: Option<&str>,
) -> Result<Vec<DocNode>, DocMatrixError> {
    match doc.format {
        SourceFormat::Image => Ok(parse_markdown(require_ocr(doc, ocr)?)),
        SourceFormat::Ppt => Ok(slide_nodes(&readers::ppt::extract_slides(doc)?)),
        _ => Ok(content_nodes(extract(doc)?)),
    }
}

fn content_nodes(content: ExtractedContent) -> Vec<DocNode> {
    match content {
        ExtractedContent::PlainText { text, pages } if pages.is_empty() => text_to_nodes(&text),
        ExtractedContent::PlainText { pages, .. } => {
            let mut nodes = Vec::new();
            for (i, page) in pages.iter().enumerate() {
                if i > 0 {
                    nodes.push(DocNode::PageBreak);
                }
                nodes.extend(text_to_nodes(page));
            }
            nodes
        }
        ExtractedContent::Grid(sheets) => {
            let mut nodes = Vec::new();
            for sheet in sheets {
                nodes.push(DocNode::heading(2, sheet.name.clone()));
                if sheet.is_empty() {
                    nodes.push(DocNode::paragraph(NO_EXTRACTED_TEXT));
                } else {
                    nodes.push(DocNode::Table(sheet.rows));
                }
            }
            nodes
        }
        ExtractedContent::StructuredMarkup(nodes) => nodes,
    }
}

fn slide_nodes(slides: &[Slide]) -> Vec<DocNode> {
    let mut nodes = Vec::new();
    for slide in slides {
        let title = if slide.title.trim().is_empty() {
            format!("Slide {}", slide.index)
        } else {
            slide.title.trim().to_string()
        };
        nodes.push(DocNode::heading(2, title));
        if slide.is_empty() {
            nodes.push(DocNode::paragraph(EMPTY_SLIDE_TEXT));
            continue;
        }
        nodes.extend(
            slide
                .body
                .iter()
                .filter(|l| !l.trim().is_empty())
                .map(|l| DocNode::paragraph(l.trim())),
        );
    }
    nodes
}

/// Sheets of a source for the Excel encoder; empty means "no content".
pub(crate) fn excel_sheets(
    doc: &SourceDocument,
    ocr: Option<&str>,
    config: &ConversionConfig,
) -> Result<Vec<Sheet>, DocMatrixError> {
    let sheets = match doc.format {
        SourceFormat::Excel => readers::excel::extract_sheets(doc)?,
        SourceFormat::Pdf => {
            readers::pdf::extract_sheets(doc, config.row_tolerance, config.column_tolerance)?
        }
        SourceFormat::Text => single_sheet(parse_text_to_grid(&readers::text::extract_text(doc))),
        SourceFormat::Word => single_sheet(parse_text_to_grid(&readers::word::extract_text(doc)?)),
        SourceFormat::Ppt => readers::ppt::extract_slides(doc)?
            .iter()
            .map(|slide| {
                let mut lines = vec![slide.title.clone()];
                lines.extend(slide.body.iter().cloned());
                let mut rows = parse_text_to_grid(&lines.join("\n"));
                if rows.is_empty() {
                    rows.push(vec![EMPTY_SLIDE_TEXT.to_string()]);
                }
                Sheet::new(format!("Slide {}", slide.index), rows)
            })
            .collect(),
        SourceFormat::Image => {
            let text = require_ocr(doc, ocr)?;
            let text = if config.correct_ocr_numbers {
                fix_common_ocr_errors(text)
            } else {
                text.to_string()
            };
            let grid = parse_text_to_grid(&text);
            for warning in validate_table(&grid) {
                warn!("'{}': table check: {:?}", doc.name, warning);
            }
            single_sheet(grid)
        }
    };
    debug!("'{}': {} sheets for Excel", doc.name, sheets.len());
    Ok(sheets)
}

fn single_sheet(rows: Vec<Vec<String>>) -> Vec<Sheet> {
    if rows.is_empty() {
        Vec::new()
    } else {
        vec![Sheet::new("Sheet1", rows)]
    }
}

/// Slide specs of a source for the PowerPoint encoder.
pub(crate) fn ppt_slides(
    doc: &SourceDocument,
    ocr: Option<&str>,
) -> Result<Vec<SlideSpec>, DocMatrixError> {
    let slides = match doc.format {
        SourceFormat::Text => text_or_table_slides(&readers::text::extract_text(doc)),
        SourceFormat::Image => text_or_table_slides(require_ocr(doc, ocr)?),
        SourceFormat::Excel => table_slides(&readers::excel::extract_sheets(doc)?),
        SourceFormat::Word => text_slides(&readers::word::extract_text(doc)?),
        SourceFormat::Pdf => text_slides(&plain_text(doc, None)?),
        SourceFormat::Ppt => deck_slides(&readers::ppt::extract_slides(doc)?),
    };
    debug!("'{}': {} slides for PowerPoint", doc.name, slides.len());
    Ok(slides)
}

/// Table slides when the text parses as a multi-column grid, else text slides.
fn text_or_table_slides(text: &str) -> Vec<SlideSpec> {
    let grid = parse_text_to_grid(text);
    if max_columns(&grid) >= 2 {
        table_slides(&[Sheet::new("Sheet1", grid)])
    } else {
        text_slides(text)
    }
}

/// Page plan of a non-PDF source for the PDF encoder.
///
/// `nameplate` labels table and slide layouts (used when merging).
pub(crate) fn pdf_plan(
    doc: &SourceDocument,
    config: &ConversionConfig,
    nameplate: Option<&str>,
) -> Result<DocumentPlan, DocMatrixError> {
    let settings = LayoutSettings::from_config(config);
    let plan = match doc.format {
        SourceFormat::Text => plan_text(&readers::text::extract_text(doc), &settings),
        SourceFormat::Excel => plan_tables(&readers::excel::extract_sheets(doc)?, &settings, nameplate),
        SourceFormat::Word => plan_flow(&render_lines(&readers::word::extract_markup(doc)?), &settings),
        SourceFormat::Ppt => plan_slides(&readers::ppt::extract_slides(doc)?, &settings, nameplate),
        SourceFormat::Image => {
            let (w, h) = image_dimensions(&doc.bytes)
                .map_err(|e| DocMatrixError::extraction(&doc.name, SourceFormat::Image, e))?;
            plan_image(doc.bytes.clone(), w, h, &settings)
        }
        SourceFormat::Pdf => {
            return Err(DocMatrixError::UnsupportedConversion {
                from: SourceFormat::Pdf,
                to: TargetFormat::Pdf,
            })
        }
    };
    debug!("'{}': planned {} PDF pages", doc.name, plan.page_count());
    Ok(plan)
}

/// PDF bytes of any source; PDFs pass through unchanged.
pub(crate) fn pdf_bytes(doc: &SourceDocument, config: &ConversionConfig) -> Result<Vec<u8>, DocMatrixError> {
    match doc.format {
        SourceFormat::Pdf => Ok(doc.bytes.clone()),
        _ => pdf::write_plan(&pdf_plan(doc, config, None)?),
    }
}

/// PNG page images of a source.
///
/// Non-PDF sources are laid out as PDF first and then rasterised; image
/// sources are re-encoded as a single PNG page.
pub(crate) fn page_images(doc: &SourceDocument, config: &ConversionConfig) -> Result<Vec<Vec<u8>>, DocMatrixError> {
    if doc.format == SourceFormat::Image {
        let image = image::load_from_memory(&doc.bytes)
            .map_err(|e| DocMatrixError::extraction(&doc.name, SourceFormat::Image, e))?;
        let png = encode_png(&image).map_err(|e| DocMatrixError::encoding(TargetFormat::Image, e))?;
        return Ok(vec![png]);
    }
    let bytes = pdf_bytes(doc, config)?;
    render::rasterize_pdf_blocking(&doc.name, &bytes, config.raster_scale)
}
