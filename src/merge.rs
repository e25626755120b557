//! Merge several source documents into one output of a single target.
//!
//! Each file is converted with the same content builders as a single
//! conversion, then the pieces are joined in input order:
//!
//! | Target | Join |
//! |--------|------|
//! | PDF    | pages concatenated; table/slide layouts carry a `File: <name>` nameplate |
//! | Word   | node trees concatenated, each file after the first on a new page |
//! | Excel  | one sheet per file (`File N`), workbook inputs keep their sheets |
//! | Text   | sections headed `--- <filename> ---` |
//! | PPT    | a nameplate slide, then the file's slides |
//! | Image  | page images of every file |
//!
//! A file that fails contributes an `Error processing <name>: <detail>`
//! marker in the target's own shape and the merge carries on.

use crate::archive::{merged_filename, UniqueNames};
use crate::config::ConversionConfig;
use crate::convert::{excel_sheets, page_images, pdf_plan, plain_text, ppt_slides, recognize, word_nodes};
use crate::error::DocMatrixError;
use crate::format::{DocumentFormat, SourceDocument, SourceFormat, TargetFormat};
use crate::formats::markup::DocNode;
use crate::formats::{Sheet, NO_EXTRACTED_TEXT};
use crate::output::{
    page_image_filename, BinaryDocumentResult, ConversionResult, ImageSetResult, PageImage,
    TextResult,
};
use crate::pipeline::render;
use crate::writers::layout::{plan_text, LayoutSettings};
use crate::writers::pdf::{self, PdfPart};
use crate::writers::ppt::SlideSpec;
use crate::writers::{excel, ppt, word};
use futures::future::join_all;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One file of a merge, with its OCR outcome when the target needs text.
struct MergeInput {
    doc: SourceDocument,
    ocr: Option<Result<String, DocMatrixError>>,
}

impl MergeInput {
    /// Build this file's piece, or the failure detail.
    fn build<T>(
        &self,
        build: impl FnOnce(&SourceDocument, Option<&str>) -> Result<T, DocMatrixError>,
    ) -> Result<T, String> {
        let ocr = match &self.ocr {
            None => None,
            Some(Ok(text)) => Some(text.as_str()),
            Some(Err(e)) => return Err(self.failed(e)),
        };
        build(&self.doc, ocr).map_err(|e| self.failed(&e))
    }

    fn failed(&self, error: &DocMatrixError) -> String {
        warn!("Merge: '{}' failed: {}", self.doc.name, error);
        error.to_string()
    }

    fn marker(&self, detail: &str) -> String {
        error_marker(&self.doc.name, detail)
    }
}

/// `Error processing <name>: <detail>`
pub fn error_marker(name: &str, detail: &str) -> String {
    format!("Error processing {name}: {detail}")
}

/// Merge `documents` into one `target` output named after `title`.
///
/// Image sources are recognised first (concurrently) when the target needs
/// their text; a failed recognition only affects that file.
pub async fn merge(
    title: &str,
    documents: Vec<SourceDocument>,
    target: TargetFormat,
    config: &ConversionConfig,
) -> Result<ConversionResult, DocMatrixError> {
    let start = Instant::now();
    info!("Merging {} files into {}", documents.len(), target);

    let needs_ocr = !matches!(target, TargetFormat::Pdf | TargetFormat::Image);
    let inputs = join_all(documents.into_iter().map(|doc| async move {
        let ocr = if needs_ocr && doc.format == SourceFormat::Image {
            Some(recognize(&doc, config).await)
        } else {
            None
        };
        MergeInput { doc, ocr }
    }))
    .await;

    let title = title.to_string();
    let config = config.clone();
    let result = tokio::task::spawn_blocking(move || merge_blocking(&title, &inputs, target, &config))
        .await
        .map_err(|e| DocMatrixError::Internal(format!("Merge task panicked: {e}")))??;

    info!(
        "Merged → '{}' ({} bytes) in {}ms",
        result.filename(),
        result.byte_len(),
        start.elapsed().as_millis()
    );
    Ok(result)
}

fn merge_blocking(
    title: &str,
    inputs: &[MergeInput],
    target: TargetFormat,
    config: &ConversionConfig,
) -> Result<ConversionResult, DocMatrixError> {
    match target {
        TargetFormat::Pdf => {
            let bytes = pdf::assemble(&pdf_parts(inputs, config))?;
            Ok(document(title, DocumentFormat::Pdf, bytes))
        }
        TargetFormat::Word => {
            let bytes = word::write_docx(&word_parts(inputs))?;
            Ok(document(title, DocumentFormat::Docx, bytes))
        }
        TargetFormat::Excel => {
            let bytes = excel::write_xlsx(&excel_parts(inputs, config))?;
            Ok(document(title, DocumentFormat::Xlsx, bytes))
        }
        TargetFormat::Ppt => {
            let bytes = ppt::write_pptx(&ppt_parts(inputs))?;
            Ok(document(title, DocumentFormat::Pptx, bytes))
        }
        TargetFormat::Text => Ok(ConversionResult::Text(TextResult {
            text: text_parts(inputs),
            filename: merged_filename(title, "txt"),
        })),
        TargetFormat::Image => Ok(ConversionResult::Images(ImageSetResult {
            images: image_parts(inputs, config),
        })),
    }
}

fn document(title: &str, format: DocumentFormat, bytes: Vec<u8>) -> ConversionResult {
    ConversionResult::Document(BinaryDocumentResult {
        format,
        filename: merged_filename(title, format.extension()),
        bytes,
    })
}

fn pdf_parts(inputs: &[MergeInput], config: &ConversionConfig) -> Vec<PdfPart> {
    let settings = LayoutSettings::from_config(config);
    inputs
        .iter()
        .map(|input| {
            let part = input.build(|doc, _| match doc.format {
                SourceFormat::Pdf => {
                    let pages = render::page_count_blocking(&doc.name, &doc.bytes)?;
                    debug!("Merge: '{}' contributes {} existing pages", doc.name, pages);
                    Ok(PdfPart::Existing {
                        name: doc.name.clone(),
                        bytes: doc.bytes.clone(),
                    })
                }
                SourceFormat::Excel | SourceFormat::Ppt => {
                    pdf_plan(doc, config, Some(&doc.name)).map(PdfPart::Plan)
                }
                _ => pdf_plan(doc, config, None).map(PdfPart::Plan),
            });
            part.unwrap_or_else(|detail| PdfPart::Plan(plan_text(&input.marker(&detail), &settings)))
        })
        .collect()
}

fn word_parts(inputs: &[MergeInput]) -> Vec<DocNode> {
    let mut nodes = Vec::new();
    for (i, input) in inputs.iter().enumerate() {
        if i > 0 {
            nodes.push(DocNode::PageBreak);
        }
        match input.build(word_nodes) {
            Ok(file_nodes) => nodes.extend(file_nodes),
            Err(detail) => nodes.push(DocNode::paragraph(input.marker(&detail))),
        }
    }
    nodes
}

fn excel_parts(inputs: &[MergeInput], config: &ConversionConfig) -> Vec<Sheet> {
    let mut sheets = Vec::new();
    for (i, input) in inputs.iter().enumerate() {
        let label = format!("File {}", i + 1);
        match input.build(|doc, ocr| excel_sheets(doc, ocr, config)) {
            Ok(file_sheets) if input.doc.format == SourceFormat::Excel && !file_sheets.is_empty() => {
                sheets.extend(file_sheets);
            }
            Ok(file_sheets) => {
                let mut rows: Vec<Vec<String>> = file_sheets.into_iter().flat_map(|s| s.rows).collect();
                if rows.is_empty() {
                    rows.push(vec![NO_EXTRACTED_TEXT.to_string()]);
                }
                sheets.push(Sheet::new(label, rows));
            }
            Err(detail) => sheets.push(Sheet::new(label, vec![vec![input.marker(&detail)]])),
        }
    }
    sheets
}

fn ppt_parts(inputs: &[MergeInput]) -> Vec<SlideSpec> {
    let mut slides = Vec::new();
    for input in inputs {
        slides.push(SlideSpec::text(Some(format!("File: {}", input.doc.name)), Vec::new()));
        match input.build(ppt_slides) {
            Ok(file_slides) => slides.extend(file_slides),
            Err(detail) => slides.push(SlideSpec::text(None, vec![input.marker(&detail)])),
        }
    }
    slides
}

fn text_parts(inputs: &[MergeInput]) -> String {
    inputs
        .iter()
        .map(|input| {
            let body = input
                .build(plain_text)
                .unwrap_or_else(|detail| input.marker(&detail));
            format!("--- {} ---\n{}", input.doc.name, body)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn image_parts(inputs: &[MergeInput], config: &ConversionConfig) -> Vec<PageImage> {
    let settings = LayoutSettings::from_config(config);
    let mut names = UniqueNames::new();
    let mut images = Vec::new();
    for input in inputs {
        let pages = match input.build(|doc, _| page_images(doc, config)) {
            Ok(pages) => pages,
            Err(detail) => {
                let marker_page = pdf::write_plan(&plan_text(&input.marker(&detail), &settings))
                    .and_then(|pdf| {
                        render::rasterize_pdf_blocking(&input.doc.name, &pdf, config.raster_scale)
                    });
                match marker_page {
                    Ok(pages) => pages,
                    Err(e) => {
                        warn!("Merge: no error page for '{}': {}", input.doc.name, e);
                        continue;
                    }
                }
            }
        };
        let basename = input.doc.basename();
        for (i, bytes) in pages.into_iter().enumerate() {
            images.push(PageImage {
                page: i + 1,
                filename: names.claim(&page_image_filename(&basename, i + 1)),
                bytes,
            });
        }
    }
    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers;

    fn cfg() -> ConversionConfig {
        ConversionConfig::default()
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn input(doc: SourceDocument) -> MergeInput {
        MergeInput { doc, ocr: None }
    }

    fn xlsx(name: &str, sheets: &[Sheet]) -> SourceDocument {
        SourceDocument::new(name, SourceFormat::Excel, excel::write_xlsx(sheets).unwrap())
    }

    #[test]
    fn text_sections_are_headed_by_filename() {
        let inputs = vec![
            input(SourceDocument::text("a.txt", "alpha")),
            input(xlsx("b.xlsx", &[Sheet::new("S", vec![row(&["1"])])])),
        ];
        assert_eq!(
            text_parts(&inputs),
            "--- a.txt ---\nalpha\n\n--- b.xlsx ---\n--- Sheet: S ---\n1"
        );
    }

    #[test]
    fn corrupt_file_becomes_inline_marker() {
        let inputs = vec![
            input(SourceDocument::text("a.txt", "alpha")),
            input(SourceDocument::new("bad.xlsx", SourceFormat::Excel, b"garbage".to_vec())),
        ];
        let text = text_parts(&inputs);
        assert!(text.contains("--- bad.xlsx ---\nError processing bad.xlsx: "), "got: {text}");
    }

    #[test]
    fn failed_ocr_is_isolated() {
        let inputs = vec![MergeInput {
            doc: SourceDocument::new("scan.png", SourceFormat::Image, Vec::new()),
            ocr: Some(Err(DocMatrixError::OcrTimeout {
                name: "scan.png".into(),
                secs: 30,
            })),
        }];
        let nodes = word_parts(&inputs);
        assert_eq!(
            nodes,
            vec![DocNode::paragraph(
                "Error processing scan.png: OCR timed out after 30s for 'scan.png'"
            )]
        );
    }

    #[test]
    fn excel_sheets_keep_workbook_names_and_label_others() {
        let inputs = vec![
            input(xlsx("q.xlsx", &[Sheet::new("Data", vec![row(&["x"])])])),
            input(SourceDocument::text("notes.txt", "a\tb")),
            input(xlsx("r.xlsx", &[Sheet::new("Data", vec![row(&["y"])])])),
        ];
        let sheets = excel_parts(&inputs, &cfg());
        let names: Vec<&str> = sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Data", "File 2", "Data"]);

        let bytes = excel::write_xlsx(&sheets).unwrap();
        let read = readers::excel::read_workbook("m.xlsx", &bytes).unwrap();
        let names: Vec<&str> = read.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Data", "File 2", "Data (2)"]);
    }

    #[test]
    fn word_files_after_the_first_start_on_new_page() {
        let inputs = vec![
            input(SourceDocument::text("a.txt", "one")),
            input(SourceDocument::text("b.txt", "two")),
        ];
        let nodes = word_parts(&inputs);
        assert_eq!(
            nodes,
            vec![
                DocNode::paragraph("one"),
                DocNode::PageBreak,
                DocNode::paragraph("two"),
            ]
        );
    }

    #[test]
    fn every_ppt_file_opens_with_a_nameplate() {
        let inputs = vec![
            input(SourceDocument::text("a.txt", "one")),
            input(SourceDocument::text("b.txt", "two")),
        ];
        let slides = ppt_parts(&inputs);
        assert_eq!(slides.len(), 4);
        assert_eq!(slides[0].title.as_deref(), Some("File: a.txt"));
        assert_eq!(slides[2].title.as_deref(), Some("File: b.txt"));
    }

    #[tokio::test]
    async fn merged_text_is_named_after_title() {
        let docs = vec![SourceDocument::text("a.txt", "x")];
        let result = merge("Excel to Text", docs, TargetFormat::Text, &cfg()).await.unwrap();
        assert_eq!(result.filename(), "excel_to_text_merged.txt");
    }
}
