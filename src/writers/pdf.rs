//! PDF writer: paints [`DocumentPlan`]s with pdfium.
//!
//! All layout decisions are made by [`crate::writers::layout`]; this module
//! only turns positioned elements into pdfium page objects using the
//! built-in Helvetica family. Existing PDFs (merge inputs that already are
//! PDFs) are appended page-for-page.
//!
//! Blocking; callers run it in `spawn_blocking`.

use super::layout::{DocumentPlan, PageElement, Rgb};
use super::metrics::FontFace;
use crate::error::DocMatrixError;
use crate::format::TargetFormat;
use crate::pipeline::engine::bind_pdfium;
use pdfium_render::prelude::*;
use tracing::debug;

/// One piece of a PDF being assembled.
#[derive(Debug, Clone)]
pub enum PdfPart {
    /// Pages to paint.
    Plan(DocumentPlan),
    /// An existing PDF whose pages are copied verbatim.
    Existing { name: String, bytes: Vec<u8> },
}

struct Fonts {
    regular: PdfFontToken,
    bold: PdfFontToken,
    italic: PdfFontToken,
    bold_italic: PdfFontToken,
}

impl Fonts {
    fn load(document: &mut PdfDocument) -> Self {
        let fonts = document.fonts_mut();
        Fonts {
            regular: fonts.helvetica(),
            bold: fonts.helvetica_bold(),
            italic: fonts.helvetica_oblique(),
            bold_italic: fonts.helvetica_bold_oblique(),
        }
    }

    fn token(&self, face: FontFace) -> PdfFontToken {
        match face {
            FontFace::Regular => self.regular,
            FontFace::Bold => self.bold,
            FontFace::Italic => self.italic,
            FontFace::BoldItalic => self.bold_italic,
        }
    }
}

fn encoding_error(detail: impl std::fmt::Display) -> DocMatrixError {
    DocMatrixError::encoding(TargetFormat::Pdf, detail)
}

fn color(rgb: Rgb) -> PdfColor {
    PdfColor::new(rgb.0, rgb.1, rgb.2, 255)
}

/// Paint one plan into a new PDF.
pub fn write_plan(plan: &DocumentPlan) -> Result<Vec<u8>, DocMatrixError> {
    assemble(std::slice::from_ref(&PdfPart::Plan(plan.clone())))
}

/// Paint and concatenate parts, in order, into one PDF.
pub fn assemble(parts: &[PdfPart]) -> Result<Vec<u8>, DocMatrixError> {
    let pdfium = bind_pdfium()?;
    let mut document = pdfium
        .create_new_pdf()
        .map_err(|e| encoding_error(format!("create document: {e:?}")))?;
    let fonts = Fonts::load(&mut document);

    for part in parts {
        match part {
            PdfPart::Plan(plan) => paint(&mut document, &fonts, plan)?,
            PdfPart::Existing { name, bytes } => {
                let source = pdfium
                    .load_pdf_from_byte_slice(bytes, None)
                    .map_err(|e| encoding_error(format!("'{name}': {e:?}")))?;
                document
                    .pages_mut()
                    .append(&source)
                    .map_err(|e| encoding_error(format!("append '{name}': {e:?}")))?;
            }
        }
    }

    debug!("assembled PDF: {} parts, {} pages", parts.len(), document.pages().len());
    document
        .save_to_bytes()
        .map_err(|e| encoding_error(format!("save: {e:?}")))
}

fn paint(document: &mut PdfDocument, fonts: &Fonts, plan: &DocumentPlan) -> Result<(), DocMatrixError> {
    let images = plan
        .images
        .iter()
        .map(|bytes| image::load_from_memory(bytes).map_err(|e| encoding_error(format!("image: {e}"))))
        .collect::<Result<Vec<_>, _>>()?;

    for (index, page_plan) in plan.pages.iter().enumerate() {
        let size = PdfPagePaperSize::Custom(
            PdfPoints::new(page_plan.size.width),
            PdfPoints::new(page_plan.size.height),
        );
        let mut page = document
            .pages_mut()
            .create_page_at_end(size)
            .map_err(|e| encoding_error(format!("page {}: {e:?}", index + 1)))?;
        let objects = page.objects_mut();

        for element in &page_plan.elements {
            let result = match element {
                PageElement::Rect {
                    x,
                    y,
                    width,
                    height,
                    fill,
                } => objects
                    .create_path_object_rect(
                        PdfRect::new_from_values(*y, *x, y + height, x + width),
                        None,
                        None,
                        Some(color(*fill)),
                    )
                    .map(|_| ()),
                PageElement::Text {
                    x,
                    y,
                    text,
                    size,
                    face,
                    color: rgb,
                } => objects
                    .create_text_object(
                        PdfPoints::new(*x),
                        PdfPoints::new(*y),
                        text,
                        fonts.token(*face),
                        PdfPoints::new(*size),
                    )
                    .and_then(|mut object| {
                        if *rgb != Rgb::BLACK {
                            object.set_fill_color(color(*rgb))?;
                        }
                        Ok(())
                    }),
                PageElement::Image {
                    source,
                    x,
                    y,
                    width,
                    height,
                } => {
                    let image = images
                        .get(*source)
                        .ok_or_else(|| encoding_error(format!("missing image {source}")))?;
                    objects
                        .create_image_object(
                            PdfPoints::new(*x),
                            PdfPoints::new(*y),
                            image,
                            Some(PdfPoints::new(*width)),
                            Some(PdfPoints::new(*height)),
                        )
                        .map(|_| ())
                }
            };
            result.map_err(|e| encoding_error(format!("page {}: {e:?}", index + 1)))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::engine::pdfium_available;
    use crate::readers::pdf::read_pages;
    use crate::writers::layout::{plan_text, LayoutSettings};

    macro_rules! pdfium_or_skip {
        () => {
            if !pdfium_available() {
                eprintln!("SKIP: pdfium library not available");
                return;
            }
        };
    }

    #[test]
    fn painted_text_reads_back() {
        pdfium_or_skip!();
        let plan = plan_text("Hello PDF\nsecond line", &LayoutSettings::default());
        let bytes = write_plan(&plan).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        let pages = read_pages("out.pdf", &bytes).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].text.contains("Hello PDF"));
    }

    #[test]
    fn assemble_concatenates_existing_pages() {
        pdfium_or_skip!();
        let s = LayoutSettings::default();
        let one = write_plan(&plan_text("one", &s)).unwrap();
        let merged = assemble(&[
            PdfPart::Existing {
                name: "one.pdf".into(),
                bytes: one,
            },
            PdfPart::Plan(plan_text("two", &s)),
        ])
        .unwrap();
        let pages = read_pages("merged.pdf", &merged).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[1].text.contains("two"));
    }
}
