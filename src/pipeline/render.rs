//! PDF rasterisation: render every page of a PDF to PNG via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! Everything here is blocking; callers run it inside
//! `tokio::task::spawn_blocking` (see `convert::run_route` and `merge`).
//!
//! ## Why a scale factor, not DPI?
//!
//! Pages are rendered at `raster_scale` times their point size. At the
//! default of 2.0 an A4 page comes out at roughly 1190 × 1684 px, enough for
//! crisp text without unbounded memory on large pages.

use crate::error::DocMatrixError;
use crate::format::{SourceFormat, TargetFormat};
use crate::pipeline::encode::encode_png;
use crate::pipeline::engine::bind_pdfium;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Rasterise every page of a PDF into PNG images, in page order.
pub fn rasterize_pdf_blocking(
    name: &str,
    bytes: &[u8],
    scale: f32,
) -> Result<Vec<Vec<u8>>, DocMatrixError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| DocMatrixError::extraction(name, SourceFormat::Pdf, format!("{e:?}")))?;

    let pages = document.pages();
    info!("Rasterising '{}': {} pages at {}x", name, pages.len(), scale);

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let mut results = Vec::with_capacity(pages.len() as usize);

    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            DocMatrixError::encoding(TargetFormat::Image, format!("page {}: {e:?}", idx + 1))
        })?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        let png = encode_png(&image).map_err(|e| {
            DocMatrixError::encoding(TargetFormat::Image, format!("page {}: {e}", idx + 1))
        })?;
        results.push(png);
    }

    Ok(results)
}

/// Number of pages in a PDF.
pub fn page_count_blocking(name: &str, bytes: &[u8]) -> Result<usize, DocMatrixError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| DocMatrixError::extraction(name, SourceFormat::Pdf, format!("{e:?}")))?;
    let count = document.pages().len() as usize;
    Ok(count)
}
