//! # edgequake-docmatrix
//!
//! Convert between PDF, Word (DOCX), Excel (XLSX), PowerPoint (PPTX), plain
//! text and raster images, in-process.
//!
//! ## Why this crate?
//!
//! Office-automation and LibreOffice bridges are heavy, slow to start and
//! hard to sandbox. This crate instead parses each source into a small set
//! of primitives (text runs, positioned glyph segments, slide paragraphs,
//! spreadsheet cell grids) and synthesises the target from those. Layout is
//! best-effort. Content is what survives.
//!
//! ## Pipeline Overview
//!
//! ```text
//! source bytes
//!  │
//!  ├─ 1. Input     local file, URL download, or in-memory bytes
//!  ├─ 2. Extract   readers::{pdf, word, excel, ppt, text}; images go to OCR
//!  ├─ 3. Normalise text / grid / node tree / slides
//!  ├─ 4. Encode    writers::{pdf, word, excel, ppt}; images via rasterisation
//!  └─ 5. Output    ConversionResult (text, page images or a document)
//! ```
//!
//! Every advertised source/target pair (30 tools, see
//! [`format::TOOL_MATRIX`]) has a route in the [`ConversionRegistry`]. Batches
//! run through the [`Orchestrator`], which tracks per-file state and
//! progress, or through [`convert_stream`] when results should be consumed
//! as they settle.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docmatrix::{convert, ConversionConfig, SourceDocument, TargetFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let doc = SourceDocument::text("people.txt", "Name\tAge\nAlice\t30");
//!     let result = convert(doc, TargetFormat::Excel, &config).await?;
//!     std::fs::write(result.filename(), result.as_bytes().unwrap_or_default())?;
//!     Ok(())
//! }
//! ```
//!
//! ## Native and remote collaborators
//!
//! PDF reading, writing and rasterising use the pdfium shared library (see
//! [`pipeline::engine`]). Image sources bound for text-like targets are sent
//! to an OCR service (see [`pipeline::ocr`]); every other route is local.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docmatrix` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-docmatrix = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod archive;
pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod formats;
pub mod merge;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod readers;
pub mod registry;
pub mod stream;
pub mod writers;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use archive::{batch_archive_name, package_batch};
pub use config::{ConversionConfig, ConversionConfigBuilder, OcrSettings, Orientation};
pub use convert::{
    convert, convert_input, convert_sync, convert_to_path, inspect, inspect_input, DocumentInfo,
};
pub use error::{DocMatrixError, FileError, FileErrorKind};
pub use format::{DocumentFormat, SourceDocument, SourceFormat, TargetFormat, Tool, TOOL_MATRIX};
pub use formats::ExtractedContent;
pub use merge::merge;
pub use orchestrator::{FileBoard, Orchestrator};
pub use output::{BatchReport, ConversionResult, FileState, FileStatus};
pub use pipeline::ocr::{HttpOcrEngine, OcrEngine, OcrRequest};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use registry::{ConversionRegistry, Route};
pub use stream::{convert_stream, FileStream};
