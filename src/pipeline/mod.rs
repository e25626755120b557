//! Shared pipeline stages used by the conversion routes.
//!
//! Each submodule implements exactly one step. Keeping stages separate
//! makes each independently testable and keeps network and pdfium concerns
//! out of the format readers and writers.
//!
//! ## Data Flow (OCR routes)
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ ocr ──▶ postprocess
//! (URL/path)  (pdfium)  (PNG/b64)  (HTTP)   (cleanup + checks)
//! ```
//!
//! 1. [`input`] : read a user-supplied path or URL into a source document
//! 2. [`engine`]: bind the pdfium library without panicking
//! 3. [`render`]: rasterise PDF pages; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 4. [`encode`]: PNG-encode images and wrap bytes as data URLs
//! 5. [`ocr`]   : drive the OCR call with retry/backoff and the server
//!    deadline; the only stage with network I/O besides downloads
//! 6. [`postprocess`]: deterministic cleanup, quality gate and numeric
//!    corrections for OCR text

pub mod encode;
pub mod engine;
pub mod input;
pub mod ocr;
pub mod postprocess;
pub mod render;
